// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use crossbeam::channel::{
	Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError, bounded,
};
use tracing::{debug, warn};

use super::{EngineEvent, SequenceNumber};

struct Subscriber {
	id: u64,
	sender: Sender<EngineEvent>,
}

/// Fan-out bus from the engine to its subscribers
///
/// Each subscriber gets its own bounded queue. Publishing never blocks the
/// engine:
/// - a full subscriber queue drops the event for that subscriber only
/// - a disconnected subscriber is removed on the next publish
///
/// The bus also owns the engine's event sequence counter.
pub struct EventBus {
	subscribers: Vec<Subscriber>,
	next_subscriber_id: u64,
	last_sequence: SequenceNumber,
	dropped: u64,
}

impl EventBus {
	pub fn new() -> Self {
		Self {
			subscribers: Vec::new(),
			next_subscriber_id: 1,
			last_sequence: 0,
			dropped: 0,
		}
	}

	/// Attach a subscriber with its own queue of `capacity` events
	pub fn subscribe(&mut self, capacity: usize) -> EventConsumer {
		let (sender, receiver) = bounded(capacity.max(1));
		let id = self.next_subscriber_id;
		self.next_subscriber_id += 1;
		self.subscribers.push(Subscriber { id, sender });

		debug!(target: "event_bus", subscriber = id, capacity, "Subscriber attached");

		EventConsumer { id, receiver }
	}

	/// Assign the next sequence number and deliver the event to every subscriber
	pub fn publish(&mut self, build: impl FnOnce(SequenceNumber) -> EngineEvent) -> SequenceNumber {
		self.last_sequence += 1;
		let seq = self.last_sequence;
		let event = build(seq);

		let mut dropped = 0;
		self.subscribers
			.retain(|subscriber| match subscriber.sender.try_send(event.clone()) {
				Ok(()) => true,
				Err(TrySendError::Full(_)) => {
					dropped += 1;
					warn!(
						target: "event_bus",
						subscriber = subscriber.id,
						seq,
						"Subscriber queue full, event dropped"
					);
					true
				}
				Err(TrySendError::Disconnected(_)) => {
					debug!(target: "event_bus", subscriber = subscriber.id, "Subscriber detached");
					false
				}
			});
		self.dropped += dropped;

		seq
	}

	pub fn last_sequence(&self) -> SequenceNumber {
		self.last_sequence
	}

	pub fn subscriber_count(&self) -> usize {
		self.subscribers.len()
	}

	/// Total events dropped because a subscriber queue was full
	pub fn dropped(&self) -> u64 {
		self.dropped
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new()
	}
}

/// Receiving end of one subscription
///
/// Dropping the consumer detaches it from the bus.
pub struct EventConsumer {
	id: u64,
	receiver: Receiver<EngineEvent>,
}

impl EventConsumer {
	pub fn id(&self) -> u64 {
		self.id
	}

	/// Try to receive an event (non-blocking)
	pub fn try_recv(&self) -> Result<EngineEvent, EventBusError> {
		self.receiver.try_recv().map_err(|e| match e {
			TryRecvError::Empty => EventBusError::Empty,
			TryRecvError::Disconnected => EventBusError::Disconnected,
		})
	}

	/// Receive an event (blocking until one arrives or the engine is dropped)
	pub fn recv(&self) -> Result<EngineEvent, EventBusError> {
		self.receiver
			.recv()
			.map_err(|_| EventBusError::Disconnected)
	}

	/// Receive an event, waiting at most `timeout`
	pub fn recv_timeout(&self, timeout: Duration) -> Result<EngineEvent, EventBusError> {
		self.receiver.recv_timeout(timeout).map_err(|e| match e {
			RecvTimeoutError::Timeout => EventBusError::Timeout,
			RecvTimeoutError::Disconnected => EventBusError::Disconnected,
		})
	}

	/// Drain up to `max_count` queued events (non-blocking)
	pub fn drain(&self, max_count: usize) -> Vec<EngineEvent> {
		self.receiver.try_iter().take(max_count).collect()
	}

	pub fn len(&self) -> usize {
		self.receiver.len()
	}

	pub fn is_empty(&self) -> bool {
		self.receiver.is_empty()
	}
}

/// Errors that can occur when reading from the event bus
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
	#[error("Event queue is empty")]
	Empty,
	#[error("Timed out waiting for an event")]
	Timeout,
	#[error("Event bus disconnected")]
	Disconnected,
}
