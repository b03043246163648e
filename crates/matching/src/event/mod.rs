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

mod bus;

use chrono::{DateTime, Utc};
use papermill_sdk::types::{OrderId, OrderStatus, OwnerId, Position, Quote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Fill;

pub use bus::{EventBus, EventBusError, EventConsumer};

/// Sequence number for event ordering
///
/// Every event published by one engine gets a strictly increasing
/// sequence number, whether or not anyone is subscribed.
pub type SequenceNumber = u64;

/// Events produced by the matching engine
///
/// Subscribers (WebSocket fan-out, persistence writers) receive these
/// through an [`EventBus`] queue. Events are immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
	/// A quote was ingested
	Tick { seq: SequenceNumber, quote: Quote },

	/// An order moved to a new status
	///
	/// `previous` is `None` for the initial `pending` status.
	OrderStatusChanged {
		seq: SequenceNumber,
		order_id: OrderId,
		owner: OwnerId,
		symbol: String,
		previous: Option<OrderStatus>,
		status: OrderStatus,
		timestamp: DateTime<Utc>,
	},

	/// An armed stop order switched to market semantics
	StopTriggered {
		seq: SequenceNumber,
		order_id: OrderId,
		symbol: String,
		stop_price: Decimal,
		last: Decimal,
		timestamp: DateTime<Utc>,
	},

	/// An order executed in full
	Fill { seq: SequenceNumber, fill: Fill },

	/// A position changed through a fill or a mark
	///
	/// `position` is `None` when the position was closed.
	PositionUpdated {
		seq: SequenceNumber,
		owner: OwnerId,
		symbol: String,
		position: Option<Position>,
		timestamp: DateTime<Utc>,
	},
}

impl EngineEvent {
	/// Get the sequence number of this event
	pub fn sequence(&self) -> SequenceNumber {
		match self {
			EngineEvent::Tick { seq, .. } => *seq,
			EngineEvent::OrderStatusChanged { seq, .. } => *seq,
			EngineEvent::StopTriggered { seq, .. } => *seq,
			EngineEvent::Fill { seq, .. } => *seq,
			EngineEvent::PositionUpdated { seq, .. } => *seq,
		}
	}

	/// Get the symbol associated with this event
	pub fn symbol(&self) -> &str {
		match self {
			EngineEvent::Tick { quote, .. } => &quote.symbol,
			EngineEvent::OrderStatusChanged { symbol, .. } => symbol,
			EngineEvent::StopTriggered { symbol, .. } => symbol,
			EngineEvent::Fill { fill, .. } => &fill.symbol,
			EngineEvent::PositionUpdated { symbol, .. } => symbol,
		}
	}

	/// Get the order_id associated with this event (if applicable)
	pub fn order_id(&self) -> Option<OrderId> {
		match self {
			EngineEvent::OrderStatusChanged { order_id, .. } => Some(*order_id),
			EngineEvent::StopTriggered { order_id, .. } => Some(*order_id),
			EngineEvent::Fill { fill, .. } => Some(fill.order_id),
			EngineEvent::Tick { .. } | EngineEvent::PositionUpdated { .. } => None,
		}
	}

	/// Check if this event moves an order into a terminal status
	pub fn is_order_complete(&self) -> bool {
		matches!(
			self,
			EngineEvent::OrderStatusChanged { status, .. } if status.is_terminal()
		)
	}
}
