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

//! Paper-trading engine service entry point
//!
//! This binary wires up:
//! - Logging (file + optional console)
//! - Matching engine behind a shared handle
//! - Event relay thread logging every engine event as JSON
//! - Simulated feed subscriptions for the configured symbols

use std::{
	sync::Arc,
	thread::{self, JoinHandle},
};

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use papermill_matching::{
	EngineHandle, EventConsumer, MatchingEngine, PapermillConfig, QuoteSink, SimulatedFeed,
	logging,
};

#[tokio::main]
async fn main() -> Result<()> {
	logging::init_logging()?;

	let config = PapermillConfig::from_env().unwrap_or_else(|e| {
		warn!(target: "server", error = %e, "Invalid configuration, using defaults");
		PapermillConfig::default()
	});

	info!(target: "server", "Starting papermill paper-trading engine");
	info!(target: "server", "Mark reference: {:?}", config.engine.mark_reference);
	info!(target: "server", "Over-sell policy: {:?}", config.engine.oversell_policy);
	info!(target: "server", "Event buffer size: {}", config.engine.event_buffer_size);
	info!(target: "server", "Feed symbols: {:?}", config.feed.symbols);

	let engine = EngineHandle::new(MatchingEngine::new(config.engine.clone()));

	info!(target: "server", "Starting event relay...");
	let relay = spawn_relay(engine.subscribe())?;

	info!(target: "server", "Starting simulated feed...");
	let sink: Arc<dyn QuoteSink> = Arc::new(engine.clone());
	let feed = SimulatedFeed::new(config.feed.clone(), sink).context("Failed to start feed")?;
	let subscriptions = config
		.feed
		.symbols
		.iter()
		.map(|symbol| feed.subscribe(symbol))
		.collect::<Result<Vec<_>, _>>()
		.context("Failed to subscribe feed symbols")?;

	signal::ctrl_c()
		.await
		.context("Failed to listen for shutdown signal")?;

	info!(target: "server", "Shutting down components...");
	for subscription in subscriptions {
		subscription.cancel();
	}
	drop(feed);

	// The relay exits once the last engine handle is gone
	drop(engine);
	if relay.join().is_err() {
		warn!(target: "server", "Event relay thread panicked");
	}

	info!(target: "server", "Shutdown complete");
	Ok(())
}

fn spawn_relay(consumer: EventConsumer) -> Result<JoinHandle<()>> {
	thread::Builder::new()
		.name("event-relay".to_string())
		.spawn(move || {
			while let Ok(event) = consumer.recv() {
				match serde_json::to_string(&event) {
					Ok(json) => info!(target: "relay", seq = event.sequence(), "{}", json),
					Err(e) => warn!(target: "relay", error = %e, "Failed to encode event"),
				}
			}
			info!(target: "relay", "Event relay stopped");
		})
		.context("Failed to spawn event relay thread")
}
