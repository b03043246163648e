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

use std::sync::{Arc, Mutex, MutexGuard};

use papermill_sdk::types::{OrderId, OrderRequest, OrderResult, OwnerId, Position, Quote};
use tracing::warn;

use super::{EngineConfig, EngineError, MatchingEngine};
use crate::{event::EventConsumer, feed::QuoteSink, types::TickReport};

/// Cloneable, thread-safe handle to one matching engine
///
/// Every call takes the engine lock for its whole duration, so a quote
/// update and an order placement never interleave.
#[derive(Clone)]
pub struct EngineHandle {
	inner: Arc<Mutex<MatchingEngine>>,
}

impl EngineHandle {
	pub fn new(engine: MatchingEngine) -> Self {
		Self {
			inner: Arc::new(Mutex::new(engine)),
		}
	}

	pub fn with_config(config: EngineConfig) -> Self {
		Self::new(MatchingEngine::new(config))
	}

	fn lock(&self) -> MutexGuard<'_, MatchingEngine> {
		self.inner.lock().unwrap_or_else(|poisoned| {
			warn!(target: "engine", "Engine lock poisoned, recovering state");
			poisoned.into_inner()
		})
	}

	/// Run `f` with exclusive access to the engine
	pub fn with<R>(&self, f: impl FnOnce(&mut MatchingEngine) -> R) -> R {
		f(&mut self.lock())
	}

	pub fn place(&self, owner: OwnerId, request: OrderRequest) -> Result<OrderResult, EngineError> {
		self.lock().place(owner, request)
	}

	pub fn on_quote_update(&self, quote: Quote) -> TickReport {
		self.lock().on_quote_update(quote)
	}

	pub fn status(&self, order_id: OrderId) -> Result<OrderResult, EngineError> {
		self.lock().status(order_id)
	}

	pub fn cancel(&self, order_id: OrderId) -> Result<OrderResult, EngineError> {
		self.lock().cancel(order_id)
	}

	pub fn positions(&self, owner: &OwnerId) -> Vec<Position> {
		self.lock().positions(owner)
	}

	pub fn position(&self, owner: &OwnerId, symbol: &str) -> Option<Position> {
		self.lock().position(owner, symbol)
	}

	pub fn open_orders(&self, owner: &OwnerId) -> Vec<OrderResult> {
		self.lock().open_orders(owner)
	}

	pub fn quote(&self, symbol: &str) -> Quote {
		self.lock().quote(symbol)
	}

	pub fn subscribe(&self) -> EventConsumer {
		self.lock().subscribe()
	}
}

impl QuoteSink for EngineHandle {
	fn on_quote(&self, quote: Quote) {
		self.on_quote_update(quote);
	}

	fn current_quote(&self, symbol: &str) -> Quote {
		self.quote(symbol)
	}
}
