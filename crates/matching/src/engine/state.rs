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

use std::collections::HashMap;

use papermill_sdk::types::OrderId;

use crate::{
	ledger::PositionLedger,
	quote::QuoteStore,
	types::Order,
};

use super::EngineConfig;

/// Matching engine state
///
/// This structure holds the complete mutable state of one engine:
/// - Quote store (latest quote per symbol)
/// - Every order placed on this engine, live or terminal
/// - Per-symbol index of resting orders in placement order
/// - Position ledger
///
/// Nothing here is shared between engines; each instance starts empty.
pub struct MatchingEngineState {
	pub quotes: QuoteStore,
	pub orders: HashMap<OrderId, Order>,
	/// Symbol -> live order ids, oldest first
	pub resting: HashMap<String, Vec<OrderId>>,
	pub ledger: PositionLedger,
}

impl MatchingEngineState {
	pub fn new(config: &EngineConfig) -> Self {
		Self {
			quotes: QuoteStore::new(config.default_price, config.default_spread),
			orders: HashMap::new(),
			resting: HashMap::new(),
			ledger: PositionLedger::new(config.oversell_policy),
		}
	}

	/// Reset state to initial conditions
	pub fn reset(&mut self, config: &EngineConfig) {
		*self = Self::new(config);
	}

	/// Number of live orders across all symbols
	pub fn resting_count(&self) -> usize {
		self.resting.values().map(Vec::len).sum()
	}
}
