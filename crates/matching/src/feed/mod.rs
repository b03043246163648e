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

//! Market data drivers
//!
//! A driver pushes quotes into a [`QuoteSink`] on its own threads. The only
//! driver shipped here is [`SimulatedFeed`], a seeded random walk.

mod simulated;

use papermill_sdk::types::Quote;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{
	DEFAULT_FEED_SPREAD, DEFAULT_FEED_VOLATILITY, DEFAULT_MAX_TICK_VOLUME, DEFAULT_PRICE_SCALE,
	DEFAULT_TICK_INTERVAL_MS, MAX_PRICE_SCALE,
};

pub use simulated::{SimulatedFeed, Subscription, next_quote};

/// Identifier of one emitter, unique per feed
pub type SubscriptionId = u64;

/// Destination of market data
///
/// Implemented by the engine handle; tests plug in recording sinks.
pub trait QuoteSink: Send + Sync {
	/// Deliver one quote
	fn on_quote(&self, quote: Quote);

	/// Latest known quote for `symbol`, used as the random walk's start
	fn current_quote(&self, symbol: &str) -> Quote;
}

/// Simulated feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
	/// Symbols the binary subscribes at startup
	pub symbols: Vec<String>,
	pub tick_interval_ms: u64,
	/// Maximum relative move per tick
	pub volatility: Decimal,
	pub spread: Decimal,
	/// Base RNG seed; each subscription uses `seed + id`
	pub seed: u64,
	/// Decimal places of simulated prices
	pub price_scale: u32,
	pub max_volume: u64,
}

impl Default for FeedConfig {
	fn default() -> Self {
		Self {
			symbols: vec!["AAPL".to_string(), "MSFT".to_string()],
			tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
			volatility: DEFAULT_FEED_VOLATILITY,
			spread: DEFAULT_FEED_SPREAD,
			seed: 0,
			price_scale: DEFAULT_PRICE_SCALE,
			max_volume: DEFAULT_MAX_TICK_VOLUME,
		}
	}
}

impl FeedConfig {
	pub fn validate(&self) -> Result<(), FeedError> {
		if self.tick_interval_ms == 0 {
			return Err(FeedError::InvalidConfig(
				"tick_interval_ms must be greater than zero".to_string(),
			));
		}
		if self.volatility < Decimal::ZERO || self.spread < Decimal::ZERO {
			return Err(FeedError::InvalidConfig(
				"volatility and spread must not be negative".to_string(),
			));
		}
		if self.price_scale > MAX_PRICE_SCALE {
			return Err(FeedError::InvalidConfig(format!(
				"price_scale must not exceed {}, got {}",
				MAX_PRICE_SCALE, self.price_scale
			)));
		}
		if self.max_volume == 0 {
			return Err(FeedError::InvalidConfig(
				"max_volume must be greater than zero".to_string(),
			));
		}
		Ok(())
	}
}

/// Error types for market data drivers
#[derive(Debug, Error)]
pub enum FeedError {
	#[error("Invalid feed configuration: {0}")]
	InvalidConfig(String),
	#[error("Failed to spawn emitter thread: {0}")]
	SpawnFailed(String),
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	#[test]
	fn test_default_config_is_valid() {
		assert!(FeedConfig::default().validate().is_ok());
	}

	#[test]
	fn test_rejects_zero_interval() {
		let config = FeedConfig {
			tick_interval_ms: 0,
			..FeedConfig::default()
		};
		assert!(matches!(config.validate(), Err(FeedError::InvalidConfig(_))));
	}

	#[test]
	fn test_rejects_negative_volatility() {
		let config = FeedConfig {
			volatility: dec!(-0.01),
			..FeedConfig::default()
		};
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_rejects_price_scale_beyond_decimal_precision() {
		let config = FeedConfig {
			price_scale: MAX_PRICE_SCALE + 2,
			..FeedConfig::default()
		};
		assert!(matches!(config.validate(), Err(FeedError::InvalidConfig(_))));

		let config = FeedConfig {
			price_scale: MAX_PRICE_SCALE,
			..FeedConfig::default()
		};
		assert!(config.validate().is_ok());
	}
}
