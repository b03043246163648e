// Copyright 2025 chenjjiaa
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

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::{engine::EngineConfig, feed::FeedConfig};

// Logging configuration constants
/// Default log level (can be overridden by RUST_LOG environment variable)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Log directory component name and log file prefix
pub const LOG_COMPONENT_NAME: &str = "papermill";

/// Default console output enabled (can be overridden by LOG_TO_CONSOLE environment variable)
pub const DEFAULT_LOG_TO_CONSOLE: bool = false;

// Engine configuration constants
/// Base price used to synthesize a quote for a symbol that was never observed
pub const DEFAULT_QUOTE_PRICE: Decimal = dec!(100.00);

/// Bid/ask spread of a synthesized quote
pub const DEFAULT_QUOTE_SPREAD: Decimal = dec!(0.10);

/// Per-subscriber event queue capacity
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 4_096;

/// Largest accepted order quantity
pub const MAX_ORDER_QUANTITY: Decimal = dec!(1_000_000_000);

/// Largest accepted limit or stop price
pub const MAX_ORDER_PRICE: Decimal = dec!(1_000_000_000);

// Simulated feed configuration constants
/// Interval between two simulated ticks of one subscription
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

/// Maximum relative price move per tick (0.002 = 0.2%)
pub const DEFAULT_FEED_VOLATILITY: Decimal = dec!(0.002);

/// Bid/ask spread of simulated quotes
pub const DEFAULT_FEED_SPREAD: Decimal = dec!(0.10);

/// Decimal places simulated prices are rounded to
pub const DEFAULT_PRICE_SCALE: u32 = 2;

/// Largest supported `price_scale` (decimal places a `Decimal` can hold)
pub const MAX_PRICE_SCALE: u32 = 28;

/// Upper bound of the simulated per-tick volume
pub const DEFAULT_MAX_TICK_VOLUME: u64 = 10_000;

/// Environment variable prefix, e.g. `PAPERMILL_ENGINE__MARK_REFERENCE=mid`
const ENV_PREFIX: &str = "PAPERMILL";

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PapermillConfig {
	pub engine: EngineConfig,
	pub feed: FeedConfig,
}

impl PapermillConfig {
	/// Load configuration from environment variables
	pub fn from_env() -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(Self::environment())
			.build()?;

		cfg.try_deserialize()
	}

	/// Load configuration from file, overridden by environment variables
	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::File::with_name(path))
			.add_source(Self::environment())
			.build()?;

		cfg.try_deserialize()
	}

	fn environment() -> config::Environment {
		config::Environment::with_prefix(ENV_PREFIX)
			.prefix_separator("_")
			.separator("__")
			.list_separator(",")
			.with_list_parse_key("feed.symbols")
			.try_parsing(true)
	}
}
