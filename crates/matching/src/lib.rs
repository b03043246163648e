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

//! Papermill paper-trading engine
//!
//! Simulated order execution against live or synthetic quotes, with
//! per-owner position accounting.
//!
//! Architecture:
//! - Quote store holding the latest quote per symbol
//! - Matching engine filling market, limit and stop orders against the quote
//!   (no book, no partial fills)
//! - Position ledger with weighted-average cost and mark-to-market P&L
//! - Event bus fanning engine events out to bounded subscriber queues
//! - Simulated market data feed driving the engine from emitter threads

pub mod config;
pub mod engine;
pub mod event;
pub mod feed;
pub mod ledger;
pub mod logging;
pub mod matcher;
pub mod quote;
pub mod types;

pub use config::PapermillConfig;
pub use engine::{EngineConfig, EngineError, EngineHandle, MatchingEngine, MatchingEngineState};
pub use event::{EngineEvent, EventBus, EventBusError, EventConsumer, SequenceNumber};
pub use feed::{FeedConfig, FeedError, QuoteSink, SimulatedFeed, Subscription, SubscriptionId};
pub use ledger::{LedgerError, LedgerUpdate, MarkReference, OversellPolicy, PositionLedger};
pub use quote::QuoteStore;
pub use types::*;
