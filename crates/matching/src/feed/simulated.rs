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

use std::{
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	thread::{self, JoinHandle},
	time::Duration,
};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, bounded};
use dashmap::DashMap;
use papermill_sdk::types::Quote;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use tracing::{debug, info, trace, warn};

use super::{FeedConfig, FeedError, QuoteSink, SubscriptionId};
use crate::config::MAX_PRICE_SCALE;

/// Random-walk quote generator
///
/// Every subscription runs its own emitter thread with its own RNG seeded
/// from `seed + id`, so a given configuration replays the same walk.
///
/// Two ways to subscribe:
/// - [`SimulatedFeed::subscribe`] hands the [`Subscription`] to the caller
/// - [`SimulatedFeed::subscribe_detached`] keeps it in the feed's registry,
///   to be stopped by id, by symbol or on shutdown
pub struct SimulatedFeed {
	config: FeedConfig,
	sink: Arc<dyn QuoteSink>,
	next_id: AtomicU64,
	detached: DashMap<SubscriptionId, Subscription>,
}

impl SimulatedFeed {
	pub fn new(config: FeedConfig, sink: Arc<dyn QuoteSink>) -> Result<Self, FeedError> {
		config.validate()?;

		Ok(Self {
			config,
			sink,
			next_id: AtomicU64::new(1),
			detached: DashMap::new(),
		})
	}

	pub fn config(&self) -> &FeedConfig {
		&self.config
	}

	/// Start an emitter for `symbol`
	///
	/// The walk starts from the sink's current quote. Ticks stop once the
	/// returned subscription is cancelled or dropped.
	pub fn subscribe(&self, symbol: &str) -> Result<Subscription, FeedError> {
		if symbol.trim().is_empty() {
			return Err(FeedError::InvalidConfig(
				"symbol must not be empty".to_string(),
			));
		}

		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let start = self.sink.current_quote(symbol).last;
		let rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(id));
		let (stop_tx, stop_rx) = bounded::<()>(1);

		let emitter = Emitter {
			symbol: symbol.to_string(),
			last: start,
			config: self.config.clone(),
			rng,
			sink: Arc::clone(&self.sink),
			stop: stop_rx,
		};

		let thread_handle = thread::Builder::new()
			.name(format!("feed-{}-{}", symbol, id))
			.spawn(move || emitter.run())
			.map_err(|e| FeedError::SpawnFailed(e.to_string()))?;

		info!(
			target: "feed",
			subscription = id,
			symbol = %symbol,
			start = %start,
			interval_ms = self.config.tick_interval_ms,
			"Feed subscription started"
		);

		Ok(Subscription {
			id,
			symbol: symbol.to_string(),
			stop: Some(stop_tx),
			thread_handle: Some(thread_handle),
		})
	}

	/// Start an emitter owned by the feed
	pub fn subscribe_detached(&self, symbol: &str) -> Result<SubscriptionId, FeedError> {
		let subscription = self.subscribe(symbol)?;
		let id = subscription.id;
		self.detached.insert(id, subscription);
		Ok(id)
	}

	/// Stop one feed-owned emitter; returns false for unknown ids
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		match self.detached.remove(&id) {
			Some((_, subscription)) => {
				subscription.cancel();
				true
			}
			None => false,
		}
	}

	/// Stop every feed-owned emitter of `symbol`
	pub fn unsubscribe_symbol(&self, symbol: &str) -> usize {
		let ids: Vec<SubscriptionId> = self
			.detached
			.iter()
			.filter(|entry| entry.value().symbol == symbol)
			.map(|entry| *entry.key())
			.collect();

		ids.into_iter().filter(|id| self.unsubscribe(*id)).count()
	}

	/// Number of feed-owned emitters
	pub fn active_subscriptions(&self) -> usize {
		self.detached.len()
	}

	/// Stop every feed-owned emitter
	pub fn shutdown(&self) {
		let ids: Vec<SubscriptionId> = self.detached.iter().map(|entry| *entry.key()).collect();
		if ids.is_empty() {
			return;
		}

		info!(target: "feed", subscriptions = ids.len(), "Shutting down simulated feed");
		for id in ids {
			self.unsubscribe(id);
		}
	}
}

impl Drop for SimulatedFeed {
	fn drop(&mut self) {
		self.shutdown();
	}
}

/// Cancellation handle of one emitter
///
/// Cancelling is synchronous: once [`Subscription::cancel`] returns, the
/// emitter thread has exited and no further quote from it reaches the sink.
/// Dropping the handle cancels as well.
///
/// Do not cancel while holding a lock the sink needs; the emitter may be
/// waiting on it and the join would never return.
pub struct Subscription {
	id: SubscriptionId,
	symbol: String,
	stop: Option<Sender<()>>,
	thread_handle: Option<JoinHandle<()>>,
}

impl Subscription {
	pub fn id(&self) -> SubscriptionId {
		self.id
	}

	pub fn symbol(&self) -> &str {
		&self.symbol
	}

	pub fn is_running(&self) -> bool {
		self.thread_handle
			.as_ref()
			.is_some_and(|handle| !handle.is_finished())
	}

	/// Stop the emitter and wait for its thread to exit
	pub fn cancel(mut self) {
		self.stop_and_join();
	}

	fn stop_and_join(&mut self) {
		// Disconnecting the channel wakes the emitter immediately
		self.stop.take();

		if let Some(handle) = self.thread_handle.take() {
			if let Err(e) = handle.join() {
				warn!(target: "feed", subscription = self.id, error = ?e, "Emitter thread panicked");
			}
			info!(target: "feed", subscription = self.id, symbol = %self.symbol, "Feed subscription stopped");
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.stop_and_join();
	}
}

struct Emitter {
	symbol: String,
	last: Decimal,
	config: FeedConfig,
	rng: ChaCha8Rng,
	sink: Arc<dyn QuoteSink>,
	stop: Receiver<()>,
}

impl Emitter {
	fn run(mut self) {
		let interval = Duration::from_millis(self.config.tick_interval_ms);
		let mut ticks: u64 = 0;

		loop {
			match self.stop.recv_timeout(interval) {
				Err(RecvTimeoutError::Timeout) => {}
				Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
			}

			let quote = next_quote(&self.symbol, self.last, &self.config, &mut self.rng);
			trace!(
				target: "feed",
				symbol = %quote.symbol,
				bid = %quote.bid,
				ask = %quote.ask,
				last = %quote.last,
				"Simulated tick"
			);
			self.last = quote.last;
			self.sink.on_quote(quote);
			ticks += 1;
		}

		debug!(target: "feed", symbol = %self.symbol, ticks, "Emitter exited");
	}
}

/// Produce the next quote of a random walk from `last`
///
/// The relative move is uniform in `[-volatility, +volatility]`. Prices are
/// rounded to `price_scale` places and kept high enough that the bid stays
/// at or above one price increment. The spread is rounded to the same scale
/// and applied exactly, so `ask - bid` never drifts from it.
pub fn next_quote<R: Rng>(symbol: &str, last: Decimal, config: &FeedConfig, rng: &mut R) -> Quote {
	let step = Decimal::new(rng.gen_range(-1_000_000i64..=1_000_000), 6);
	let moved = last
		.checked_mul(config.volatility)
		.and_then(|scaled| scaled.checked_mul(step))
		.and_then(|change| last.checked_add(change))
		.unwrap_or(last);

	let scale = config.price_scale.min(MAX_PRICE_SCALE);
	let increment = Decimal::new(1, scale);
	let spread = config.spread.round_dp(scale);
	let floor = increment + spread;

	let price = moved.round_dp(scale).max(floor);
	let bid = (price - spread / Decimal::TWO).round_dp(scale);
	let ask = bid + spread;
	let volume = rng.gen_range(1..=config.max_volume);

	Quote::new(symbol, bid, ask, price).with_volume(volume)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;
	use std::sync::Mutex;

	#[test]
	fn test_next_quote_is_reproducible() {
		let config = FeedConfig::default();
		let mut a = ChaCha8Rng::seed_from_u64(42);
		let mut b = ChaCha8Rng::seed_from_u64(42);

		let mut last_a = dec!(150.00);
		let mut last_b = dec!(150.00);
		for _ in 0..50 {
			let qa = next_quote("AAPL", last_a, &config, &mut a);
			let qb = next_quote("AAPL", last_b, &config, &mut b);
			assert_eq!((qa.bid, qa.ask, qa.last, qa.volume), (qb.bid, qb.ask, qb.last, qb.volume));
			last_a = qa.last;
			last_b = qb.last;
		}
	}

	#[test]
	fn test_next_quote_stays_within_bounds() {
		let config = FeedConfig::default();
		let mut rng = ChaCha8Rng::seed_from_u64(7);
		let last = dec!(150.00);
		let max_move = last * config.volatility + dec!(0.01);

		for _ in 0..200 {
			let quote = next_quote("AAPL", last, &config, &mut rng);
			assert!((quote.last - last).abs() <= max_move);
			assert_eq!(quote.ask - quote.bid, config.spread);
			assert!(quote.volume >= 1 && quote.volume <= config.max_volume);
		}
	}

	#[test]
	fn test_odd_spread_is_kept_exact() {
		let config = FeedConfig {
			spread: dec!(0.05),
			price_scale: 2,
			..FeedConfig::default()
		};
		let mut rng = ChaCha8Rng::seed_from_u64(11);
		let mut last = dec!(100.00);

		for _ in 0..100 {
			let quote = next_quote("AAPL", last, &config, &mut rng);
			assert_eq!(quote.ask - quote.bid, dec!(0.05));
			assert!(quote.bid <= quote.last && quote.last <= quote.ask);
			assert_eq!(quote.bid, quote.bid.round_dp(2));
			last = quote.last;
		}
	}

	#[test]
	fn test_spread_finer_than_price_scale_is_rounded() {
		let config = FeedConfig {
			spread: dec!(0.125),
			price_scale: 2,
			..FeedConfig::default()
		};
		let mut rng = ChaCha8Rng::seed_from_u64(5);

		let quote = next_quote("AAPL", dec!(100.00), &config, &mut rng);
		assert_eq!(quote.ask - quote.bid, dec!(0.12));
	}

	#[test]
	fn test_next_quote_never_reaches_zero() {
		let config = FeedConfig {
			volatility: dec!(2),
			..FeedConfig::default()
		};
		let mut rng = ChaCha8Rng::seed_from_u64(3);
		let mut last = dec!(0.05);

		for _ in 0..20 {
			let quote = next_quote("PENNY", last, &config, &mut rng);
			assert!(quote.bid > Decimal::ZERO);
			assert!(quote.bid < quote.ask);
			last = quote.last;
		}
	}

	struct Recorder {
		quotes: Mutex<Vec<Quote>>,
	}

	impl QuoteSink for Recorder {
		fn on_quote(&self, quote: Quote) {
			self.quotes.lock().unwrap().push(quote);
		}

		fn current_quote(&self, symbol: &str) -> Quote {
			Quote::new(symbol, dec!(99.95), dec!(100.05), dec!(100.00))
		}
	}

	fn fast_feed() -> (SimulatedFeed, Arc<Recorder>) {
		let recorder = Arc::new(Recorder {
			quotes: Mutex::new(Vec::new()),
		});
		let config = FeedConfig {
			tick_interval_ms: 5,
			..FeedConfig::default()
		};
		let feed = SimulatedFeed::new(config, recorder.clone()).unwrap();
		(feed, recorder)
	}

	#[test]
	fn test_rejects_empty_symbol() {
		let (feed, _) = fast_feed();
		assert!(matches!(feed.subscribe(""), Err(FeedError::InvalidConfig(_))));
	}

	#[test]
	fn test_detached_registry() {
		let (feed, recorder) = fast_feed();

		let first = feed.subscribe_detached("AAPL").unwrap();
		feed.subscribe_detached("AAPL").unwrap();
		feed.subscribe_detached("MSFT").unwrap();
		assert_eq!(feed.active_subscriptions(), 3);

		assert!(feed.unsubscribe(first));
		assert!(!feed.unsubscribe(first));
		assert_eq!(feed.unsubscribe_symbol("AAPL"), 1);
		assert_eq!(feed.active_subscriptions(), 1);

		feed.shutdown();
		assert_eq!(feed.active_subscriptions(), 0);

		let delivered = recorder.quotes.lock().unwrap().len();
		thread::sleep(Duration::from_millis(30));
		assert_eq!(recorder.quotes.lock().unwrap().len(), delivered);
	}
}
