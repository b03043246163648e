//! Integration tests for the simulated market data feed
//!
//! These tests verify:
//! - Ticks reach the sink on each subscription
//! - Cancellation is synchronous and isolated per subscription
//! - The feed drives resting orders through the engine handle

use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
	thread,
	time::Duration,
};

use papermill_matching::{
	EngineConfig, EngineHandle, FeedConfig, FeedError, QuoteSink, SimulatedFeed,
};
use papermill_sdk::types::{OrderRequest, OrderStatus, OwnerId, Quote, Side};
use rust_decimal_macros::dec;

#[derive(Default)]
struct CountingSink {
	counts: Mutex<HashMap<String, usize>>,
}

impl CountingSink {
	fn count(&self, symbol: &str) -> usize {
		self.counts.lock().unwrap().get(symbol).copied().unwrap_or(0)
	}
}

impl QuoteSink for CountingSink {
	fn on_quote(&self, quote: Quote) {
		*self.counts.lock().unwrap().entry(quote.symbol).or_default() += 1;
	}

	fn current_quote(&self, symbol: &str) -> Quote {
		Quote::new(symbol, dec!(99.95), dec!(100.05), dec!(100.00))
	}
}

fn fast_config() -> FeedConfig {
	FeedConfig {
		tick_interval_ms: 5,
		..FeedConfig::default()
	}
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
	for _ in 0..400 {
		if condition() {
			return true;
		}
		thread::sleep(Duration::from_millis(5));
	}
	false
}

#[test]
fn test_rejects_zero_tick_interval() {
	let config = FeedConfig {
		tick_interval_ms: 0,
		..FeedConfig::default()
	};
	let result = SimulatedFeed::new(config, Arc::new(CountingSink::default()));
	assert!(matches!(result, Err(FeedError::InvalidConfig(_))));
}

#[test]
fn test_no_ticks_after_cancel() {
	let sink = Arc::new(CountingSink::default());
	let feed = SimulatedFeed::new(fast_config(), sink.clone()).unwrap();

	let subscription = feed.subscribe("AAPL").unwrap();
	assert!(wait_for(|| sink.count("AAPL") >= 3));

	subscription.cancel();
	let after_cancel = sink.count("AAPL");

	thread::sleep(Duration::from_millis(50));
	assert_eq!(sink.count("AAPL"), after_cancel);
}

#[test]
fn test_cancel_is_isolated_per_subscription() {
	let sink = Arc::new(CountingSink::default());
	let feed = SimulatedFeed::new(fast_config(), sink.clone()).unwrap();

	let aapl = feed.subscribe("AAPL").unwrap();
	let msft = feed.subscribe("MSFT").unwrap();
	assert_eq!(aapl.symbol(), "AAPL");
	assert_eq!(msft.symbol(), "MSFT");
	assert!(wait_for(|| sink.count("AAPL") > 0 && sink.count("MSFT") > 0));

	aapl.cancel();
	let frozen = sink.count("AAPL");
	let before = sink.count("MSFT");

	assert!(msft.is_running());
	assert!(wait_for(|| sink.count("MSFT") >= before + 3));
	assert_eq!(sink.count("AAPL"), frozen);
}

#[test]
fn test_two_subscriptions_same_symbol() {
	let sink = Arc::new(CountingSink::default());
	let feed = SimulatedFeed::new(fast_config(), sink.clone()).unwrap();

	let first = feed.subscribe("AAPL").unwrap();
	let second = feed.subscribe("AAPL").unwrap();
	assert_ne!(first.id(), second.id());

	drop(first);
	let before = sink.count("AAPL");
	assert!(second.is_running());
	assert!(wait_for(|| sink.count("AAPL") >= before + 3));
}

#[test]
fn test_dropping_feed_stops_detached_emitters() {
	let sink = Arc::new(CountingSink::default());
	let feed = SimulatedFeed::new(fast_config(), sink.clone()).unwrap();

	feed.subscribe_detached("AAPL").unwrap();
	assert!(wait_for(|| sink.count("AAPL") > 0));

	drop(feed);
	let after_drop = sink.count("AAPL");
	thread::sleep(Duration::from_millis(50));
	assert_eq!(sink.count("AAPL"), after_drop);
}

#[test]
fn test_feed_drives_engine() {
	let engine = EngineHandle::with_config(EngineConfig::default());
	let owner = OwnerId::from("alice");

	// Far above any reachable price: fills on the first tick
	let order = engine
		.place(
			owner.clone(),
			OrderRequest::limit("AAPL", Side::Buy, dec!(1), dec!(1000)),
		)
		.unwrap();
	assert_eq!(order.status, OrderStatus::Filled);

	let resting = engine
		.place(
			owner.clone(),
			OrderRequest::limit("AAPL", Side::Buy, dec!(1), dec!(1)),
		)
		.unwrap();
	assert_eq!(resting.status, OrderStatus::Open);

	let consumer = engine.subscribe();
	let feed = SimulatedFeed::new(fast_config(), Arc::new(engine.clone())).unwrap();
	let subscription = feed.subscribe("AAPL").unwrap();

	assert!(wait_for(|| consumer.len() >= 5));
	subscription.cancel();

	// The walk starts at the synthesized default quote and stays nearby
	let quote = engine.quote("AAPL");
	assert!(quote.last > dec!(50) && quote.last < dec!(200));
	assert_eq!(engine.status(resting.order_id).unwrap().status, OrderStatus::Open);

	let position = engine.position(&owner, "AAPL").unwrap();
	assert_eq!(position.current_price, quote.bid);
}
