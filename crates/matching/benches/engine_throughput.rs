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

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::hint::black_box;

use papermill_matching::{EngineConfig, FeedConfig, MatchingEngine, feed::next_quote};
use papermill_sdk::types::{OrderRequest, OwnerId, Quote, Side};

const RESTING_COUNTS: &[usize] = &[10, 100, 1_000, 10_000];
const OWNERS: usize = 16;

fn quote(bid: Decimal, ask: Decimal) -> Quote {
	Quote::new("AAPL", bid, ask, (bid + ask) / Decimal::TWO)
}

fn owner(i: usize) -> OwnerId {
	OwnerId::new(format!("owner-{}", i % OWNERS))
}

/// Engine with `count` buy limits resting below the market
fn engine_with_resting(count: usize) -> MatchingEngine {
	let mut engine = MatchingEngine::new(EngineConfig::default());
	engine.on_quote_update(quote(dec!(150.00), dec!(150.10)));

	for i in 0..count {
		let limit = dec!(140.00) + Decimal::new((i % 500) as i64, 2);
		engine
			.place(owner(i), OrderRequest::limit("AAPL", Side::Buy, dec!(1), limit))
			.ok();
	}

	engine
}

fn bench_place_market(c: &mut Criterion) {
	let mut engine = MatchingEngine::new(EngineConfig::default());
	engine.on_quote_update(quote(dec!(150.00), dec!(150.10)));

	let mut i = 0usize;
	c.bench_function("place_market", |b| {
		b.iter(|| {
			i += 1;
			let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
			black_box(engine.place(owner(i), OrderRequest::market("AAPL", side, dec!(1))))
		})
	});
}

fn bench_quote_update(c: &mut Criterion) {
	let mut group = c.benchmark_group("on_quote_update");

	for &count in RESTING_COUNTS {
		// Nothing crosses: measures the per-order evaluation cost
		group.bench_with_input(BenchmarkId::new("no_cross", count), &count, |b, &count| {
			let mut engine = engine_with_resting(count);
			b.iter(|| black_box(engine.on_quote_update(quote(dec!(150.00), dec!(150.10)))))
		});

		// Every resting order fills in one tick
		group.bench_with_input(BenchmarkId::new("all_fill", count), &count, |b, &count| {
			b.iter_batched(
				|| engine_with_resting(count),
				|mut engine| black_box(engine.on_quote_update(quote(dec!(130.00), dec!(130.10)))),
				BatchSize::LargeInput,
			)
		});
	}

	group.finish();
}

fn bench_next_quote(c: &mut Criterion) {
	let config = FeedConfig::default();
	let mut rng = ChaCha8Rng::seed_from_u64(0);
	let mut last = dec!(150.00);

	c.bench_function("next_quote", |b| {
		b.iter(|| {
			let quote = next_quote("AAPL", last, &config, &mut rng);
			last = quote.last;
			black_box(quote)
		})
	});
}

criterion_group!(benches, bench_place_market, bench_quote_update, bench_next_quote);
criterion_main!(benches);
