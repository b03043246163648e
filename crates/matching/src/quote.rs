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

use chrono::Utc;
use papermill_sdk::types::Quote;
use rust_decimal::Decimal;

/// Latest known quote per symbol
///
/// The store keeps exactly one quote per symbol; every update replaces the
/// previous quote wholesale and no history is retained. Reads are lenient:
/// a symbol that was never observed yields a synthesized quote built from
/// the configured base price and spread, so any symbol can be evaluated
/// without a priming step.
///
/// The store is owned by the matching engine and mutated only from the
/// engine's single logical thread, so same-symbol updates are applied in
/// arrival order.
#[derive(Debug, Clone)]
pub struct QuoteStore {
	quotes: HashMap<String, Quote>,
	default_price: Decimal,
	default_spread: Decimal,
}

impl QuoteStore {
	pub fn new(default_price: Decimal, default_spread: Decimal) -> Self {
		Self {
			quotes: HashMap::new(),
			default_price,
			default_spread,
		}
	}

	/// Replace the quote for `quote.symbol`, returning the previous one
	pub fn update(&mut self, quote: Quote) -> Option<Quote> {
		self.quotes.insert(quote.symbol.clone(), quote)
	}

	/// Current quote, or a synthesized default for an unseen symbol
	pub fn get(&self, symbol: &str) -> Quote {
		self.quotes
			.get(symbol)
			.cloned()
			.unwrap_or_else(|| self.synthesize(symbol))
	}

	/// Current quote without the default fallback
	pub fn latest(&self, symbol: &str) -> Option<&Quote> {
		self.quotes.get(symbol)
	}

	/// Build the default quote for a symbol
	///
	/// `bid = default_price`, `ask = bid + spread`, `last = mid`. The
	/// synthesized quote is not stored.
	pub fn synthesize(&self, symbol: &str) -> Quote {
		let bid = self.default_price;
		let ask = self.default_price + self.default_spread;
		Quote {
			symbol: symbol.to_string(),
			bid,
			ask,
			last: (bid + ask) / Decimal::TWO,
			volume: 0,
			timestamp: Utc::now(),
		}
	}

	pub fn contains(&self, symbol: &str) -> bool {
		self.quotes.contains_key(symbol)
	}

	pub fn symbols(&self) -> impl Iterator<Item = &str> {
		self.quotes.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.quotes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.quotes.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	fn store() -> QuoteStore {
		QuoteStore::new(dec!(100.00), dec!(0.10))
	}

	#[test]
	fn test_update_returns_previous() {
		let mut store = store();

		let first = Quote::new("AAPL", dec!(150.00), dec!(150.10), dec!(150.05));
		assert!(store.update(first.clone()).is_none());

		let second = Quote::new("AAPL", dec!(151.00), dec!(151.20), dec!(151.10));
		let previous = store.update(second.clone()).unwrap();
		assert_eq!(previous, first);
		assert_eq!(store.get("AAPL"), second);
		assert_eq!(store.len(), 1);
	}

	#[test]
	fn test_unknown_symbol_is_synthesized() {
		let store = store();

		let quote = store.get("UNSEEN");
		assert_eq!(quote.symbol, "UNSEEN");
		assert_eq!(quote.bid, dec!(100.00));
		assert_eq!(quote.ask, dec!(100.10));
		assert_eq!(quote.last, dec!(100.05));
		assert!(quote.ask > quote.bid);

		// Lenient reads do not prime the store
		assert!(!store.contains("UNSEEN"));
		assert!(store.latest("UNSEEN").is_none());
		assert!(store.is_empty());
	}

	#[test]
	fn test_symbols_are_independent() {
		let mut store = store();
		store.update(Quote::new("AAPL", dec!(150.00), dec!(150.10), dec!(150.05)));
		store.update(Quote::new("MSFT", dec!(410.00), dec!(410.20), dec!(410.10)));

		assert_eq!(store.get("AAPL").bid, dec!(150.00));
		assert_eq!(store.get("MSFT").bid, dec!(410.00));

		let mut symbols: Vec<_> = store.symbols().collect();
		symbols.sort();
		assert_eq!(symbols, vec!["AAPL", "MSFT"]);
	}
}
