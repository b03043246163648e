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

//! Price-crossing and trigger rules
//!
//! | kind   | buy fills when | sell fills when | price        |
//! |--------|----------------|-----------------|--------------|
//! | market | always         | always          | ask / bid    |
//! | limit  | ask <= limit   | bid >= limit    | ask / bid    |
//! | stop   | last >= stop   | last <= stop    | ask / bid    |
//!
//! Executions happen at the crossing quote, never at the limit price
//! itself. A stop whose condition is met is converted to market semantics
//! and filled in the same evaluation.

use papermill_sdk::types::{Quote, Side};
use rust_decimal::Decimal;

use crate::types::Execution;

/// Result of evaluating one order against one quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
	/// The stop trigger fired during this evaluation
	pub triggered: bool,
	/// Execution price if the order fills
	pub fill_price: Option<Decimal>,
}

impl Evaluation {
	fn rest() -> Self {
		Self {
			triggered: false,
			fill_price: None,
		}
	}
}

/// Evaluate an order against `quote`
///
/// Arms-to-triggered is the only mutation performed here; status changes
/// are left to the engine.
pub fn evaluate(execution: &mut Execution, side: Side, quote: &Quote) -> Evaluation {
	let mut triggered = false;

	if let Execution::Stop { stop_price } = *execution
		&& stop_triggered(side, stop_price, quote)
	{
		*execution = Execution::Triggered { stop_price };
		triggered = true;
	}

	let crosses = match *execution {
		Execution::Market | Execution::Triggered { .. } => true,
		Execution::Limit { limit_price } => limit_crosses(side, limit_price, quote),
		Execution::Stop { .. } => false,
	};

	if !crosses {
		return Evaluation::rest();
	}

	Evaluation {
		triggered,
		fill_price: Some(execution_price(side, quote)),
	}
}

/// Buys lift the ask, sells hit the bid
pub fn execution_price(side: Side, quote: &Quote) -> Decimal {
	match side {
		Side::Buy => quote.ask,
		Side::Sell => quote.bid,
	}
}

fn limit_crosses(side: Side, limit_price: Decimal, quote: &Quote) -> bool {
	match side {
		Side::Buy => quote.ask <= limit_price,
		Side::Sell => quote.bid >= limit_price,
	}
}

fn stop_triggered(side: Side, stop_price: Decimal, quote: &Quote) -> bool {
	match side {
		Side::Buy => quote.last >= stop_price,
		Side::Sell => quote.last <= stop_price,
	}
}
