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

use chrono::{DateTime, Utc};
use papermill_sdk::types::{OrderId, OrderKind, OrderResult, OrderStatus, OwnerId, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Execution semantics of a live order
///
/// Stop orders move through an explicit transition instead of rewriting
/// their kind: `Stop -> Triggered`. A triggered stop is evaluated exactly
/// like a market order from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Execution {
	Market,
	Limit { limit_price: Decimal },
	/// Armed stop, waiting for `last` to cross `stop_price`
	Stop { stop_price: Decimal },
	/// Stop whose trigger condition was met; market semantics
	Triggered { stop_price: Decimal },
}

impl Execution {
	/// Kind the order currently behaves as
	pub fn effective_kind(&self) -> OrderKind {
		match self {
			Execution::Market | Execution::Triggered { .. } => OrderKind::Market,
			Execution::Limit { .. } => OrderKind::Limit,
			Execution::Stop { .. } => OrderKind::Stop,
		}
	}
}

/// Internal order representation for the matching engine
///
/// Orders are created by the engine on placement and mutated only by the
/// engine's own transition logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	pub id: OrderId,
	pub owner: OwnerId,
	pub symbol: String,
	pub side: Side,
	/// Kind as requested by the client
	pub requested_kind: OrderKind,
	pub execution: Execution,
	pub quantity: Decimal,
	pub status: OrderStatus,
	/// Either zero or equal to `quantity`
	pub filled_quantity: Decimal,
	pub average_fill_price: Option<Decimal>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Order {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		id: OrderId,
		owner: OwnerId,
		symbol: String,
		side: Side,
		requested_kind: OrderKind,
		execution: Execution,
		quantity: Decimal,
		created_at: DateTime<Utc>,
	) -> Self {
		Self {
			id,
			owner,
			symbol,
			side,
			requested_kind,
			execution,
			quantity,
			status: OrderStatus::Pending,
			filled_quantity: Decimal::ZERO,
			average_fill_price: None,
			created_at,
			updated_at: created_at,
		}
	}

	/// Move to `next`, returning the previous status
	///
	/// Returns `None` and leaves the order untouched when the move would
	/// revert the lifecycle.
	pub fn transition(&mut self, next: OrderStatus, at: DateTime<Utc>) -> Option<OrderStatus> {
		if !self.status.can_transition_to(next) {
			return None;
		}
		let previous = self.status;
		self.status = next;
		self.updated_at = at;
		Some(previous)
	}

	/// Fill the whole order at `price`
	///
	/// Returns `None` if the order is no longer live.
	pub fn fill(&mut self, price: Decimal, at: DateTime<Utc>) -> Option<(OrderStatus, Fill)> {
		let previous = self.transition(OrderStatus::Filled, at)?;
		self.filled_quantity = self.quantity;
		self.average_fill_price = Some(price);

		Some((previous, self.fill_at(price, at)))
	}

	/// The fill this order would produce at `price`, without changing it
	pub fn fill_at(&self, price: Decimal, at: DateTime<Utc>) -> Fill {
		Fill {
			order_id: self.id,
			owner: self.owner.clone(),
			symbol: self.symbol.clone(),
			side: self.side,
			quantity: self.quantity,
			price,
			timestamp: at,
		}
	}

	pub fn result(&self) -> OrderResult {
		let filled = self.status == OrderStatus::Filled;
		OrderResult {
			order_id: self.id,
			symbol: self.symbol.clone(),
			side: self.side,
			kind: self.execution.effective_kind(),
			status: self.status,
			filled_quantity: filled.then_some(self.filled_quantity),
			average_price: if filled {
				self.average_fill_price
			} else {
				None
			},
		}
	}
}

/// Execution of an order's full quantity at a single price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
	pub order_id: OrderId,
	pub owner: OwnerId,
	pub symbol: String,
	pub side: Side,
	pub quantity: Decimal,
	pub price: Decimal,
	pub timestamp: DateTime<Utc>,
}

impl Fill {
	/// Quantity with sign: positive for buys, negative for sells
	pub fn signed_quantity(&self) -> Decimal {
		match self.side {
			Side::Buy => self.quantity,
			Side::Sell => -self.quantity,
		}
	}
}

/// Outcome of re-evaluating one symbol's resting orders against a quote
#[derive(Debug, Clone, Default)]
pub struct TickReport {
	pub symbol: String,
	/// Fills produced during this pass, in evaluation order
	pub fills: Vec<Fill>,
	/// Stop orders whose trigger fired during this pass
	pub triggered: Vec<OrderId>,
	/// Live orders left resting on the symbol after the pass
	pub resting: usize,
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	fn create_test_order(execution: Execution) -> Order {
		Order::new(
			OrderId::new(),
			OwnerId::from("alice"),
			"AAPL".to_string(),
			Side::Buy,
			execution.effective_kind(),
			execution,
			dec!(10),
			Utc::now(),
		)
	}

	#[test]
	fn test_fill_is_all_or_nothing() {
		let mut order = create_test_order(Execution::Market);
		let (previous, fill) = order.fill(dec!(150.10), Utc::now()).unwrap();

		assert_eq!(previous, OrderStatus::Pending);
		assert_eq!(order.status, OrderStatus::Filled);
		assert_eq!(order.filled_quantity, order.quantity);
		assert_eq!(fill.quantity, dec!(10));
		assert_eq!(fill.signed_quantity(), dec!(10));
		assert_eq!(fill.price, dec!(150.10));
	}

	#[test]
	fn test_filled_order_cannot_fill_or_reopen() {
		let mut order = create_test_order(Execution::Market);
		order.fill(dec!(150.10), Utc::now()).unwrap();

		assert!(order.fill(dec!(140.00), Utc::now()).is_none());
		assert!(order.transition(OrderStatus::Open, Utc::now()).is_none());
		assert_eq!(order.average_fill_price, Some(dec!(150.10)));
	}

	#[test]
	fn test_result_hides_fill_fields_until_filled() {
		let mut order = create_test_order(Execution::Limit {
			limit_price: dec!(149.00),
		});
		order.transition(OrderStatus::Open, Utc::now()).unwrap();

		let result = order.result();
		assert_eq!(result.status, OrderStatus::Open);
		assert_eq!(result.kind, OrderKind::Limit);
		assert!(result.filled_quantity.is_none());
		assert!(result.average_price.is_none());
	}

	#[test]
	fn test_triggered_stop_reports_market_kind() {
		let order = create_test_order(Execution::Triggered {
			stop_price: dec!(155.00),
		});
		assert_eq!(order.result().kind, OrderKind::Market);
	}
}
