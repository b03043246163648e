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

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque order identity, unique for the lifetime of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	pub fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl Default for OrderId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for OrderId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ord_{}", self.0.simple())
	}
}

/// Account that owns orders and positions
///
/// The engine never interprets this value; authentication and account
/// management happen upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<&str> for OwnerId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

impl From<String> for OwnerId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl fmt::Display for OwnerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
	Buy,
	Sell,
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
	Market,
	Limit,
	Stop,
}

/// Order status
///
/// Transitions only move forward: `Pending -> {Open, Filled, Cancelled}`,
/// `Open -> {Filled, Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
	Pending,
	Open,
	Filled,
	Cancelled,
}

impl OrderStatus {
	/// Whether the order is still eligible for evaluation
	pub fn is_live(self) -> bool {
		matches!(self, OrderStatus::Pending | OrderStatus::Open)
	}

	pub fn is_terminal(self) -> bool {
		!self.is_live()
	}

	/// Whether moving from `self` to `next` respects the forward-only lifecycle
	pub fn can_transition_to(self, next: OrderStatus) -> bool {
		match (self, next) {
			(OrderStatus::Pending, OrderStatus::Open)
			| (OrderStatus::Pending, OrderStatus::Filled)
			| (OrderStatus::Pending, OrderStatus::Cancelled)
			| (OrderStatus::Open, OrderStatus::Filled)
			| (OrderStatus::Open, OrderStatus::Cancelled) => true,
			_ => false,
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Open => "open",
			OrderStatus::Filled => "filled",
			OrderStatus::Cancelled => "cancelled",
		};
		f.write_str(s)
	}
}

/// Request to place an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
	/// Instrument symbol (e.g., "AAPL")
	pub symbol: String,
	pub side: Side,
	#[serde(rename = "type")]
	pub kind: OrderKind,
	/// Requested quantity, must be positive
	pub quantity: Decimal,
	/// Required for limit orders
	pub limit_price: Option<Decimal>,
	/// Required for stop orders
	pub stop_price: Option<Decimal>,
}

impl OrderRequest {
	pub fn market(symbol: impl Into<String>, side: Side, quantity: Decimal) -> Self {
		Self {
			symbol: symbol.into(),
			side,
			kind: OrderKind::Market,
			quantity,
			limit_price: None,
			stop_price: None,
		}
	}

	pub fn limit(
		symbol: impl Into<String>,
		side: Side,
		quantity: Decimal,
		limit_price: Decimal,
	) -> Self {
		Self {
			symbol: symbol.into(),
			side,
			kind: OrderKind::Limit,
			quantity,
			limit_price: Some(limit_price),
			stop_price: None,
		}
	}

	pub fn stop(
		symbol: impl Into<String>,
		side: Side,
		quantity: Decimal,
		stop_price: Decimal,
	) -> Self {
		Self {
			symbol: symbol.into(),
			side,
			kind: OrderKind::Stop,
			quantity,
			limit_price: None,
			stop_price: Some(stop_price),
		}
	}
}

/// Order state as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
	pub order_id: OrderId,
	pub symbol: String,
	pub side: Side,
	/// Effective kind; a triggered stop order reports `market`
	#[serde(rename = "type")]
	pub kind: OrderKind,
	pub status: OrderStatus,
	/// Present only once the order is filled
	pub filled_quantity: Option<Decimal>,
	/// Present only once the order is filled
	pub average_price: Option<Decimal>,
}

/// Top-of-book quote for a symbol
///
/// `bid <= ask` is expected but not enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
	pub symbol: String,
	pub bid: Decimal,
	pub ask: Decimal,
	/// Last traded price
	pub last: Decimal,
	pub volume: u64,
	pub timestamp: DateTime<Utc>,
}

impl Quote {
	pub fn new(symbol: impl Into<String>, bid: Decimal, ask: Decimal, last: Decimal) -> Self {
		Self {
			symbol: symbol.into(),
			bid,
			ask,
			last,
			volume: 0,
			timestamp: Utc::now(),
		}
	}

	pub fn with_volume(mut self, volume: u64) -> Self {
		self.volume = volume;
		self
	}

	pub fn mid(&self) -> Decimal {
		(self.bid + self.ask) / Decimal::TWO
	}
}

/// Open position for an (owner, symbol) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
	pub owner: OwnerId,
	pub symbol: String,
	/// Signed quantity; negative only for short positions
	pub quantity: Decimal,
	/// Weighted average cost basis
	pub average_entry_price: Decimal,
	/// Last mark or fill price
	pub current_price: Decimal,
	/// (current_price - average_entry_price) * quantity
	pub unrealized_pnl: Decimal,
	pub updated_at: DateTime<Utc>,
}

impl Position {
	pub fn is_long(&self) -> bool {
		self.quantity.is_sign_positive() && !self.quantity.is_zero()
	}

	pub fn is_short(&self) -> bool {
		self.quantity.is_sign_negative() && !self.quantity.is_zero()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	#[test]
	fn test_status_lifecycle_is_forward_only() {
		assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Open));
		assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Filled));
		assert!(OrderStatus::Open.can_transition_to(OrderStatus::Filled));
		assert!(OrderStatus::Open.can_transition_to(OrderStatus::Cancelled));

		assert!(!OrderStatus::Open.can_transition_to(OrderStatus::Pending));
		assert!(!OrderStatus::Filled.can_transition_to(OrderStatus::Open));
		assert!(!OrderStatus::Filled.can_transition_to(OrderStatus::Cancelled));
		assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Open));
	}

	#[test]
	fn test_request_serializes_with_lowercase_enums() {
		let request = OrderRequest::limit("AAPL", Side::Buy, dec!(5), dec!(149.00));
		let json = serde_json::to_value(&request).unwrap();

		assert_eq!(json["side"], "buy");
		assert_eq!(json["type"], "limit");
		assert_eq!(json["limit_price"], "149.00");
		assert!(json["stop_price"].is_null());
	}

	#[test]
	fn test_quote_mid() {
		let quote = Quote::new("AAPL", dec!(150.00), dec!(150.10), dec!(150.05));
		assert_eq!(quote.mid(), dec!(150.05));
	}
}
