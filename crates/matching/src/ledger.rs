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

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use papermill_sdk::types::{OwnerId, Position, Quote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::Fill;

/// Quote field used to mark positions to market
///
/// Marks are independent from fill prices: fills always execute at the
/// crossing ask/bid, marks use this reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkReference {
	#[default]
	Bid,
	Ask,
	Mid,
	Last,
}

impl MarkReference {
	pub fn price(self, quote: &Quote) -> Decimal {
		match self {
			MarkReference::Bid => quote.bid,
			MarkReference::Ask => quote.ask,
			MarkReference::Mid => quote.mid(),
			MarkReference::Last => quote.last,
		}
	}
}

/// What happens when a sell exceeds the held long quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OversellPolicy {
	/// Close the position and report the excess; never go short
	#[default]
	Clamp,
	/// Open a short position with the excess at the fill price
	Flip,
}

/// Effect of one fill on the ledger
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerUpdate {
	/// New position created
	Opened(Position),
	/// Same-direction fill; cost basis re-averaged
	Increased(Position),
	/// Opposite-direction fill that left the position open
	Reduced(Position),
	/// Position reached zero (or crossed it under `Clamp`) and was removed
	Closed {
		owner: OwnerId,
		symbol: String,
		/// Quantity beyond the held position that was not booked
		excess: Decimal,
	},
	/// Position crossed zero under `Flip`; the remainder opened at the fill price
	Flipped(Position),
	/// Sell without a position under `Clamp`; nothing booked
	Ignored {
		owner: OwnerId,
		symbol: String,
		excess: Decimal,
	},
}

impl LedgerUpdate {
	/// Position after the update, if one remains
	pub fn position(&self) -> Option<&Position> {
		match self {
			LedgerUpdate::Opened(p)
			| LedgerUpdate::Increased(p)
			| LedgerUpdate::Reduced(p)
			| LedgerUpdate::Flipped(p) => Some(p),
			LedgerUpdate::Closed { .. } | LedgerUpdate::Ignored { .. } => None,
		}
	}

	/// Quantity that could not be booked under `Clamp`
	pub fn excess(&self) -> Decimal {
		match self {
			LedgerUpdate::Closed { excess, .. } | LedgerUpdate::Ignored { excess, .. } => *excess,
			_ => Decimal::ZERO,
		}
	}
}

/// Error types for position ledger operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
	#[error("Position arithmetic overflow booking {quantity} {symbol} at {price}")]
	Overflow {
		symbol: String,
		quantity: Decimal,
		price: Decimal,
	},
}

impl LedgerError {
	fn overflow(fill: &Fill) -> Self {
		LedgerError::Overflow {
			symbol: fill.symbol.clone(),
			quantity: fill.quantity,
			price: fill.price,
		}
	}
}

#[derive(Debug, Clone)]
struct Entry {
	position: Position,
	/// Signed sum of quantity * price over the open lot
	cost_basis: Decimal,
}

/// Position ledger keyed by (owner, symbol)
///
/// The ledger exclusively owns position records. The engine only feeds it
/// fills through `apply` and marks through `mark_to_market`.
///
/// All arithmetic is checked. A fill that would overflow is refused and
/// leaves the ledger unchanged.
#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
	positions: BTreeMap<(OwnerId, String), Entry>,
	oversell_policy: OversellPolicy,
}

impl PositionLedger {
	pub fn new(oversell_policy: OversellPolicy) -> Self {
		Self {
			positions: BTreeMap::new(),
			oversell_policy,
		}
	}

	pub fn oversell_policy(&self) -> OversellPolicy {
		self.oversell_policy
	}

	/// Book a fill with weighted-average cost accounting
	pub fn apply(&mut self, fill: &Fill) -> Result<LedgerUpdate, LedgerError> {
		let (next, update) = self.plan(fill)?;
		let key = (fill.owner.clone(), fill.symbol.clone());

		match next {
			Some(entry) => {
				self.positions.insert(key, entry);
			}
			None => {
				self.positions.remove(&key);
			}
		}

		match &update {
			LedgerUpdate::Opened(position) => debug!(
				target: "ledger",
				owner = %fill.owner,
				symbol = %fill.symbol,
				quantity = %position.quantity,
				price = %fill.price,
				"Position opened"
			),
			LedgerUpdate::Flipped(position) => debug!(
				target: "ledger",
				owner = %fill.owner,
				symbol = %fill.symbol,
				quantity = %position.quantity,
				"Position flipped"
			),
			LedgerUpdate::Closed { excess, .. } if !excess.is_zero() => warn!(
				target: "ledger",
				owner = %fill.owner,
				symbol = %fill.symbol,
				excess = %excess,
				"Fill exceeded held quantity, position closed and excess dropped"
			),
			LedgerUpdate::Ignored { excess, .. } => warn!(
				target: "ledger",
				owner = %fill.owner,
				symbol = %fill.symbol,
				excess = %excess,
				"Sell without a position, nothing booked"
			),
			_ => {}
		}

		Ok(update)
	}

	/// Outcome `apply` would have for `fill`, without booking it
	pub fn preview(&self, fill: &Fill) -> Result<LedgerUpdate, LedgerError> {
		self.plan(fill).map(|(_, update)| update)
	}

	/// Compute the entry that replaces the current one (`None` removes it)
	fn plan(&self, fill: &Fill) -> Result<(Option<Entry>, LedgerUpdate), LedgerError> {
		let overflow = || LedgerError::overflow(fill);
		let delta = fill.signed_quantity();

		let Some(entry) = self.positions.get(&(fill.owner.clone(), fill.symbol.clone())) else {
			if delta.is_sign_positive() || self.oversell_policy == OversellPolicy::Flip {
				let cost_basis = delta.checked_mul(fill.price).ok_or_else(overflow)?;
				let position = open_position(fill, delta);
				return Ok((
					Some(Entry {
						position: position.clone(),
						cost_basis,
					}),
					LedgerUpdate::Opened(position),
				));
			}

			return Ok((
				None,
				LedgerUpdate::Ignored {
					owner: fill.owner.clone(),
					symbol: fill.symbol.clone(),
					excess: fill.quantity,
				},
			));
		};

		let held = entry.position.quantity;
		let remaining = held.checked_add(delta).ok_or_else(overflow)?;
		let mut position = entry.position.clone();

		if held.is_sign_positive() == delta.is_sign_positive() {
			// avg = sum(qty * price) / sum(qty); signs cancel for shorts
			let cost_basis = delta
				.checked_mul(fill.price)
				.and_then(|added| entry.cost_basis.checked_add(added))
				.ok_or_else(overflow)?;
			position.quantity = remaining;
			position.average_entry_price = cost_basis.checked_div(remaining).ok_or_else(overflow)?;
			revalue(&mut position, fill.price, fill.timestamp).ok_or_else(overflow)?;
			return Ok((
				Some(Entry {
					position: position.clone(),
					cost_basis,
				}),
				LedgerUpdate::Increased(position),
			));
		}

		if remaining.is_zero() {
			return Ok((
				None,
				LedgerUpdate::Closed {
					owner: fill.owner.clone(),
					symbol: fill.symbol.clone(),
					excess: Decimal::ZERO,
				},
			));
		}

		if remaining.is_sign_positive() == held.is_sign_positive() {
			// Average entry is unchanged; the cost basis shrinks pro rata
			let cost_basis = entry
				.cost_basis
				.checked_mul(remaining)
				.and_then(|scaled| scaled.checked_div(held))
				.ok_or_else(overflow)?;
			position.quantity = remaining;
			revalue(&mut position, fill.price, fill.timestamp).ok_or_else(overflow)?;
			return Ok((
				Some(Entry {
					position: position.clone(),
					cost_basis,
				}),
				LedgerUpdate::Reduced(position),
			));
		}

		// Crossed through zero
		match self.oversell_policy {
			OversellPolicy::Clamp => Ok((
				None,
				LedgerUpdate::Closed {
					owner: fill.owner.clone(),
					symbol: fill.symbol.clone(),
					excess: remaining.abs(),
				},
			)),
			OversellPolicy::Flip => {
				let cost_basis = remaining.checked_mul(fill.price).ok_or_else(overflow)?;
				position.quantity = remaining;
				position.average_entry_price = fill.price;
				revalue(&mut position, fill.price, fill.timestamp).ok_or_else(overflow)?;
				Ok((
					Some(Entry {
						position: position.clone(),
						cost_basis,
					}),
					LedgerUpdate::Flipped(position),
				))
			}
		}
	}

	/// Revalue every position in `symbol` at `price`
	///
	/// Quantity and cost basis are left untouched. Returns the updated
	/// positions; a position whose P&L would overflow keeps its last mark.
	pub fn mark_to_market(&mut self, symbol: &str, price: Decimal) -> Vec<Position> {
		let now = Utc::now();
		self.positions
			.iter_mut()
			.filter(|((_, s), _)| s == symbol)
			.filter_map(|((owner, _), entry)| {
				let mut position = entry.position.clone();
				if revalue(&mut position, price, now).is_none() {
					warn!(
						target: "ledger",
						owner = %owner,
						symbol = %symbol,
						price = %price,
						"Mark overflowed, position keeps its last valuation"
					);
					return None;
				}
				entry.position = position.clone();
				Some(position)
			})
			.collect()
	}

	/// All positions of `owner`, ordered by symbol
	pub fn positions(&self, owner: &OwnerId) -> Vec<Position> {
		self.positions
			.range((owner.clone(), String::new())..)
			.take_while(|((o, _), _)| o == owner)
			.map(|(_, entry)| entry.position.clone())
			.collect()
	}

	pub fn get(&self, owner: &OwnerId, symbol: &str) -> Option<&Position> {
		self.positions
			.get(&(owner.clone(), symbol.to_string()))
			.map(|entry| &entry.position)
	}

	pub fn len(&self) -> usize {
		self.positions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.positions.is_empty()
	}
}

fn open_position(fill: &Fill, quantity: Decimal) -> Position {
	Position {
		owner: fill.owner.clone(),
		symbol: fill.symbol.clone(),
		quantity,
		average_entry_price: fill.price,
		current_price: fill.price,
		unrealized_pnl: Decimal::ZERO,
		updated_at: fill.timestamp,
	}
}

/// Mark `position` at `price`; `None` on overflow, leaving it untouched
fn revalue(position: &mut Position, price: Decimal, at: DateTime<Utc>) -> Option<()> {
	let pnl = price
		.checked_sub(position.average_entry_price)?
		.checked_mul(position.quantity)?;
	position.current_price = price;
	position.unrealized_pnl = pnl;
	position.updated_at = at;
	Some(())
}
