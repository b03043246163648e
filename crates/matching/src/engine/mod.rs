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

mod handle;
mod state;

pub use handle::EngineHandle;
pub use state::MatchingEngineState;

use chrono::{DateTime, Utc};
use papermill_sdk::types::{
	OrderId, OrderKind, OrderRequest, OrderResult, OrderStatus, OwnerId, Position, Quote,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
	config::{
		DEFAULT_EVENT_BUFFER_SIZE, DEFAULT_QUOTE_PRICE, DEFAULT_QUOTE_SPREAD, MAX_ORDER_PRICE,
		MAX_ORDER_QUANTITY,
	},
	event::{EngineEvent, EventBus, EventConsumer, SequenceNumber},
	ledger::{LedgerError, MarkReference, OversellPolicy},
	matcher,
	types::{Execution, Fill, Order, TickReport},
};

/// Error types for matching engine operations
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Invalid order request: {0}")]
	InvalidOrderRequest(String),
	#[error("Order not found: {0}")]
	OrderNotFound(OrderId),
	#[error("Order {order_id} cannot be cancelled in status {status}")]
	OrderNotCancellable {
		order_id: OrderId,
		status: OrderStatus,
	},
	#[error(transparent)]
	Ledger(#[from] LedgerError),
}

/// Configuration for the matching engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	/// Bid of the quote synthesized for a never-observed symbol
	pub default_price: Decimal,
	/// Spread of the synthesized quote
	pub default_spread: Decimal,
	/// Quote field positions are marked against on every tick
	pub mark_reference: MarkReference,
	pub oversell_policy: OversellPolicy,
	/// Default per-subscriber event queue capacity
	pub event_buffer_size: usize,
	pub verbose_logging: bool,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			default_price: DEFAULT_QUOTE_PRICE,
			default_spread: DEFAULT_QUOTE_SPREAD,
			mark_reference: MarkReference::default(),
			oversell_policy: OversellPolicy::default(),
			event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
			verbose_logging: false,
		}
	}
}

/// Paper-trading matching engine
///
/// The engine owns every order placed on it, the latest quote per symbol
/// and the position ledger. All operations are synchronous:
/// - `place` resolves the order against the quote in effect before returning
/// - `on_quote_update` resolves every resting order of the symbol before
///   returning
///
/// The engine is single-threaded; share it through [`EngineHandle`] when
/// several threads drive it.
pub struct MatchingEngine {
	config: EngineConfig,
	state: MatchingEngineState,
	bus: EventBus,
}

impl MatchingEngine {
	pub fn new(config: EngineConfig) -> Self {
		let state = MatchingEngineState::new(&config);
		Self {
			config,
			state,
			bus: EventBus::new(),
		}
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	pub fn state(&self) -> &MatchingEngineState {
		&self.state
	}

	/// Attach an event subscriber with the configured queue capacity
	pub fn subscribe(&mut self) -> EventConsumer {
		self.bus.subscribe(self.config.event_buffer_size)
	}

	pub fn subscribe_with_capacity(&mut self, capacity: usize) -> EventConsumer {
		self.bus.subscribe(capacity)
	}

	pub fn last_sequence(&self) -> SequenceNumber {
		self.bus.last_sequence()
	}

	/// Place an order and immediately try to fill it
	///
	/// Malformed requests, and orders whose immediate fill the ledger
	/// cannot book, are rejected before any state is created or any event
	/// is published. An order that does not fill against the current quote
	/// is left `open`.
	pub fn place(
		&mut self,
		owner: OwnerId,
		request: OrderRequest,
	) -> Result<OrderResult, EngineError> {
		let execution = validate(&request)?;
		let now = Utc::now();

		let mut order = Order::new(
			OrderId::new(),
			owner,
			request.symbol,
			request.side,
			request.kind,
			execution,
			request.quantity,
			now,
		);

		let quote = self.state.quotes.get(&order.symbol);
		let mut execution = order.execution;
		if let Some(price) = matcher::evaluate(&mut execution, order.side, &quote).fill_price {
			self.state.ledger.preview(&order.fill_at(price, now))?;
		}

		self.bus.publish(|seq| status_event(seq, &order, None));
		if self.config.verbose_logging {
			debug!(
				target: "engine",
				order_id = %order.id,
				symbol = %order.symbol,
				bid = %quote.bid,
				ask = %quote.ask,
				last = %quote.last,
				"Evaluating new order"
			);
		}

		self.evaluate(&mut order, &quote, now);

		info!(
			target: "engine",
			order_id = %order.id,
			owner = %order.owner,
			symbol = %order.symbol,
			side = ?order.side,
			kind = ?order.requested_kind,
			quantity = %order.quantity,
			status = %order.status,
			"Order placed"
		);

		let result = order.result();
		self.state.orders.insert(order.id, order);
		Ok(result)
	}

	/// Ingest a quote and re-evaluate the symbol's resting orders
	///
	/// Each resting order is evaluated exactly once per call; an order that
	/// fills here is never reconsidered in the same pass. Positions in the
	/// symbol are marked to market afterwards.
	pub fn on_quote_update(&mut self, quote: Quote) -> TickReport {
		let now = Utc::now();
		let symbol = quote.symbol.clone();

		self.state.quotes.update(quote.clone());
		self.bus.publish(|seq| EngineEvent::Tick {
			seq,
			quote: quote.clone(),
		});

		let mut report = TickReport {
			symbol: symbol.clone(),
			..TickReport::default()
		};

		let candidates = self.state.resting.remove(&symbol).unwrap_or_default();
		for id in candidates {
			let Some(mut order) = self.state.orders.remove(&id) else {
				continue;
			};

			if order.status.is_live() {
				let outcome = self.evaluate(&mut order, &quote, now);
				if outcome.triggered {
					report.triggered.push(id);
				}
				if let Some(fill) = outcome.fill {
					report.fills.push(fill);
				}
			}

			self.state.orders.insert(id, order);
		}
		report.resting = self.state.resting.get(&symbol).map_or(0, Vec::len);

		let mark = self.config.mark_reference.price(&quote);
		for position in self.state.ledger.mark_to_market(&symbol, mark) {
			self.bus.publish(|seq| EngineEvent::PositionUpdated {
				seq,
				owner: position.owner.clone(),
				symbol: position.symbol.clone(),
				position: Some(position.clone()),
				timestamp: now,
			});
		}

		if self.config.verbose_logging || !report.fills.is_empty() {
			debug!(
				target: "engine",
				symbol = %symbol,
				fills = report.fills.len(),
				triggered = report.triggered.len(),
				resting = report.resting,
				"Quote processed"
			);
		}

		report
	}

	/// Current state of an order
	pub fn status(&self, order_id: OrderId) -> Result<OrderResult, EngineError> {
		self.state
			.orders
			.get(&order_id)
			.map(Order::result)
			.ok_or(EngineError::OrderNotFound(order_id))
	}

	/// Cancel a live order
	///
	/// This is the only way an order becomes `cancelled`; quote updates
	/// never cancel.
	pub fn cancel(&mut self, order_id: OrderId) -> Result<OrderResult, EngineError> {
		let now = Utc::now();
		let order = self
			.state
			.orders
			.get_mut(&order_id)
			.ok_or(EngineError::OrderNotFound(order_id))?;

		let Some(previous) = order.transition(OrderStatus::Cancelled, now) else {
			return Err(EngineError::OrderNotCancellable {
				order_id,
				status: order.status,
			});
		};

		self.bus.publish(|seq| status_event(seq, order, Some(previous)));
		let result = order.result();
		let symbol = order.symbol.clone();

		if let Some(ids) = self.state.resting.get_mut(&symbol) {
			ids.retain(|id| *id != order_id);
			if ids.is_empty() {
				self.state.resting.remove(&symbol);
			}
		}

		info!(target: "engine", order_id = %order_id, symbol = %symbol, "Order cancelled");
		Ok(result)
	}

	/// Open positions of `owner`, ordered by symbol
	pub fn positions(&self, owner: &OwnerId) -> Vec<Position> {
		self.state.ledger.positions(owner)
	}

	pub fn position(&self, owner: &OwnerId, symbol: &str) -> Option<Position> {
		self.state.ledger.get(owner, symbol).cloned()
	}

	/// Live orders of `owner`, oldest first
	pub fn open_orders(&self, owner: &OwnerId) -> Vec<OrderResult> {
		let mut orders: Vec<&Order> = self
			.state
			.orders
			.values()
			.filter(|o| &o.owner == owner && o.status.is_live())
			.collect();
		orders.sort_by_key(|o| o.created_at);
		orders.into_iter().map(Order::result).collect()
	}

	/// Current quote, synthesized for unseen symbols
	pub fn quote(&self, symbol: &str) -> Quote {
		self.state.quotes.get(symbol)
	}

	/// Drop every order, quote and position
	///
	/// Subscribers stay attached and the event sequence keeps counting.
	pub fn reset(&mut self) {
		self.state.reset(&self.config);
		info!(target: "engine", "Engine state reset");
	}

	/// Run the crossing rules for one order and apply the outcome
	fn evaluate(&mut self, order: &mut Order, quote: &Quote, now: DateTime<Utc>) -> Outcome {
		let evaluation = matcher::evaluate(&mut order.execution, order.side, quote);

		if evaluation.triggered
			&& let Execution::Triggered { stop_price } = order.execution
		{
			self.bus.publish(|seq| EngineEvent::StopTriggered {
				seq,
				order_id: order.id,
				symbol: order.symbol.clone(),
				stop_price,
				last: quote.last,
				timestamp: now,
			});
			info!(
				target: "engine",
				order_id = %order.id,
				stop_price = %stop_price,
				last = %quote.last,
				"Stop triggered"
			);
		}

		let fill = match evaluation.fill_price {
			Some(price) => match self.execute(order, price, now) {
				Ok(fill) => fill,
				Err(e) => {
					error!(
						target: "engine",
						order_id = %order.id,
						error = %e,
						"Fill refused by ledger, order stays live"
					);
					self.rest(order, now);
					None
				}
			},
			None => {
				self.rest(order, now);
				None
			}
		};

		Outcome {
			triggered: evaluation.triggered,
			fill,
		}
	}

	/// Book the fill, then mark the order filled and publish
	///
	/// A fill the ledger refuses leaves both the order and the ledger
	/// untouched and publishes nothing.
	fn execute(
		&mut self,
		order: &mut Order,
		price: Decimal,
		now: DateTime<Utc>,
	) -> Result<Option<Fill>, LedgerError> {
		if !order.status.is_live() {
			return Ok(None);
		}

		let update = self.state.ledger.apply(&order.fill_at(price, now))?;
		let Some((previous, fill)) = order.fill(price, now) else {
			return Ok(None);
		};

		self.bus.publish(|seq| EngineEvent::Fill {
			seq,
			fill: fill.clone(),
		});
		self.bus.publish(|seq| status_event(seq, order, Some(previous)));
		self.bus.publish(|seq| EngineEvent::PositionUpdated {
			seq,
			owner: fill.owner.clone(),
			symbol: fill.symbol.clone(),
			position: update.position().cloned(),
			timestamp: now,
		});

		info!(
			target: "engine",
			order_id = %fill.order_id,
			symbol = %fill.symbol,
			side = ?fill.side,
			quantity = %fill.quantity,
			price = %fill.price,
			"Order filled"
		);

		Ok(Some(fill))
	}

	fn rest(&mut self, order: &mut Order, now: DateTime<Utc>) {
		if order.status == OrderStatus::Pending
			&& let Some(previous) = order.transition(OrderStatus::Open, now)
		{
			self.bus.publish(|seq| status_event(seq, order, Some(previous)));
		}

		self.state
			.resting
			.entry(order.symbol.clone())
			.or_default()
			.push(order.id);
	}
}

struct Outcome {
	triggered: bool,
	fill: Option<Fill>,
}

/// Check a request before any state is created
fn validate(request: &OrderRequest) -> Result<Execution, EngineError> {
	if request.symbol.trim().is_empty() {
		return Err(EngineError::InvalidOrderRequest(
			"symbol must not be empty".to_string(),
		));
	}

	if request.quantity <= Decimal::ZERO {
		return Err(EngineError::InvalidOrderRequest(format!(
			"quantity must be positive, got {}",
			request.quantity
		)));
	}

	if request.quantity > MAX_ORDER_QUANTITY {
		return Err(EngineError::InvalidOrderRequest(format!(
			"quantity must not exceed {}, got {}",
			MAX_ORDER_QUANTITY, request.quantity
		)));
	}

	match request.kind {
		OrderKind::Market => Ok(Execution::Market),
		OrderKind::Limit => {
			let limit_price = required_price(request.limit_price, "limit")?;
			Ok(Execution::Limit { limit_price })
		}
		OrderKind::Stop => {
			let stop_price = required_price(request.stop_price, "stop")?;
			Ok(Execution::Stop { stop_price })
		}
	}
}

fn required_price(price: Option<Decimal>, name: &str) -> Result<Decimal, EngineError> {
	match price {
		Some(p) if p > MAX_ORDER_PRICE => Err(EngineError::InvalidOrderRequest(format!(
			"{} price must not exceed {}, got {}",
			name, MAX_ORDER_PRICE, p
		))),
		Some(p) if p > Decimal::ZERO => Ok(p),
		Some(p) => Err(EngineError::InvalidOrderRequest(format!(
			"{} price must be positive, got {}",
			name, p
		))),
		None => Err(EngineError::InvalidOrderRequest(format!(
			"{} order requires a {} price",
			name, name
		))),
	}
}

fn status_event(seq: SequenceNumber, order: &Order, previous: Option<OrderStatus>) -> EngineEvent {
	EngineEvent::OrderStatusChanged {
		seq,
		order_id: order.id,
		owner: order.owner.clone(),
		symbol: order.symbol.clone(),
		previous,
		status: order.status,
		timestamp: order.updated_at,
	}
}
