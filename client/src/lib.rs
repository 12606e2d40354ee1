#![warn(missing_docs)]
/*!
Client library for the order book exchange program.

## Overview

The program keeps each market in a handful of accounts: the market state itself, a request queue of orders
waiting to be matched, an event queue of fills waiting to be settled, and one critbit tree ("slab") per side
of the book. This library decodes all of them into owned, strongly typed snapshots and builds the instructions
that act on them.

Nothing here talks to the network. A [`Market`][`market::Market`] is given an
[`AccountFetcher`][`client::AccountFetcher`] to read raw account bytes and a
[`TransactionSubmitter`][`client::TransactionSubmitter`] to send instructions, and composes the two.

## Reading the book

[`Market::load_bids`][`market::Market::load_bids`] and [`Market::load_asks`][`market::Market::load_asks`] return an
[`OrderBook`][`state::OrderBook`]: the leaves of the side's [`Slab`][`state::Slab`] in best-first order, with
[`l2_depth`][`state::OrderBook::l2_depth`] for an aggregated view. Decoding is strict: a slab whose tree does not
match its header, or a queue whose header does not fit its buffer, is an error rather than a partial result.

## Placing and cancelling orders

[`Market::place_order`][`market::Market::place_order`] converts a native price and quantity into lots under the
configured [`RoundingPolicy`][`config::RoundingPolicy`] and submits a
[`NewOrder`][`instruction::MarketInstruction::NewOrder`]. Orders only reach the book once a
[`MatchOrders`][`instruction::MarketInstruction::MatchOrders`] instruction processes the request queue, and
their fills only reach the owner's balances once a [`ConsumeEvents`][`instruction::MarketInstruction::ConsumeEvents`]
instruction pops them off the event queue.

## Logging

Decoders and the market emit [`tracing`] events. No subscriber is installed by the library.
*/

#[cfg(target_endian = "big")]
compile_error!("account layouts are read in place and assume a little-endian host");

/// Collaborators injected into a market
pub mod client;
/// Client configuration
pub mod config;
/// Error types
pub mod error;
/// Program instructions and their builders
pub mod instruction;
/// A loaded market and the operations available on it
pub mod market;
/// Describes the different data structures that the program uses to encode state
pub mod state;
/// Lot conversion
pub mod utils;

pub use crate::error::{DexError, DexResult};
pub use crate::market::Market;
