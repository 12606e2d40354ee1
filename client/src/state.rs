use borsh::{BorshDeserialize, BorshSerialize};
use bytemuck::Pod;
use enumflags2::{bitflags, BitFlags};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::io::{Read, Write};
use tracing::warn;

use crate::error::{DexError, DexResult};

pub use crate::state::critbit::{
    InnerNode, LeafNode, Node, NodeHandle, Slab, SlabHeader, SlabIterator,
};
pub use crate::state::event_queue::{Event, EventFlag, EventQueue};
pub use crate::state::market_state::{MarketLayout, MarketState};
pub use crate::state::open_orders::{OpenOrderSlot, OpenOrders};
pub use crate::state::orderbook::{get_spread, OrderBook, PriceLevel};
pub use crate::state::queue::{Queue, QueueHeader, QueueRecord};
pub use crate::state::request_queue::{Request, RequestFlag, RequestQueue};

/// Critbit tree holding one side of the book
pub mod critbit;
/// Fill and out events awaiting settlement
pub mod event_queue;
/// The market account
pub mod market_state;
/// Per-owner open orders account
pub mod open_orders;
/// Price-ordered view over a slab
pub mod orderbook;
/// Circular queue shared by the event and request queues
pub mod queue;
/// Orders and cancels awaiting matching
pub mod request_queue;

/// Marker written in front of every account owned by the DEX program
pub const ACCOUNT_HEAD_PADDING: &[u8; 5] = b"serum";
/// Marker written after every account owned by the DEX program
pub const ACCOUNT_TAIL_PADDING: &[u8; 7] = b"padding";

#[bitflags]
#[repr(u64)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// Bits of the flags word that follows the head padding of every account.
pub enum AccountFlag {
    /// The account was initialized by the program
    Initialized = 1 << 0,
    /// Market state
    Market = 1 << 1,
    /// Open orders of a single owner
    OpenOrders = 1 << 2,
    /// Request queue
    RequestQueue = 1 << 3,
    /// Event queue
    EventQueue = 1 << 4,
    /// Bid slab
    Bids = 1 << 5,
    /// Ask slab
    Asks = 1 << 6,
    /// The market no longer accepts orders
    Disabled = 1 << 7,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u32)]
/// Side of the book an order rests on.
pub enum Side {
    /// Buy
    Bid = 0,
    /// Sell
    Ask = 1,
}

impl Side {
    /// Helper function to get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    /// The account flag marking the slab that holds this side of the book.
    pub fn slab_flag(&self) -> AccountFlag {
        match self {
            Side::Bid => AccountFlag::Bids,
            Side::Ask => AccountFlag::Asks,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u32)]
/// How a new order interacts with the book.
pub enum OrderType {
    /// Match what crosses, rest the remainder
    Limit = 0,
    /// Match what crosses, drop the remainder
    ImmediateOrCancel = 1,
    /// Rest only if nothing crosses
    PostOnly = 2,
}

// Both enums travel as little-endian u32 inside instruction payloads.
macro_rules! borsh_as_u32 {
    ($($t:ty),*) => {
        $(
            impl BorshSerialize for $t {
                fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
                    (*self as u32).serialize(writer)
                }
            }

            impl BorshDeserialize for $t {
                fn deserialize_reader<R: Read>(reader: &mut R) -> std::io::Result<Self> {
                    let tag = u32::deserialize_reader(reader)?;
                    <$t>::from_u32(tag).ok_or_else(|| {
                        std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            format!("invalid {} {}", stringify!($t), tag),
                        )
                    })
                }
            }
        )*
    };
}

borsh_as_u32!(Side, OrderType);

/// Copy a plain-old-data layout out of `data`, starting at `offset`.
pub(crate) fn read_pod<T: Pod>(data: &[u8], offset: usize) -> DexResult<T> {
    let needed = std::mem::size_of::<T>();
    data.get(offset..)
        .and_then(|rest| rest.get(..needed))
        .and_then(|bytes| bytemuck::try_pod_read_unaligned(bytes).ok())
        .ok_or(DexError::TruncatedBuffer {
            offset,
            needed,
            available: data.len().saturating_sub(offset),
        })
}

/// Map a stored discriminant onto its enum.
pub(crate) fn parse_tag<T: FromPrimitive>(tag: u32, kind: &'static str) -> DexResult<T> {
    T::from_u32(tag).ok_or(DexError::UnknownVariant {
        kind,
        tag: tag as u64,
    })
}

/// Decode the account flags word and check it carries every expected flag.
pub fn parse_account_flags(
    raw: u64,
    expected: BitFlags<AccountFlag>,
) -> DexResult<BitFlags<AccountFlag>> {
    let flags = BitFlags::<AccountFlag>::from_bits(raw).map_err(|_| DexError::UnknownVariant {
        kind: "account flags",
        tag: raw,
    })?;
    if !flags.contains(expected) {
        return Err(DexError::WrongAccountFlags {
            expected: expected.bits(),
            actual: raw,
        });
    }
    Ok(flags)
}

/// Strip the `"serum"` / `"padding"` envelope from raw account bytes.
///
/// Returns the bytes in between, account flags included.
pub fn strip_account_padding(data: &[u8]) -> DexResult<&[u8]> {
    let envelope = ACCOUNT_HEAD_PADDING.len() + ACCOUNT_TAIL_PADDING.len();
    if data.len() < envelope {
        return Err(DexError::TruncatedBuffer {
            offset: 0,
            needed: envelope,
            available: data.len(),
        });
    }
    let (head, rest) = data.split_at(ACCOUNT_HEAD_PADDING.len());
    let (body, tail) = rest.split_at(rest.len() - ACCOUNT_TAIL_PADDING.len());
    if head != ACCOUNT_HEAD_PADDING {
        return Err(DexError::WrongAccountHeadPadding);
    }
    if tail != ACCOUNT_TAIL_PADDING {
        return Err(DexError::WrongAccountTailPadding);
    }
    Ok(body)
}

/// Strip the envelope and the leading account flags of a DEX account.
///
/// Returns the checked flags and the remaining body.
pub fn strip_header(
    data: &[u8],
    expected: BitFlags<AccountFlag>,
) -> DexResult<(BitFlags<AccountFlag>, &[u8])> {
    let body = strip_account_padding(data)?;
    let flags = parse_account_flags(read_pod(body, 0)?, expected)?;
    Ok((flags, &body[std::mem::size_of::<u64>()..]))
}

/// Drop trailing bytes that do not fill a whole `item_len` slot.
///
/// On-chain allocations are sized in round numbers, not in whole nodes, so
/// real accounts always carry a few unusable bytes after the last slot.
pub(crate) fn remove_slop(body: &[u8], header_len: usize, item_len: usize) -> &[u8] {
    if body.len() < header_len || item_len == 0 {
        return body;
    }
    let slop = (body.len() - header_len) % item_len;
    if slop != 0 {
        warn!(slop, item_len, "Discarding trailing account bytes");
    }
    &body[..body.len() - slop]
}

/// Wrap a body in the account envelope. The inverse of [`strip_account_padding`].
pub fn pad_account(body: &[u8]) -> Vec<u8> {
    let mut data =
        Vec::with_capacity(body.len() + ACCOUNT_HEAD_PADDING.len() + ACCOUNT_TAIL_PADDING.len());
    data.extend_from_slice(ACCOUNT_HEAD_PADDING);
    data.extend_from_slice(body);
    data.extend_from_slice(ACCOUNT_TAIL_PADDING);
    data
}

/// Returns the side of an order from its order id.
///
/// Bid sequence numbers are stored complemented, so their low half has the
/// top bit set for any realistic sequence number.
pub fn get_side_from_order_id(order_id: u128) -> Side {
    if (order_id as u64) >> 63 == 1 {
        Side::Bid
    } else {
        Side::Ask
    }
}

/// Returns the limit price (in lots) encoded in the high half of an order id.
pub fn price_from_order_id(order_id: u128) -> u64 {
    (order_id >> 64) as u64
}
