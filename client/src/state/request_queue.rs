use bytemuck::{Pod, Zeroable};
use enumflags2::{bitflags, BitFlags};
use solana_program::pubkey::Pubkey;

use crate::error::{DexError, DexResult};
use crate::state::queue::{Queue, QueueRecord};
use crate::state::{price_from_order_id, OrderType, Side};

#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// Bits of a request's flags byte.
pub enum RequestFlag {
    /// Place an order
    NewOrder = 0x01,
    /// Cancel an order
    CancelOrder = 0x02,
    /// The order is a bid
    Bid = 0x04,
    /// Post only order
    PostOnly = 0x08,
    /// Immediate or cancel order
    ImmediateOrCancel = 0x10,
}

/// An order operation accepted by the program but not yet matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Place an order
    NewOrder {
        /// Buy or sell
        side: Side,
        /// How the order meets the book
        order_type: OrderType,
        /// Slot reserved in the owner's open orders account
        owner_slot: u8,
        /// Fee tier of the owner
        fee_tier: u8,
        /// Id assigned to the order, price in the high half
        order_id: u128,
        /// In base lots
        max_coin_qty: u64,
        /// Native quote units locked for a bid
        native_pc_qty_locked: u64,
        /// Open orders account placing the order
        owner: Pubkey,
        /// Client supplied id, zero when none
        client_order_id: u64,
    },
    /// Cancel an order
    CancelOrder {
        /// Side of the order
        side: Side,
        /// Id of the order
        order_id: u128,
        /// Sequence number of the cancel
        cancel_id: u64,
        /// Slot the order must occupy
        expected_owner_slot: u8,
        /// Open orders account that must own the order
        expected_owner: Pubkey,
        /// Client supplied id, zero when none
        client_order_id: u64,
    },
}

impl Request {
    /// Side of the order
    pub fn side(&self) -> Side {
        match self {
            Request::NewOrder { side, .. } | Request::CancelOrder { side, .. } => *side,
        }
    }

    /// Id of the order
    pub fn order_id(&self) -> u128 {
        match self {
            Request::NewOrder { order_id, .. } | Request::CancelOrder { order_id, .. } => *order_id,
        }
    }

    /// Limit price in quote lots, carried in the high half of the order id
    pub fn price(&self) -> u64 {
        price_from_order_id(self.order_id())
    }

    /// The flags byte this request is stored with
    pub fn flags(&self) -> BitFlags<RequestFlag> {
        let mut flags = match self {
            Request::NewOrder { order_type, .. } => {
                let mut f = BitFlags::from(RequestFlag::NewOrder);
                match order_type {
                    OrderType::PostOnly => f |= RequestFlag::PostOnly,
                    OrderType::ImmediateOrCancel => f |= RequestFlag::ImmediateOrCancel,
                    OrderType::Limit => (),
                }
                f
            }
            Request::CancelOrder { .. } => BitFlags::from(RequestFlag::CancelOrder),
        };
        if self.side() == Side::Bid {
            flags |= RequestFlag::Bid;
        }
        flags
    }
}

/// A request slot as stored in the queue
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct RequestRaw {
    flags: u8,
    owner_slot: u8,
    fee_tier: u8,
    padding: [u8; 5],
    max_coin_qty_or_cancel_id: u64,
    native_pc_qty_locked: u64,
    order_id: u128,
    owner: [u8; 32],
    client_order_id: u64,
}

impl QueueRecord for Request {
    type Raw = RequestRaw;
    const KIND: &'static str = "request";

    fn from_raw(raw: &RequestRaw) -> DexResult<Self> {
        let raw_flags = raw.flags;
        let invalid = DexError::UnknownVariant {
            kind: "request flags",
            tag: raw_flags as u64,
        };
        let flags = BitFlags::<RequestFlag>::from_bits(raw_flags).map_err(|_| invalid.clone())?;
        let side = if flags.contains(RequestFlag::Bid) {
            Side::Bid
        } else {
            Side::Ask
        };
        if flags.contains(RequestFlag::NewOrder) {
            use RequestFlag::*;
            if !(NewOrder | Bid | PostOnly | ImmediateOrCancel).contains(flags) {
                return Err(invalid);
            }
            let order_type = match (
                flags.contains(PostOnly),
                flags.contains(ImmediateOrCancel),
            ) {
                (false, false) => OrderType::Limit,
                (true, false) => OrderType::PostOnly,
                (false, true) => OrderType::ImmediateOrCancel,
                (true, true) => return Err(invalid),
            };
            Ok(Request::NewOrder {
                side,
                order_type,
                owner_slot: raw.owner_slot,
                fee_tier: raw.fee_tier,
                order_id: raw.order_id,
                max_coin_qty: raw.max_coin_qty_or_cancel_id,
                native_pc_qty_locked: raw.native_pc_qty_locked,
                owner: Pubkey::new_from_array(raw.owner),
                client_order_id: raw.client_order_id,
            })
        } else if flags.contains(RequestFlag::CancelOrder)
            && (RequestFlag::CancelOrder | RequestFlag::Bid).contains(flags)
        {
            Ok(Request::CancelOrder {
                side,
                order_id: raw.order_id,
                cancel_id: raw.max_coin_qty_or_cancel_id,
                expected_owner_slot: raw.owner_slot,
                expected_owner: Pubkey::new_from_array(raw.owner),
                client_order_id: raw.client_order_id,
            })
        } else {
            Err(invalid)
        }
    }

    fn to_raw(&self) -> RequestRaw {
        let (owner_slot, fee_tier, max_coin_qty_or_cancel_id, native_pc_qty_locked, owner) =
            match *self {
                Request::NewOrder {
                    owner_slot,
                    fee_tier,
                    max_coin_qty,
                    native_pc_qty_locked,
                    owner,
                    ..
                } => (owner_slot, fee_tier, max_coin_qty, native_pc_qty_locked, owner),
                Request::CancelOrder {
                    cancel_id,
                    expected_owner_slot,
                    expected_owner,
                    ..
                } => (expected_owner_slot, 0, cancel_id, 0, expected_owner),
            };
        let client_order_id = match *self {
            Request::NewOrder {
                client_order_id, ..
            }
            | Request::CancelOrder {
                client_order_id, ..
            } => client_order_id,
        };
        RequestRaw {
            flags: self.flags().bits(),
            owner_slot,
            fee_tier,
            padding: [0; 5],
            max_coin_qty_or_cancel_id,
            native_pc_qty_locked,
            order_id: self.order_id(),
            owner: owner.to_bytes(),
            client_order_id,
        }
    }
}

/// The decoded request queue of a market
pub type RequestQueue = Queue<Request>;
