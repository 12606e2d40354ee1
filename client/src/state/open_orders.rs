use bytemuck::{Pod, Zeroable};
use enumflags2::BitFlags;
use solana_program::pubkey::Pubkey;
use tracing::debug;

use crate::error::{DexError, DexResult};
use crate::state::{
    get_side_from_order_id, pad_account, parse_account_flags, read_pod, strip_account_padding,
    AccountFlag, Side,
};

/// Number of order slots in an open orders account
pub const MAX_ORDERS: usize = 128;

const V1_ACCOUNT_LEN: usize = 3220;
const V2_ACCOUNT_LEN: usize = 3228;

/// The v1 body, between the envelope markers. V2 appends one `u64`.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
struct OpenOrdersRaw {
    account_flags: u64,
    market: [u8; 32],
    owner: [u8; 32],
    base_token_free: u64,
    base_token_total: u64,
    quote_token_free: u64,
    quote_token_total: u64,
    free_slot_bits: u128,
    is_bid_bits: u128,
    orders: [u128; MAX_ORDERS],
    client_ids: [u64; MAX_ORDERS],
}

/// A user's balances and resting orders on one market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOrders {
    /// Always carries `Initialized | OpenOrders`
    pub account_flags: BitFlags<AccountFlag>,
    /// The market this account trades on
    pub market: Pubkey,
    /// Wallet allowed to act on the account
    pub owner: Pubkey,
    /// Base tokens ready to settle
    pub base_token_free: u64,
    /// Base tokens free or locked in asks
    pub base_token_total: u64,
    /// Quote tokens ready to settle
    pub quote_token_free: u64,
    /// Quote tokens free or locked in bids
    pub quote_token_total: u64,
    /// Bit `i` is set when slot `i` holds no order
    pub free_slot_bits: u128,
    /// Bit `i` is set when slot `i` holds a bid
    pub is_bid_bits: u128,
    /// Order id per slot, stale in free slots
    pub orders: [u128; MAX_ORDERS],
    /// Client order id per slot
    pub client_ids: [u64; MAX_ORDERS],
    /// `None` for the v1 layout
    pub referrer_rebates_accrued: Option<u64>,
}

/// One occupied slot of an [`OpenOrders`] account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOrderSlot {
    /// Slot index
    pub slot: u8,
    /// Side of the order
    pub side: Side,
    /// Id of the order
    pub order_id: u128,
    /// Client supplied id, zero when none
    pub client_id: u64,
}

impl OpenOrders {
    /// Decode a full v1 or v2 open orders account.
    pub fn parse(data: &[u8]) -> DexResult<Self> {
        let has_rebates = match data.len() {
            V1_ACCOUNT_LEN => false,
            V2_ACCOUNT_LEN => true,
            _ => return Err(DexError::MalformedOpenOrders("unexpected account size")),
        };
        let body = strip_account_padding(data)?;
        let raw: OpenOrdersRaw = read_pod(body, 0)?;
        let account_flags = parse_account_flags(
            raw.account_flags,
            AccountFlag::Initialized | AccountFlag::OpenOrders,
        )?;
        let market = Pubkey::new_from_array(raw.market);
        let owner = Pubkey::new_from_array(raw.owner);
        let base_token_free = raw.base_token_free;
        let base_token_total = raw.base_token_total;
        let quote_token_free = raw.quote_token_free;
        let quote_token_total = raw.quote_token_total;
        let free_slot_bits = raw.free_slot_bits;
        let referrer_rebates_accrued = if has_rebates {
            Some(read_pod(body, std::mem::size_of::<OpenOrdersRaw>())?)
        } else {
            None
        };
        if base_token_free > base_token_total || quote_token_free > quote_token_total {
            return Err(DexError::MalformedOpenOrders(
                "free balance exceeds total balance",
            ));
        }
        debug!(
            %market,
            %owner,
            orders = MAX_ORDERS as u32 - free_slot_bits.count_ones(),
            "Decoded open orders"
        );
        Ok(Self {
            account_flags,
            market,
            owner,
            base_token_free,
            base_token_total,
            quote_token_free,
            quote_token_total,
            free_slot_bits,
            is_bid_bits: raw.is_bid_bits,
            orders: raw.orders,
            client_ids: raw.client_ids,
            referrer_rebates_accrued,
        })
    }

    /// Serialize back to the layout the account was read from.
    pub fn to_bytes(&self) -> Vec<u8> {
        let raw = OpenOrdersRaw {
            account_flags: self.account_flags.bits(),
            market: self.market.to_bytes(),
            owner: self.owner.to_bytes(),
            base_token_free: self.base_token_free,
            base_token_total: self.base_token_total,
            quote_token_free: self.quote_token_free,
            quote_token_total: self.quote_token_total,
            free_slot_bits: self.free_slot_bits,
            is_bid_bits: self.is_bid_bits,
            orders: self.orders,
            client_ids: self.client_ids,
        };
        let mut body = bytemuck::bytes_of(&raw).to_vec();
        if let Some(rebates) = self.referrer_rebates_accrued {
            body.extend_from_slice(bytemuck::bytes_of(&rebates));
        }
        pad_account(&body)
    }

    /// Slots past the end count as free
    pub fn is_slot_free(&self, slot: u8) -> bool {
        (slot as usize) >= MAX_ORDERS || self.free_slot_bits & (1u128 << slot) != 0
    }

    /// Side of the order in `slot`, or `None` if the slot is free
    pub fn slot_side(&self, slot: u8) -> Option<Side> {
        if self.is_slot_free(slot) {
            return None;
        }
        Some(if self.is_bid_bits & (1u128 << slot) != 0 {
            Side::Bid
        } else {
            Side::Ask
        })
    }

    /// Iterate over the occupied slots, lowest slot first.
    pub fn orders(&self) -> impl Iterator<Item = OpenOrderSlot> + '_ {
        (0..MAX_ORDERS as u8).filter_map(move |slot| {
            self.slot_side(slot).map(|side| OpenOrderSlot {
                slot,
                side,
                order_id: self.orders[slot as usize],
                client_id: self.client_ids[slot as usize],
            })
        })
    }

    /// Find the slot holding `order_id`
    pub fn find_order(&self, order_id: u128) -> Option<OpenOrderSlot> {
        self.orders().find(|o| o.order_id == order_id)
    }

    /// Find the slot holding the order with client id `client_id`
    pub fn find_by_client_id(&self, client_id: u64) -> Option<OpenOrderSlot> {
        self.orders().find(|o| o.client_id == client_id)
    }

    /// Check the slot bitmap against the side encoded in each order id
    pub fn check_sides(&self) -> DexResult {
        match self
            .orders()
            .find(|o| get_side_from_order_id(o.order_id) != o.side)
        {
            Some(_) => Err(DexError::MalformedOpenOrders(
                "slot side disagrees with its order id",
            )),
            None => Ok(()),
        }
    }
}
