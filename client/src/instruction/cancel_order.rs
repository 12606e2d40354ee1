//! Cancel an existing order in the orderbook.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{instruction::AccountMeta, pubkey::Pubkey};

use crate::state::Side;

#[derive(BorshDeserialize, BorshSerialize, Clone, Copy, Debug, PartialEq, Eq)]
/**
The required arguments for a cancel_order instruction.
*/
pub struct Params {
    /// Side of the book holding the order
    pub side: Side,
    /// The order id is a unique identifier for a particular order
    pub order_id: u128,
    /// The open orders account expected to own the order
    pub open_orders: [u8; 32],
    /// Slot of the order in its open orders account
    pub open_orders_slot: u8,
}

impl Params {
    /// Serialized size of the payload
    pub const LEN: usize = 53;
}

/// The required accounts for a cancel_order or cancel_order_by_client_id instruction.
pub struct Accounts<'a> {
    /// The market account
    pub market: &'a Pubkey,
    /// The owner's open orders account
    pub open_orders: &'a Pubkey,
    /// The market's request queue
    pub request_queue: &'a Pubkey,
    /// Owner of the open orders account, signs the transaction
    pub owner: &'a Pubkey,
}

impl<'a> Accounts<'a> {
    pub(crate) fn metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new_readonly(*self.market, false),
            AccountMeta::new(*self.open_orders, false),
            AccountMeta::new(*self.request_queue, false),
            AccountMeta::new_readonly(*self.owner, true),
        ]
    }
}
