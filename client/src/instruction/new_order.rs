//! Place a new order on the request queue.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{instruction::AccountMeta, pubkey::Pubkey, sysvar};

use crate::state::{OrderType, Side};

#[derive(BorshDeserialize, BorshSerialize, Clone, Copy, Debug, PartialEq, Eq)]
/**
The required arguments for a new_order instruction.
*/
pub struct Params {
    /// The order's side (Bid or Ask)
    pub side: Side,
    /// The order's limit price, in quote lots per base lot
    pub limit_price: u64,
    /// The maximum quantity to trade, in base lots
    pub max_quantity: u64,
    /// How the order interacts with the book
    pub order_type: OrderType,
    /// Echoed back in the order's fill and out events. Zero means none.
    pub client_id: u64,
}

impl Params {
    /// Serialized size of the payload
    pub const LEN: usize = 32;
}

/// The required accounts for a new_order instruction.
pub struct Accounts<'a> {
    /// The market account
    pub market: &'a Pubkey,
    /// The owner's open orders account for this market
    pub open_orders: &'a Pubkey,
    /// The market's request queue
    pub request_queue: &'a Pubkey,
    /// The token account funds are locked from: quote tokens for bids, base tokens for asks
    pub payer: &'a Pubkey,
    /// Owner of the open orders account, signs the transaction
    pub owner: &'a Pubkey,
    /// Vault holding the market's base tokens
    pub base_vault: &'a Pubkey,
    /// Vault holding the market's quote tokens
    pub quote_vault: &'a Pubkey,
}

impl<'a> Accounts<'a> {
    pub(crate) fn metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(*self.market, false),
            AccountMeta::new(*self.open_orders, false),
            AccountMeta::new(*self.request_queue, false),
            AccountMeta::new(*self.payer, false),
            AccountMeta::new_readonly(*self.owner, true),
            AccountMeta::new(*self.base_vault, false),
            AccountMeta::new(*self.quote_vault, false),
            AccountMeta::new_readonly(spl_token::ID, false),
            AccountMeta::new_readonly(sysvar::rent::ID, false),
        ]
    }
}
