//! Match requests from the request queue against the book.

use solana_program::{instruction::AccountMeta, pubkey::Pubkey};

/// The required accounts for a match_orders instruction.
pub struct Accounts<'a> {
    /// The market account
    pub market: &'a Pubkey,
    /// The market's request queue
    pub request_queue: &'a Pubkey,
    /// The market's event queue
    pub event_queue: &'a Pubkey,
    /// The bid slab
    pub bids: &'a Pubkey,
    /// The ask slab
    pub asks: &'a Pubkey,
    /// Vault holding the market's base tokens
    pub base_vault: &'a Pubkey,
    /// Vault holding the market's quote tokens
    pub quote_vault: &'a Pubkey,
}

impl<'a> Accounts<'a> {
    pub(crate) fn metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(*self.market, false),
            AccountMeta::new(*self.request_queue, false),
            AccountMeta::new(*self.event_queue, false),
            AccountMeta::new(*self.bids, false),
            AccountMeta::new(*self.asks, false),
            AccountMeta::new(*self.base_vault, false),
            AccountMeta::new(*self.quote_vault, false),
        ]
    }
}
