//! Pop a series of events off the event queue, crediting the open orders accounts they name.

use solana_program::{instruction::AccountMeta, pubkey::Pubkey};

/// The required accounts for a consume_events instruction.
pub struct Accounts<'a> {
    /// Every open orders account referenced by the events being consumed, sorted
    pub open_orders: &'a [Pubkey],
    /// The market account
    pub market: &'a Pubkey,
    /// The market's event queue
    pub event_queue: &'a Pubkey,
    /// Vault holding the market's base tokens
    pub base_vault: &'a Pubkey,
    /// Vault holding the market's quote tokens
    pub quote_vault: &'a Pubkey,
}

impl<'a> Accounts<'a> {
    pub(crate) fn metas(&self) -> Vec<AccountMeta> {
        let mut metas: Vec<AccountMeta> = self
            .open_orders
            .iter()
            .map(|key| AccountMeta::new(*key, false))
            .collect();
        metas.extend_from_slice(&[
            AccountMeta::new(*self.market, false),
            AccountMeta::new(*self.event_queue, false),
            AccountMeta::new(*self.base_vault, false),
            AccountMeta::new(*self.quote_vault, false),
        ]);
        metas
    }
}
