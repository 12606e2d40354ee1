//! Initialize a new market over freshly allocated accounts.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{instruction::AccountMeta, pubkey::Pubkey, sysvar};

#[derive(BorshDeserialize, BorshSerialize, Clone, Copy, Debug, PartialEq, Eq)]
/**
The required arguments for an initialize_market instruction.
*/
pub struct Params {
    /// Native base units per base lot
    pub base_lot_size: u64,
    /// Native quote units per quote lot
    pub quote_lot_size: u64,
    /// Taker fee in basis points
    pub fee_rate_bps: u16,
    /// Nonce such that `[market, nonce]` derives the vault signer
    pub vault_signer_nonce: u64,
    /// Quote amounts below this are not worth settling
    pub quote_dust_threshold: u64,
}

impl Params {
    /// Serialized size of the payload
    pub const LEN: usize = 34;
}

/// The required accounts for an initialize_market instruction.
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
    /// Mint of the base token
    pub base_mint: &'a Pubkey,
    /// Mint of the quote token
    pub quote_mint: &'a Pubkey,
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
            AccountMeta::new_readonly(*self.base_mint, false),
            AccountMeta::new_readonly(*self.quote_mint, false),
            AccountMeta::new_readonly(sysvar::rent::ID, false),
        ]
    }
}
