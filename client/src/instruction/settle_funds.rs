//! Withdraw the free balances of an open orders account into the owner's wallets.

use solana_program::{instruction::AccountMeta, pubkey::Pubkey};

/// The required accounts for a settle_funds instruction.
pub struct Accounts<'a> {
    /// The market account
    pub market: &'a Pubkey,
    /// The owner's open orders account
    pub open_orders: &'a Pubkey,
    /// Owner of the open orders account, signs the transaction
    pub owner: &'a Pubkey,
    /// Vault holding the market's base tokens
    pub base_vault: &'a Pubkey,
    /// Vault holding the market's quote tokens
    pub quote_vault: &'a Pubkey,
    /// Receives the free base tokens
    pub base_wallet: &'a Pubkey,
    /// Receives the free quote tokens
    pub quote_wallet: &'a Pubkey,
    /// Program address owning the vaults, see [`MarketState::vault_signer`](crate::state::MarketState::vault_signer)
    pub vault_signer: &'a Pubkey,
}

impl<'a> Accounts<'a> {
    pub(crate) fn metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(*self.market, false),
            AccountMeta::new(*self.open_orders, false),
            AccountMeta::new_readonly(*self.owner, true),
            AccountMeta::new(*self.base_vault, false),
            AccountMeta::new(*self.quote_vault, false),
            AccountMeta::new(*self.base_wallet, false),
            AccountMeta::new(*self.quote_wallet, false),
            AccountMeta::new_readonly(*self.vault_signer, false),
            AccountMeta::new_readonly(spl_token::ID, false),
        ]
    }
}
