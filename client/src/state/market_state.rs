//! The market state struct tracks the mints, vaults, queues, slabs and lot
//! sizes of one market, as stored in the market account.
use bytemuck::{Pod, Zeroable};
use enumflags2::BitFlags;
use solana_program::pubkey::Pubkey;
use tracing::debug;

use crate::error::{DexError, DexResult};
use crate::state::{pad_account, parse_account_flags, read_pod, strip_account_padding, AccountFlag};

/// Fee rates are expressed in basis points
pub const FEE_RATE_DENOMINATOR: u64 = 10_000;

/// The two account sizes the program has ever written for a market
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketLayout {
    /// The original layout
    V1,
    /// Adds `referrer_rebates_accrued`
    V2,
}

impl MarketLayout {
    /// Full account size, envelope included
    pub const fn account_len(self) -> usize {
        match self {
            MarketLayout::V1 => 380,
            MarketLayout::V2 => 388,
        }
    }

    fn from_account_len(len: usize) -> Option<Self> {
        match len {
            380 => Some(MarketLayout::V1),
            388 => Some(MarketLayout::V2),
            _ => None,
        }
    }
}

/// The v1 body, between the envelope markers. V2 appends one `u64`.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
struct MarketStateRaw {
    account_flags: u64,
    own_address: [u8; 32],
    vault_signer_nonce: u64,
    base_mint: [u8; 32],
    quote_mint: [u8; 32],
    base_vault: [u8; 32],
    base_deposits_total: u64,
    base_fees_accrued: u64,
    quote_vault: [u8; 32],
    quote_deposits_total: u64,
    quote_fees_accrued: u64,
    quote_dust_threshold: u64,
    request_queue: [u8; 32],
    event_queue: [u8; 32],
    bids: [u8; 32],
    asks: [u8; 32],
    base_lot_size: u64,
    quote_lot_size: u64,
    fee_rate_bps: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The market's central state
pub struct MarketState {
    /// Which layout the account was decoded from
    pub layout: MarketLayout,
    /// Always carries `Initialized | Market`
    pub account_flags: BitFlags<AccountFlag>,
    /// The market account's own address
    pub own_address: Pubkey,
    /// Seed completing the vault signer derivation
    pub vault_signer_nonce: u64,
    /// Base token mint
    pub base_mint: Pubkey,
    /// Quote token mint
    pub quote_mint: Pubkey,
    /// Base token vault
    pub base_vault: Pubkey,
    /// Base tokens deposited in open orders accounts
    pub base_deposits_total: u64,
    /// Base fees not yet swept
    pub base_fees_accrued: u64,
    /// Quote token vault
    pub quote_vault: Pubkey,
    /// Quote tokens deposited in open orders accounts
    pub quote_deposits_total: u64,
    /// Quote fees not yet swept
    pub quote_fees_accrued: u64,
    /// Quote amounts below this are not worth settling
    pub quote_dust_threshold: u64,
    /// Request queue account
    pub request_queue: Pubkey,
    /// Event queue account
    pub event_queue: Pubkey,
    /// Bid slab account
    pub bids: Pubkey,
    /// Ask slab account
    pub asks: Pubkey,
    /// Native base units per base lot
    pub base_lot_size: u64,
    /// Native quote units per quote lot. This is the tick size.
    pub quote_lot_size: u64,
    /// Taker fee in basis points
    pub fee_rate_bps: u64,
    /// Always zero for [`MarketLayout::V1`] accounts
    pub referrer_rebates_accrued: u64,
}

impl MarketState {
    /// Decode a full market account.
    ///
    /// Any deviation from the two known layouts, including a missing
    /// envelope or missing `Initialized | Market` flags, is reported as
    /// [`DexError::UnrecognizedMarketLayout`].
    pub fn parse(data: &[u8]) -> DexResult<Self> {
        let layout = MarketLayout::from_account_len(data.len())
            .ok_or(DexError::UnrecognizedMarketLayout("unexpected account size"))?;
        let body = strip_account_padding(data)
            .map_err(|_| DexError::UnrecognizedMarketLayout("missing account padding"))?;
        let raw: MarketStateRaw = read_pod(body, 0)?;
        let account_flags =
            parse_account_flags(raw.account_flags, AccountFlag::Initialized | AccountFlag::Market)
                .map_err(|_| DexError::UnrecognizedMarketLayout("not an initialized market"))?;

        let state = Self {
            layout,
            account_flags,
            own_address: Pubkey::new_from_array(raw.own_address),
            vault_signer_nonce: raw.vault_signer_nonce,
            base_mint: Pubkey::new_from_array(raw.base_mint),
            quote_mint: Pubkey::new_from_array(raw.quote_mint),
            base_vault: Pubkey::new_from_array(raw.base_vault),
            base_deposits_total: raw.base_deposits_total,
            base_fees_accrued: raw.base_fees_accrued,
            quote_vault: Pubkey::new_from_array(raw.quote_vault),
            quote_deposits_total: raw.quote_deposits_total,
            quote_fees_accrued: raw.quote_fees_accrued,
            quote_dust_threshold: raw.quote_dust_threshold,
            request_queue: Pubkey::new_from_array(raw.request_queue),
            event_queue: Pubkey::new_from_array(raw.event_queue),
            bids: Pubkey::new_from_array(raw.bids),
            asks: Pubkey::new_from_array(raw.asks),
            base_lot_size: raw.base_lot_size,
            quote_lot_size: raw.quote_lot_size,
            fee_rate_bps: raw.fee_rate_bps,
            referrer_rebates_accrued: match layout {
                MarketLayout::V1 => 0,
                MarketLayout::V2 => read_pod(body, std::mem::size_of::<MarketStateRaw>())?,
            },
        };
        debug!(
            market = %state.own_address,
            ?layout,
            base_lot_size = state.base_lot_size,
            quote_lot_size = state.quote_lot_size,
            "Decoded market state"
        );
        Ok(state)
    }

    /// Encode back into a full account, envelope included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let raw = MarketStateRaw {
            account_flags: self.account_flags.bits(),
            own_address: self.own_address.to_bytes(),
            vault_signer_nonce: self.vault_signer_nonce,
            base_mint: self.base_mint.to_bytes(),
            quote_mint: self.quote_mint.to_bytes(),
            base_vault: self.base_vault.to_bytes(),
            base_deposits_total: self.base_deposits_total,
            base_fees_accrued: self.base_fees_accrued,
            quote_vault: self.quote_vault.to_bytes(),
            quote_deposits_total: self.quote_deposits_total,
            quote_fees_accrued: self.quote_fees_accrued,
            quote_dust_threshold: self.quote_dust_threshold,
            request_queue: self.request_queue.to_bytes(),
            event_queue: self.event_queue.to_bytes(),
            bids: self.bids.to_bytes(),
            asks: self.asks.to_bytes(),
            base_lot_size: self.base_lot_size,
            quote_lot_size: self.quote_lot_size,
            fee_rate_bps: self.fee_rate_bps,
        };
        let mut body = bytemuck::bytes_of(&raw).to_vec();
        if self.layout == MarketLayout::V2 {
            body.extend_from_slice(bytemuck::bytes_of(&self.referrer_rebates_accrued));
        }
        pad_account(&body)
    }

    /// The minimum price increment, in native quote units
    pub fn tick_size(&self) -> u64 {
        self.quote_lot_size
    }

    /// Fee rate as `(numerator, denominator)`
    pub fn fee_rate(&self) -> (u64, u64) {
        (self.fee_rate_bps, FEE_RATE_DENOMINATOR)
    }

    /// Derive the program address that owns the market's vaults.
    pub fn vault_signer(&self, program_id: &Pubkey) -> DexResult<Pubkey> {
        let nonce = self.vault_signer_nonce.to_le_bytes();
        Pubkey::create_program_address(&[self.own_address.as_ref(), &nonce], program_id)
            .map_err(|_| DexError::VaultSigner(self.own_address))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_state(layout: MarketLayout) -> MarketState {
        MarketState {
            layout,
            account_flags: AccountFlag::Initialized | AccountFlag::Market,
            own_address: Pubkey::new_from_array([1; 32]),
            vault_signer_nonce: 0,
            base_mint: Pubkey::new_from_array([2; 32]),
            quote_mint: Pubkey::new_from_array([3; 32]),
            base_vault: Pubkey::new_from_array([4; 32]),
            base_deposits_total: 1,
            base_fees_accrued: 2,
            quote_vault: Pubkey::new_from_array([5; 32]),
            quote_deposits_total: 3,
            quote_fees_accrued: 4,
            quote_dust_threshold: 100,
            request_queue: Pubkey::new_from_array([6; 32]),
            event_queue: Pubkey::new_from_array([7; 32]),
            bids: Pubkey::new_from_array([8; 32]),
            asks: Pubkey::new_from_array([9; 32]),
            base_lot_size: 100,
            quote_lot_size: 10,
            fee_rate_bps: 22,
            referrer_rebates_accrued: match layout {
                MarketLayout::V1 => 0,
                MarketLayout::V2 => 77,
            },
        }
    }

    #[test]
    fn v1_field_offsets() {
        let data = sample_state(MarketLayout::V1).to_bytes();
        assert_eq!(data.len(), 380);
        assert_eq!(&data[..5], b"serum");
        assert_eq!(&data[5..13], &3u64.to_le_bytes());
        assert_eq!(&data[13..45], &[1; 32]);
        assert_eq!(&data[53..85], &[2; 32]);
        // lot sizes and fee rate close the body
        assert_eq!(&data[349..357], &100u64.to_le_bytes());
        assert_eq!(&data[357..365], &10u64.to_le_bytes());
        assert_eq!(&data[365..373], &22u64.to_le_bytes());
        assert_eq!(&data[373..], b"padding");

        let state = MarketState::parse(&data).unwrap();
        assert_eq!(state, sample_state(MarketLayout::V1));
        assert_eq!(state.tick_size(), 10);
        assert_eq!(state.fee_rate(), (22, 10_000));
    }

    #[test]
    fn v2_carries_referrer_rebates() {
        let data = sample_state(MarketLayout::V2).to_bytes();
        assert_eq!(data.len(), 388);
        let state = MarketState::parse(&data).unwrap();
        assert_eq!(state.layout, MarketLayout::V2);
        assert_eq!(state.referrer_rebates_accrued, 77);
    }

    #[test]
    fn unrecognized_layouts() {
        let data = sample_state(MarketLayout::V2).to_bytes();
        for len in [0, 379, 381, 387, 389] {
            let mut d = data.clone();
            d.resize(len, 0);
            assert!(matches!(
                MarketState::parse(&d),
                Err(DexError::UnrecognizedMarketLayout(_))
            ));
        }

        let mut d = data.clone();
        d[0] = b'x';
        assert!(matches!(
            MarketState::parse(&d),
            Err(DexError::UnrecognizedMarketLayout(_))
        ));

        let mut state = sample_state(MarketLayout::V2);
        state.account_flags = AccountFlag::Initialized | AccountFlag::Bids;
        assert!(matches!(
            MarketState::parse(&state.to_bytes()),
            Err(DexError::UnrecognizedMarketLayout(_))
        ));
    }

    #[test]
    fn vault_signer_matches_program_address() {
        let program_id = Pubkey::new_unique();
        let mut state = sample_state(MarketLayout::V2);
        state.own_address = Pubkey::new_unique();
        let market = state.own_address;
        let (expected, nonce) = (0..100u64)
            .find_map(|nonce| {
                Pubkey::create_program_address(&[market.as_ref(), &nonce.to_le_bytes()], &program_id)
                    .ok()
                    .map(|key| (key, nonce))
            })
            .unwrap();
        state.vault_signer_nonce = nonce;
        assert_eq!(state.vault_signer(&program_id).unwrap(), expected);

        // nonces that land on the curve have no program address
        let bad_nonce = (0..100u64)
            .find(|nonce| {
                Pubkey::create_program_address(&[market.as_ref(), &nonce.to_le_bytes()], &program_id)
                    .is_err()
            })
            .unwrap();
        state.vault_signer_nonce = bad_nonce;
        assert_eq!(
            state.vault_signer(&program_id),
            Err(DexError::VaultSigner(market))
        );
    }
}
