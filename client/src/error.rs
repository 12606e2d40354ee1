use solana_program::pubkey::Pubkey;
use thiserror::Error;

use crate::client::{FetchError, SubmissionError};

/// Result type used throughout the crate.
pub type DexResult<T = ()> = Result<T, DexError>;

/// Everything that can go wrong while decoding accounts or driving a market.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DexError {
    /// A read ran past the end of the buffer
    #[error("Buffer too short: needed {needed} bytes at offset {offset}, {available} available")]
    TruncatedBuffer {
        /// Where the read started
        offset: usize,
        /// Bytes the read required
        needed: usize,
        /// Bytes left after `offset`
        available: usize,
    },
    /// A discriminant with no matching variant
    #[error("Unknown {kind} discriminant {tag}")]
    UnknownVariant {
        /// What was being decoded
        kind: &'static str,
        /// The stored discriminant
        tag: u64,
    },
    /// The slab buffer has the wrong size or header
    #[error("Slab buffer of {len} bytes does not match the node layout: {reason}")]
    MalformedSlab {
        /// Buffer length
        len: usize,
        /// What is wrong with it
        reason: &'static str,
    },
    /// The tree inside the slab is inconsistent
    #[error("Corrupt slab at node {index}: {reason}")]
    CorruptSlab {
        /// Handle of the offending node
        index: u32,
        /// What is wrong with it
        reason: &'static str,
    },
    /// The queue buffer has the wrong size or header
    #[error("Queue buffer of {len} bytes does not match the record layout: {reason}")]
    MalformedQueue {
        /// Buffer length
        len: usize,
        /// What is wrong with it
        reason: &'static str,
    },
    /// Neither the v1 nor the v2 market layout
    #[error("Unrecognized market layout: {0}")]
    UnrecognizedMarketLayout(&'static str),
    /// The open orders account cannot be decoded
    #[error("Malformed open orders account: {0}")]
    MalformedOpenOrders(&'static str),
    /// Instruction data with the wrong version or length
    #[error("Malformed instruction data: {0}")]
    MalformedInstruction(&'static str),
    /// The instruction payload could not be written
    #[error("Failed to serialize instruction: {0}")]
    Serialization(String),
    /// Missing `"serum"` head marker
    #[error("The account does not start with the expected head padding")]
    WrongAccountHeadPadding,
    /// Missing `"padding"` tail marker
    #[error("The account does not end with the expected tail padding")]
    WrongAccountTailPadding,
    /// The account is of another kind
    #[error("Account flags {actual:#x} do not contain the expected {expected:#x}")]
    WrongAccountFlags {
        /// Flags the account must carry
        expected: u64,
        /// Flags it carries
        actual: u64,
    },
    /// A native amount that cannot be expressed in lots
    #[error("{what} {value} is not representable in lots of {lot_size}")]
    InvalidSize {
        /// Price or quantity
        what: &'static str,
        /// The native amount
        value: u64,
        /// The lot size it was divided by
        lot_size: u64,
    },
    /// The stored nonce does not derive a program address
    #[error("Could not derive the vault signer for market {0}")]
    VaultSigner(Pubkey),
    /// The fetcher found no account
    #[error("Account {0} not found")]
    NotFound(Pubkey),
    /// The fetcher's transport failed
    #[error("Network error: {0}")]
    Network(String),
    /// The submitter failed, with its own error kind
    #[error("Transaction submission failed: {0}")]
    Submission(#[from] SubmissionError),
}

impl From<FetchError> for DexError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::NotFound(address) => DexError::NotFound(address),
            FetchError::Network(msg) => DexError::Network(msg),
        }
    }
}
