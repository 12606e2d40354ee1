//! The two capabilities a [`Market`](crate::market::Market) needs from the
//! outside world. Transport, retries and signing live behind these traits.

use solana_program::{instruction::Instruction, pubkey::Pubkey};
use std::fmt;
use thiserror::Error;

/// Why an account could not be read.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The account does not exist
    #[error("account {0} not found")]
    NotFound(Pubkey),
    /// The transport failed
    #[error("network error: {0}")]
    Network(String),
}

/// Why a transaction could not be sent or tracked.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    /// The cluster refused the transaction
    #[error("transaction rejected: {0}")]
    Rejected(String),
    /// The transport failed
    #[error("network error: {0}")]
    Network(String),
}

/// Opaque identifier returned by the submitter
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransactionSignature(pub String);

impl fmt::Display for TransactionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of waiting on a submitted transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    /// The transaction landed
    Confirmed,
    /// The submitter gave up waiting
    TimedOut,
}

/// Reads raw account data.
pub trait AccountFetcher {
    /// The full data of the account at `address`.
    fn fetch_account_bytes(&self, address: &Pubkey) -> Result<Vec<u8>, FetchError>;
}

/// Signs, sends and tracks transactions.
///
/// `signers` names the accounts whose signatures the transaction requires.
/// Holding the keys is the implementor's business.
pub trait TransactionSubmitter {
    /// Send `instructions` as a single transaction.
    fn submit_transaction(
        &self,
        instructions: &[Instruction],
        signers: &[Pubkey],
    ) -> Result<TransactionSignature, SubmissionError>;

    /// Wait for a previously submitted transaction.
    fn confirm_transaction(
        &self,
        signature: &TransactionSignature,
    ) -> Result<Confirmation, SubmissionError>;
}

impl<T: AccountFetcher + ?Sized> AccountFetcher for &T {
    fn fetch_account_bytes(&self, address: &Pubkey) -> Result<Vec<u8>, FetchError> {
        (**self).fetch_account_bytes(address)
    }
}

impl<T: TransactionSubmitter + ?Sized> TransactionSubmitter for &T {
    fn submit_transaction(
        &self,
        instructions: &[Instruction],
        signers: &[Pubkey],
    ) -> Result<TransactionSignature, SubmissionError> {
        (**self).submit_transaction(instructions, signers)
    }

    fn confirm_transaction(
        &self,
        signature: &TransactionSignature,
    ) -> Result<Confirmation, SubmissionError> {
        (**self).confirm_transaction(signature)
    }
}
