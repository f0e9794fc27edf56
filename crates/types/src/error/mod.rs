// Path: crates/types/src/error/mod.rs
//! Core error types for the NexaFlow ledger.

use crate::app::{Address, ResultCode};
use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors related to the state trie or canonical serialization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// A key of the wrong width was handed to the SHAMap boundary.
    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength {
        /// The required key width.
        expected: usize,
        /// The width actually supplied.
        got: usize,
    },
    /// The requested key was not found in the state.
    #[error("Key not found in state")]
    KeyNotFound,
    /// An error occurred during canonical decoding.
    #[error("Decode error: {0}")]
    Decode(String),
    /// An error occurred during canonical encoding.
    #[error("Encode error: {0}")]
    Encode(String),
}

impl ErrorCode for StateError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidKeyLength { .. } => "STATE_INVALID_KEY_LENGTH",
            Self::KeyNotFound => "STATE_KEY_NOT_FOUND",
            Self::Decode(_) => "STATE_DECODE_ERROR",
            Self::Encode(_) => "STATE_ENCODE_ERROR",
        }
    }
}

/// Errors raised while validating or applying a transaction.
///
/// Domain managers return these for every expected failure; they never panic
/// for an expected outcome. [`TransactionError::result_code`] maps each
/// variant to the stable integer code recorded in transaction metadata.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// The supplied signature did not verify against the signing key.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    /// The sending account does not exist on the ledger.
    #[error("Account {0} does not exist")]
    AccountNotFound(Address),
    /// The spendable balance cannot cover the operation.
    #[error("Insufficient funds: {0}")]
    Unfunded(String),
    /// No trust line exists for the referenced issued currency.
    #[error("No trust line for {currency}/{issuer}")]
    NoLine {
        /// The currency code.
        currency: String,
        /// The issuing account.
        issuer: Address,
    },
    /// The transaction sequence did not match the account's next sequence.
    #[error("Bad sequence: expected {expected}, got {got}")]
    BadSequence {
        /// The account's next sequence.
        expected: u32,
        /// The sequence carried by the transaction.
        got: u32,
    },
    /// The fee is below the current minimum.
    #[error("Fee {fee} drops below minimum {minimum} drops")]
    FeeBelowMinimum {
        /// The fee offered.
        fee: u64,
        /// The current minimum fee.
        minimum: u64,
    },
    /// The transaction queue is full and this fee displaces nothing.
    #[error("Queue full and fee too low")]
    QueueFull,
    /// A domain-specific precondition was not met.
    #[error("{0}")]
    Precondition(String),
    /// A time window has passed.
    #[error("{0}")]
    Expired(String),
    /// The sender may not perform this operation.
    #[error("Not authorized: {0}")]
    NotAuthorized(String),
    /// A referenced ledger object does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The operation duplicates existing state.
    #[error("Duplicate: {0}")]
    Duplicate(String),
    /// A structural limit was exceeded.
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),
    /// An installed hook rejected or rolled back the transaction.
    #[error("Hook rejected: {0}")]
    HookRejected(String),
    /// A post-application invariant failed; the state was rolled back.
    #[error("Invariant violation: {0}")]
    Invariant(String),
    /// The transaction is structurally malformed.
    #[error("Malformed transaction: {0}")]
    Malformed(String),
    /// An amount field is out of range or of the wrong kind.
    #[error("Bad amount: {0}")]
    BadAmount(String),
    /// Canonical serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A state-layer fault surfaced during application.
    #[error("State error: {0}")]
    State(#[from] StateError),
    /// A structural fault: a lookup the caller asserted would succeed failed.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransactionError {
    /// The stable result code recorded for this failure.
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::InvalidSignature(_) => ResultCode::TecBadSignature,
            Self::AccountNotFound(_) | Self::Unfunded(_) => ResultCode::TecUnfunded,
            Self::NoLine { .. } => ResultCode::TecNoLine,
            Self::BadSequence { .. } => ResultCode::TecBadSequence,
            Self::FeeBelowMinimum { .. } => ResultCode::TerInsufFee,
            Self::QueueFull => ResultCode::TerQueueFull,
            Self::Precondition(_) => ResultCode::TecPrecondition,
            Self::Expired(_) => ResultCode::TecExpired,
            Self::NotAuthorized(_) => ResultCode::TecNoPermission,
            Self::NotFound(_) => ResultCode::TecNoEntry,
            Self::Duplicate(_) => ResultCode::TecDuplicate,
            Self::LimitExceeded(_) => ResultCode::TecLimitExceeded,
            Self::HookRejected(_) => ResultCode::TecHookRejected,
            Self::Invariant(_) => ResultCode::TecInvariantFailed,
            Self::Malformed(_) => ResultCode::TemMalformed,
            Self::BadAmount(_) => ResultCode::TemBadAmount,
            Self::Serialization(_) | Self::State(_) | Self::Internal(_) => {
                ResultCode::TefInternal
            }
        }
    }
}

impl ErrorCode for TransactionError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidSignature(_) => "TX_INVALID_SIGNATURE",
            Self::AccountNotFound(_) => "TX_ACCOUNT_NOT_FOUND",
            Self::Unfunded(_) => "TX_UNFUNDED",
            Self::NoLine { .. } => "TX_NO_TRUST_LINE",
            Self::BadSequence { .. } => "TX_BAD_SEQUENCE",
            Self::FeeBelowMinimum { .. } => "TX_FEE_BELOW_MINIMUM",
            Self::QueueFull => "TX_QUEUE_FULL",
            Self::Precondition(_) => "TX_PRECONDITION_FAILED",
            Self::Expired(_) => "TX_EXPIRED",
            Self::NotAuthorized(_) => "TX_NOT_AUTHORIZED",
            Self::NotFound(_) => "TX_NOT_FOUND",
            Self::Duplicate(_) => "TX_DUPLICATE",
            Self::LimitExceeded(_) => "TX_LIMIT_EXCEEDED",
            Self::HookRejected(_) => "TX_HOOK_REJECTED",
            Self::Invariant(_) => "TX_INVARIANT_FAILED",
            Self::Malformed(_) => "TX_MALFORMED",
            Self::BadAmount(_) => "TX_BAD_AMOUNT",
            Self::Serialization(_) => "TX_SERIALIZATION_ERROR",
            Self::State(_) => "TX_STATE_ERROR",
            Self::Internal(_) => "TX_INTERNAL_ERROR",
        }
    }
}
