// Path: crates/types/src/app/result.rs
//! Stable transaction result codes.
//!
//! Codes are wire-stable integers grouped into the classic five classes:
//! `tes` (success), `tec` (claimed-fee failure), `tem` (malformed),
//! `ter` (retryable) and `tef` (fatal). Only the integer code is part of the
//! deterministic record; human-readable messages are advisory.

use serde::{Deserialize, Serialize};

/// The class of a result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultClass {
    /// `tes*`: the transaction succeeded and its effects are committed.
    Success,
    /// `tec*`: the transaction failed but the fee was claimed and the
    /// failure is recorded in metadata.
    ClaimedFee,
    /// `tem*`: the transaction was malformed; no fee is charged.
    Malformed,
    /// `ter*`: a local, retryable rejection; no fee is charged.
    Retry,
    /// `tef*`: a fatal, non-retryable failure.
    Fatal,
}

/// A stable integer result code for an applied or rejected transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ResultCode {
    /// The transaction was applied successfully.
    TesSuccess = 0,

    /// Insufficient spendable balance for the operation (fee claimed).
    TecUnfunded = 103,
    /// No trust line exists for the referenced issued currency.
    TecNoLine = 104,
    /// The transaction sequence did not match the account's next sequence.
    TecBadSequence = 105,
    /// The supplied signature did not verify.
    TecBadSignature = 106,
    /// A referenced ledger object does not exist.
    TecNoEntry = 107,
    /// The sender is not permitted to perform the operation.
    TecNoPermission = 108,
    /// A domain-specific precondition was not met.
    TecPrecondition = 109,
    /// An installed hook rejected or rolled back the transaction.
    TecHookRejected = 110,
    /// A post-application invariant failed; the state change was rolled back.
    TecInvariantFailed = 111,
    /// The referenced object or offer has expired.
    TecExpired = 112,
    /// The operation duplicates existing state (e.g. a second attestation).
    TecDuplicate = 113,
    /// A structural limit was exceeded (slots, entries, supply).
    TecLimitExceeded = 114,

    /// The transaction is structurally malformed.
    TemMalformed = -299,
    /// An amount field is out of range or of the wrong kind.
    TemBadAmount = -298,

    /// The fee is below the current minimum; resubmit with a higher fee.
    TerInsufFee = -96,
    /// The queue is full and the fee does not displace any queued entry.
    TerQueueFull = -95,

    /// An internal, structural fault. Indicates a programmer error.
    TefInternal = -199,
}

impl ResultCode {
    /// The class this code belongs to.
    pub fn class(&self) -> ResultClass {
        match *self as i32 {
            0 => ResultClass::Success,
            100..=199 => ResultClass::ClaimedFee,
            -299..=-200 => ResultClass::Malformed,
            -99..=-1 => ResultClass::Retry,
            _ => ResultClass::Fatal,
        }
    }

    /// The canonical name, e.g. `"tesSUCCESS"` or `"tecUNFUNDED"`.
    pub fn name(&self) -> &'static str {
        match self {
            ResultCode::TesSuccess => "tesSUCCESS",
            ResultCode::TecUnfunded => "tecUNFUNDED",
            ResultCode::TecNoLine => "tecNO_LINE",
            ResultCode::TecBadSequence => "tecBAD_SEQUENCE",
            ResultCode::TecBadSignature => "tecBAD_SIGNATURE",
            ResultCode::TecNoEntry => "tecNO_ENTRY",
            ResultCode::TecNoPermission => "tecNO_PERMISSION",
            ResultCode::TecPrecondition => "tecPRECONDITION",
            ResultCode::TecHookRejected => "tecHOOK_REJECTED",
            ResultCode::TecInvariantFailed => "tecINVARIANT_FAILED",
            ResultCode::TecExpired => "tecEXPIRED",
            ResultCode::TecDuplicate => "tecDUPLICATE",
            ResultCode::TecLimitExceeded => "tecLIMIT_EXCEEDED",
            ResultCode::TemMalformed => "temMALFORMED",
            ResultCode::TemBadAmount => "temBAD_AMOUNT",
            ResultCode::TerInsufFee => "terINSUF_FEE",
            ResultCode::TerQueueFull => "terQUEUE_FULL",
            ResultCode::TefInternal => "tefINTERNAL",
        }
    }

    /// Whether the fee is claimed for this outcome.
    pub fn claims_fee(&self) -> bool {
        matches!(self.class(), ResultClass::Success | ResultClass::ClaimedFee)
    }
}
