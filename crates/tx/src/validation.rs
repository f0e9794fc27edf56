// Path: crates/tx/src/validation.rs

//! Stateless transaction validation.
//!
//! Checks a transaction against a read-only ledger snapshot before any
//! domain handler runs: signature, account existence, fee floor, sequence,
//! balance coverage including the post-transaction reserve, trust-line
//! existence for IOU payments, and per-kind structural preconditions.
//! Nothing here mutates state.

use crate::fees::FeeModel;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use nexaflow_types::app::{
    AccountRoot, Amount, Drops, ResultCode, Transaction, TxPayload,
};
use nexaflow_types::error::TransactionError;

/// Read-only access to the ledger state the validator needs.
pub trait LedgerReader {
    /// The account root for an address, if the account exists.
    fn account(&self, address: &str) -> Option<&AccountRoot>;
    /// The minimum stake in drops.
    fn min_stake(&self) -> Drops;
}

/// The stateless validator.
///
/// Borrowing a snapshot and the fee model, `validate` returns `Ok(())` or
/// the typed failure; `validate_outcome` is the `(valid, code, message)`
/// form recorded in submission responses.
pub struct TransactionValidator<'a, L: LedgerReader> {
    ledger: &'a L,
    fees: &'a FeeModel,
}

impl<'a, L: LedgerReader> TransactionValidator<'a, L> {
    /// A validator over the given snapshot and fee model.
    pub fn new(ledger: &'a L, fees: &'a FeeModel) -> Self {
        Self { ledger, fees }
    }

    /// Run the full validation pipeline.
    pub fn validate(&self, tx: &Transaction) -> Result<(), TransactionError> {
        self.check_signature(tx)?;

        let account = self
            .ledger
            .account(&tx.account)
            .ok_or_else(|| TransactionError::AccountNotFound(tx.account.clone()))?;

        self.fees.validate_fee(tx.fee)?;

        if tx.sequence != 0 && tx.sequence != account.sequence {
            return Err(TransactionError::BadSequence {
                expected: account.sequence,
                got: tx.sequence,
            });
        }

        self.check_funding(tx, account)?;
        self.check_payload(tx, account)
    }

    /// The `(valid, result_code, message)` form of [`Self::validate`].
    pub fn validate_outcome(&self, tx: &Transaction) -> (bool, ResultCode, String) {
        match self.validate(tx) {
            Ok(()) => (true, ResultCode::TesSuccess, "Valid".to_owned()),
            Err(err) => (false, err.result_code(), err.to_string()),
        }
    }

    fn check_signature(&self, tx: &Transaction) -> Result<(), TransactionError> {
        let (Some(pub_key), Some(signature)) = (&tx.signing_pub_key, &tx.signature) else {
            return Ok(()); // unsigned submissions are allowed at this layer
        };
        let key_bytes: [u8; 32] = pub_key
            .as_slice()
            .try_into()
            .map_err(|_| TransactionError::InvalidSignature("Bad public key length".into()))?;
        let verifying_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| TransactionError::InvalidSignature(e.to_string()))?;
        let signature = Signature::from_slice(signature)
            .map_err(|e| TransactionError::InvalidSignature(e.to_string()))?;
        let sign_bytes = tx
            .to_sign_bytes()
            .map_err(TransactionError::Serialization)?;
        verifying_key
            .verify(&sign_bytes, &signature)
            .map_err(|_| TransactionError::InvalidSignature("Signature mismatch".into()))
    }

    fn check_funding(
        &self,
        tx: &Transaction,
        account: &AccountRoot,
    ) -> Result<(), TransactionError> {
        let reserve = self.fees.account_reserve(account.owner_count);
        match &tx.payload {
            TxPayload::Payment {
                amount: Amount::Drops(drops),
                ..
            } => {
                let needed = drops
                    .checked_add(tx.fee)
                    .and_then(|n| n.checked_add(reserve))
                    .ok_or_else(|| TransactionError::BadAmount("Amount overflow".into()))?;
                if account.balance < needed {
                    return Err(TransactionError::Unfunded(format!(
                        "Insufficient balance: have {}, need {} + reserve {}",
                        account.balance,
                        drops + tx.fee,
                        reserve
                    )));
                }
            }
            TxPayload::Payment {
                amount:
                    Amount::Issued {
                        currency, issuer, ..
                    },
                ..
            } => {
                if account.balance < tx.fee {
                    return Err(TransactionError::Unfunded("Cannot cover fee".into()));
                }
                if account.trust_line(currency, issuer).is_none() && tx.account != *issuer {
                    return Err(TransactionError::NoLine {
                        currency: currency.clone(),
                        issuer: issuer.clone(),
                    });
                }
            }
            TxPayload::EscrowCreate { amount, .. }
            | TxPayload::PayChanCreate { amount, .. }
            | TxPayload::Stake { amount } => {
                let needed = amount
                    .checked_add(tx.fee)
                    .and_then(|n| n.checked_add(reserve))
                    .ok_or_else(|| TransactionError::BadAmount("Amount overflow".into()))?;
                if account.balance < needed {
                    return Err(TransactionError::Unfunded(format!(
                        "Insufficient balance: have {}, need {} + reserve {}",
                        account.balance,
                        amount + tx.fee,
                        reserve
                    )));
                }
            }
            _ => {
                if account.balance < tx.fee {
                    return Err(TransactionError::Unfunded("Cannot cover fee".into()));
                }
            }
        }
        Ok(())
    }

    fn check_payload(
        &self,
        tx: &Transaction,
        _account: &AccountRoot,
    ) -> Result<(), TransactionError> {
        match &tx.payload {
            TxPayload::Payment {
                destination,
                amount,
            } => {
                if destination.is_empty() {
                    return Err(TransactionError::Malformed("Destination required".into()));
                }
                if *destination == tx.account {
                    return Err(TransactionError::Malformed(
                        "Cannot pay yourself".into(),
                    ));
                }
                if amount.is_zero() {
                    return Err(TransactionError::BadAmount(
                        "Payment amount must be positive".into(),
                    ));
                }
            }
            TxPayload::EscrowCreate {
                destination,
                amount,
                finish_after,
                cancel_after,
                ..
            } => {
                if destination.is_empty() {
                    return Err(TransactionError::Malformed("Destination required".into()));
                }
                if *amount == 0 {
                    return Err(TransactionError::BadAmount(
                        "Escrow amount must be positive".into(),
                    ));
                }
                if *cancel_after > 0 && *finish_after > 0 && finish_after >= cancel_after {
                    return Err(TransactionError::Malformed(
                        "finish_after must be before cancel_after".into(),
                    ));
                }
            }
            TxPayload::PayChanCreate {
                destination,
                amount,
                ..
            } => {
                if destination.is_empty() || *destination == tx.account {
                    return Err(TransactionError::Malformed(
                        "Channel requires a distinct destination".into(),
                    ));
                }
                if *amount == 0 {
                    return Err(TransactionError::BadAmount(
                        "Channel amount must be positive".into(),
                    ));
                }
            }
            TxPayload::CheckCreate {
                destination,
                send_max,
                ..
            } => {
                if destination.is_empty() {
                    return Err(TransactionError::Malformed("Destination required".into()));
                }
                if send_max.is_zero() {
                    return Err(TransactionError::BadAmount(
                        "send_max must be positive".into(),
                    ));
                }
            }
            TxPayload::TicketCreate { count } => {
                if *count == 0 || *count > 250 {
                    return Err(TransactionError::Malformed(
                        "Ticket count must be 1-250".into(),
                    ));
                }
            }
            TxPayload::Stake { amount } => {
                if *amount < self.ledger.min_stake() {
                    return Err(TransactionError::Unfunded(format!(
                        "Stake {} below minimum {}",
                        amount,
                        self.ledger.min_stake()
                    )));
                }
            }
            TxPayload::NftokenMint { transfer_fee, .. } => {
                if *transfer_fee > 50_000 {
                    return Err(TransactionError::Malformed(
                        "transfer_fee must be 0-50000".into(),
                    ));
                }
            }
            TxPayload::MptIssuanceCreate { transfer_fee, .. } => {
                if *transfer_fee > 5_000 {
                    return Err(TransactionError::Malformed(
                        "Transfer fee must be 0-5000".into(),
                    ));
                }
            }
            TxPayload::CredentialCreate {
                subject,
                credential_type,
                uri,
                ..
            } => {
                if *subject == tx.account {
                    return Err(TransactionError::Malformed(
                        "Issuer and subject must differ".into(),
                    ));
                }
                if credential_type.is_empty() || credential_type.len() > 64 {
                    return Err(TransactionError::Malformed(
                        "Credential type required, max 64 chars".into(),
                    ));
                }
                if uri.len() > 256 {
                    return Err(TransactionError::Malformed("URI max 256 chars".into()));
                }
            }
            TxPayload::DidSet {
                uri,
                data,
                attestations,
            } => {
                if uri.len() > 256 || data.len() > 512 || attestations.len() > 10 {
                    return Err(TransactionError::Malformed(
                        "DID document exceeds size bounds".into(),
                    ));
                }
            }
            TxPayload::AccountDelete { destination } => {
                if *destination == tx.account {
                    return Err(TransactionError::Malformed(
                        "Cannot delete into self".into(),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use nexaflow_types::config::LedgerParams;
    use std::collections::BTreeMap;

    struct TestLedger {
        accounts: BTreeMap<String, AccountRoot>,
    }

    impl LedgerReader for TestLedger {
        fn account(&self, address: &str) -> Option<&AccountRoot> {
            self.accounts.get(address)
        }
        fn min_stake(&self) -> Drops {
            10_000_000
        }
    }

    fn ledger_with_alice(balance: Drops) -> TestLedger {
        let mut accounts = BTreeMap::new();
        accounts.insert("alice".to_owned(), AccountRoot::new("alice", balance));
        TestLedger { accounts }
    }

    fn payment(fee: Drops, sequence: u32, drops: Drops) -> Transaction {
        Transaction::new(
            "t1",
            "alice",
            fee,
            sequence,
            TxPayload::Payment {
                destination: "bob".into(),
                amount: Amount::Drops(drops),
            },
        )
    }

    #[test]
    fn accepts_funded_payment() {
        let ledger = ledger_with_alice(500_000_000);
        let fees = FeeModel::new(&LedgerParams::default());
        let validator = TransactionValidator::new(&ledger, &fees);
        assert!(validator.validate(&payment(10, 1, 50_000_000)).is_ok());
    }

    #[test]
    fn missing_account_rejected() {
        let ledger = TestLedger {
            accounts: BTreeMap::new(),
        };
        let fees = FeeModel::new(&LedgerParams::default());
        let validator = TransactionValidator::new(&ledger, &fees);
        let (valid, code, _) = validator.validate_outcome(&payment(10, 1, 1));
        assert!(!valid);
        assert_eq!(code, ResultCode::TecUnfunded);
    }

    #[test]
    fn fee_floor_is_exact() {
        let ledger = ledger_with_alice(500_000_000);
        let fees = FeeModel::new(&LedgerParams::default());
        let validator = TransactionValidator::new(&ledger, &fees);
        // One drop below the minimum rejected; exactly equal accepted.
        assert!(matches!(
            validator.validate(&payment(9, 1, 1)).unwrap_err(),
            TransactionError::FeeBelowMinimum { .. }
        ));
        assert!(validator.validate(&payment(10, 1, 1)).is_ok());
    }

    #[test]
    fn sequence_must_match_or_be_zero() {
        let ledger = ledger_with_alice(500_000_000);
        let fees = FeeModel::new(&LedgerParams::default());
        let validator = TransactionValidator::new(&ledger, &fees);
        assert!(matches!(
            validator.validate(&payment(10, 7, 1)).unwrap_err(),
            TransactionError::BadSequence {
                expected: 1,
                got: 7
            }
        ));
        assert!(validator.validate(&payment(10, 0, 1)).is_ok());
    }

    #[test]
    fn payment_must_leave_reserve() {
        // Balance 11 NXF, reserve 10 NXF: can spend at most ~1 NXF.
        let ledger = ledger_with_alice(11_000_000);
        let fees = FeeModel::new(&LedgerParams::default());
        let validator = TransactionValidator::new(&ledger, &fees);
        assert!(validator.validate(&payment(10, 1, 999_990)).is_ok());
        assert!(matches!(
            validator.validate(&payment(10, 1, 1_000_000)).unwrap_err(),
            TransactionError::Unfunded(_)
        ));
    }

    #[test]
    fn iou_payment_requires_trust_line_unless_issuer() {
        let mut ledger = ledger_with_alice(500_000_000);
        let fees = FeeModel::new(&LedgerParams::default());
        let iou = |issuer: &str| {
            Transaction::new(
                "t1",
                "alice",
                10,
                1,
                TxPayload::Payment {
                    destination: "bob".into(),
                    amount: Amount::Issued {
                        currency: "USD".into(),
                        issuer: issuer.into(),
                        value: rust_decimal::Decimal::ONE,
                    },
                },
            )
        };
        {
            let validator = TransactionValidator::new(&ledger, &fees);
            assert!(matches!(
                validator.validate(&iou("gateway")).unwrap_err(),
                TransactionError::NoLine { .. }
            ));
            // The issuer itself needs no line.
            assert!(validator.validate(&iou("alice")).is_ok());
        }
        // With a line in place the payment validates.
        ledger
            .accounts
            .get_mut("alice")
            .unwrap()
            .trust_lines
            .insert(
                ("USD".into(), "gateway".into()),
                nexaflow_types::app::TrustLine::new("USD", "gateway", rust_decimal::Decimal::ONE_HUNDRED),
            );
        let validator = TransactionValidator::new(&ledger, &fees);
        assert!(validator.validate(&iou("gateway")).is_ok());
    }

    #[test]
    fn stake_minimum_boundary() {
        let ledger = ledger_with_alice(500_000_000);
        let fees = FeeModel::new(&LedgerParams::default());
        let validator = TransactionValidator::new(&ledger, &fees);
        let stake = |amount| {
            Transaction::new("t1", "alice", 10, 1, TxPayload::Stake { amount })
        };
        assert!(matches!(
            validator.validate(&stake(9_999_999)).unwrap_err(),
            TransactionError::Unfunded(_)
        ));
        assert!(validator.validate(&stake(10_000_000)).is_ok());
    }

    #[test]
    fn escrow_timing_coherence() {
        let ledger = ledger_with_alice(500_000_000);
        let fees = FeeModel::new(&LedgerParams::default());
        let validator = TransactionValidator::new(&ledger, &fees);
        let tx = Transaction::new(
            "t1",
            "alice",
            10,
            1,
            TxPayload::EscrowCreate {
                destination: "bob".into(),
                amount: 100,
                condition: String::new(),
                finish_after: 2000,
                cancel_after: 1000,
            },
        );
        assert!(matches!(
            validator.validate(&tx).unwrap_err(),
            TransactionError::Malformed(_)
        ));
    }

    #[test]
    fn ed25519_signature_verified_when_present() {
        let ledger = ledger_with_alice(500_000_000);
        let fees = FeeModel::new(&LedgerParams::default());
        let validator = TransactionValidator::new(&ledger, &fees);

        let key = SigningKey::from_bytes(&[7u8; 32]);
        let mut tx = payment(10, 1, 1_000);
        let sig = key.sign(&tx.to_sign_bytes().unwrap());
        tx.signing_pub_key = Some(key.verifying_key().to_bytes().to_vec());
        tx.signature = Some(sig.to_bytes().to_vec());
        assert!(validator.validate(&tx).is_ok());

        // Tampering with the envelope invalidates the signature.
        tx.fee = 11;
        assert!(matches!(
            validator.validate(&tx).unwrap_err(),
            TransactionError::InvalidSignature(_)
        ));
    }
}
