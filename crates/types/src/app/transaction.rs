// Path: crates/types/src/app/transaction.rs
//! The transaction envelope and the typed payload for every ledger
//! operation.
//!
//! Dispatch over transaction kinds is a tagged enum: the apply pipeline
//! matches on [`TxPayload`] and hands each variant to its domain handler
//! with an immutable view of the envelope.

use super::{Address, Amount, Drops};
use crate::codec;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wire-stable transaction type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
#[allow(missing_docs)] // variant names are the documentation
pub enum TxType {
    Payment = 0,
    EscrowCreate = 1,
    EscrowFinish = 2,
    AccountSet = 3,
    EscrowCancel = 4,
    SetRegularKey = 5,
    OfferCreate = 7,
    OfferCancel = 8,
    TicketCreate = 10,
    SignerListSet = 12,
    PayChanCreate = 13,
    PayChanFund = 14,
    PayChanClaim = 15,
    PayChanClose = 16,
    CheckCreate = 17,
    CheckCash = 18,
    CheckCancel = 19,
    TrustSet = 20,
    AccountDelete = 21,
    SetHook = 22,
    NftokenMint = 25,
    NftokenBurn = 26,
    NftokenOfferCreate = 27,
    NftokenOfferCancel = 28,
    NftokenOfferAccept = 29,
    DepositPreauth = 30,
    XchainAccountCreateCommit = 41,
    XchainAddClaimAttestation = 43,
    XchainClaim = 44,
    XchainCommit = 45,
    XchainCreateBridge = 46,
    XchainCreateClaimId = 47,
    DidSet = 49,
    DidDelete = 50,
    OracleSet = 51,
    OracleDelete = 52,
    MptIssuanceCreate = 54,
    MptIssuanceDestroy = 55,
    MptIssuanceSet = 56,
    MptAuthorize = 57,
    CredentialCreate = 58,
    CredentialAccept = 59,
    CredentialDelete = 61,
    MptMint = 62,
    MptTransfer = 63,
    MptClawback = 64,
    Stake = 70,
    Unstake = 71,
}

/// A currency/issuer descriptor, as used by cross-chain bridges.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IssueSpec {
    /// Currency code (`"NXF"` for the native asset).
    pub currency: String,
    /// Issuing account; empty for the native asset.
    pub issuer: Address,
}

/// One oracle price point submitted with an `OracleSet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceDatum {
    /// Base asset, e.g. `"NXF"`.
    pub base_asset: String,
    /// Quote asset, e.g. `"USD"`.
    pub quote_asset: String,
    /// The raw price value.
    pub price: Decimal,
    /// Decimal scale: the effective price is `price · 10⁻ˢᶜᵃˡᵉ`.
    pub scale: u8,
}

/// The typed, per-operation body of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)] // field names mirror the data model in the module docs
pub enum TxPayload {
    Payment {
        destination: Address,
        amount: Amount,
    },
    EscrowCreate {
        destination: Address,
        amount: Drops,
        /// SHA-256 of the fulfillment, hex-encoded; empty string = none.
        condition: String,
        finish_after: u64,
        cancel_after: u64,
    },
    EscrowFinish {
        escrow_id: String,
        fulfillment: String,
    },
    EscrowCancel {
        escrow_id: String,
    },
    TrustSet {
        currency: String,
        issuer: Address,
        limit: Decimal,
    },
    SignerListSet {
        quorum: u32,
        /// `(signer, weight)` entries; empty with quorum 0 deletes the list.
        signers: Vec<(Address, u16)>,
    },
    SetRegularKey {
        /// The new regular key; an empty string removes it.
        regular_key: String,
    },
    AccountSet {
        deposit_auth: Option<bool>,
        gateway: Option<bool>,
    },
    AccountDelete {
        destination: Address,
    },
    DepositPreauth {
        authorize: Address,
        /// When true, remove the preauthorization instead of adding it.
        unauthorize: bool,
    },
    TicketCreate {
        count: u32,
    },
    OfferCreate {
        taker_pays: Amount,
        taker_gets: Amount,
    },
    OfferCancel {
        offer_sequence: u32,
    },
    PayChanCreate {
        destination: Address,
        amount: Drops,
        settle_delay: u64,
        public_key: String,
        cancel_after: u64,
    },
    PayChanFund {
        channel_id: String,
        amount: Drops,
    },
    PayChanClaim {
        channel_id: String,
        balance: Drops,
    },
    PayChanClose {
        channel_id: String,
    },
    CheckCreate {
        destination: Address,
        send_max: Amount,
        expiration: u64,
    },
    CheckCash {
        check_id: String,
        amount: Option<Amount>,
        deliver_min: Option<Amount>,
    },
    CheckCancel {
        check_id: String,
    },
    NftokenMint {
        uri: String,
        /// Transfer fee in 1/100 000 units, 0..=50 000.
        transfer_fee: u16,
        taxon: u32,
        transferable: bool,
        burnable: bool,
    },
    NftokenBurn {
        nftoken_id: String,
    },
    NftokenOfferCreate {
        nftoken_id: String,
        amount: Drops,
        destination: Option<Address>,
        is_sell: bool,
        expiration: u64,
    },
    NftokenOfferCancel {
        offer_id: String,
    },
    NftokenOfferAccept {
        offer_id: String,
    },
    MptIssuanceCreate {
        /// Maximum supply; zero means unlimited.
        max_supply: Decimal,
        /// Transfer fee in basis points, 0..=5 000.
        transfer_fee: u16,
        metadata: String,
        flags: u32,
    },
    MptIssuanceDestroy {
        issuance_id: String,
    },
    MptIssuanceSet {
        issuance_id: String,
        lock: Option<bool>,
    },
    MptAuthorize {
        issuance_id: String,
        /// Present when the issuer authorizes a holder; absent for self opt-in.
        holder: Option<Address>,
    },
    MptMint {
        issuance_id: String,
        holder: Address,
        amount: Decimal,
    },
    MptTransfer {
        issuance_id: String,
        destination: Address,
        amount: Decimal,
    },
    MptClawback {
        issuance_id: String,
        holder: Address,
        amount: Decimal,
    },
    DidSet {
        uri: String,
        /// Hex-encoded payload, at most 512 hex characters.
        data: String,
        attestations: Vec<String>,
    },
    DidDelete,
    CredentialCreate {
        subject: Address,
        credential_type: String,
        uri: String,
        expiration: u64,
    },
    CredentialAccept {
        credential_id: String,
    },
    CredentialDelete {
        credential_id: String,
    },
    OracleSet {
        /// Owner-scoped document id; absent allocates the next one.
        document_id: Option<u32>,
        provider: String,
        asset_class: String,
        uri: String,
        prices: Vec<PriceDatum>,
    },
    OracleDelete {
        document_id: u32,
    },
    XchainCreateBridge {
        locking_chain_door: Address,
        issuing_chain_door: Address,
        locking_chain_issue: IssueSpec,
        issuing_chain_issue: IssueSpec,
        min_account_create_amount: Drops,
        signal_reward: Drops,
    },
    XchainCreateClaimId {
        bridge_id: String,
        destination: Option<Address>,
    },
    XchainCommit {
        bridge_id: String,
        claim_id: u64,
        amount: Drops,
        destination: Option<Address>,
    },
    XchainAddClaimAttestation {
        bridge_id: String,
        claim_id: u64,
        witness: Address,
        signature: String,
    },
    XchainClaim {
        bridge_id: String,
        claim_id: u64,
        destination: Address,
    },
    XchainAccountCreateCommit {
        bridge_id: String,
        destination: Address,
        amount: Drops,
    },
    SetHook {
        /// Hook slot, 0..=3.
        position: u8,
        /// Definition to install; `None` deletes the slot.
        hook_hash: Option<String>,
        parameters: BTreeMap<String, String>,
    },
    Stake {
        amount: Drops,
    },
    Unstake {
        amount: Drops,
    },
}

impl TxPayload {
    /// The wire-stable type tag of this payload.
    pub fn tx_type(&self) -> TxType {
        match self {
            TxPayload::Payment { .. } => TxType::Payment,
            TxPayload::EscrowCreate { .. } => TxType::EscrowCreate,
            TxPayload::EscrowFinish { .. } => TxType::EscrowFinish,
            TxPayload::EscrowCancel { .. } => TxType::EscrowCancel,
            TxPayload::TrustSet { .. } => TxType::TrustSet,
            TxPayload::SignerListSet { .. } => TxType::SignerListSet,
            TxPayload::SetRegularKey { .. } => TxType::SetRegularKey,
            TxPayload::AccountSet { .. } => TxType::AccountSet,
            TxPayload::AccountDelete { .. } => TxType::AccountDelete,
            TxPayload::DepositPreauth { .. } => TxType::DepositPreauth,
            TxPayload::TicketCreate { .. } => TxType::TicketCreate,
            TxPayload::OfferCreate { .. } => TxType::OfferCreate,
            TxPayload::OfferCancel { .. } => TxType::OfferCancel,
            TxPayload::PayChanCreate { .. } => TxType::PayChanCreate,
            TxPayload::PayChanFund { .. } => TxType::PayChanFund,
            TxPayload::PayChanClaim { .. } => TxType::PayChanClaim,
            TxPayload::PayChanClose { .. } => TxType::PayChanClose,
            TxPayload::CheckCreate { .. } => TxType::CheckCreate,
            TxPayload::CheckCash { .. } => TxType::CheckCash,
            TxPayload::CheckCancel { .. } => TxType::CheckCancel,
            TxPayload::NftokenMint { .. } => TxType::NftokenMint,
            TxPayload::NftokenBurn { .. } => TxType::NftokenBurn,
            TxPayload::NftokenOfferCreate { .. } => TxType::NftokenOfferCreate,
            TxPayload::NftokenOfferCancel { .. } => TxType::NftokenOfferCancel,
            TxPayload::NftokenOfferAccept { .. } => TxType::NftokenOfferAccept,
            TxPayload::MptIssuanceCreate { .. } => TxType::MptIssuanceCreate,
            TxPayload::MptIssuanceDestroy { .. } => TxType::MptIssuanceDestroy,
            TxPayload::MptIssuanceSet { .. } => TxType::MptIssuanceSet,
            TxPayload::MptAuthorize { .. } => TxType::MptAuthorize,
            TxPayload::MptMint { .. } => TxType::MptMint,
            TxPayload::MptTransfer { .. } => TxType::MptTransfer,
            TxPayload::MptClawback { .. } => TxType::MptClawback,
            TxPayload::DidSet { .. } => TxType::DidSet,
            TxPayload::DidDelete => TxType::DidDelete,
            TxPayload::CredentialCreate { .. } => TxType::CredentialCreate,
            TxPayload::CredentialAccept { .. } => TxType::CredentialAccept,
            TxPayload::CredentialDelete { .. } => TxType::CredentialDelete,
            TxPayload::OracleSet { .. } => TxType::OracleSet,
            TxPayload::OracleDelete { .. } => TxType::OracleDelete,
            TxPayload::XchainCreateBridge { .. } => TxType::XchainCreateBridge,
            TxPayload::XchainCreateClaimId { .. } => TxType::XchainCreateClaimId,
            TxPayload::XchainCommit { .. } => TxType::XchainCommit,
            TxPayload::XchainAddClaimAttestation { .. } => TxType::XchainAddClaimAttestation,
            TxPayload::XchainClaim { .. } => TxType::XchainClaim,
            TxPayload::XchainAccountCreateCommit { .. } => TxType::XchainAccountCreateCommit,
            TxPayload::SetHook { .. } => TxType::SetHook,
            TxPayload::Stake { .. } => TxType::Stake,
            TxPayload::Unstake { .. } => TxType::Unstake,
        }
    }
}

/// A signed (or unsigned) transaction submitted to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// The submitter-assigned transaction id (hash of the signed blob in a
    /// full deployment; any unique string here).
    pub id: String,
    /// The sending account.
    pub account: Address,
    /// Fee offered, in drops.
    pub fee: Drops,
    /// The account sequence this transaction consumes; zero skips the
    /// sequence check (e.g. when a ticket is used instead).
    pub sequence: u32,
    /// Ticket consumed in place of a sequence number, if any.
    pub ticket_id: Option<String>,
    /// Ed25519 public key of the signer, when signed.
    pub signing_pub_key: Option<Vec<u8>>,
    /// Ed25519 signature over [`Transaction::to_sign_bytes`], when signed.
    pub signature: Option<Vec<u8>>,
    /// The typed operation body.
    pub payload: TxPayload,
}

impl Transaction {
    /// An unsigned transaction with the given envelope fields.
    pub fn new(
        id: impl Into<String>,
        account: impl Into<Address>,
        fee: Drops,
        sequence: u32,
        payload: TxPayload,
    ) -> Self {
        Self {
            id: id.into(),
            account: account.into(),
            fee,
            sequence,
            ticket_id: None,
            signing_pub_key: None,
            signature: None,
            payload,
        }
    }

    /// The wire-stable type tag.
    pub fn tx_type(&self) -> TxType {
        self.payload.tx_type()
    }

    /// The canonical bytes a signature covers: the envelope with both
    /// signature fields cleared, encoded with the canonical codec.
    pub fn to_sign_bytes(&self) -> std::result::Result<Vec<u8>, String> {
        let mut unsigned = self.clone();
        unsigned.signing_pub_key = None;
        unsigned.signature = None;
        codec::to_bytes_canonical(&unsigned)
    }

    /// The canonical ordering key used inside a closed ledger so that every
    /// node applies the same transaction set in the same order.
    pub fn canonical_key(&self) -> (u16, Address, u32, String) {
        (
            self.tx_type() as u16,
            self.account.clone(),
            self.sequence,
            self.id.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(id: &str, account: &str, seq: u32) -> Transaction {
        Transaction::new(
            id,
            account,
            10,
            seq,
            TxPayload::Payment {
                destination: "bob".into(),
                amount: Amount::Drops(50_000_000),
            },
        )
    }

    #[test]
    fn sign_bytes_exclude_signature() {
        let mut tx = payment("t1", "alice", 1);
        let unsigned = tx.to_sign_bytes().unwrap();
        tx.signature = Some(vec![1, 2, 3]);
        tx.signing_pub_key = Some(vec![9; 32]);
        assert_eq!(tx.to_sign_bytes().unwrap(), unsigned);
    }

    #[test]
    fn canonical_key_orders_by_type_then_account() {
        let a = payment("t1", "alice", 1);
        let b = Transaction::new(
            "t2",
            "alice",
            10,
            2,
            TxPayload::TrustSet {
                currency: "USD".into(),
                issuer: "gw".into(),
                limit: Decimal::ONE_HUNDRED,
            },
        );
        assert!(a.canonical_key() < b.canonical_key());
    }

    #[test]
    fn payload_type_tags_are_stable() {
        assert_eq!(TxType::Payment as u16, 0);
        assert_eq!(TxType::TrustSet as u16, 20);
        assert_eq!(TxType::Stake as u16, 70);
    }
}
