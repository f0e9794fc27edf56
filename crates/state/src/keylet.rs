// Path: crates/state/src/keylet.rs
//! Deterministic keylets: the 32-byte addresses of ledger objects.
//!
//! Each ledger object type has a 256-bit key computed from a type-specific
//! space byte and the object's identifying fields:
//!
//! ```text
//! keylet = SHA-512-Half(SPACE_BYTE || field1 || field2 || ...)
//! ```
//!
//! Integer fields serialize big-endian (8 bytes for 64-bit values, 4 for
//! 32-bit), strings as raw UTF-8 bytes. Space bytes are disjoint across
//! object kinds, so addresses never collide across categories even when
//! the identifying fields happen to match.

use nexaflow_crypto::{sha512_half, Hash256};

/// Keylet space bytes, one per ledger object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum LedgerSpace {
    Account = 0x61,      // 'a'
    TrustLine = 0x72,    // 'r'
    Offer = 0x6F,        // 'o'
    Escrow = 0x75,       // 'u'
    Check = 0x43,        // 'C'
    PayChannel = 0x78,   // 'x'
    Nftoken = 0x4E,      // 'N'
    NftokenOffer = 0x51, // 'Q'
    Ticket = 0x54,       // 'T'
    SignerList = 0x53,   // 'S'
    Amm = 0x41,          // 'A'
    Oracle = 0x52,       // 'R'
    Did = 0x44,          // 'D'
    Mpt = 0x7E,          // '~'
    Credential = 0x64,   // 'd'
    Bridge = 0x42,       // 'B'
    Hook = 0x48,         // 'H'
    Amendment = 0x66,    // 'f'
    Fee = 0x65,          // 'e'
    NegativeUnl = 0x4C,  // 'L'
}

/// Compute a 32-byte keylet from a space byte and component fields.
pub fn compute_keylet(space: LedgerSpace, parts: &[&[u8]]) -> Hash256 {
    let mut buf = Vec::with_capacity(1 + parts.iter().map(|p| p.len()).sum::<usize>());
    buf.push(space as u8);
    for part in parts {
        buf.extend_from_slice(part);
    }
    sha512_half(&buf)
}

/// Keylet of an account root.
pub fn account_keylet(address: &str) -> Hash256 {
    compute_keylet(LedgerSpace::Account, &[address.as_bytes()])
}

/// Keylet of a trust line, keyed by holder, currency and issuer.
pub fn trust_line_keylet(holder: &str, currency: &str, issuer: &str) -> Hash256 {
    compute_keylet(
        LedgerSpace::TrustLine,
        &[holder.as_bytes(), currency.as_bytes(), issuer.as_bytes()],
    )
}

/// Keylet of a DEX offer, keyed by account and creating sequence.
pub fn offer_keylet(account: &str, sequence: u64) -> Hash256 {
    compute_keylet(
        LedgerSpace::Offer,
        &[account.as_bytes(), &sequence.to_be_bytes()],
    )
}

/// Keylet of an escrow.
pub fn escrow_keylet(account: &str, escrow_id: &str) -> Hash256 {
    compute_keylet(
        LedgerSpace::Escrow,
        &[account.as_bytes(), escrow_id.as_bytes()],
    )
}

/// Keylet of a check.
pub fn check_keylet(check_id: &str) -> Hash256 {
    compute_keylet(LedgerSpace::Check, &[check_id.as_bytes()])
}

/// Keylet of a payment channel.
pub fn pay_channel_keylet(channel_id: &str) -> Hash256 {
    compute_keylet(LedgerSpace::PayChannel, &[channel_id.as_bytes()])
}

/// Keylet of an NFToken.
pub fn nftoken_keylet(nftoken_id: &str) -> Hash256 {
    compute_keylet(LedgerSpace::Nftoken, &[nftoken_id.as_bytes()])
}

/// Keylet of an NFToken buy/sell offer.
pub fn nftoken_offer_keylet(offer_id: &str) -> Hash256 {
    compute_keylet(LedgerSpace::NftokenOffer, &[offer_id.as_bytes()])
}

/// Keylet of a sequence-reservation ticket.
pub fn ticket_keylet(account: &str, ticket_sequence: u64) -> Hash256 {
    compute_keylet(
        LedgerSpace::Ticket,
        &[account.as_bytes(), &ticket_sequence.to_be_bytes()],
    )
}

/// Keylet of an account's signer list.
pub fn signer_list_keylet(account: &str) -> Hash256 {
    compute_keylet(LedgerSpace::SignerList, &[account.as_bytes()])
}

/// Keylet of a price oracle, keyed by owner and document id.
pub fn oracle_keylet(owner: &str, document_id: u64) -> Hash256 {
    compute_keylet(
        LedgerSpace::Oracle,
        &[owner.as_bytes(), &document_id.to_be_bytes()],
    )
}

/// Keylet of an account's DID document.
pub fn did_keylet(account: &str) -> Hash256 {
    compute_keylet(LedgerSpace::Did, &[account.as_bytes()])
}

/// Keylet of an MPT issuance.
pub fn mpt_keylet(issuance_id: &str) -> Hash256 {
    compute_keylet(LedgerSpace::Mpt, &[issuance_id.as_bytes()])
}

/// Keylet of an on-ledger credential.
pub fn credential_keylet(credential_id: &str) -> Hash256 {
    compute_keylet(LedgerSpace::Credential, &[credential_id.as_bytes()])
}

/// Keylet of a cross-chain bridge definition.
pub fn bridge_keylet(bridge_id: &str) -> Hash256 {
    compute_keylet(LedgerSpace::Bridge, &[bridge_id.as_bytes()])
}

/// Keylet of a hook installed on an account, keyed by slot position.
pub fn hook_keylet(account: &str, position: u32) -> Hash256 {
    compute_keylet(
        LedgerSpace::Hook,
        &[account.as_bytes(), &position.to_be_bytes()],
    )
}

/// Keylet of an amendment record.
pub fn amendment_keylet(amendment_id: &str) -> Hash256 {
    compute_keylet(LedgerSpace::Amendment, &[amendment_id.as_bytes()])
}

/// Keylet of the singleton fee-settings object.
pub fn fee_keylet() -> Hash256 {
    compute_keylet(LedgerSpace::Fee, &[])
}

/// Keylet of a negative-UNL entry.
pub fn negative_unl_keylet(validator_id: &str) -> Hash256 {
    compute_keylet(LedgerSpace::NegativeUnl, &[validator_id.as_bytes()])
}
