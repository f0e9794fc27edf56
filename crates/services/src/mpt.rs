// Path: crates/services/src/mpt.rs

//! Multi-purpose tokens: fungible issuances independent of trust lines.
//!
//! Balances live on the holder entries; the issuance tracks global supply,
//! the flag bitfield and the lock state. Transfer fees route to the
//! issuer's own holder entry.

use nexaflow_crypto::sha256;
use nexaflow_types::app::Address;
use nexaflow_types::error::TransactionError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Issuance may be locked and unlocked by the issuer.
pub const MPT_CAN_LOCK: u32 = 0x0001;
/// Holders must be explicitly authorized by the issuer.
pub const MPT_REQUIRE_AUTH: u32 = 0x0002;
/// Balances may be placed in escrow.
pub const MPT_CAN_ESCROW: u32 = 0x0004;
/// Balances may be traded on the DEX.
pub const MPT_CAN_TRADE: u32 = 0x0008;
/// Balances may be transferred between non-issuer holders.
pub const MPT_CAN_TRANSFER: u32 = 0x0010;
/// The issuer may claw back balances.
pub const MPT_CAN_CLAWBACK: u32 = 0x0020;

/// Holder flag: authorized to hold.
pub const MPT_AUTHORIZED: u32 = 0x0001;
/// Holder flag: frozen by the issuer.
pub const MPT_FROZEN: u32 = 0x0002;

/// Maximum metadata length in characters.
pub const MAX_METADATA_LENGTH: usize = 1024;
/// Maximum transfer fee in basis points (50%).
pub const MAX_TRANSFER_FEE_BPS: u16 = 5000;

/// A multi-purpose token issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MptIssuance {
    /// Unique issuance id.
    pub issuance_id: String,
    /// The issuing account.
    pub issuer: Address,
    /// Maximum supply; zero means unlimited.
    pub max_supply: Decimal,
    /// Outstanding (minted minus burned) supply.
    pub outstanding: Decimal,
    /// Transfer fee in basis points.
    pub transfer_fee: u16,
    /// Free-form metadata.
    pub metadata: String,
    /// `MPT_*` issuance flags.
    pub flags: u32,
    /// Whether the issuance is currently locked.
    pub locked: bool,
    /// Per-issuer creation sequence.
    pub sequence: u64,
}

/// A holder's balance for a specific issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MptHolder {
    /// The holding account.
    pub account: Address,
    /// The issuance held.
    pub issuance_id: String,
    /// Current balance; never negative.
    pub balance: Decimal,
    /// `MPT_AUTHORIZED` / `MPT_FROZEN` holder flags.
    pub flags: u32,
}

impl MptHolder {
    fn new(account: &str, issuance_id: &str) -> Self {
        Self {
            account: account.to_owned(),
            issuance_id: issuance_id.to_owned(),
            balance: Decimal::ZERO,
            flags: 0,
        }
    }

    /// Whether the holder is authorized.
    pub fn authorized(&self) -> bool {
        self.flags & MPT_AUTHORIZED != 0
    }

    /// Whether the holder is frozen.
    pub fn frozen(&self) -> bool {
        self.flags & MPT_FROZEN != 0
    }
}

/// Manages all MPT issuances and holdings.
#[derive(Debug, Clone, Default)]
pub struct MptManager {
    /// All issuances, keyed by id.
    pub issuances: BTreeMap<String, MptIssuance>,
    holders: BTreeMap<String, BTreeMap<Address, MptHolder>>,
    issuer_index: BTreeMap<Address, Vec<String>>,
    sequences: BTreeMap<Address, u64>,
}

impl MptManager {
    fn make_id(issuer: &str, seq: u64) -> String {
        let raw = format!("MPT:{}:{}", issuer, seq);
        hex::encode(&sha256(raw.as_bytes())[..20])
    }

    /// Create a new issuance.
    pub fn create_issuance(
        &mut self,
        issuer: &str,
        max_supply: Decimal,
        transfer_fee: u16,
        metadata: &str,
        flags: u32,
    ) -> Result<&MptIssuance, TransactionError> {
        if transfer_fee > MAX_TRANSFER_FEE_BPS {
            return Err(TransactionError::Malformed(format!(
                "Transfer fee must be 0-{}",
                MAX_TRANSFER_FEE_BPS
            )));
        }
        if metadata.len() > MAX_METADATA_LENGTH {
            return Err(TransactionError::Malformed(format!(
                "Metadata exceeds {} chars",
                MAX_METADATA_LENGTH
            )));
        }
        let seq = self.sequences.get(issuer).copied().unwrap_or(0);
        self.sequences.insert(issuer.to_owned(), seq + 1);
        let issuance_id = Self::make_id(issuer, seq);

        let issuance = MptIssuance {
            issuance_id: issuance_id.clone(),
            issuer: issuer.to_owned(),
            max_supply,
            outstanding: Decimal::ZERO,
            transfer_fee,
            metadata: metadata.to_owned(),
            flags,
            locked: false,
            sequence: seq,
        };
        self.issuances.insert(issuance_id.clone(), issuance);
        self.issuer_index
            .entry(issuer.to_owned())
            .or_default()
            .push(issuance_id.clone());
        log::debug!("mpt issuance {} created by {}", issuance_id, issuer);
        Ok(&self.issuances[&issuance_id])
    }

    /// Destroy an issuance; requires the issuer and zero outstanding supply.
    pub fn destroy_issuance(
        &mut self,
        issuer: &str,
        issuance_id: &str,
    ) -> Result<(), TransactionError> {
        let issuance = self
            .issuances
            .get(issuance_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Issuance {}", issuance_id)))?;
        if issuance.issuer != issuer {
            return Err(TransactionError::NotAuthorized("Not the issuer".into()));
        }
        if issuance.outstanding > Decimal::ZERO {
            return Err(TransactionError::Precondition(
                "Outstanding supply must be zero".into(),
            ));
        }
        self.issuances.remove(issuance_id);
        self.holders.remove(issuance_id);
        if let Some(ids) = self.issuer_index.get_mut(issuer) {
            ids.retain(|id| id != issuance_id);
        }
        Ok(())
    }

    /// Authorize a holder. With `issuer_action`, the issuer grants
    /// authorization; otherwise the account opts in (auto-authorized unless
    /// the issuance requires auth).
    pub fn authorize(
        &mut self,
        issuance_id: &str,
        account: &str,
        issuer_action: bool,
        issuer: &str,
    ) -> Result<(), TransactionError> {
        let issuance = self
            .issuances
            .get(issuance_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Issuance {}", issuance_id)))?;
        let require_auth = issuance.flags & MPT_REQUIRE_AUTH != 0;
        let issuance_issuer = issuance.issuer.clone();
        let holders = self.holders.entry(issuance_id.to_owned()).or_default();

        if issuer_action {
            if issuer != issuance_issuer {
                return Err(TransactionError::NotAuthorized("Not the issuer".into()));
            }
            let holder = holders
                .entry(account.to_owned())
                .or_insert_with(|| MptHolder::new(account, issuance_id));
            holder.flags |= MPT_AUTHORIZED;
            return Ok(());
        }

        if holders.contains_key(account) {
            return Ok(()); // already opted in
        }
        let mut holder = MptHolder::new(account, issuance_id);
        if !require_auth {
            holder.flags |= MPT_AUTHORIZED;
        }
        holders.insert(account.to_owned(), holder);
        Ok(())
    }

    /// Lock or unlock an issuance; requires the lockable flag.
    pub fn set_issuance(
        &mut self,
        issuer: &str,
        issuance_id: &str,
        lock: Option<bool>,
    ) -> Result<(), TransactionError> {
        let issuance = self
            .issuances
            .get_mut(issuance_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Issuance {}", issuance_id)))?;
        if issuance.issuer != issuer {
            return Err(TransactionError::NotAuthorized("Not the issuer".into()));
        }
        if issuance.flags & MPT_CAN_LOCK == 0 {
            return Err(TransactionError::Precondition(
                "Issuance does not allow locking".into(),
            ));
        }
        if let Some(locked) = lock {
            issuance.locked = locked;
        }
        Ok(())
    }

    /// Mint tokens to an opted-in holder; respects max supply and auth.
    pub fn mint(
        &mut self,
        issuer: &str,
        issuance_id: &str,
        holder: &str,
        amount: Decimal,
    ) -> Result<(), TransactionError> {
        let issuance = self
            .issuances
            .get_mut(issuance_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Issuance {}", issuance_id)))?;
        if issuance.issuer != issuer {
            return Err(TransactionError::NotAuthorized("Not the issuer".into()));
        }
        if issuance.locked {
            return Err(TransactionError::Precondition("Issuance is locked".into()));
        }
        if amount <= Decimal::ZERO {
            return Err(TransactionError::BadAmount("Amount must be positive".into()));
        }
        if issuance.max_supply > Decimal::ZERO
            && issuance.outstanding + amount > issuance.max_supply
        {
            return Err(TransactionError::LimitExceeded(
                "Would exceed max supply".into(),
            ));
        }
        let require_auth = issuance.flags & MPT_REQUIRE_AUTH != 0;

        let holders = self.holders.entry(issuance_id.to_owned()).or_default();
        let entry = holders
            .get_mut(holder)
            .ok_or_else(|| TransactionError::Precondition("Holder not opted in".into()))?;
        if require_auth && !entry.authorized() {
            return Err(TransactionError::NotAuthorized(
                "Holder not authorized".into(),
            ));
        }
        entry.balance += amount;
        issuance.outstanding += amount;
        Ok(())
    }

    /// Transfer between holders. Returns the fee routed to the issuer.
    pub fn transfer(
        &mut self,
        issuance_id: &str,
        sender: &str,
        recipient: &str,
        amount: Decimal,
    ) -> Result<Decimal, TransactionError> {
        let issuance = self
            .issuances
            .get(issuance_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Issuance {}", issuance_id)))?;
        if issuance.flags & MPT_CAN_TRANSFER == 0 {
            return Err(TransactionError::Precondition(
                "Transfers not allowed".into(),
            ));
        }
        if issuance.locked {
            return Err(TransactionError::Precondition("Issuance is locked".into()));
        }
        if amount <= Decimal::ZERO {
            return Err(TransactionError::BadAmount("Amount must be positive".into()));
        }
        let issuer = issuance.issuer.clone();
        let require_auth = issuance.flags & MPT_REQUIRE_AUTH != 0;
        let fee_bps = issuance.transfer_fee;

        let holders = self.holders.entry(issuance_id.to_owned()).or_default();
        {
            let s = holders
                .get(sender)
                .ok_or_else(|| TransactionError::Precondition("Sender not opted in".into()))?;
            if s.frozen() {
                return Err(TransactionError::Precondition("Sender is frozen".into()));
            }
            if s.balance < amount {
                return Err(TransactionError::Unfunded("Insufficient balance".into()));
            }
            let r = holders
                .get(recipient)
                .ok_or_else(|| TransactionError::Precondition("Recipient not opted in".into()))?;
            if r.frozen() {
                return Err(TransactionError::Precondition("Recipient is frozen".into()));
            }
            if require_auth && !r.authorized() {
                return Err(TransactionError::NotAuthorized(
                    "Recipient not authorized".into(),
                ));
            }
        }

        let fee = if fee_bps > 0 && sender != issuer && recipient != issuer {
            amount * Decimal::from(fee_bps) / Decimal::from(10_000u32)
        } else {
            Decimal::ZERO
        };

        if let Some(s) = holders.get_mut(sender) {
            s.balance -= amount;
        }
        if let Some(r) = holders.get_mut(recipient) {
            r.balance += amount - fee;
        }
        if fee > Decimal::ZERO {
            if let Some(h) = holders.get_mut(&issuer) {
                h.balance += fee;
            }
        }
        Ok(fee)
    }

    /// Burn (redeem) tokens from a holder.
    pub fn burn(
        &mut self,
        issuance_id: &str,
        account: &str,
        amount: Decimal,
    ) -> Result<(), TransactionError> {
        if amount <= Decimal::ZERO {
            return Err(TransactionError::BadAmount("Amount must be positive".into()));
        }
        let issuance = self
            .issuances
            .get_mut(issuance_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Issuance {}", issuance_id)))?;
        let holders = self.holders.entry(issuance_id.to_owned()).or_default();
        let holder = holders
            .get_mut(account)
            .ok_or_else(|| TransactionError::NotFound("Holder not found".into()))?;
        if holder.balance < amount {
            return Err(TransactionError::Unfunded("Insufficient balance".into()));
        }
        holder.balance -= amount;
        issuance.outstanding -= amount;
        Ok(())
    }

    /// Issuer claws back up to `amount` from a holder; requires the
    /// clawback flag. Returns the amount actually recovered.
    pub fn clawback(
        &mut self,
        issuer: &str,
        issuance_id: &str,
        holder: &str,
        amount: Decimal,
    ) -> Result<Decimal, TransactionError> {
        let issuance = self
            .issuances
            .get_mut(issuance_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Issuance {}", issuance_id)))?;
        if issuance.issuer != issuer {
            return Err(TransactionError::NotAuthorized("Not the issuer".into()));
        }
        if issuance.flags & MPT_CAN_CLAWBACK == 0 {
            return Err(TransactionError::Precondition(
                "Clawback not enabled".into(),
            ));
        }
        let holders = self.holders.entry(issuance_id.to_owned()).or_default();
        let entry = holders
            .get_mut(holder)
            .ok_or_else(|| TransactionError::NotFound("Holder not found".into()))?;
        let actual = amount.min(entry.balance);
        entry.balance -= actual;
        issuance.outstanding -= actual;
        log::info!(
            "mpt {}: {} clawed back from {}",
            issuance_id,
            actual,
            holder
        );
        Ok(actual)
    }

    /// Freeze a specific holder.
    pub fn freeze_holder(
        &mut self,
        issuer: &str,
        issuance_id: &str,
        holder: &str,
    ) -> Result<(), TransactionError> {
        let issuance = self
            .issuances
            .get(issuance_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Issuance {}", issuance_id)))?;
        if issuance.issuer != issuer {
            return Err(TransactionError::NotAuthorized("Not the issuer".into()));
        }
        let holders = self.holders.entry(issuance_id.to_owned()).or_default();
        let entry = holders
            .get_mut(holder)
            .ok_or_else(|| TransactionError::NotFound("Holder not found".into()))?;
        entry.flags |= MPT_FROZEN;
        Ok(())
    }

    /// Look up an issuance.
    pub fn get_issuance(&self, issuance_id: &str) -> Option<&MptIssuance> {
        self.issuances.get(issuance_id)
    }

    /// Look up a holder entry.
    pub fn get_holder(&self, issuance_id: &str, account: &str) -> Option<&MptHolder> {
        self.holders.get(issuance_id).and_then(|h| h.get(account))
    }

    /// All holder entries for an issuance.
    pub fn holders_of(&self, issuance_id: &str) -> Vec<&MptHolder> {
        self.holders
            .get(issuance_id)
            .map(|h| h.values().collect())
            .unwrap_or_default()
    }

    /// Issuances created by an issuer.
    pub fn issuances_by(&self, issuer: &str) -> Vec<&MptIssuance> {
        self.issuer_index
            .get(issuer)
            .map(|ids| ids.iter().filter_map(|id| self.issuances.get(id)).collect())
            .unwrap_or_default()
    }
}
