// Path: crates/services/src/payment_channel.rs

//! Payment channel management.
//!
//! Unidirectional channels for rapid off-ledger micropayments; only open,
//! fund, claim and close touch the ledger. Closure is two-phase for the
//! creator (close request, then settle delay) and immediate for the
//! destination.

use nexaflow_types::app::{Address, Drops};
use nexaflow_types::error::TransactionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A unidirectional payment channel between two accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChannel {
    /// Unique id (the creating transaction id).
    pub channel_id: String,
    /// Channel creator and funder.
    pub account: Address,
    /// Channel recipient.
    pub destination: Address,
    /// Total drops deposited into the channel.
    pub amount: Drops,
    /// Cumulative drops already claimed by the destination. Monotonically
    /// non-decreasing and never above `amount`.
    pub balance: Drops,
    /// Seconds after a close request before the creator may finalize.
    pub settle_delay: u64,
    /// Hex public key authorized to sign claims (informational here).
    pub public_key: String,
    /// Absolute expiration; 0 = none.
    pub cancel_after: u64,
    /// Creation time.
    pub create_time: u64,
    /// Set once the creator has requested closure.
    pub close_requested: bool,
    /// When the close request was made.
    pub close_request_time: u64,
    /// Terminal.
    pub closed: bool,
}

impl PaymentChannel {
    /// Drops remaining in the channel.
    pub fn available(&self) -> Drops {
        self.amount.saturating_sub(self.balance)
    }

    /// Check whether a claim raising the balance to `claim_balance` is
    /// valid now.
    pub fn can_claim(&self, claim_balance: Drops, now: u64) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::Precondition("Channel is closed".into()));
        }
        if self.cancel_after > 0 && now >= self.cancel_after {
            return Err(TransactionError::Expired("Channel has expired".into()));
        }
        if claim_balance <= self.balance {
            return Err(TransactionError::Precondition(
                "Claim balance must exceed current balance".into(),
            ));
        }
        if claim_balance > self.amount {
            return Err(TransactionError::Precondition(
                "Claim exceeds channel amount".into(),
            ));
        }
        Ok(())
    }
}

/// Manages all payment channels on the ledger.
#[derive(Debug, Clone, Default)]
pub struct PaymentChannelManager {
    /// All channels, keyed by id.
    pub channels: BTreeMap<String, PaymentChannel>,
}

impl PaymentChannelManager {
    /// Open a new channel.
    #[allow(clippy::too_many_arguments)]
    pub fn create_channel(
        &mut self,
        channel_id: &str,
        account: &str,
        destination: &str,
        amount: Drops,
        settle_delay: u64,
        public_key: &str,
        cancel_after: u64,
        now: u64,
    ) -> Result<&PaymentChannel, TransactionError> {
        let ch = PaymentChannel {
            channel_id: channel_id.to_owned(),
            account: account.to_owned(),
            destination: destination.to_owned(),
            amount,
            balance: 0,
            settle_delay,
            public_key: public_key.to_owned(),
            cancel_after,
            create_time: now,
            close_requested: false,
            close_request_time: 0,
            closed: false,
        };
        log::debug!("channel {} opened with {} drops", channel_id, amount);
        self.channels.insert(channel_id.to_owned(), ch);
        Ok(&self.channels[channel_id])
    }

    /// Add more drops to an existing open channel.
    pub fn fund_channel(
        &mut self,
        channel_id: &str,
        additional: Drops,
    ) -> Result<&PaymentChannel, TransactionError> {
        let ch = self
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Channel {}", channel_id)))?;
        if ch.closed {
            return Err(TransactionError::Precondition(
                "Cannot fund a closed channel".into(),
            ));
        }
        ch.amount += additional;
        Ok(ch)
    }

    /// Process a claim. Returns the channel and the drops paid out.
    pub fn claim(
        &mut self,
        channel_id: &str,
        new_balance: Drops,
        now: u64,
    ) -> Result<(&PaymentChannel, Drops), TransactionError> {
        let ch = self
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Channel {}", channel_id)))?;
        ch.can_claim(new_balance, now)?;
        let payout = new_balance - ch.balance;
        ch.balance = new_balance;
        log::info!("channel {} claim: {} drops paid out", channel_id, payout);
        Ok((&*ch, payout))
    }

    /// Request or finalize channel closure.
    ///
    /// The destination closes immediately. The creator's first request
    /// starts the settle-delay clock; a later request succeeds only once
    /// `settle_delay` has elapsed. Returns the channel and whether it is
    /// now closed.
    pub fn request_close(
        &mut self,
        channel_id: &str,
        requester: &str,
        now: u64,
    ) -> Result<(&PaymentChannel, bool), TransactionError> {
        let ch = self
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Channel {}", channel_id)))?;
        if ch.closed {
            return Err(TransactionError::Precondition("Already closed".into()));
        }
        if requester == ch.destination {
            ch.closed = true;
            log::info!("channel {} closed by destination", channel_id);
            return Ok((&*ch, true));
        }
        if requester != ch.account {
            return Err(TransactionError::NotAuthorized(
                "Only channel parties can close".into(),
            ));
        }
        if ch.close_requested {
            if now >= ch.close_request_time + ch.settle_delay {
                ch.closed = true;
                log::info!("channel {} settled and closed", channel_id);
                return Ok((&*ch, true));
            }
            return Err(TransactionError::Precondition(format!(
                "Settle delay not elapsed (wait until {})",
                ch.close_request_time + ch.settle_delay
            )));
        }
        ch.close_requested = true;
        ch.close_request_time = now;
        log::info!("channel {} close requested, settle delay started", channel_id);
        Ok((&*ch, false))
    }

    /// Look up a channel by id.
    pub fn get_channel(&self, channel_id: &str) -> Option<&PaymentChannel> {
        self.channels.get(channel_id)
    }

    /// Open channels where the account is a party.
    pub fn get_channels_for_account(&self, account: &str) -> Vec<&PaymentChannel> {
        self.channels
            .values()
            .filter(|c| (c.account == account || c.destination == account) && !c.closed)
            .collect()
    }

    /// Drops locked in open channels (deposited minus claimed).
    pub fn total_locked(&self) -> Drops {
        self.channels
            .values()
            .filter(|c| !c.closed)
            .map(|c| c.amount - c.balance)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_channel(mgr: &mut PaymentChannelManager) {
        mgr.create_channel("ch1", "alice", "bob", 500_000_000, 3600, "", 0, 0)
            .unwrap();
    }

    #[test]
    fn claim_must_make_progress() {
        let mut mgr = PaymentChannelManager::default();
        open_channel(&mut mgr);

        let (_, payout) = mgr.claim("ch1", 200_000_000, 10).unwrap();
        assert_eq!(payout, 200_000_000);

        // A claim equal to the current balance is rejected.
        let err = mgr.claim("ch1", 200_000_000, 11).unwrap_err();
        assert_eq!(err.to_string(), "Claim balance must exceed current balance");

        // Claiming the full amount succeeds exactly once.
        let (_, payout) = mgr.claim("ch1", 500_000_000, 12).unwrap();
        assert_eq!(payout, 300_000_000);
        assert!(mgr.claim("ch1", 500_000_000, 13).is_err());
    }

    #[test]
    fn claim_cannot_exceed_amount() {
        let mut mgr = PaymentChannelManager::default();
        open_channel(&mut mgr);
        let err = mgr.claim("ch1", 500_000_001, 10).unwrap_err();
        assert_eq!(err.to_string(), "Claim exceeds channel amount");
    }

    #[test]
    fn creator_close_is_two_phase() {
        let mut mgr = PaymentChannelManager::default();
        open_channel(&mut mgr);

        let (_, closed) = mgr.request_close("ch1", "alice", 1_000_000).unwrap();
        assert!(!closed);

        // Second request inside the delay is rejected.
        let err = mgr.request_close("ch1", "alice", 1_001_000).unwrap_err();
        assert!(err.to_string().starts_with("Settle delay not elapsed"));

        // After the delay, the close finalizes.
        let (ch, closed) = mgr.request_close("ch1", "alice", 1_003_601).unwrap();
        assert!(closed);
        assert!(ch.closed);
    }

    #[test]
    fn destination_closes_immediately() {
        let mut mgr = PaymentChannelManager::default();
        open_channel(&mut mgr);
        let (_, closed) = mgr.request_close("ch1", "bob", 5).unwrap();
        assert!(closed);
    }

    #[test]
    fn stranger_cannot_close() {
        let mut mgr = PaymentChannelManager::default();
        open_channel(&mut mgr);
        let err = mgr.request_close("ch1", "mallory", 5).unwrap_err();
        assert!(matches!(err, TransactionError::NotAuthorized(_)));
    }

    #[test]
    fn expired_channel_rejects_claims() {
        let mut mgr = PaymentChannelManager::default();
        mgr.create_channel("ch2", "alice", "bob", 100, 60, "", 1000, 0)
            .unwrap();
        assert!(mgr.claim("ch2", 50, 999).is_ok());
        let err = mgr.claim("ch2", 60, 1000).unwrap_err();
        assert!(matches!(err, TransactionError::Expired(_)));
    }

    #[test]
    fn total_locked_counts_unclaimed_remainder() {
        let mut mgr = PaymentChannelManager::default();
        open_channel(&mut mgr);
        assert_eq!(mgr.total_locked(), 500_000_000);
        mgr.claim("ch1", 100_000_000, 1).unwrap();
        assert_eq!(mgr.total_locked(), 400_000_000);
        mgr.request_close("ch1", "bob", 2).unwrap();
        assert_eq!(mgr.total_locked(), 0);
    }

    #[test]
    fn funding_a_closed_channel_fails() {
        let mut mgr = PaymentChannelManager::default();
        open_channel(&mut mgr);
        mgr.request_close("ch1", "bob", 1).unwrap();
        assert!(mgr.fund_channel("ch1", 10).is_err());
    }
}
