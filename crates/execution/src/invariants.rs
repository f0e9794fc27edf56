// Path: crates/execution/src/invariants.rs

//! Post-transaction invariant checks.
//!
//! A snapshot of the ledger is captured before every transaction and the
//! full battery of invariants runs after it: supply conservation, balance
//! sanity, sequence monotonicity, trust-line limits, no value creation,
//! zombie-account detection, per-manager amount sanity, staking pool
//! consistency and closed-ledger ordering. Any failure rolls the
//! transaction back.
//!
//! Balances are integer drops, so every comparison is exact; there are no
//! floating-point tolerances anywhere in this module.

use crate::ledger::LedgerState;
use nexaflow_types::app::{Address, Drops, LedgerHeader};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of the consensus-relevant ledger fields before a transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Total supply before the transaction.
    pub total_supply: Drops,
    /// Total burned before the transaction.
    pub total_burned: Drops,
    /// Total minted before the transaction.
    pub total_minted: Drops,
    /// Per-account native balances.
    pub account_balances: BTreeMap<Address, Drops>,
    /// Per-account sequences.
    pub account_sequences: BTreeMap<Address, u32>,
    /// Per-account owner counts.
    pub account_owner_counts: BTreeMap<Address, u32>,
    /// Per-line trust balances, keyed by (holder, currency, issuer).
    pub trust_line_balances: BTreeMap<(Address, String, Address), Decimal>,
    /// Drops locked in unresolved escrows.
    pub escrow_total: Drops,
    /// Drops locked in open payment channels.
    pub channel_total: Drops,
    /// Drops staked.
    pub staked_total: Drops,
}

/// Captures a pre-transaction snapshot and validates every invariant after
/// the transaction has been applied.
#[derive(Debug, Default)]
pub struct InvariantChecker {
    snapshot: Option<LedgerSnapshot>,
}

impl InvariantChecker {
    /// A checker with no captured snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a snapshot of the ledger state before a transaction.
    pub fn capture(&mut self, state: &LedgerState) {
        let mut snap = LedgerSnapshot {
            total_supply: state.total_supply,
            total_burned: state.total_burned,
            total_minted: state.total_minted,
            escrow_total: state.escrows.total_locked(),
            channel_total: state.channels.total_locked(),
            staked_total: state.staking.total_staked,
            ..LedgerSnapshot::default()
        };
        for (address, account) in &state.accounts {
            snap.account_balances.insert(address.clone(), account.balance);
            snap.account_sequences
                .insert(address.clone(), account.sequence);
            snap.account_owner_counts
                .insert(address.clone(), account.owner_count);
            for ((currency, issuer), line) in &account.trust_lines {
                snap.trust_line_balances.insert(
                    (address.clone(), currency.clone(), issuer.clone()),
                    line.balance,
                );
            }
        }
        self.snapshot = Some(snap);
    }

    /// Verify all invariants against the current state. Consumes the
    /// snapshot; with no snapshot captured, verification passes.
    ///
    /// On failure returns every violated invariant's message, joined.
    pub fn verify(
        &mut self,
        state: &LedgerState,
        initial_supply: Drops,
        closed_ledgers: &[LedgerHeader],
    ) -> Result<(), String> {
        let Some(snap) = self.snapshot.take() else {
            return Ok(());
        };

        let mut errors: Vec<String> = Vec::new();
        let checks: [fn(&LedgerSnapshot, &LedgerState, Drops, &[LedgerHeader]) -> Result<(), String>;
            14] = [
            check_supply_conservation,
            check_balance_sanity,
            check_owner_counts,
            check_sequence_increases,
            check_supply_formula,
            check_trust_line_limits,
            check_no_creation,
            check_no_zombie_accounts,
            check_burn_mint_monotonic,
            check_locked_amounts,
            check_nftoken_ownership,
            check_staking_consistency,
            check_trust_line_non_negative,
            check_ledger_sequence,
        ];
        for check in checks {
            if let Err(msg) = check(&snap, state, initial_supply, closed_ledgers) {
                errors.push(msg);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }
}

fn system_total(state: &LedgerState) -> i128 {
    let accounts: i128 = state.accounts.values().map(|a| a.balance as i128).sum();
    accounts
        + state.escrows.total_locked() as i128
        + state.channels.total_locked() as i128
        + state.staking.total_staked as i128
}

/// 1. Supply only changes by fees burned and staking interest minted.
fn check_supply_conservation(
    snap: &LedgerSnapshot,
    state: &LedgerState,
    _initial_supply: Drops,
    _headers: &[LedgerHeader],
) -> Result<(), String> {
    let burn_delta = state.total_burned as i128 - snap.total_burned as i128;
    let mint_delta = state.total_minted as i128 - snap.total_minted as i128;
    let expected = snap.total_supply as i128 - burn_delta + mint_delta;
    if state.total_supply as i128 != expected {
        return Err(format!(
            "Supply mismatch: expected {}, got {}",
            expected, state.total_supply
        ));
    }
    Ok(())
}

/// 2. No account balance outside the issuable range. Balances are unsigned,
/// so an arithmetic underflow upstream would surface as an impossibly large
/// value here.
fn check_balance_sanity(
    _snap: &LedgerSnapshot,
    state: &LedgerState,
    initial_supply: Drops,
    _headers: &[LedgerHeader],
) -> Result<(), String> {
    let ceiling = initial_supply.saturating_add(state.total_minted);
    for (address, account) in &state.accounts {
        if account.balance > ceiling {
            return Err(format!(
                "Balance on {} exceeds issuable supply: {} > {}",
                address, account.balance, ceiling
            ));
        }
    }
    Ok(())
}

/// 3. Owner counts match the owner directories.
fn check_owner_counts(
    _snap: &LedgerSnapshot,
    state: &LedgerState,
    _initial_supply: Drops,
    _headers: &[LedgerHeader],
) -> Result<(), String> {
    for (address, account) in &state.accounts {
        let directory_count = state.directories.owner_count(address) as u32;
        if account.owner_count != directory_count {
            return Err(format!(
                "Owner count mismatch on {}: account says {}, directory says {}",
                address, account.owner_count, directory_count
            ));
        }
    }
    Ok(())
}

/// 4. Account sequences never decrease.
fn check_sequence_increases(
    snap: &LedgerSnapshot,
    state: &LedgerState,
    _initial_supply: Drops,
    _headers: &[LedgerHeader],
) -> Result<(), String> {
    for (address, account) in &state.accounts {
        let old = snap.account_sequences.get(address).copied().unwrap_or(0);
        if account.sequence < old {
            return Err(format!(
                "Sequence decreased on {}: {} -> {}",
                address, old, account.sequence
            ));
        }
    }
    Ok(())
}

/// 5. `total_supply == initial_supply - total_burned + total_minted`.
fn check_supply_formula(
    _snap: &LedgerSnapshot,
    state: &LedgerState,
    initial_supply: Drops,
    _headers: &[LedgerHeader],
) -> Result<(), String> {
    let expected =
        initial_supply as i128 - state.total_burned as i128 + state.total_minted as i128;
    if state.total_supply as i128 != expected {
        return Err(format!(
            "Supply formula violated: {} != {} - {} + {}",
            state.total_supply, initial_supply, state.total_burned, state.total_minted
        ));
    }
    Ok(())
}

/// 6. A trust-line balance may not newly exceed its limit; a line already
/// over the limit before the transaction is grandfathered as long as its
/// balance did not grow.
fn check_trust_line_limits(
    snap: &LedgerSnapshot,
    state: &LedgerState,
    _initial_supply: Drops,
    _headers: &[LedgerHeader],
) -> Result<(), String> {
    for (address, account) in &state.accounts {
        for ((currency, issuer), line) in &account.trust_lines {
            if line.balance <= line.limit {
                continue;
            }
            let key = (address.clone(), currency.clone(), issuer.clone());
            match snap.trust_line_balances.get(&key) {
                // Grandfathered: it was already at or above this balance.
                Some(prev) if line.balance <= *prev => {}
                _ => {
                    return Err(format!(
                        "Trust line {}/{} on {} newly exceeds limit: {} > {}",
                        currency, issuer, address, line.balance, line.limit
                    ));
                }
            }
        }
    }
    Ok(())
}

/// 7. Total system value (accounts + escrow + channels + staked) changes
/// only by `-Δburned + Δminted`.
fn check_no_creation(
    snap: &LedgerSnapshot,
    state: &LedgerState,
    _initial_supply: Drops,
    _headers: &[LedgerHeader],
) -> Result<(), String> {
    let old_accounts: i128 = snap.account_balances.values().map(|b| *b as i128).sum();
    let old_system = old_accounts
        + snap.escrow_total as i128
        + snap.channel_total as i128
        + snap.staked_total as i128;
    let new_system = system_total(state);

    let burn_delta = state.total_burned as i128 - snap.total_burned as i128;
    let mint_delta = state.total_minted as i128 - snap.total_minted as i128;
    let expected_change = -burn_delta + mint_delta;
    let actual_change = new_system - old_system;

    if actual_change != expected_change {
        return Err(format!(
            "NXF creation detected: system total changed by {} but expected {}",
            actual_change, expected_change
        ));
    }
    Ok(())
}

/// 8. An account drained to zero with nothing owned (and not a gateway)
/// must not silently persist.
fn check_no_zombie_accounts(
    snap: &LedgerSnapshot,
    state: &LedgerState,
    _initial_supply: Drops,
    _headers: &[LedgerHeader],
) -> Result<(), String> {
    for (address, account) in &state.accounts {
        if account.balance == 0
            && account.owner_count == 0
            && account.trust_lines.is_empty()
            && !account.is_gateway
        {
            if let Some(old_balance) = snap.account_balances.get(address) {
                if *old_balance > 0 {
                    return Err(format!(
                        "Zombie account {}: balance drained to 0 with no owned objects",
                        address
                    ));
                }
            }
        }
    }
    Ok(())
}

/// 9. Burned and minted totals never decrease.
fn check_burn_mint_monotonic(
    snap: &LedgerSnapshot,
    state: &LedgerState,
    _initial_supply: Drops,
    _headers: &[LedgerHeader],
) -> Result<(), String> {
    if state.total_burned < snap.total_burned {
        return Err(format!(
            "total_burned decreased: {} -> {}",
            snap.total_burned, state.total_burned
        ));
    }
    if state.total_minted < snap.total_minted {
        return Err(format!(
            "total_minted decreased: {} -> {}",
            snap.total_minted, state.total_minted
        ));
    }
    Ok(())
}

/// 10. Escrow, channel and MPT amounts stay within their bounds.
fn check_locked_amounts(
    _snap: &LedgerSnapshot,
    state: &LedgerState,
    _initial_supply: Drops,
    _headers: &[LedgerHeader],
) -> Result<(), String> {
    for (channel_id, channel) in &state.channels.channels {
        if channel.balance > channel.amount {
            return Err(format!(
                "Channel {} claimed more than deposited: {} > {}",
                channel_id, channel.balance, channel.amount
            ));
        }
    }
    for (issuance_id, issuance) in &state.mpt.issuances {
        if issuance.outstanding < Decimal::ZERO {
            return Err(format!(
                "MPT {} outstanding is negative: {}",
                issuance_id, issuance.outstanding
            ));
        }
        if issuance.max_supply > Decimal::ZERO && issuance.outstanding > issuance.max_supply {
            return Err(format!(
                "MPT {} outstanding exceeds max supply: {} > {}",
                issuance_id, issuance.outstanding, issuance.max_supply
            ));
        }
        for holder in state.mpt.holders_of(issuance_id) {
            if holder.balance < Decimal::ZERO {
                return Err(format!(
                    "MPT {} holder {} has negative balance: {}",
                    issuance_id, holder.account, holder.balance
                ));
            }
        }
    }
    Ok(())
}

/// 11. Every live NFToken is owned by an existing account.
fn check_nftoken_ownership(
    _snap: &LedgerSnapshot,
    state: &LedgerState,
    _initial_supply: Drops,
    _headers: &[LedgerHeader],
) -> Result<(), String> {
    for (token_id, token) in &state.nftokens.tokens {
        if !token.burned && !state.accounts.contains_key(&token.owner) {
            return Err(format!(
                "NFToken {} owned by non-existent account {}",
                token_id, token.owner
            ));
        }
    }
    Ok(())
}

/// 12. The staking pool total equals the sum of active stakes.
fn check_staking_consistency(
    _snap: &LedgerSnapshot,
    state: &LedgerState,
    _initial_supply: Drops,
    _headers: &[LedgerHeader],
) -> Result<(), String> {
    let active_sum = state.staking.active_stake_sum();
    if state.staking.total_staked != active_sum {
        return Err(format!(
            "Staking pool mismatch: total_staked={} but active stake sum={}",
            state.staking.total_staked, active_sum
        ));
    }
    Ok(())
}

/// 13. Holder-side trust-line balances never go negative.
fn check_trust_line_non_negative(
    _snap: &LedgerSnapshot,
    state: &LedgerState,
    _initial_supply: Drops,
    _headers: &[LedgerHeader],
) -> Result<(), String> {
    for (address, account) in &state.accounts {
        for ((currency, issuer), line) in &account.trust_lines {
            if line.balance < Decimal::ZERO {
                return Err(format!(
                    "Negative trust line balance {}/{} on {}: {}",
                    currency, issuer, address, line.balance
                ));
            }
        }
    }
    Ok(())
}

/// 14. Closed-ledger sequences are strictly increasing and headers chain by
/// hash.
fn check_ledger_sequence(
    _snap: &LedgerSnapshot,
    _state: &LedgerState,
    _initial_supply: Drops,
    headers: &[LedgerHeader],
) -> Result<(), String> {
    for pair in headers.windows(2) {
        if pair[1].sequence <= pair[0].sequence {
            return Err(format!(
                "Non-monotonic ledger sequence: {} then {}",
                pair[0].sequence, pair[1].sequence
            ));
        }
        if pair[1].parent_hash != pair[0].state_hash {
            return Err(format!(
                "Broken header chain at sequence {}",
                pair[1].sequence
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerState;
    use nexaflow_types::app::{AccountRoot, TrustLine};
    use nexaflow_types::config::LedgerParams;
    use rust_decimal_macros::dec;

    const INITIAL: Drops = 10_000 * 1_000_000;

    fn state_with(balances: &[(&str, Drops)]) -> LedgerState {
        let mut state = LedgerState::new(&LedgerParams::default());
        state.total_supply = INITIAL;
        for (address, balance) in balances {
            state
                .accounts
                .insert((*address).to_owned(), AccountRoot::new(*address, *balance));
        }
        state
    }

    #[test]
    fn clean_transfer_passes() {
        let mut state = state_with(&[("alice", 500_000_000), ("bob", 100_000_000)]);
        let mut checker = InvariantChecker::new();
        checker.capture(&state);

        // alice pays bob 50 NXF with a 10-drop fee.
        state.accounts.get_mut("alice").unwrap().balance -= 50_000_010;
        state.accounts.get_mut("bob").unwrap().balance += 50_000_000;
        state.total_burned += 10;
        state.total_supply -= 10;

        assert!(checker.verify(&state, INITIAL, &[]).is_ok());
    }

    #[test]
    fn value_creation_detected() {
        let mut state = state_with(&[("alice", 500_000_000), ("bob", 100_000_000)]);
        let mut checker = InvariantChecker::new();
        checker.capture(&state);

        // A buggy handler gives alice 100 NXF out of thin air.
        state.accounts.get_mut("alice").unwrap().balance += 100_000_000;

        let err = checker.verify(&state, INITIAL, &[]).unwrap_err();
        assert!(err.contains("NXF creation detected"));
        assert!(err.contains("100000000"));
    }

    #[test]
    fn sequence_decrease_detected() {
        let mut state = state_with(&[("alice", 100)]);
        state.accounts.get_mut("alice").unwrap().sequence = 9;
        let mut checker = InvariantChecker::new();
        checker.capture(&state);
        state.accounts.get_mut("alice").unwrap().sequence = 8;
        let err = checker.verify(&state, INITIAL, &[]).unwrap_err();
        assert!(err.contains("Sequence decreased"));
    }

    #[test]
    fn supply_formula_detected() {
        let mut state = state_with(&[]);
        let mut checker = InvariantChecker::new();
        checker.capture(&state);
        state.total_burned += 5; // burned but supply untouched
        let err = checker.verify(&state, INITIAL, &[]).unwrap_err();
        assert!(err.contains("Supply"));
    }

    #[test]
    fn new_trust_line_violation_detected_but_grandfathered_kept() {
        let mut state = state_with(&[("alice", 100)]);
        {
            let alice = state.accounts.get_mut("alice").unwrap();
            let mut line = TrustLine::new("USD", "gw", dec!(50));
            line.balance = dec!(80); // pre-existing over-limit balance
            alice
                .trust_lines
                .insert(("USD".into(), "gw".into()), line);
        }
        let mut checker = InvariantChecker::new();
        checker.capture(&state);

        // Unchanged over-limit balance is grandfathered.
        assert!(checker.verify(&state, INITIAL, &[]).is_ok());

        // Growing it further is a new violation.
        checker.capture(&state);
        state
            .accounts
            .get_mut("alice")
            .unwrap()
            .trust_line_mut("USD", "gw")
            .unwrap()
            .balance = dec!(81);
        let err = checker.verify(&state, INITIAL, &[]).unwrap_err();
        assert!(err.contains("newly exceeds limit"));
    }

    #[test]
    fn zombie_account_flagged() {
        let mut state = state_with(&[("alice", 100)]);
        let mut checker = InvariantChecker::new();
        checker.capture(&state);
        state.accounts.get_mut("alice").unwrap().balance = 0;
        // Not conserving on purpose; both violations should be reported.
        let err = checker.verify(&state, INITIAL, &[]).unwrap_err();
        assert!(err.contains("Zombie account alice"));
        assert!(err.contains("NXF creation detected"));
    }

    #[test]
    fn gateway_exempt_from_zombie_check() {
        let mut state = state_with(&[("gw", 100)]);
        state.accounts.get_mut("gw").unwrap().is_gateway = true;
        let mut checker = InvariantChecker::new();
        checker.capture(&state);
        state.accounts.get_mut("gw").unwrap().balance = 0;
        state.total_burned += 100;
        state.total_supply -= 100;
        assert!(checker.verify(&state, INITIAL, &[]).is_ok());
    }

    #[test]
    fn owner_count_directory_mismatch_detected() {
        let mut state = state_with(&[("alice", 100)]);
        let mut checker = InvariantChecker::new();
        checker.capture(&state);
        state.accounts.get_mut("alice").unwrap().owner_count = 1;
        let err = checker.verify(&state, INITIAL, &[]).unwrap_err();
        assert!(err.contains("Owner count mismatch"));
    }

    #[test]
    fn staking_mismatch_detected() {
        let mut state = state_with(&[]);
        let mut checker = InvariantChecker::new();
        checker.capture(&state);
        state.staking.total_staked = 77;
        let err = checker.verify(&state, INITIAL, &[]).unwrap_err();
        assert!(err.contains("Staking pool mismatch"));
    }

    #[test]
    fn broken_header_chain_detected() {
        let state = state_with(&[]);
        let mut checker = InvariantChecker::new();
        checker.capture(&state);
        let headers = vec![
            LedgerHeader {
                sequence: 1,
                parent_hash: [0; 32],
                state_hash: [1; 32],
                close_time: 10,
                tx_count: 0,
            },
            LedgerHeader {
                sequence: 1,
                parent_hash: [1; 32],
                state_hash: [2; 32],
                close_time: 20,
                tx_count: 0,
            },
        ];
        let err = checker.verify(&state, INITIAL, &headers).unwrap_err();
        assert!(err.contains("Non-monotonic ledger sequence"));
    }

    #[test]
    fn no_snapshot_means_pass() {
        let state = state_with(&[]);
        let mut checker = InvariantChecker::new();
        assert!(checker.verify(&state, INITIAL, &[]).is_ok());
    }
}
