// Path: crates/execution/tests/scenarios.rs

//! End-to-end scenarios driving the full apply pipeline: validation, fee
//! gate, domain handlers, invariants, metadata and the state map.

use nexaflow_crypto::sha256_hex;
use nexaflow_execution::{ApplyOutcome, Ledger};
use nexaflow_types::app::{Amount, ResultCode, Transaction, TxPayload, DROPS_PER_NXF};
use nexaflow_types::config::LedgerParams;
use std::collections::BTreeSet;

const NXF: u64 = DROPS_PER_NXF;
const FEE: u64 = 10; // 0.00001 NXF

fn payment(id: &str, from: &str, to: &str, drops: u64) -> Transaction {
    Transaction::new(
        id,
        from,
        FEE,
        0,
        TxPayload::Payment {
            destination: to.into(),
            amount: Amount::Drops(drops),
        },
    )
}

fn expect_applied(outcome: ApplyOutcome) -> ResultCode {
    match outcome {
        ApplyOutcome::Applied { code, .. } => code,
        other => panic!("expected Applied, got {:?}", other),
    }
}

#[test]
fn conservation_under_round_trip() {
    let mut ledger = Ledger::with_defaults();
    ledger.create_account("alice", 500 * NXF);
    ledger.create_account("bob", 100 * NXF);

    let root_before = ledger.state_root();
    let supply_before = ledger.state.total_supply;
    assert_eq!(supply_before, 10_000 * NXF);

    let code = expect_applied(ledger.submit_transaction(&payment("t1", "alice", "bob", 50 * NXF), 0));
    assert_eq!(code, ResultCode::TesSuccess);

    assert_eq!(ledger.balance_of("alice"), 449_999_990);
    assert_eq!(ledger.balance_of("bob"), 150 * NXF);
    assert_eq!(ledger.state.total_burned, FEE);
    assert_eq!(ledger.state.total_supply, 10_000 * NXF - FEE);
    assert_ne!(ledger.state_root(), root_before);
}

#[test]
fn escrow_with_condition_full_lifecycle() {
    let mut ledger = Ledger::with_defaults();
    ledger.create_account("alice", 500 * NXF);
    ledger.create_account("bob", 100 * NXF);

    let condition = sha256_hex(b"payment-proof");
    let create = Transaction::new(
        "e1",
        "alice",
        FEE,
        0,
        TxPayload::EscrowCreate {
            destination: "bob".into(),
            amount: 100 * NXF,
            condition,
            finish_after: 1000,
            cancel_after: 0,
        },
    );
    assert_eq!(expect_applied(ledger.submit_transaction(&create, 0)), ResultCode::TesSuccess);
    assert_eq!(ledger.state.escrows.total_locked(), 100 * NXF);
    assert_eq!(ledger.get_account("alice").unwrap().owner_count, 1);

    let finish = |fulfillment: &str, id: &str| {
        Transaction::new(
            id,
            "bob",
            FEE,
            0,
            TxPayload::EscrowFinish {
                escrow_id: "e1".into(),
                fulfillment: fulfillment.into(),
            },
        )
    };

    // Too early, even with the right secret.
    let code = expect_applied(ledger.submit_transaction(&finish("payment-proof", "f1"), 500));
    assert_eq!(code, ResultCode::TecPrecondition);

    // On time, wrong secret.
    let code = expect_applied(ledger.submit_transaction(&finish("wrong-secret", "f2"), 1001));
    assert_eq!(code, ResultCode::TecPrecondition);

    // On time, right secret.
    let bob_before = ledger.balance_of("bob");
    let code = expect_applied(ledger.submit_transaction(&finish("payment-proof", "f3"), 1001));
    assert_eq!(code, ResultCode::TesSuccess);
    assert_eq!(ledger.balance_of("bob"), bob_before + 100 * NXF - FEE);
    assert_eq!(ledger.state.escrows.total_locked(), 0);
    assert_eq!(ledger.get_account("alice").unwrap().owner_count, 0);
}

#[test]
fn payment_channel_two_phase_close() {
    let mut ledger = Ledger::with_defaults();
    ledger.create_account("alice", 600 * NXF);
    ledger.create_account("bob", 100 * NXF);

    let create = Transaction::new(
        "ch1",
        "alice",
        FEE,
        0,
        TxPayload::PayChanCreate {
            destination: "bob".into(),
            amount: 500 * NXF,
            settle_delay: 3600,
            public_key: String::new(),
            cancel_after: 0,
        },
    );
    assert_eq!(expect_applied(ledger.submit_transaction(&create, 0)), ResultCode::TesSuccess);

    // Claim raises the channel balance; the delta pays out to bob.
    let claim = Transaction::new(
        "cl1",
        "bob",
        FEE,
        0,
        TxPayload::PayChanClaim {
            channel_id: "ch1".into(),
            balance: 200 * NXF,
        },
    );
    let bob_before = ledger.balance_of("bob");
    assert_eq!(expect_applied(ledger.submit_transaction(&claim, 10)), ResultCode::TesSuccess);
    assert_eq!(ledger.balance_of("bob"), bob_before + 200 * NXF - FEE);

    let close = |id: &str| {
        Transaction::new(
            id,
            "alice",
            FEE,
            0,
            TxPayload::PayChanClose {
                channel_id: "ch1".into(),
            },
        )
    };

    // First request starts the settle-delay clock.
    assert_eq!(
        expect_applied(ledger.submit_transaction(&close("c1"), 1_000_000)),
        ResultCode::TesSuccess
    );
    assert!(!ledger.state.channels.get_channel("ch1").unwrap().closed);

    // Second request before the delay elapses is a claimed-fee failure.
    assert_eq!(
        expect_applied(ledger.submit_transaction(&close("c2"), 1_001_000)),
        ResultCode::TecPrecondition
    );

    // After the delay the channel closes and the remainder refunds.
    let alice_before = ledger.balance_of("alice");
    assert_eq!(
        expect_applied(ledger.submit_transaction(&close("c3"), 1_003_601)),
        ResultCode::TesSuccess
    );
    assert!(ledger.state.channels.get_channel("ch1").unwrap().closed);
    assert_eq!(ledger.balance_of("alice"), alice_before + 300 * NXF - FEE);
}

#[test]
fn amendment_enablement_via_ledger_close() {
    let mut params = LedgerParams::default();
    params.amendment_voting_period_secs = 10;
    let mut ledger = Ledger::new(params);
    for v in 0..10 {
        ledger.register_validator(&format!("v{}", v));
    }

    let amendment_id = {
        let amendment = ledger.state.amendments.propose("BigFeature", "big");
        amendment.amendment_id.clone()
    };
    for v in 0..8 {
        ledger.state.amendments.vote(&amendment_id, &format!("v{}", v), true);
    }

    ledger.close_ledger(1000);
    assert!(!ledger.state.amendments.is_enabled("BigFeature"));

    ledger.close_ledger(1005);
    assert!(!ledger.state.amendments.is_enabled("BigFeature"));

    ledger.close_ledger(1011);
    assert!(ledger.state.amendments.is_enabled("BigFeature"));
}

#[test]
fn multi_sig_quorum_via_signer_list_set() {
    let mut ledger = Ledger::with_defaults();
    ledger.create_account("alice", 100 * NXF);

    let set = Transaction::new(
        "s1",
        "alice",
        FEE,
        0,
        TxPayload::SignerListSet {
            quorum: 3,
            signers: vec![("bob".into(), 2), ("charlie".into(), 2)],
        },
    );
    assert_eq!(expect_applied(ledger.submit_transaction(&set, 0)), ResultCode::TesSuccess);
    assert_eq!(ledger.get_account("alice").unwrap().owner_count, 1);

    let both: BTreeSet<String> = ["bob", "charlie"].iter().map(|s| s.to_string()).collect();
    assert_eq!(
        ledger.state.multi_sign.validate_multi_sig("alice", &both).unwrap(),
        4
    );

    let just_bob: BTreeSet<String> = ["bob"].iter().map(|s| s.to_string()).collect();
    let err = ledger
        .state
        .multi_sign
        .validate_multi_sig("alice", &just_bob)
        .unwrap_err();
    assert_eq!(err.to_string(), "Quorum not met: 2/3");
}

#[test]
fn regular_key_set_and_removed() {
    let mut ledger = Ledger::with_defaults();
    ledger.create_account("alice", 100 * NXF);

    let set_key = |id: &str, key: &str| {
        Transaction::new(
            id,
            "alice",
            FEE,
            0,
            TxPayload::SetRegularKey {
                regular_key: key.into(),
            },
        )
    };
    expect_applied(ledger.submit_transaction(&set_key("k1", "backup"), 0));
    assert_eq!(
        ledger.get_account("alice").unwrap().regular_key.as_deref(),
        Some("backup")
    );
    expect_applied(ledger.submit_transaction(&set_key("k2", ""), 1));
    assert_eq!(ledger.get_account("alice").unwrap().regular_key, None);
}

#[test]
fn trust_lines_and_iou_payment() {
    let mut ledger = Ledger::with_defaults();
    ledger.create_account("gateway", 100 * NXF);
    ledger.create_account("alice", 100 * NXF);
    ledger.create_account("bob", 100 * NXF);

    let trust = |id: &str, who: &str, limit: i64| {
        Transaction::new(
            id,
            who,
            FEE,
            0,
            TxPayload::TrustSet {
                currency: "USD".into(),
                issuer: "gateway".into(),
                limit: limit.into(),
            },
        )
    };
    expect_applied(ledger.submit_transaction(&trust("t1", "alice", 1000), 0));
    expect_applied(ledger.submit_transaction(&trust("t2", "bob", 50), 0));

    // The gateway issues 100 USD to alice.
    let issue = Transaction::new(
        "i1",
        "gateway",
        FEE,
        0,
        TxPayload::Payment {
            destination: "alice".into(),
            amount: Amount::Issued {
                currency: "USD".into(),
                issuer: "gateway".into(),
                value: 100.into(),
            },
        },
    );
    assert_eq!(expect_applied(ledger.submit_transaction(&issue, 1)), ResultCode::TesSuccess);
    assert_eq!(
        ledger
            .get_account("alice")
            .unwrap()
            .trust_line("USD", "gateway")
            .unwrap()
            .balance,
        100.into()
    );

    // alice pays bob 30 USD.
    let pay = Transaction::new(
        "p1",
        "alice",
        FEE,
        0,
        TxPayload::Payment {
            destination: "bob".into(),
            amount: Amount::Issued {
                currency: "USD".into(),
                issuer: "gateway".into(),
                value: 30.into(),
            },
        },
    );
    assert_eq!(expect_applied(ledger.submit_transaction(&pay, 2)), ResultCode::TesSuccess);

    // Paying 30 more would push bob's line over its 50 limit.
    let too_much = Transaction::new(
        "p2",
        "alice",
        FEE,
        0,
        TxPayload::Payment {
            destination: "bob".into(),
            amount: Amount::Issued {
                currency: "USD".into(),
                issuer: "gateway".into(),
                value: 30.into(),
            },
        },
    );
    assert_eq!(
        expect_applied(ledger.submit_transaction(&too_much, 3)),
        ResultCode::TecPrecondition
    );
    assert_eq!(
        ledger
            .get_account("bob")
            .unwrap()
            .trust_line("USD", "gateway")
            .unwrap()
            .balance,
        30.into()
    );
}

#[test]
fn fee_queue_defers_and_drains_on_close() {
    let mut params = LedgerParams::default();
    params.max_txn_count = 0; // nothing enters the open ledger directly
    let mut ledger = Ledger::new(params);
    ledger.create_account("alice", 100 * NXF);
    ledger.create_account("bob", 10 * NXF);

    let outcome = ledger.submit_transaction(&payment("q1", "alice", "bob", NXF), 0);
    assert!(matches!(outcome, ApplyOutcome::Queued { .. }));
    assert_eq!(ledger.balance_of("bob"), 10 * NXF);

    // The close drains the queue into the next open ledger.
    ledger.close_ledger(1);
    assert_eq!(ledger.balance_of("bob"), 11 * NXF);
}

#[test]
fn closed_ledger_headers_chain() {
    let mut ledger = Ledger::with_defaults();
    ledger.create_account("alice", 100 * NXF);
    ledger.create_account("bob", 100 * NXF);

    expect_applied(ledger.submit_transaction(&payment("t1", "alice", "bob", NXF), 5));
    let first = ledger.close_ledger(10);

    expect_applied(ledger.submit_transaction(&payment("t2", "alice", "bob", NXF), 15));
    let second = ledger.close_ledger(20);

    assert_eq!(first.sequence, 1);
    assert_eq!(second.sequence, 2);
    assert_eq!(second.parent_hash, first.state_hash);
    assert_eq!(second.state_hash, ledger.state_root());
    assert_eq!(first.tx_count, 1);
}

#[test]
fn canonical_ordering_is_stable_within_a_ledger() {
    // Two ledgers fed the same transactions in different submission order
    // end with identical state roots.
    let build = |order: &[&str]| {
        let mut ledger = Ledger::with_defaults();
        ledger.create_account("alice", 100 * NXF);
        ledger.create_account("bob", 100 * NXF);
        for id in order {
            let tx = match *id {
                "a" => payment("a", "alice", "bob", NXF),
                _ => payment("b", "bob", "alice", 2 * NXF),
            };
            expect_applied(ledger.submit_transaction(&tx, 0));
        }
        ledger.close_ledger(10);
        ledger.state_root()
    };
    assert_eq!(build(&["a", "b"]), build(&["b", "a"]));
}

#[test]
fn invariant_rolls_back_value_creation() {
    use nexaflow_execution::InvariantChecker;

    let mut ledger = Ledger::with_defaults();
    ledger.create_account("alice", 500 * NXF);
    ledger.create_account("bob", 100 * NXF);

    let mut checker = InvariantChecker::new();
    checker.capture(&ledger.state);

    // A buggy handler credits alice 100 NXF with no burn or mint.
    ledger.state.accounts.get_mut("alice").unwrap().balance += 100 * NXF;

    let err = checker
        .verify(&ledger.state, ledger.initial_supply(), &ledger.closed_ledgers)
        .unwrap_err();
    assert!(err.contains("NXF creation detected"));
    assert!(err.contains("but expected 0"));
}

#[test]
fn ticket_reserves_sequence_and_rejects_double_use() {
    let mut ledger = Ledger::with_defaults();
    ledger.create_account("alice", 100 * NXF);
    ledger.create_account("bob", 100 * NXF);

    let create = Transaction::new("tk", "alice", FEE, 0, TxPayload::TicketCreate { count: 1 });
    expect_applied(ledger.submit_transaction(&create, 0));
    let ticket_id = format!("alice:{}", ledger.get_account("alice").unwrap().sequence - 1);
    assert!(ledger.state.tickets.has_ticket(&ticket_id));

    // A payment rides the ticket instead of a sequence number.
    let mut tx = payment("tp", "alice", "bob", NXF);
    tx.ticket_id = Some(ticket_id.clone());
    assert_eq!(expect_applied(ledger.submit_transaction(&tx, 1)), ResultCode::TesSuccess);
    assert!(!ledger.state.tickets.has_ticket(&ticket_id));

    // The consumed ticket cannot be ridden again.
    let mut again = payment("tp2", "alice", "bob", NXF);
    again.ticket_id = Some(ticket_id);
    assert_eq!(
        expect_applied(ledger.submit_transaction(&again, 2)),
        ResultCode::TecPrecondition
    );
}

#[test]
fn check_create_cash_lifecycle() {
    let mut ledger = Ledger::with_defaults();
    ledger.create_account("alice", 100 * NXF);
    ledger.create_account("bob", 100 * NXF);

    let create = Transaction::new(
        "chk1",
        "alice",
        FEE,
        0,
        TxPayload::CheckCreate {
            destination: "bob".into(),
            send_max: Amount::Drops(20 * NXF),
            expiration: 0,
        },
    );
    expect_applied(ledger.submit_transaction(&create, 0));

    // Only the destination can cash.
    let cash_by_stranger = Transaction::new(
        "cc0",
        "alice",
        FEE,
        0,
        TxPayload::CheckCash {
            check_id: "chk1".into(),
            amount: None,
            deliver_min: None,
        },
    );
    assert_eq!(
        expect_applied(ledger.submit_transaction(&cash_by_stranger, 1)),
        ResultCode::TecNoPermission
    );

    let cash = Transaction::new(
        "cc1",
        "bob",
        FEE,
        0,
        TxPayload::CheckCash {
            check_id: "chk1".into(),
            amount: Some(Amount::Drops(15 * NXF)),
            deliver_min: None,
        },
    );
    let bob_before = ledger.balance_of("bob");
    assert_eq!(expect_applied(ledger.submit_transaction(&cash, 2)), ResultCode::TesSuccess);
    assert_eq!(ledger.balance_of("bob"), bob_before + 15 * NXF - FEE);
    assert!(ledger.state.checks.get_check("chk1").unwrap().cashed);
}

#[test]
fn account_delete_sweeps_remainder() {
    let mut ledger = Ledger::with_defaults();
    ledger.create_account("alice", 100 * NXF);
    ledger.create_account("bob", 100 * NXF);
    ledger.state.accounts.get_mut("alice").unwrap().sequence = 300;

    let delete = Transaction::new(
        "d1",
        "alice",
        FEE,
        0,
        TxPayload::AccountDelete {
            destination: "bob".into(),
        },
    );
    assert_eq!(expect_applied(ledger.submit_transaction(&delete, 0)), ResultCode::TesSuccess);
    assert!(ledger.get_account("alice").is_none());
    assert_eq!(ledger.balance_of("bob"), 200 * NXF - FEE);
}

#[test]
fn owner_directory_matches_owner_count_and_rebuild() {
    let mut ledger = Ledger::with_defaults();
    ledger.create_account("alice", 500 * NXF);
    ledger.create_account("bob", 100 * NXF);

    let escrow = Transaction::new(
        "e1",
        "alice",
        FEE,
        0,
        TxPayload::EscrowCreate {
            destination: "bob".into(),
            amount: 10 * NXF,
            condition: String::new(),
            finish_after: 0,
            cancel_after: 0,
        },
    );
    expect_applied(ledger.submit_transaction(&escrow, 0));
    let check = Transaction::new(
        "c1",
        "alice",
        FEE,
        0,
        TxPayload::CheckCreate {
            destination: "bob".into(),
            send_max: Amount::Drops(NXF),
            expiration: 0,
        },
    );
    expect_applied(ledger.submit_transaction(&check, 0));

    let account = ledger.get_account("alice").unwrap();
    assert_eq!(account.owner_count, 2);
    assert_eq!(ledger.state.directories.owner_count("alice"), 2);

    // A rebuild from the managers reproduces the same directories.
    ledger.rebuild_directories();
    assert_eq!(ledger.state.directories.owner_count("alice"), 2);
    assert_eq!(ledger.get_account("alice").unwrap().owner_count, 2);
}

#[test]
fn hook_rejection_claims_fee_without_state_change() {
    use nexaflow_services::hooks::{HookPhase, HOOK_ON_ALL};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    let mut ledger = Ledger::with_defaults();
    ledger.create_account("alice", 100 * NXF);
    ledger.create_account("bob", 100 * NXF);

    let hash = ledger
        .state
        .hooks
        .register_definition(
            "alice",
            "firewall",
            Some(Arc::new(|ctx| ctx.reject("payments blocked", 42))),
            "",
            "ns",
            BTreeMap::new(),
            HOOK_ON_ALL,
            Vec::new(),
        )
        .unwrap();
    ledger
        .state
        .hooks
        .set_hook("alice", 0, &hash, BTreeMap::new(), HookPhase::Before)
        .unwrap();

    let bob_before = ledger.balance_of("bob");
    let code = expect_applied(ledger.submit_transaction(&payment("h1", "alice", "bob", NXF), 0));
    assert_eq!(code, ResultCode::TecHookRejected);

    // Fee charged, payment not delivered, execution recorded.
    assert_eq!(ledger.balance_of("bob"), bob_before);
    assert_eq!(ledger.balance_of("alice"), 100 * NXF - FEE);
    assert_eq!(ledger.state.hooks.executions.len(), 1);
    assert_eq!(ledger.state.hooks.executions[0].return_code, 42);
}

#[test]
fn stake_and_unstake_move_value_through_the_pool() {
    let mut ledger = Ledger::with_defaults();
    ledger.create_account("alice", 100 * NXF);

    let stake = Transaction::new("s1", "alice", FEE, 0, TxPayload::Stake { amount: 20 * NXF });
    assert_eq!(expect_applied(ledger.submit_transaction(&stake, 0)), ResultCode::TesSuccess);
    assert_eq!(ledger.state.staking.total_staked, 20 * NXF);
    assert_eq!(ledger.balance_of("alice"), 80 * NXF - FEE);

    // Below the minimum is rejected outright by the validator.
    let low = Transaction::new("s2", "alice", FEE, 0, TxPayload::Stake { amount: NXF });
    assert!(matches!(
        ledger.submit_transaction(&low, 1),
        ApplyOutcome::Rejected {
            code: ResultCode::TecUnfunded,
            ..
        }
    ));

    let unstake = Transaction::new("u1", "alice", FEE, 0, TxPayload::Unstake { amount: 20 * NXF });
    assert_eq!(expect_applied(ledger.submit_transaction(&unstake, 2)), ResultCode::TesSuccess);
    assert_eq!(ledger.state.staking.total_staked, 0);
    assert_eq!(ledger.balance_of("alice"), 100 * NXF - 2 * FEE);
}

#[test]
fn path_finding_over_ledger_trust_lines() {
    let mut ledger = Ledger::with_defaults();
    ledger.create_account("gateway", 100 * NXF);
    ledger.create_account("alice", 100 * NXF);
    ledger.create_account("bob", 100 * NXF);

    // Native: one direct path as long as the source is funded.
    let native = ledger.find_payment_paths("alice", "bob", "NXF", 50 * NXF);
    assert_eq!(native.len(), 1);
    assert_eq!(native[0].hop_count(), 2);
    assert!(ledger
        .find_payment_paths("alice", "bob", "NXF", 200 * NXF)
        .is_empty());

    // Issued: bob trusts alice for USD, so alice can reach him directly.
    let trust = Transaction::new(
        "t1",
        "bob",
        FEE,
        0,
        TxPayload::TrustSet {
            currency: "USD".into(),
            issuer: "alice".into(),
            limit: 40.into(),
        },
    );
    expect_applied(ledger.submit_transaction(&trust, 0));
    let paths = ledger.find_payment_paths("alice", "bob", "USD", 0);
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].max_amount, 40.into());
}

#[test]
fn merkle_proof_follows_account_mutation() {
    use nexaflow_state::keylet;

    let mut ledger = Ledger::with_defaults();
    ledger.create_account("alice", 100 * NXF);
    ledger.create_account("bob", 100 * NXF);

    let key = keylet::account_keylet("alice");
    let proof = ledger.prove(&key).unwrap();
    assert!(proof.verify());
    assert!(proof.leaf_data.is_some());

    expect_applied(ledger.submit_transaction(&payment("m1", "alice", "bob", NXF), 0));

    // The old proof no longer anchors to the new root.
    let stale = nexaflow_state::shamap::MerkleProof {
        root_hash: ledger.state_root(),
        ..proof
    };
    assert!(!stale.verify());
    let fresh = ledger.prove(&key).unwrap();
    assert!(fresh.verify());
}
