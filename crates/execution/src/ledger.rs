// Path: crates/execution/src/ledger.rs

//! The ledger aggregate and the transaction apply pipeline.
//!
//! `Ledger` owns every domain manager, the fee engine and the SHAMap, and
//! is the single writer: transactions apply one at a time, in canonical
//! order within a ledger, synchronously to completion or rollback. External
//! readers receive clones or snapshots; nothing here is shared mutably.
//!
//! The pipeline for one transaction:
//!
//! ```text
//! validator → fee engine (accept | queue | reject) → metadata snapshot
//!   → before-hooks → domain handler → invariant check
//!   → commit or rollback → metadata finalize → SHAMap refresh
//! ```
//!
//! Rollback is checkpoint/restore: the domain state is cloned before the
//! handler runs and restored wholesale if the handler or an invariant
//! fails, after which only the fee charge is re-applied.

use crate::invariants::InvariantChecker;
use crate::metadata::{MetadataBuilder, TransactionMetadata};
use nexaflow_services::amendments::AmendmentManager;
use nexaflow_services::check::CheckManager;
use nexaflow_services::credentials::CredentialManager;
use nexaflow_services::did::DidManager;
use nexaflow_services::directory::{DirectoryManager, ObjectType};
use nexaflow_services::escrow::EscrowManager;
use nexaflow_services::hooks::{HookPhase, HooksManager};
use nexaflow_services::mpt::MptManager;
use nexaflow_services::multi_sign::MultiSignManager;
use nexaflow_services::negative_unl::NegativeUnl;
use nexaflow_services::nftoken::NfTokenManager;
use nexaflow_services::offers::OfferBook;
use nexaflow_services::oracle::OracleManager;
use nexaflow_services::path::{PathFinder, PaymentPath};
use nexaflow_services::payment_channel::PaymentChannelManager;
use nexaflow_services::staking::StakePool;
use nexaflow_services::ticket::TicketManager;
use nexaflow_services::trust_graph::TrustGraph;
use nexaflow_services::xchain::XChainManager;
use nexaflow_state::keylet::{self, LedgerSpace};
use nexaflow_state::shamap::{MerkleProof, SHAMap};
use nexaflow_tx::fees::FeeModel;
use nexaflow_tx::queue::{FeeEscalation, SubmitOutcome};
use nexaflow_tx::validation::{LedgerReader, TransactionValidator};
use nexaflow_crypto::Hash256;
use nexaflow_types::app::{
    AccountRoot, Address, Drops, LedgerHeader, ResultCode, Transaction, TxPayload,
};
use nexaflow_types::codec;
use nexaflow_types::config::LedgerParams;
use nexaflow_types::error::TransactionError;
use std::collections::{BTreeMap, BTreeSet};

/// Every piece of domain state a transaction can touch.
///
/// Cloneable as a unit: the apply pipeline checkpoints it before a handler
/// runs and restores it on failure.
#[derive(Debug, Clone)]
pub struct LedgerState {
    /// All funded accounts.
    pub accounts: BTreeMap<Address, AccountRoot>,
    /// Escrow entries.
    pub escrows: EscrowManager,
    /// Payment channels.
    pub channels: PaymentChannelManager,
    /// Checks.
    pub checks: CheckManager,
    /// Sequence-reservation tickets.
    pub tickets: TicketManager,
    /// NFTokens and their offers.
    pub nftokens: NfTokenManager,
    /// Multi-purpose token issuances and holdings.
    pub mpt: MptManager,
    /// DID documents.
    pub dids: DidManager,
    /// On-ledger credentials.
    pub credentials: CredentialManager,
    /// Price oracles.
    pub oracles: OracleManager,
    /// Cross-chain bridges.
    pub xchain: XChainManager,
    /// Hooks.
    pub hooks: HooksManager,
    /// Regular keys and signer lists.
    pub multi_sign: MultiSignManager,
    /// Amendment voting.
    pub amendments: AmendmentManager,
    /// The negative UNL.
    pub negative_unl: NegativeUnl,
    /// The staking pool.
    pub staking: StakePool,
    /// DEX offers.
    pub offers: OfferBook,
    /// Owner and offer directories.
    pub directories: DirectoryManager,
    /// The registered validator set.
    pub validators: BTreeSet<Address>,
    /// Current total supply in drops.
    pub total_supply: Drops,
    /// Cumulative drops burned (fees).
    pub total_burned: Drops,
    /// Cumulative drops minted (staking rewards).
    pub total_minted: Drops,
}

impl LedgerState {
    /// Fresh domain state for the given parameters.
    pub fn new(params: &LedgerParams) -> Self {
        Self {
            accounts: BTreeMap::new(),
            escrows: EscrowManager::default(),
            channels: PaymentChannelManager::default(),
            checks: CheckManager::default(),
            tickets: TicketManager::default(),
            nftokens: NfTokenManager::default(),
            mpt: MptManager::default(),
            dids: DidManager::default(),
            credentials: CredentialManager::default(),
            oracles: OracleManager::default(),
            xchain: XChainManager::new(params.min_witnesses),
            hooks: HooksManager::default(),
            multi_sign: MultiSignManager::default(),
            amendments: AmendmentManager::new(
                params.amendment_voting_period_secs,
                params.amendment_threshold,
            ),
            negative_unl: NegativeUnl::new(
                params.miss_threshold,
                params.max_negative_unl_fraction,
                params.nunl_readd_cooldown_secs,
            ),
            staking: StakePool::new(params.min_stake_drops),
            offers: OfferBook::default(),
            directories: DirectoryManager::default(),
            validators: BTreeSet::new(),
            total_supply: params.initial_supply_drops,
            total_burned: 0,
            total_minted: 0,
        }
    }
}

impl LedgerReader for LedgerState {
    fn account(&self, address: &str) -> Option<&AccountRoot> {
        self.accounts.get(address)
    }
    fn min_stake(&self) -> Drops {
        self.staking.min_stake()
    }
}

/// The outcome of submitting a transaction.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    /// The transaction was applied (successfully or with a claimed-fee
    /// failure) and recorded.
    Applied {
        /// The recorded result code.
        code: ResultCode,
        /// The transaction's metadata record.
        metadata: TransactionMetadata,
    },
    /// Held in the fee queue for a later ledger.
    Queued {
        /// Queue position (0 = next out).
        position: usize,
    },
    /// Rejected without any ledger effect; no fee charged.
    Rejected {
        /// The deterministic rejection code.
        code: ResultCode,
        /// Advisory human-readable message.
        message: String,
    },
}

/// The deterministic ledger state machine.
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Network parameters.
    pub params: LedgerParams,
    /// The mutable domain state.
    pub state: LedgerState,
    /// Reserve and load-factor model.
    pub fee_model: FeeModel,
    /// Open-ledger escalation and the transaction queue.
    pub fee_queue: FeeEscalation,
    /// Headers of all closed ledgers, oldest first.
    pub closed_ledgers: Vec<LedgerHeader>,
    state_map: SHAMap,
    open_txs: Vec<(Transaction, TransactionMetadata)>,
    pending_queue: BTreeMap<String, Transaction>,
    initial_supply: Drops,
}

impl Ledger {
    /// A fresh ledger with the given parameters.
    pub fn new(params: LedgerParams) -> Self {
        Self {
            state: LedgerState::new(&params),
            fee_model: FeeModel::new(&params),
            fee_queue: FeeEscalation::new(&params),
            closed_ledgers: Vec::new(),
            state_map: SHAMap::new(),
            open_txs: Vec::new(),
            pending_queue: BTreeMap::new(),
            initial_supply: params.initial_supply_drops,
            params,
        }
    }

    /// A ledger with the default parameters.
    pub fn with_defaults() -> Self {
        Self::new(LedgerParams::default())
    }

    /// The genesis supply in drops.
    pub fn initial_supply(&self) -> Drops {
        self.initial_supply
    }

    /// Fund a new account from the genesis distribution. Not a transaction;
    /// used at network bootstrap and in tests.
    pub fn create_account(&mut self, address: &str, balance: Drops) -> &AccountRoot {
        let account = AccountRoot::new(address, balance);
        let leaf = codec::to_bytes_canonical(&account).unwrap_or_default();
        let _ = self
            .state_map
            .insert(&keylet::account_keylet(address), leaf, LedgerSpace::Account as u8);
        self.state.accounts.insert(address.to_owned(), account);
        &self.state.accounts[address]
    }

    /// Look up an account.
    pub fn get_account(&self, address: &str) -> Option<&AccountRoot> {
        self.state.accounts.get(address)
    }

    /// An account's native balance in drops (0 when absent).
    pub fn balance_of(&self, address: &str) -> Drops {
        self.state
            .accounts
            .get(address)
            .map(|a| a.balance)
            .unwrap_or(0)
    }

    /// Register a consensus validator.
    pub fn register_validator(&mut self, validator_id: &str) {
        self.state.validators.insert(validator_id.to_owned());
    }

    /// The current SHAMap root hash over all ledger state.
    pub fn state_root(&self) -> Hash256 {
        self.state_map.root_hash()
    }

    /// A Merkle proof for a keylet against the current state root.
    pub fn prove(&self, key: &Hash256) -> Option<MerkleProof> {
        self.state_map.get_proof(key).ok()
    }

    /// Number of leaves in the state map.
    pub fn state_size(&self) -> usize {
        self.state_map.size()
    }

    /// Transactions applied to the current open ledger.
    pub fn open_tx_count(&self) -> usize {
        self.open_txs.len()
    }

    /// Find payment paths from `source` to `destination`: the direct path
    /// for native payments, a BFS over the trust graph for issued
    /// currencies.
    pub fn find_payment_paths(
        &self,
        source: &str,
        destination: &str,
        currency: &str,
        amount: Drops,
    ) -> Vec<PaymentPath> {
        let mut graph = TrustGraph::default();
        graph.build_from_accounts(self.state.accounts.values());
        let finder = PathFinder::new(&graph);
        if currency == nexaflow_types::app::NATIVE_CURRENCY {
            finder.find_native_path(source, destination, amount, self.balance_of(source))
        } else {
            finder.find_iou_paths(source, destination, currency)
        }
    }

    // ── Submission ──────────────────────────────────────────────

    /// Submit a transaction: validate, pass the fee gate, then apply.
    pub fn submit_transaction(&mut self, tx: &Transaction, now: u64) -> ApplyOutcome {
        let validation = {
            let validator = TransactionValidator::new(&self.state, &self.fee_model);
            validator.validate(tx)
        };
        if let Err(err) = validation {
            log::debug!("tx {} rejected by validator: {}", tx.id, err);
            return ApplyOutcome::Rejected {
                code: err.result_code(),
                message: err.to_string(),
            };
        }

        match self
            .fee_queue
            .submit(&tx.id, &tx.account, tx.sequence, tx.fee, now, &self.fee_model)
        {
            SubmitOutcome::Applied => {}
            SubmitOutcome::Queued(position) => {
                self.pending_queue.insert(tx.id.clone(), tx.clone());
                return ApplyOutcome::Queued { position };
            }
            SubmitOutcome::Rejected(err) => {
                return ApplyOutcome::Rejected {
                    code: err.result_code(),
                    message: err.to_string(),
                };
            }
        }

        let (code, metadata) = self.apply(tx, now);
        ApplyOutcome::Applied { code, metadata }
    }

    /// Apply a transaction that has passed validation and the fee gate.
    pub(crate) fn apply(&mut self, tx: &Transaction, now: u64) -> (ResultCode, TransactionMetadata) {
        let span = tracing::debug_span!("apply", tx = %tx.id, tx_type = ?tx.tx_type());
        let _guard = span.enter();

        let tx_index = self.open_txs.len() as u32;
        let mut builder = MetadataBuilder::new(&tx.id, tx_index);

        let touched = self.touched_accounts(tx);
        for address in &touched {
            if let Some(account) = self.state.accounts.get(address) {
                builder.snapshot_account(account);
            }
        }

        let mut checker = InvariantChecker::new();
        checker.capture(&self.state);
        let checkpoint = self.state.clone();

        if let Err(err) = charge_fee_and_sequence(&mut self.state, tx) {
            // Ticket problems and the like still claim the fee; restore the
            // state and burn the fee through the plain sequence path.
            self.state = checkpoint;
            if err.result_code().claims_fee() {
                charge_fee_only(&mut self.state, tx);
            }
            return self.finalize_failure(tx, builder, err);
        }

        // Before-hooks on the sending account.
        let (hooks_ok, _) = self
            .state
            .hooks
            .execute_hooks(&tx.account, tx, HookPhase::Before);
        if !hooks_ok {
            self.rollback_keeping_fee(tx, &checkpoint);
            return self.finalize_failure(
                tx,
                builder,
                TransactionError::HookRejected("before-hook rejected transaction".into()),
            );
        }

        if let Err(err) = self.dispatch(tx, now, &mut builder) {
            if err.result_code().claims_fee() {
                self.rollback_keeping_fee(tx, &checkpoint);
            } else {
                self.state = checkpoint;
            }
            builder.discard_changes();
            return self.finalize_failure(tx, builder, err);
        }

        if let Err(reasons) = checker.verify(&self.state, self.initial_supply, &self.closed_ledgers)
        {
            log::error!("tx {} violated invariants: {}", tx.id, reasons);
            self.rollback_keeping_fee(tx, &checkpoint);
            builder.discard_changes();
            return self.finalize_failure(tx, builder, TransactionError::Invariant(reasons));
        }

        // After-hooks observe the committed state; a reject still undoes
        // the transaction.
        let (after_ok, _) = self
            .state
            .hooks
            .execute_hooks(&tx.account, tx, HookPhase::After);
        if !after_ok {
            self.rollback_keeping_fee(tx, &checkpoint);
            builder.discard_changes();
            return self.finalize_failure(
                tx,
                builder,
                TransactionError::HookRejected("after-hook rejected transaction".into()),
            );
        }

        for address in builder.snapshot_addresses() {
            if let Some(account) = self.state.accounts.get(&address) {
                builder.record_account_modify(account);
            }
        }
        builder.set_result(ResultCode::TesSuccess);
        let metadata = builder.build();

        self.sync_affected(&metadata);
        self.fee_model.record_transaction(tx.fee);
        self.open_txs.push((tx.clone(), metadata.clone()));
        (ResultCode::TesSuccess, metadata)
    }

    /// Restore the checkpoint but keep the fee charge, the sequence bump
    /// and the hook execution log.
    fn rollback_keeping_fee(&mut self, tx: &Transaction, checkpoint: &LedgerState) {
        let executions = self.state.hooks.executions.clone();
        self.state = checkpoint.clone();
        self.state.hooks.executions = executions;
        let _ = charge_fee_and_sequence(&mut self.state, tx);
    }

    /// Record a claimed-fee failure: metadata with the failure code and the
    /// fee-only balance delta, synced into the SHAMap.
    fn finalize_failure(
        &mut self,
        tx: &Transaction,
        mut builder: MetadataBuilder,
        err: TransactionError,
    ) -> (ResultCode, TransactionMetadata) {
        let code = err.result_code();
        log::info!("tx {} failed: {} ({})", tx.id, err, code.name());
        if let Some(account) = self.state.accounts.get(&tx.account) {
            builder.record_account_modify(account);
        }
        builder.set_result(code);
        let metadata = builder.build();
        self.sync_affected(&metadata);
        if code.claims_fee() {
            self.fee_model.record_transaction(tx.fee);
            self.open_txs.push((tx.clone(), metadata.clone()));
        }
        (code, metadata)
    }

    // ── Ledger close ────────────────────────────────────────────

    /// Close the open ledger: canonically order and seal its transactions
    /// into a header, update the fee schedule, process amendment voting and
    /// the negative UNL, then drain the queue into the next open ledger.
    pub fn close_ledger(&mut self, now: u64) -> LedgerHeader {
        // Canonical order: (tx_type, account, sequence, tx_id).
        self.open_txs
            .sort_by_key(|(tx, _)| tx.canonical_key());
        for (index, (_, metadata)) in self.open_txs.iter_mut().enumerate() {
            metadata.tx_index = index as u32;
        }

        let sequence = self.closed_ledgers.len() as u64 + 1;
        let parent_hash = self
            .closed_ledgers
            .last()
            .map(|header| header.state_hash)
            .unwrap_or([0u8; 32]);
        let header = LedgerHeader {
            sequence,
            parent_hash,
            state_hash: self.state_map.root_hash(),
            close_time: now,
            tx_count: self.open_txs.len() as u32,
        };
        log::info!(
            "ledger {} closed with {} transactions, root {}",
            sequence,
            header.tx_count,
            hex::encode(header.state_hash)
        );
        self.closed_ledgers.push(header.clone());
        self.open_txs.clear();

        self.fee_model.on_ledger_close();

        let validator_count = self.state.validators.len();
        if validator_count > 0 {
            self.state
                .amendments
                .process_voting_round(validator_count, now);
            self.state
                .negative_unl
                .check_and_update(validator_count, sequence, now);
        }

        // Drain the queue into the next open ledger, fee-descending.
        // Entries are re-validated against the post-close state; stale ones
        // (consumed sequence, drained balance) are dropped.
        let drained = self.fee_queue.on_ledger_close(now);
        for queued in drained {
            if let Some(tx) = self.pending_queue.remove(&queued.tx_id) {
                let still_valid = {
                    let validator = TransactionValidator::new(&self.state, &self.fee_model);
                    validator.validate(&tx)
                };
                match still_valid {
                    Ok(()) => {
                        self.apply(&tx, now);
                    }
                    Err(err) => {
                        log::debug!("queued tx {} dropped at drain: {}", tx.id, err);
                    }
                }
            }
        }

        header
    }

    /// Rebuild every owner directory from the managers, then reset each
    /// account's owner count from its directory. Used on recovery.
    pub fn rebuild_directories(&mut self) {
        let state = &mut self.state;
        state.directories.clear();

        for (address, account) in &state.accounts {
            for (currency, issuer) in account.trust_lines.keys() {
                state.directories.add_owned_object(
                    address,
                    &format!("{}:{}:{}", address, currency, issuer),
                    ObjectType::TrustLine,
                );
            }
            if state.multi_sign.get_signer_list(address).is_some() {
                state
                    .directories
                    .add_owned_object(address, address, ObjectType::SignerList);
            }
        }
        for (escrow_id, escrow) in &state.escrows.escrows {
            if !escrow.finished && !escrow.cancelled {
                state
                    .directories
                    .add_owned_object(&escrow.account, escrow_id, ObjectType::Escrow);
            }
        }
        for (channel_id, channel) in &state.channels.channels {
            if !channel.closed {
                state.directories.add_owned_object(
                    &channel.account,
                    channel_id,
                    ObjectType::PaymentChannel,
                );
            }
        }
        for (check_id, check) in &state.checks.checks {
            if !check.cashed && !check.cancelled {
                state
                    .directories
                    .add_owned_object(&check.account, check_id, ObjectType::Check);
            }
        }
        for (ticket_id, ticket) in &state.tickets.tickets {
            if !ticket.used {
                state
                    .directories
                    .add_owned_object(&ticket.account, ticket_id, ObjectType::Ticket);
            }
        }
        for (token_id, token) in &state.nftokens.tokens {
            if !token.burned {
                state
                    .directories
                    .add_owned_object(&token.owner, token_id, ObjectType::Nftoken);
            }
        }
        for (offer_id, offer) in &state.nftokens.offers {
            if !offer.accepted && !offer.cancelled {
                state
                    .directories
                    .add_owned_object(&offer.owner, offer_id, ObjectType::NftokenOffer);
            }
        }
        for (offer_id, offer) in &state.offers.offers {
            state
                .directories
                .add_owned_object(&offer.owner, offer_id, ObjectType::Offer);
            state
                .directories
                .offer_dir_mut(&offer.pair())
                .add_offer(offer_id);
        }
        for (account, _) in state.dids.dids.iter() {
            state
                .directories
                .add_owned_object(account, &format!("did:{}", account), ObjectType::Did);
        }
        for (credential_id, credential) in &state.credentials.credentials {
            state.directories.add_owned_object(
                &credential.issuer,
                credential_id,
                ObjectType::Credential,
            );
        }
        for (oracle_id, oracle) in &state.oracles.oracles {
            state
                .directories
                .add_owned_object(&oracle.owner, oracle_id, ObjectType::Oracle);
        }

        for (address, account) in &mut state.accounts {
            account.owner_count = state.directories.owner_count(address) as u32;
        }
    }

    // ── SHAMap synchronization ──────────────────────────────────

    /// Re-serialize every node a transaction touched into the state map.
    fn sync_affected(&mut self, metadata: &TransactionMetadata) {
        for node in &metadata.affected_nodes {
            let Some(key) = self.keylet_for(&node.ledger_entry_type, &node.ledger_index) else {
                continue;
            };
            match node.action {
                crate::metadata::NodeAction::Deleted => {
                    let _ = self.state_map.remove(&key);
                }
                _ => {
                    if let Some((bytes, space)) =
                        self.leaf_bytes_for(&node.ledger_entry_type, &node.ledger_index)
                    {
                        let _ = self.state_map.insert(&key, bytes, space);
                    }
                }
            }
        }
        // Balance-only touches (fee charges) also move the root.
        for change in &metadata.balance_changes {
            if let Some(account) = self.state.accounts.get(&change.account) {
                if let Ok(bytes) = codec::to_bytes_canonical(account) {
                    let _ = self.state_map.insert(
                        &keylet::account_keylet(&change.account),
                        bytes,
                        LedgerSpace::Account as u8,
                    );
                }
            }
        }
    }

    fn keylet_for(&self, entry_type: &str, index: &str) -> Option<Hash256> {
        match entry_type {
            "AccountRoot" => Some(keylet::account_keylet(index)),
            "TrustLine" => {
                let mut parts = index.splitn(3, ':');
                let holder = parts.next()?;
                let currency = parts.next()?;
                let issuer = parts.next()?;
                Some(keylet::trust_line_keylet(holder, currency, issuer))
            }
            "Escrow" => {
                let escrow = self.state.escrows.get_escrow(index)?;
                Some(keylet::escrow_keylet(&escrow.account, index))
            }
            "PayChannel" => Some(keylet::pay_channel_keylet(index)),
            "Check" => Some(keylet::check_keylet(index)),
            "Ticket" => {
                let (account, seq) = index.rsplit_once(':')?;
                Some(keylet::ticket_keylet(account, seq.parse().ok()?))
            }
            "NFToken" => Some(keylet::nftoken_keylet(index)),
            "NFTokenOffer" => Some(keylet::nftoken_offer_keylet(index)),
            "Offer" => {
                let (owner, seq) = index.rsplit_once(':')?;
                Some(keylet::offer_keylet(owner, seq.parse().ok()?))
            }
            "SignerList" => Some(keylet::signer_list_keylet(index)),
            "DID" => Some(keylet::did_keylet(index.strip_prefix("did:").unwrap_or(index))),
            "Credential" => Some(keylet::credential_keylet(index)),
            "Oracle" => {
                let (owner, doc) = index.rsplit_once(':')?;
                Some(keylet::oracle_keylet(owner, doc.parse().ok()?))
            }
            "MPTIssuance" => Some(keylet::mpt_keylet(index)),
            "MPTHolder" => {
                let (issuance, account) = index.split_once(':')?;
                Some(keylet::compute_keylet(
                    LedgerSpace::Mpt,
                    &[issuance.as_bytes(), account.as_bytes()],
                ))
            }
            "Bridge" => Some(keylet::bridge_keylet(index)),
            "XChainClaim" => {
                let (bridge, claim) = index.rsplit_once(':')?;
                let claim: u64 = claim.parse().ok()?;
                Some(keylet::compute_keylet(
                    LedgerSpace::Bridge,
                    &[bridge.as_bytes(), &claim.to_be_bytes()],
                ))
            }
            "Hook" => {
                let (account, position) = index.rsplit_once(':')?;
                Some(keylet::hook_keylet(account, position.parse().ok()?))
            }
            "Amendment" => Some(keylet::amendment_keylet(index)),
            "NegativeUNL" => Some(keylet::negative_unl_keylet(index)),
            "Stake" => Some(keylet::compute_keylet(
                LedgerSpace::Fee,
                &[b"stake".as_slice(), index.as_bytes()],
            )),
            _ => None,
        }
    }

    fn leaf_bytes_for(&self, entry_type: &str, index: &str) -> Option<(Vec<u8>, u8)> {
        let state = &self.state;
        match entry_type {
            "AccountRoot" => encoded(state.accounts.get(index)?, LedgerSpace::Account),
            "TrustLine" => {
                let mut parts = index.splitn(3, ':');
                let holder = parts.next()?;
                let currency = parts.next()?;
                let issuer = parts.next()?;
                let line = state.accounts.get(holder)?.trust_line(currency, issuer)?;
                encoded(line, LedgerSpace::TrustLine)
            }
            "Escrow" => encoded(state.escrows.get_escrow(index)?, LedgerSpace::Escrow),
            "PayChannel" => encoded(state.channels.get_channel(index)?, LedgerSpace::PayChannel),
            "Check" => encoded(state.checks.get_check(index)?, LedgerSpace::Check),
            "Ticket" => encoded(state.tickets.tickets.get(index)?, LedgerSpace::Ticket),
            "NFToken" => encoded(state.nftokens.get_token(index)?, LedgerSpace::Nftoken),
            "NFTokenOffer" => {
                encoded(state.nftokens.offers.get(index)?, LedgerSpace::NftokenOffer)
            }
            "Offer" => encoded(state.offers.get_offer(index)?, LedgerSpace::Offer),
            "SignerList" => {
                encoded(state.multi_sign.get_signer_list(index)?, LedgerSpace::SignerList)
            }
            "DID" => {
                let account = index.strip_prefix("did:").unwrap_or(index);
                encoded(state.dids.get_did(account)?, LedgerSpace::Did)
            }
            "Credential" => {
                encoded(state.credentials.get_credential(index)?, LedgerSpace::Credential)
            }
            "Oracle" => {
                let (owner, doc) = index.rsplit_once(':')?;
                encoded(
                    state.oracles.get_oracle(owner, doc.parse().ok()?)?,
                    LedgerSpace::Oracle,
                )
            }
            "MPTIssuance" => encoded(state.mpt.get_issuance(index)?, LedgerSpace::Mpt),
            "MPTHolder" => {
                let (issuance, account) = index.split_once(':')?;
                encoded(state.mpt.get_holder(issuance, account)?, LedgerSpace::Mpt)
            }
            "Bridge" => encoded(state.xchain.get_bridge(index)?, LedgerSpace::Bridge),
            "XChainClaim" => {
                let (bridge, claim) = index.rsplit_once(':')?;
                encoded(
                    state.xchain.get_claim(bridge, claim.parse().ok()?)?,
                    LedgerSpace::Bridge,
                )
            }
            "Hook" => {
                let (account, position) = index.rsplit_once(':')?;
                let position: usize = position.parse().ok()?;
                let hook = state
                    .hooks
                    .get_hooks(account)
                    .into_iter()
                    .find(|h| h.position as usize == position)?;
                encoded(hook, LedgerSpace::Hook)
            }
            "Amendment" => {
                encoded(state.amendments.amendments.get(index)?, LedgerSpace::Amendment)
            }
            "NegativeUNL" => {
                encoded(state.negative_unl.entries.get(index)?, LedgerSpace::NegativeUnl)
            }
            "Stake" => encoded(state.staking.stakes.get(index)?, LedgerSpace::Fee),
            _ => None,
        }
    }
}

fn encoded<T: serde::Serialize>(value: &T, space: LedgerSpace) -> Option<(Vec<u8>, u8)> {
    codec::to_bytes_canonical(value).ok().map(|bytes| (bytes, space as u8))
}

/// Burn the fee and bump the sequence, ignoring any ticket. Fallback for
/// failures inside the ticketed charge path.
fn charge_fee_only(state: &mut LedgerState, tx: &Transaction) {
    if let Some(account) = state.accounts.get_mut(&tx.account) {
        if account.balance >= tx.fee {
            account.balance -= tx.fee;
            account.sequence += 1;
            state.total_burned += tx.fee;
            state.total_supply -= tx.fee;
        }
    }
}

/// Burn the fee and consume the sequence number (or ticket).
pub(crate) fn charge_fee_and_sequence(
    state: &mut LedgerState,
    tx: &Transaction,
) -> Result<(), TransactionError> {
    if let Some(ticket_id) = &tx.ticket_id {
        state.tickets.use_ticket(ticket_id)?;
        let ticket_owner = tx.account.clone();
        state.directories.remove_owned_object(&ticket_owner, ticket_id);
        if let Some(account) = state.accounts.get_mut(&ticket_owner) {
            account.owner_count = account.owner_count.saturating_sub(1);
        }
    }

    let account = state
        .accounts
        .get_mut(&tx.account)
        .ok_or_else(|| TransactionError::AccountNotFound(tx.account.clone()))?;
    if account.balance < tx.fee {
        return Err(TransactionError::Unfunded("Cannot cover fee".into()));
    }
    account.balance -= tx.fee;
    if tx.ticket_id.is_none() {
        account.sequence += 1;
    }
    state.total_burned += tx.fee;
    state.total_supply -= tx.fee;
    Ok(())
}
