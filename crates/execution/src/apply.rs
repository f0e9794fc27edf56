// Path: crates/execution/src/apply.rs

//! Per-type transaction handlers.
//!
//! `dispatch` hands each payload variant to its domain handler with an
//! immutable view of the envelope and a mutable working state. Handlers
//! record every created, modified and deleted node into the metadata
//! builder; account balance deltas are derived from builder snapshots by
//! the pipeline.

use crate::ledger::{Ledger, LedgerState};
use crate::metadata::MetadataBuilder;
use nexaflow_services::directory::ObjectType;
use nexaflow_services::hooks::HookPhase;
use nexaflow_services::multi_sign::SignerEntry;
use nexaflow_types::app::{
    AccountRoot, Address, Amount, Drops, Transaction, TxPayload,
};
use nexaflow_types::error::TransactionError;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::BTreeMap;

type Fields = BTreeMap<String, serde_json::Value>;

fn field(name: &str, value: serde_json::Value) -> Fields {
    let mut fields = BTreeMap::new();
    fields.insert(name.to_owned(), value);
    fields
}

fn trust_line_index(holder: &str, currency: &str, issuer: &str) -> String {
    format!("{}:{}:{}", holder, currency, issuer)
}

/// Credit native drops, creating the destination account when absent.
fn credit(state: &mut LedgerState, builder: &mut MetadataBuilder, address: &str, drops: Drops) {
    match state.accounts.get_mut(address) {
        Some(account) => {
            if !builder.has_snapshot(address) {
                builder.snapshot_account(account);
            }
            account.balance += drops;
        }
        None => {
            let account = AccountRoot::new(address, drops);
            builder.record_account_create(&account);
            state.accounts.insert(address.to_owned(), account);
        }
    }
}

/// Debit native drops from an existing account.
fn debit(
    state: &mut LedgerState,
    builder: &mut MetadataBuilder,
    address: &str,
    drops: Drops,
) -> Result<(), TransactionError> {
    let account = state
        .accounts
        .get_mut(address)
        .ok_or_else(|| TransactionError::AccountNotFound(address.to_owned()))?;
    if !builder.has_snapshot(address) {
        builder.snapshot_account(account);
    }
    if account.balance < drops {
        return Err(TransactionError::Unfunded(format!(
            "Insufficient balance: have {}, need {}",
            account.balance, drops
        )));
    }
    account.balance -= drops;
    Ok(())
}

fn check_deposit_auth(
    state: &LedgerState,
    destination: &str,
    sender: &str,
) -> Result<(), TransactionError> {
    if let Some(dest) = state.accounts.get(destination) {
        if dest.deposit_auth && sender != destination && !dest.preauthorized.contains(sender) {
            return Err(TransactionError::NotAuthorized(
                "Destination requires deposit authorization".into(),
            ));
        }
    }
    Ok(())
}

fn add_owned(
    state: &mut LedgerState,
    address: &str,
    object_id: &str,
    object_type: ObjectType,
) {
    state
        .directories
        .add_owned_object(address, object_id, object_type);
    if let Some(account) = state.accounts.get_mut(address) {
        account.owner_count += 1;
    }
}

fn remove_owned(state: &mut LedgerState, address: &str, object_id: &str) {
    if state.directories.remove_owned_object(address, object_id) {
        if let Some(account) = state.accounts.get_mut(address) {
            account.owner_count = account.owner_count.saturating_sub(1);
        }
    }
}

impl Ledger {
    /// Accounts whose native balances this transaction may move; their
    /// pre-application state is snapshotted for metadata.
    pub(crate) fn touched_accounts(&self, tx: &Transaction) -> Vec<Address> {
        let mut touched = vec![tx.account.clone()];
        let state = &self.state;
        match &tx.payload {
            TxPayload::Payment { destination, .. }
            | TxPayload::AccountDelete { destination }
            | TxPayload::XchainAccountCreateCommit { destination, .. } => {
                touched.push(destination.clone());
            }
            TxPayload::EscrowFinish { escrow_id, .. } => {
                if let Some(escrow) = state.escrows.get_escrow(escrow_id) {
                    touched.push(escrow.destination.clone());
                    touched.push(escrow.account.clone());
                }
            }
            TxPayload::EscrowCancel { escrow_id } => {
                if let Some(escrow) = state.escrows.get_escrow(escrow_id) {
                    touched.push(escrow.account.clone());
                }
            }
            TxPayload::PayChanClaim { channel_id, .. }
            | TxPayload::PayChanClose { channel_id } => {
                if let Some(channel) = state.channels.get_channel(channel_id) {
                    touched.push(channel.account.clone());
                    touched.push(channel.destination.clone());
                }
            }
            TxPayload::CheckCash { check_id, .. } => {
                if let Some(check) = state.checks.get_check(check_id) {
                    touched.push(check.account.clone());
                    touched.push(check.destination.clone());
                }
            }
            TxPayload::NftokenOfferAccept { offer_id } => {
                if let Some(offer) = state.nftokens.offers.get(offer_id) {
                    touched.push(offer.owner.clone());
                    if let Some(token) = state.nftokens.get_token(&offer.nftoken_id) {
                        touched.push(token.owner.clone());
                        touched.push(token.issuer.clone());
                    }
                }
            }
            TxPayload::XchainCommit { bridge_id, .. } => {
                if let Some(bridge) = state.xchain.get_bridge(bridge_id) {
                    touched.push(bridge.locking_chain_door.clone());
                }
            }
            TxPayload::XchainClaim {
                bridge_id,
                destination,
                ..
            } => {
                if let Some(bridge) = state.xchain.get_bridge(bridge_id) {
                    touched.push(bridge.issuing_chain_door.clone());
                }
                touched.push(destination.clone());
            }
            _ => {}
        }
        touched.sort_unstable();
        touched.dedup();
        touched
    }

    /// Route a validated, fee-gated transaction to its domain handler.
    /// Returns the delivered amount, when the operation delivered value.
    pub(crate) fn dispatch(
        &mut self,
        tx: &Transaction,
        now: u64,
        builder: &mut MetadataBuilder,
    ) -> Result<Option<Amount>, TransactionError> {
        match &tx.payload {
            TxPayload::Payment {
                destination,
                amount,
            } => self.apply_payment(tx, destination, amount, builder),
            TxPayload::EscrowCreate {
                destination,
                amount,
                condition,
                finish_after,
                cancel_after,
            } => {
                debit(&mut self.state, builder, &tx.account, *amount)?;
                self.state.escrows.create_escrow(
                    &tx.id,
                    &tx.account,
                    destination,
                    *amount,
                    condition,
                    *finish_after,
                    *cancel_after,
                    now,
                )?;
                add_owned(&mut self.state, &tx.account, &tx.id, ObjectType::Escrow);
                builder.record_created("Escrow", &tx.id, field("Amount", json!(amount)));
                Ok(None)
            }
            TxPayload::EscrowFinish {
                escrow_id,
                fulfillment,
            } => {
                let (account, destination, amount) = {
                    let entry = self.state.escrows.finish_escrow(escrow_id, fulfillment, now)?;
                    (entry.account.clone(), entry.destination.clone(), entry.amount)
                };
                credit(&mut self.state, builder, &destination, amount);
                remove_owned(&mut self.state, &account, escrow_id);
                builder.record_modified(
                    "Escrow",
                    escrow_id,
                    field("Finished", json!(false)),
                    field("Finished", json!(true)),
                );
                Ok(Some(Amount::Drops(amount)))
            }
            TxPayload::EscrowCancel { escrow_id } => {
                let (account, amount) = {
                    let entry = self
                        .state
                        .escrows
                        .cancel_escrow(escrow_id, &tx.account, now)?;
                    (entry.account.clone(), entry.amount)
                };
                credit(&mut self.state, builder, &account, amount);
                remove_owned(&mut self.state, &account, escrow_id);
                builder.record_modified(
                    "Escrow",
                    escrow_id,
                    field("Cancelled", json!(false)),
                    field("Cancelled", json!(true)),
                );
                Ok(None)
            }
            TxPayload::TrustSet {
                currency,
                issuer,
                limit,
            } => self.apply_trust_set(tx, currency, issuer, *limit, builder),
            TxPayload::SignerListSet { quorum, signers } => {
                let entries: Vec<SignerEntry> = signers
                    .iter()
                    .map(|(account, weight)| SignerEntry {
                        account: account.clone(),
                        weight: *weight,
                    })
                    .collect();
                let existed = self.state.multi_sign.get_signer_list(&tx.account).is_some();
                let deleting = *quorum == 0 && entries.is_empty();
                self.state
                    .multi_sign
                    .set_signer_list(&tx.account, *quorum, entries)?;
                if deleting && existed {
                    remove_owned(&mut self.state, &tx.account, &tx.account);
                    builder.record_deleted("SignerList", &tx.account, Fields::new());
                } else if !deleting && !existed {
                    add_owned(&mut self.state, &tx.account, &tx.account, ObjectType::SignerList);
                    builder.record_created(
                        "SignerList",
                        &tx.account,
                        field("SignerQuorum", json!(quorum)),
                    );
                } else if !deleting {
                    builder.record_modified(
                        "SignerList",
                        &tx.account,
                        Fields::new(),
                        field("SignerQuorum", json!(quorum)),
                    );
                }
                Ok(None)
            }
            TxPayload::SetRegularKey { regular_key } => {
                self.state.multi_sign.set_regular_key(&tx.account, regular_key);
                if let Some(account) = self.state.accounts.get_mut(&tx.account) {
                    account.regular_key = if regular_key.is_empty() {
                        None
                    } else {
                        Some(regular_key.clone())
                    };
                }
                Ok(None)
            }
            TxPayload::AccountSet {
                deposit_auth,
                gateway,
            } => {
                let account = self
                    .state
                    .accounts
                    .get_mut(&tx.account)
                    .ok_or_else(|| TransactionError::AccountNotFound(tx.account.clone()))?;
                if let Some(flag) = deposit_auth {
                    account.deposit_auth = *flag;
                }
                if let Some(flag) = gateway {
                    account.is_gateway = *flag;
                }
                Ok(None)
            }
            TxPayload::AccountDelete { destination } => {
                self.apply_account_delete(tx, destination, builder)
            }
            TxPayload::DepositPreauth {
                authorize,
                unauthorize,
            } => {
                let account = self
                    .state
                    .accounts
                    .get_mut(&tx.account)
                    .ok_or_else(|| TransactionError::AccountNotFound(tx.account.clone()))?;
                if *unauthorize {
                    account.preauthorized.remove(authorize);
                } else {
                    account.preauthorized.insert(authorize.clone());
                }
                Ok(None)
            }
            TxPayload::TicketCreate { count } => {
                let start_sequence = {
                    let account = self
                        .state
                        .accounts
                        .get_mut(&tx.account)
                        .ok_or_else(|| TransactionError::AccountNotFound(tx.account.clone()))?;
                    let start = account.sequence;
                    account.sequence += *count;
                    start
                };
                let created = self
                    .state
                    .tickets
                    .create_tickets(&tx.account, start_sequence, *count);
                for ticket in &created {
                    add_owned(
                        &mut self.state,
                        &tx.account,
                        &ticket.ticket_id,
                        ObjectType::Ticket,
                    );
                    builder.record_created(
                        "Ticket",
                        &ticket.ticket_id,
                        field("TicketSequence", json!(ticket.ticket_sequence)),
                    );
                }
                Ok(None)
            }
            TxPayload::OfferCreate {
                taker_pays,
                taker_gets,
            } => {
                let sequence = if tx.sequence != 0 {
                    tx.sequence
                } else {
                    self.state
                        .accounts
                        .get(&tx.account)
                        .map(|a| a.sequence.saturating_sub(1))
                        .unwrap_or(0)
                };
                let offer_id = {
                    let offer = self.state.offers.create_offer(
                        &tx.account,
                        sequence,
                        taker_pays.clone(),
                        taker_gets.clone(),
                        &mut self.state.directories,
                    )?;
                    offer.id.clone()
                };
                add_owned(&mut self.state, &tx.account, &offer_id, ObjectType::Offer);
                builder.record_created("Offer", &offer_id, Fields::new());
                Ok(None)
            }
            TxPayload::OfferCancel { offer_sequence } => {
                let offer = self.state.offers.cancel_offer(
                    &tx.account,
                    *offer_sequence,
                    &mut self.state.directories,
                )?;
                remove_owned(&mut self.state, &tx.account, &offer.id);
                builder.record_deleted("Offer", &offer.id, Fields::new());
                Ok(None)
            }
            TxPayload::PayChanCreate {
                destination,
                amount,
                settle_delay,
                public_key,
                cancel_after,
            } => {
                debit(&mut self.state, builder, &tx.account, *amount)?;
                self.state.channels.create_channel(
                    &tx.id,
                    &tx.account,
                    destination,
                    *amount,
                    *settle_delay,
                    public_key,
                    *cancel_after,
                    now,
                )?;
                add_owned(&mut self.state, &tx.account, &tx.id, ObjectType::PaymentChannel);
                builder.record_created("PayChannel", &tx.id, field("Amount", json!(amount)));
                Ok(None)
            }
            TxPayload::PayChanFund { channel_id, amount } => {
                debit(&mut self.state, builder, &tx.account, *amount)?;
                self.state.channels.fund_channel(channel_id, *amount)?;
                builder.record_modified("PayChannel", channel_id, Fields::new(), Fields::new());
                Ok(None)
            }
            TxPayload::PayChanClaim {
                channel_id,
                balance,
            } => {
                let (destination, payout) = {
                    let (channel, payout) = self.state.channels.claim(channel_id, *balance, now)?;
                    (channel.destination.clone(), payout)
                };
                credit(&mut self.state, builder, &destination, payout);
                builder.record_modified(
                    "PayChannel",
                    channel_id,
                    Fields::new(),
                    field("Balance", json!(balance)),
                );
                Ok(Some(Amount::Drops(payout)))
            }
            TxPayload::PayChanClose { channel_id } => {
                let (closed, owner, refund) = {
                    let (channel, closed) = self
                        .state
                        .channels
                        .request_close(channel_id, &tx.account, now)?;
                    (closed, channel.account.clone(), channel.available())
                };
                if closed {
                    credit(&mut self.state, builder, &owner, refund);
                    remove_owned(&mut self.state, &owner, channel_id);
                    builder.record_modified(
                        "PayChannel",
                        channel_id,
                        field("Closed", json!(false)),
                        field("Closed", json!(true)),
                    );
                } else {
                    builder.record_modified(
                        "PayChannel",
                        channel_id,
                        field("CloseRequested", json!(false)),
                        field("CloseRequested", json!(true)),
                    );
                }
                Ok(None)
            }
            TxPayload::CheckCreate {
                destination,
                send_max,
                expiration,
            } => {
                self.state.checks.create_check(
                    &tx.id,
                    &tx.account,
                    destination,
                    send_max.clone(),
                    *expiration,
                    now,
                )?;
                add_owned(&mut self.state, &tx.account, &tx.id, ObjectType::Check);
                builder.record_created("Check", &tx.id, Fields::new());
                Ok(None)
            }
            TxPayload::CheckCash {
                check_id,
                amount,
                deliver_min,
            } => self.apply_check_cash(tx, check_id, amount.as_ref(), deliver_min.as_ref(), now, builder),
            TxPayload::CheckCancel { check_id } => {
                let creator = {
                    let entry = self.state.checks.cancel_check(check_id, &tx.account, now)?;
                    entry.account.clone()
                };
                remove_owned(&mut self.state, &creator, check_id);
                builder.record_deleted("Check", check_id, Fields::new());
                Ok(None)
            }
            TxPayload::NftokenMint {
                uri,
                transfer_fee,
                taxon,
                transferable,
                burnable,
            } => {
                let token_id = {
                    let token = self.state.nftokens.mint(
                        &tx.account,
                        uri,
                        *transfer_fee,
                        *taxon,
                        *transferable,
                        *burnable,
                    )?;
                    token.nftoken_id.clone()
                };
                add_owned(&mut self.state, &tx.account, &token_id, ObjectType::Nftoken);
                builder.record_created("NFToken", &token_id, field("URI", json!(uri)));
                Ok(None)
            }
            TxPayload::NftokenBurn { nftoken_id } => {
                let owner = {
                    let token = self.state.nftokens.burn(nftoken_id, &tx.account)?;
                    token.owner.clone()
                };
                remove_owned(&mut self.state, &owner, nftoken_id);
                builder.record_modified(
                    "NFToken",
                    nftoken_id,
                    field("Burned", json!(false)),
                    field("Burned", json!(true)),
                );
                Ok(None)
            }
            TxPayload::NftokenOfferCreate {
                nftoken_id,
                amount,
                destination,
                is_sell,
                expiration,
            } => {
                self.state.nftokens.create_offer(
                    &tx.id,
                    nftoken_id,
                    &tx.account,
                    *amount,
                    destination.as_deref(),
                    *is_sell,
                    *expiration,
                )?;
                add_owned(&mut self.state, &tx.account, &tx.id, ObjectType::NftokenOffer);
                builder.record_created("NFTokenOffer", &tx.id, Fields::new());
                Ok(None)
            }
            TxPayload::NftokenOfferCancel { offer_id } => {
                let owner = {
                    let offer = self.state.nftokens.cancel_offer(offer_id, &tx.account)?;
                    offer.owner.clone()
                };
                remove_owned(&mut self.state, &owner, offer_id);
                builder.record_modified(
                    "NFTokenOffer",
                    offer_id,
                    field("Cancelled", json!(false)),
                    field("Cancelled", json!(true)),
                );
                Ok(None)
            }
            TxPayload::NftokenOfferAccept { offer_id } => {
                self.apply_nftoken_offer_accept(tx, offer_id, now, builder)
            }
            TxPayload::MptIssuanceCreate {
                max_supply,
                transfer_fee,
                metadata,
                flags,
            } => {
                let issuance_id = {
                    let issuance = self.state.mpt.create_issuance(
                        &tx.account,
                        *max_supply,
                        *transfer_fee,
                        metadata,
                        *flags,
                    )?;
                    issuance.issuance_id.clone()
                };
                add_owned(&mut self.state, &tx.account, &issuance_id, ObjectType::Mpt);
                builder.record_created("MPTIssuance", &issuance_id, Fields::new());
                Ok(None)
            }
            TxPayload::MptIssuanceDestroy { issuance_id } => {
                self.state.mpt.destroy_issuance(&tx.account, issuance_id)?;
                remove_owned(&mut self.state, &tx.account, issuance_id);
                builder.record_deleted("MPTIssuance", issuance_id, Fields::new());
                Ok(None)
            }
            TxPayload::MptIssuanceSet { issuance_id, lock } => {
                self.state.mpt.set_issuance(&tx.account, issuance_id, *lock)?;
                builder.record_modified(
                    "MPTIssuance",
                    issuance_id,
                    Fields::new(),
                    field("Locked", json!(lock)),
                );
                Ok(None)
            }
            TxPayload::MptAuthorize {
                issuance_id,
                holder,
            } => {
                let (subject, issuer_action) = match holder {
                    Some(holder) => (holder.clone(), true),
                    None => (tx.account.clone(), false),
                };
                let existed = self.state.mpt.get_holder(issuance_id, &subject).is_some();
                self.state
                    .mpt
                    .authorize(issuance_id, &subject, issuer_action, &tx.account)?;
                let index = format!("{}:{}", issuance_id, subject);
                if !existed {
                    add_owned(&mut self.state, &subject, &index, ObjectType::Mpt);
                    builder.record_created("MPTHolder", &index, Fields::new());
                }
                Ok(None)
            }
            TxPayload::MptMint {
                issuance_id,
                holder,
                amount,
            } => {
                self.state.mpt.mint(&tx.account, issuance_id, holder, *amount)?;
                builder.record_modified(
                    "MPTHolder",
                    &format!("{}:{}", issuance_id, holder),
                    Fields::new(),
                    Fields::new(),
                );
                builder.record_modified("MPTIssuance", issuance_id, Fields::new(), Fields::new());
                Ok(None)
            }
            TxPayload::MptTransfer {
                issuance_id,
                destination,
                amount,
            } => {
                let fee = self
                    .state
                    .mpt
                    .transfer(issuance_id, &tx.account, destination, *amount)?;
                builder.record_modified(
                    "MPTHolder",
                    &format!("{}:{}", issuance_id, tx.account),
                    Fields::new(),
                    Fields::new(),
                );
                builder.record_modified(
                    "MPTHolder",
                    &format!("{}:{}", issuance_id, destination),
                    Fields::new(),
                    field("TransferFee", json!(fee.to_string())),
                );
                Ok(Some(Amount::Issued {
                    currency: issuance_id.clone(),
                    issuer: String::new(),
                    value: *amount - fee,
                }))
            }
            TxPayload::MptClawback {
                issuance_id,
                holder,
                amount,
            } => {
                self.state
                    .mpt
                    .clawback(&tx.account, issuance_id, holder, *amount)?;
                builder.record_modified(
                    "MPTHolder",
                    &format!("{}:{}", issuance_id, holder),
                    Fields::new(),
                    Fields::new(),
                );
                Ok(None)
            }
            TxPayload::DidSet {
                uri,
                data,
                attestations,
            } => {
                let existed = self.state.dids.get_did(&tx.account).is_some();
                self.state.dids.set_did(
                    &tx.account,
                    uri,
                    data,
                    Some(attestations.clone()).filter(|a| !a.is_empty()),
                    now,
                )?;
                if !existed {
                    add_owned(
                        &mut self.state,
                        &tx.account,
                        &format!("did:{}", tx.account),
                        ObjectType::Did,
                    );
                    builder.record_created("DID", &tx.account, field("URI", json!(uri)));
                } else {
                    builder.record_modified("DID", &tx.account, Fields::new(), Fields::new());
                }
                Ok(None)
            }
            TxPayload::DidDelete => {
                self.state.dids.delete_did(&tx.account)?;
                remove_owned(&mut self.state, &tx.account, &format!("did:{}", tx.account));
                builder.record_deleted("DID", &tx.account, Fields::new());
                Ok(None)
            }
            TxPayload::CredentialCreate {
                subject,
                credential_type,
                uri,
                expiration,
            } => {
                let credential_id = {
                    let credential = self.state.credentials.create(
                        &tx.account,
                        subject,
                        credential_type,
                        uri,
                        *expiration,
                        now,
                    )?;
                    credential.credential_id.clone()
                };
                add_owned(&mut self.state, &tx.account, &credential_id, ObjectType::Credential);
                builder.record_created("Credential", &credential_id, Fields::new());
                Ok(None)
            }
            TxPayload::CredentialAccept { credential_id } => {
                self.state.credentials.accept(&tx.account, credential_id, now)?;
                builder.record_modified(
                    "Credential",
                    credential_id,
                    field("Accepted", json!(false)),
                    field("Accepted", json!(true)),
                );
                Ok(None)
            }
            TxPayload::CredentialDelete { credential_id } => {
                let issuer = self
                    .state
                    .credentials
                    .get_credential(credential_id)
                    .map(|c| c.issuer.clone())
                    .ok_or_else(|| TransactionError::NotFound("Credential not found".into()))?;
                self.state.credentials.delete(&tx.account, credential_id)?;
                remove_owned(&mut self.state, &issuer, credential_id);
                builder.record_deleted("Credential", credential_id, Fields::new());
                Ok(None)
            }
            TxPayload::OracleSet {
                document_id,
                provider,
                asset_class,
                uri,
                prices,
            } => {
                let existed = document_id
                    .map(|id| self.state.oracles.get_oracle(&tx.account, id).is_some())
                    .unwrap_or(false);
                let oracle_id = {
                    let oracle = self.state.oracles.set_oracle(
                        &tx.account,
                        *document_id,
                        provider,
                        asset_class,
                        uri,
                        prices,
                        now,
                    )?;
                    oracle.oracle_id.clone()
                };
                if !existed {
                    add_owned(&mut self.state, &tx.account, &oracle_id, ObjectType::Oracle);
                    builder.record_created("Oracle", &oracle_id, Fields::new());
                } else {
                    builder.record_modified("Oracle", &oracle_id, Fields::new(), Fields::new());
                }
                Ok(None)
            }
            TxPayload::OracleDelete { document_id } => {
                let oracle_id = format!("{}:{}", tx.account, document_id);
                self.state.oracles.delete_oracle(&tx.account, *document_id)?;
                remove_owned(&mut self.state, &tx.account, &oracle_id);
                builder.record_deleted("Oracle", &oracle_id, Fields::new());
                Ok(None)
            }
            TxPayload::XchainCreateBridge {
                locking_chain_door,
                issuing_chain_door,
                locking_chain_issue,
                issuing_chain_issue,
                min_account_create_amount,
                signal_reward,
            } => {
                let bridge_id = {
                    let bridge = self.state.xchain.create_bridge(
                        locking_chain_door,
                        issuing_chain_door,
                        locking_chain_issue.clone(),
                        issuing_chain_issue.clone(),
                        *min_account_create_amount,
                        *signal_reward,
                    )?;
                    bridge.bridge_id.clone()
                };
                add_owned(&mut self.state, &tx.account, &bridge_id, ObjectType::Bridge);
                builder.record_created("Bridge", &bridge_id, Fields::new());
                Ok(None)
            }
            TxPayload::XchainCreateClaimId {
                bridge_id,
                destination,
            } => {
                let claim_id = self.state.xchain.create_claim_id(
                    bridge_id,
                    &tx.account,
                    destination.as_deref(),
                )?;
                builder.record_created(
                    "XChainClaim",
                    &format!("{}:{}", bridge_id, claim_id),
                    Fields::new(),
                );
                Ok(None)
            }
            TxPayload::XchainCommit {
                bridge_id,
                claim_id,
                amount,
                destination,
            } => {
                let door = self
                    .state
                    .xchain
                    .get_bridge(bridge_id)
                    .map(|b| b.locking_chain_door.clone())
                    .ok_or_else(|| TransactionError::NotFound("Bridge not found".into()))?;
                debit(&mut self.state, builder, &tx.account, *amount)?;
                self.state.xchain.commit(
                    bridge_id,
                    &tx.account,
                    *amount,
                    *claim_id,
                    destination.as_deref(),
                )?;
                credit(&mut self.state, builder, &door, *amount);
                builder.record_modified(
                    "XChainClaim",
                    &format!("{}:{}", bridge_id, claim_id),
                    field("Committed", json!(false)),
                    field("Committed", json!(true)),
                );
                Ok(None)
            }
            TxPayload::XchainAddClaimAttestation {
                bridge_id,
                claim_id,
                witness,
                signature,
            } => {
                self.state
                    .xchain
                    .add_attestation(bridge_id, *claim_id, witness, signature, now)?;
                builder.record_modified(
                    "XChainClaim",
                    &format!("{}:{}", bridge_id, claim_id),
                    Fields::new(),
                    Fields::new(),
                );
                Ok(None)
            }
            TxPayload::XchainClaim {
                bridge_id,
                claim_id,
                destination,
            } => {
                let door = self
                    .state
                    .xchain
                    .get_bridge(bridge_id)
                    .map(|b| b.issuing_chain_door.clone())
                    .ok_or_else(|| TransactionError::NotFound("Bridge not found".into()))?;
                let payout = self.state.xchain.claim(bridge_id, *claim_id, destination)?;
                debit(&mut self.state, builder, &door, payout)?;
                credit(&mut self.state, builder, destination, payout);
                builder.record_modified(
                    "XChainClaim",
                    &format!("{}:{}", bridge_id, claim_id),
                    field("Claimed", json!(false)),
                    field("Claimed", json!(true)),
                );
                Ok(Some(Amount::Drops(payout)))
            }
            TxPayload::XchainAccountCreateCommit {
                bridge_id,
                destination,
                amount,
            } => {
                let door = self
                    .state
                    .xchain
                    .get_bridge(bridge_id)
                    .map(|b| b.locking_chain_door.clone())
                    .ok_or_else(|| TransactionError::NotFound("Bridge not found".into()))?;
                debit(&mut self.state, builder, &tx.account, *amount)?;
                let claim_id = self.state.xchain.account_create_commit(
                    bridge_id,
                    &tx.account,
                    *amount,
                    destination,
                )?;
                credit(&mut self.state, builder, &door, *amount);
                builder.record_created(
                    "XChainClaim",
                    &format!("{}:{}", bridge_id, claim_id),
                    Fields::new(),
                );
                Ok(None)
            }
            TxPayload::SetHook {
                position,
                hook_hash,
                parameters,
            } => {
                let index = format!("{}:{}", tx.account, position);
                match hook_hash {
                    Some(hash) => {
                        let replacing = self
                            .state
                            .hooks
                            .get_hooks(&tx.account)
                            .iter()
                            .any(|h| h.position == *position);
                        self.state.hooks.set_hook(
                            &tx.account,
                            *position,
                            hash,
                            parameters.clone(),
                            HookPhase::Before,
                        )?;
                        if !replacing {
                            add_owned(&mut self.state, &tx.account, &index, ObjectType::Hook);
                            builder.record_created("Hook", &index, field("HookHash", json!(hash)));
                        } else {
                            builder.record_modified("Hook", &index, Fields::new(), Fields::new());
                        }
                    }
                    None => {
                        self.state.hooks.delete_hook(&tx.account, *position)?;
                        remove_owned(&mut self.state, &tx.account, &index);
                        builder.record_deleted("Hook", &index, Fields::new());
                    }
                }
                Ok(None)
            }
            TxPayload::Stake { amount } => {
                debit(&mut self.state, builder, &tx.account, *amount)?;
                self.state.staking.stake(&tx.account, *amount, now)?;
                builder.record_modified(
                    "Stake",
                    &tx.account,
                    Fields::new(),
                    field("Amount", json!(amount)),
                );
                Ok(None)
            }
            TxPayload::Unstake { amount } => {
                let released = self.state.staking.unstake(&tx.account, *amount)?;
                credit(&mut self.state, builder, &tx.account, released);
                builder.record_modified(
                    "Stake",
                    &tx.account,
                    Fields::new(),
                    field("Released", json!(released)),
                );
                Ok(None)
            }
        }
    }

    fn apply_payment(
        &mut self,
        tx: &Transaction,
        destination: &str,
        amount: &Amount,
        builder: &mut MetadataBuilder,
    ) -> Result<Option<Amount>, TransactionError> {
        check_deposit_auth(&self.state, destination, &tx.account)?;
        match amount {
            Amount::Drops(drops) => {
                debit(&mut self.state, builder, &tx.account, *drops)?;
                credit(&mut self.state, builder, destination, *drops);
            }
            Amount::Issued {
                currency,
                issuer,
                value,
            } => {
                if *value <= Decimal::ZERO {
                    return Err(TransactionError::BadAmount(
                        "Payment amount must be positive".into(),
                    ));
                }
                // Sender leg: the issuer mints its own obligation freely.
                if tx.account != *issuer {
                    let sender = self
                        .state
                        .accounts
                        .get_mut(&tx.account)
                        .ok_or_else(|| TransactionError::AccountNotFound(tx.account.clone()))?;
                    let line = sender.trust_line_mut(currency, issuer).ok_or_else(|| {
                        TransactionError::NoLine {
                            currency: currency.clone(),
                            issuer: issuer.clone(),
                        }
                    })?;
                    if line.balance < *value {
                        return Err(TransactionError::Unfunded(format!(
                            "Insufficient {} balance: have {}, need {}",
                            currency, line.balance, value
                        )));
                    }
                    let previous = line.balance;
                    line.balance -= *value;
                    builder.record_modified(
                        "TrustLine",
                        &trust_line_index(&tx.account, currency, issuer),
                        field("Balance", json!(previous.to_string())),
                        field("Balance", json!(line.balance.to_string())),
                    );
                }
                // Receiver leg: redeeming to the issuer burns the obligation.
                if destination != issuer {
                    let receiver = self
                        .state
                        .accounts
                        .get_mut(destination)
                        .ok_or_else(|| TransactionError::AccountNotFound(destination.to_owned()))?;
                    let line = receiver.trust_line_mut(currency, issuer).ok_or_else(|| {
                        TransactionError::NoLine {
                            currency: currency.clone(),
                            issuer: issuer.clone(),
                        }
                    })?;
                    if line.balance + *value > line.limit {
                        return Err(TransactionError::Precondition(format!(
                            "Transfer would put {}/{} above the trust line limit",
                            currency, issuer
                        )));
                    }
                    let previous = line.balance;
                    line.balance += *value;
                    builder.record_modified(
                        "TrustLine",
                        &trust_line_index(destination, currency, issuer),
                        field("Balance", json!(previous.to_string())),
                        field("Balance", json!(line.balance.to_string())),
                    );
                }
            }
        }
        Ok(Some(amount.clone()))
    }

    fn apply_trust_set(
        &mut self,
        tx: &Transaction,
        currency: &str,
        issuer: &str,
        limit: Decimal,
        builder: &mut MetadataBuilder,
    ) -> Result<Option<Amount>, TransactionError> {
        use nexaflow_types::app::TrustLine;

        if issuer == tx.account {
            return Err(TransactionError::Malformed(
                "Cannot extend trust to yourself".into(),
            ));
        }
        if limit < Decimal::ZERO {
            return Err(TransactionError::BadAmount("Limit must be >= 0".into()));
        }
        let index = trust_line_index(&tx.account, currency, issuer);
        let key = (currency.to_owned(), issuer.to_owned());

        enum LineChange {
            Created,
            Modified(Decimal),
            Deleted,
        }
        let change = {
            let account = self
                .state
                .accounts
                .get_mut(&tx.account)
                .ok_or_else(|| TransactionError::AccountNotFound(tx.account.clone()))?;
            match account.trust_lines.get_mut(&key) {
                Some(line) => {
                    let previous = line.limit;
                    if limit.is_zero() && line.balance.is_zero() {
                        account.trust_lines.remove(&key);
                        LineChange::Deleted
                    } else {
                        line.limit = limit;
                        LineChange::Modified(previous)
                    }
                }
                None => {
                    account
                        .trust_lines
                        .insert(key, TrustLine::new(currency, issuer, limit));
                    LineChange::Created
                }
            }
        };
        match change {
            LineChange::Created => {
                add_owned(&mut self.state, &tx.account, &index, ObjectType::TrustLine);
                builder.record_created(
                    "TrustLine",
                    &index,
                    field("Limit", json!(limit.to_string())),
                );
            }
            LineChange::Modified(previous) => {
                builder.record_modified(
                    "TrustLine",
                    &index,
                    field("Limit", json!(previous.to_string())),
                    field("Limit", json!(limit.to_string())),
                );
            }
            LineChange::Deleted => {
                remove_owned(&mut self.state, &tx.account, &index);
                builder.record_deleted("TrustLine", &index, Fields::new());
            }
        }
        Ok(None)
    }

    fn apply_account_delete(
        &mut self,
        tx: &Transaction,
        destination: &str,
        builder: &mut MetadataBuilder,
    ) -> Result<Option<Amount>, TransactionError> {
        if !self.state.accounts.contains_key(destination) {
            return Err(TransactionError::NotFound(format!(
                "Destination {} does not exist",
                destination
            )));
        }
        let remaining = {
            let account = self
                .state
                .accounts
                .get(&tx.account)
                .ok_or_else(|| TransactionError::AccountNotFound(tx.account.clone()))?;
            if !account.deletable() {
                return Err(TransactionError::Precondition(
                    "Account has owned objects, trust lines, or a low sequence".into(),
                ));
            }
            account.balance
        };
        credit(&mut self.state, builder, destination, remaining);
        self.state.accounts.remove(&tx.account);
        builder.record_account_delete(&tx.account, remaining);
        log::info!(
            "account {} deleted; {} drops swept to {}",
            tx.account,
            remaining,
            destination
        );
        Ok(None)
    }

    fn apply_check_cash(
        &mut self,
        tx: &Transaction,
        check_id: &str,
        amount: Option<&Amount>,
        deliver_min: Option<&Amount>,
        now: u64,
        builder: &mut MetadataBuilder,
    ) -> Result<Option<Amount>, TransactionError> {
        {
            let check = self
                .state
                .checks
                .get_check(check_id)
                .ok_or_else(|| TransactionError::NotFound(format!("Check {}", check_id)))?;
            if check.destination != tx.account {
                return Err(TransactionError::NotAuthorized(
                    "Only the check destination can cash it".into(),
                ));
            }
        }
        let (creator, cashed) = {
            let (entry, cashed) = self
                .state
                .checks
                .cash_check(check_id, amount, deliver_min, now)?;
            (entry.account.clone(), cashed)
        };
        match &cashed {
            Amount::Drops(drops) => {
                debit(&mut self.state, builder, &creator, *drops)?;
                credit(&mut self.state, builder, &tx.account, *drops);
            }
            Amount::Issued {
                currency,
                issuer,
                value,
            } => {
                // IOU checks move trust-line balances like a payment.
                let sender = self
                    .state
                    .accounts
                    .get_mut(&creator)
                    .ok_or_else(|| TransactionError::AccountNotFound(creator.clone()))?;
                if creator != *issuer {
                    let line = sender.trust_line_mut(currency, issuer).ok_or_else(|| {
                        TransactionError::NoLine {
                            currency: currency.clone(),
                            issuer: issuer.clone(),
                        }
                    })?;
                    if line.balance < *value {
                        return Err(TransactionError::Unfunded(
                            "Check writer cannot cover the amount".into(),
                        ));
                    }
                    line.balance -= *value;
                }
                if tx.account != *issuer {
                    let receiver = self
                        .state
                        .accounts
                        .get_mut(&tx.account)
                        .ok_or_else(|| TransactionError::AccountNotFound(tx.account.clone()))?;
                    let line = receiver.trust_line_mut(currency, issuer).ok_or_else(|| {
                        TransactionError::NoLine {
                            currency: currency.clone(),
                            issuer: issuer.clone(),
                        }
                    })?;
                    if line.balance + *value > line.limit {
                        return Err(TransactionError::Precondition(
                            "Cashing would exceed the trust line limit".into(),
                        ));
                    }
                    line.balance += *value;
                }
            }
        }
        remove_owned(&mut self.state, &creator, check_id);
        builder.record_modified(
            "Check",
            check_id,
            field("Cashed", json!(false)),
            field("Cashed", json!(true)),
        );
        Ok(Some(cashed))
    }

    fn apply_nftoken_offer_accept(
        &mut self,
        tx: &Transaction,
        offer_id: &str,
        now: u64,
        builder: &mut MetadataBuilder,
    ) -> Result<Option<Amount>, TransactionError> {
        // Resolve parties and price before the manager mutates ownership.
        let (price, seller, buyer, token_id, previous_owner, issuer, transfer_fee) = {
            let offer = self
                .state
                .nftokens
                .offers
                .get(offer_id)
                .ok_or_else(|| TransactionError::NotFound(format!("Offer {}", offer_id)))?;
            let token = self
                .state
                .nftokens
                .get_token(&offer.nftoken_id)
                .ok_or_else(|| TransactionError::NotFound("NFToken not found".into()))?;
            let (seller, buyer) = if offer.is_sell {
                (offer.owner.clone(), tx.account.clone())
            } else {
                (tx.account.clone(), offer.owner.clone())
            };
            (
                offer.amount,
                seller,
                buyer,
                offer.nftoken_id.clone(),
                token.owner.clone(),
                token.issuer.clone(),
                token.transfer_fee,
            )
        };

        self.state.nftokens.accept_offer(offer_id, &tx.account, now)?;

        // Settle the price: buyer pays seller, with the issuer's cut on
        // secondary sales.
        if price > 0 {
            debit(&mut self.state, builder, &buyer, price)?;
            let issuer_cut = if seller != issuer {
                price * transfer_fee as u64 / 100_000
            } else {
                0
            };
            credit(&mut self.state, builder, &seller, price - issuer_cut);
            if issuer_cut > 0 {
                credit(&mut self.state, builder, &issuer, issuer_cut);
            }
        }

        // The token changes owner directories; the offer is consumed.
        let new_owner = if seller == previous_owner { buyer } else { seller };
        remove_owned(&mut self.state, &previous_owner, &token_id);
        add_owned(&mut self.state, &new_owner, &token_id, ObjectType::Nftoken);
        let offer_owner = self
            .state
            .nftokens
            .offers
            .get(offer_id)
            .map(|o| o.owner.clone())
            .unwrap_or_default();
        remove_owned(&mut self.state, &offer_owner, offer_id);

        builder.record_modified(
            "NFToken",
            &token_id,
            field("Owner", json!(previous_owner)),
            field("Owner", json!(new_owner)),
        );
        builder.record_modified(
            "NFTokenOffer",
            offer_id,
            field("Accepted", json!(false)),
            field("Accepted", json!(true)),
        );
        Ok(Some(Amount::Drops(price)))
    }
}
