// Path: crates/services/src/ticket.rs

//! Sequence-reservation tickets.
//!
//! A ticket reserves a sequence number for later, out-of-order use. Using a
//! ticket is terminal; double-use is rejected.

use nexaflow_types::app::Address;
use nexaflow_types::error::TransactionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single sequence-reservation ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket id, `"{account}:{sequence}"`.
    pub ticket_id: String,
    /// The owning account.
    pub account: Address,
    /// The reserved sequence number.
    pub ticket_sequence: u32,
    /// Terminal: the ticket has been consumed.
    pub used: bool,
}

/// Manages tickets for all accounts.
#[derive(Debug, Clone, Default)]
pub struct TicketManager {
    /// All tickets, keyed by id.
    pub tickets: BTreeMap<String, Ticket>,
    account_tickets: BTreeMap<Address, Vec<String>>,
}

impl TicketManager {
    /// Create `count` tickets reserving sequences starting at
    /// `start_sequence`.
    pub fn create_tickets(
        &mut self,
        account: &str,
        start_sequence: u32,
        count: u32,
    ) -> Vec<Ticket> {
        let mut created = Vec::with_capacity(count as usize);
        for offset in 0..count {
            let seq = start_sequence + offset;
            let ticket_id = format!("{}:{}", account, seq);
            let ticket = Ticket {
                ticket_id: ticket_id.clone(),
                account: account.to_owned(),
                ticket_sequence: seq,
                used: false,
            };
            self.tickets.insert(ticket_id.clone(), ticket.clone());
            self.account_tickets
                .entry(account.to_owned())
                .or_default()
                .push(ticket_id);
            created.push(ticket);
        }
        created
    }

    /// Consume a ticket.
    pub fn use_ticket(&mut self, ticket_id: &str) -> Result<&Ticket, TransactionError> {
        let ticket = self
            .tickets
            .get_mut(ticket_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Ticket {}", ticket_id)))?;
        if ticket.used {
            return Err(TransactionError::Precondition("Ticket already used".into()));
        }
        ticket.used = true;
        Ok(ticket)
    }

    /// Whether an unused ticket with this id exists.
    pub fn has_ticket(&self, ticket_id: &str) -> bool {
        self.tickets.get(ticket_id).is_some_and(|t| !t.used)
    }

    /// All unused tickets for an account.
    pub fn get_available_tickets(&self, account: &str) -> Vec<&Ticket> {
        self.account_tickets
            .get(account)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.tickets.get(id))
                    .filter(|t| !t.used)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Count of unused tickets for an account.
    pub fn ticket_count(&self, account: &str) -> usize {
        self.get_available_tickets(account).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_reserve_consecutive_sequences() {
        let mut mgr = TicketManager::default();
        let created = mgr.create_tickets("alice", 5, 3);
        let seqs: Vec<u32> = created.iter().map(|t| t.ticket_sequence).collect();
        assert_eq!(seqs, [5, 6, 7]);
        assert_eq!(mgr.ticket_count("alice"), 3);
    }

    #[test]
    fn double_use_is_rejected() {
        let mut mgr = TicketManager::default();
        mgr.create_tickets("alice", 5, 1);
        assert!(mgr.use_ticket("alice:5").is_ok());
        let err = mgr.use_ticket("alice:5").unwrap_err();
        assert_eq!(err.to_string(), "Ticket already used");
        assert!(!mgr.has_ticket("alice:5"));
    }

    #[test]
    fn missing_ticket_is_not_found() {
        let mut mgr = TicketManager::default();
        assert!(matches!(
            mgr.use_ticket("alice:9").unwrap_err(),
            TransactionError::NotFound(_)
        ));
    }
}
