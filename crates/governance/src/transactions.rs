//! Transaction queue and confirmation bookkeeping.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use laurel_common::{Address, TransactionId};

use crate::{GovernanceError, GovernanceResult, ProposalAction, Transaction};

/// Stores submitted transactions and their confirmation sets.
///
/// Ids are allocated sequentially from 1 and never reused. Transactions are
/// never removed: a proposal stays pending until it executes, or forever.
#[derive(Debug)]
pub struct TransactionLedger {
    transactions: BTreeMap<TransactionId, Transaction>,
    next_id: TransactionId,
}

impl TransactionLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            transactions: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Total number of transactions ever submitted.
    pub fn count(&self) -> u64 {
        self.transactions.len() as u64
    }

    /// Look up a transaction by id.
    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.get(&id)
    }

    /// Number of confirmations currently recorded for `id`; 0 for unknown
    /// ids.
    pub fn confirmation_count(&self, id: TransactionId) -> usize {
        self.transactions
            .get(&id)
            .map(|tx| tx.confirmations.len())
            .unwrap_or(0)
    }

    /// Ids of transactions that have not executed yet, in submission order.
    pub fn pending_ids(&self) -> Vec<TransactionId> {
        self.ids_where(false)
    }

    /// Ids of executed transactions, in submission order.
    pub fn executed_ids(&self) -> Vec<TransactionId> {
        self.ids_where(true)
    }

    fn ids_where(&self, executed: bool) -> Vec<TransactionId> {
        self.transactions
            .values()
            .filter(|tx| tx.executed == executed)
            .map(|tx| tx.id)
            .collect()
    }

    /// Queue a new transaction and return its id.
    pub(crate) fn submit(&mut self, action: ProposalAction) -> TransactionId {
        let id = self.next_id;
        self.next_id += 1;
        self.transactions.insert(
            id,
            Transaction {
                id,
                action,
                executed: false,
                confirmations: HashSet::new(),
            },
        );
        debug!(id, "transaction queued");
        id
    }

    /// Record `sender`'s confirmation on `id`.
    pub(crate) fn confirm(&mut self, id: TransactionId, sender: Address) -> GovernanceResult<()> {
        let tx = self
            .transactions
            .get_mut(&id)
            .ok_or(GovernanceError::InvalidTransaction(id))?;
        if tx.executed {
            return Err(GovernanceError::AlreadyExecuted(id));
        }
        if !tx.confirmations.insert(sender) {
            return Err(GovernanceError::AlreadyConfirmed { id, member: sender });
        }
        Ok(())
    }

    /// Remove `sender`'s confirmation from `id`.
    pub(crate) fn revoke(&mut self, id: TransactionId, sender: &Address) -> GovernanceResult<()> {
        let tx = self
            .transactions
            .get_mut(&id)
            .ok_or(GovernanceError::InvalidTransaction(id))?;
        if tx.executed {
            return Err(GovernanceError::AlreadyExecuted(id));
        }
        if !tx.confirmations.remove(sender) {
            return Err(GovernanceError::NotConfirmed {
                id,
                member: *sender,
            });
        }
        Ok(())
    }

    /// Drop `sender`'s confirmation without state checks. Used to unwind a
    /// vote whose execution attempt failed hard in the same call.
    pub(crate) fn rescind(&mut self, id: TransactionId, sender: &Address) {
        if let Some(tx) = self.transactions.get_mut(&id) {
            tx.confirmations.remove(sender);
        }
    }

    /// Flag `id` as executed.
    pub(crate) fn mark_executed(&mut self, id: TransactionId) {
        if let Some(tx) = self.transactions.get_mut(&id) {
            tx.executed = true;
        }
    }
}

impl Default for TransactionLedger {
    fn default() -> Self {
        Self::new()
    }
}
