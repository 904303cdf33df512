//! Governance manager.
//!
//! The manager is the single entry point for members: it owns the member
//! registry and the transaction queue behind one lock, so every operation
//! runs as an atomic, serialized step, and dispatches executable
//! transactions to their effects. A call either completes all of its
//! effects or none of them; events are journaled only once a call's
//! outcome is settled.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use laurel_common::{Address, TransactionId};
use laurel_trophy::TrophyLedger;

use crate::execution::Dispatcher;
use crate::members::MemberRegistry;
use crate::transactions::TransactionLedger;
use crate::{
    ExecutionOutcome, GovernanceError, GovernanceEvent, GovernanceResult, ProposalAction,
    Transaction, TrophyPassOutcome, TrophyPassRequest,
};

/// Registry and queue, behind one lock so each call is atomic.
pub(crate) struct GovernanceState {
    pub(crate) registry: MemberRegistry,
    pub(crate) transactions: TransactionLedger,
}

/// The governance engine's public surface.
pub struct GovernanceManager {
    /// The identity under which the engine administers the trophy ledger.
    address: Address,
    /// The governed asset ledger.
    trophy: Arc<dyn TrophyLedger>,
    /// Maps executable transactions to their effects.
    dispatcher: Dispatcher,
    /// Mutable engine state.
    state: RwLock<GovernanceState>,
    /// Journal of domain events, in emission order.
    events: RwLock<Vec<GovernanceEvent>>,
}

impl GovernanceManager {
    /// Create an engine with the founding member set.
    ///
    /// `address` is the identity the trophy ledger must recognize as its
    /// administrator for governed trophy operations to succeed.
    pub fn new(
        address: Address,
        trophy: Arc<dyn TrophyLedger>,
        quorum: u8,
        members: Vec<Address>,
    ) -> GovernanceResult<Self> {
        let registry = MemberRegistry::new(quorum, members)?;
        info!(
            address = %address,
            quorum,
            members = registry.member_count(),
            "governance engine created"
        );
        Ok(Self {
            dispatcher: Dispatcher::new(Arc::clone(&trophy), address),
            address,
            trophy,
            state: RwLock::new(GovernanceState {
                registry,
                transactions: TransactionLedger::new(),
            }),
            events: RwLock::new(Vec::new()),
        })
    }

    // ---- submissions ----------------------------------------------------

    /// Queue the addition of `member` to the member set.
    pub async fn submit_add_member(
        &self,
        sender: Address,
        member: Address,
    ) -> GovernanceResult<TransactionId> {
        let mut state = self.state.write().await;
        self.require_member(&state, &sender)?;
        state.registry.check_add(&member)?;
        self.queue_and_confirm(&mut state, ProposalAction::AddMember { member }, sender)
            .await
    }

    /// Queue the removal of `member` from the member set.
    pub async fn submit_remove_member(
        &self,
        sender: Address,
        member: Address,
    ) -> GovernanceResult<TransactionId> {
        let mut state = self.state.write().await;
        self.require_member(&state, &sender)?;
        state.registry.check_remove(&member)?;
        self.queue_and_confirm(&mut state, ProposalAction::RemoveMember { member }, sender)
            .await
    }

    /// Queue the replacement of `old_member` by `new_member`.
    pub async fn submit_replace_member(
        &self,
        sender: Address,
        old_member: Address,
        new_member: Address,
    ) -> GovernanceResult<TransactionId> {
        let mut state = self.state.write().await;
        self.require_member(&state, &sender)?;
        state.registry.check_replace(&old_member, &new_member)?;
        self.queue_and_confirm(
            &mut state,
            ProposalAction::ReplaceMember {
                old_member,
                new_member,
            },
            sender,
        )
        .await
    }

    /// Queue a quorum change.
    pub async fn submit_change_quorum(
        &self,
        sender: Address,
        quorum: u8,
    ) -> GovernanceResult<TransactionId> {
        let mut state = self.state.write().await;
        self.require_member(&state, &sender)?;
        MemberRegistry::check_quorum(quorum)?;
        self.queue_and_confirm(&mut state, ProposalAction::ChangeQuorum { quorum }, sender)
            .await
    }

    /// Queue handing trophy ledger administration to `new_owner`.
    pub async fn submit_transfer_ownership(
        &self,
        sender: Address,
        new_owner: Address,
    ) -> GovernanceResult<TransactionId> {
        let mut state = self.state.write().await;
        self.require_member(&state, &sender)?;
        if new_owner.is_zero() {
            return Err(GovernanceError::ZeroAddress);
        }
        self.queue_and_confirm(
            &mut state,
            ProposalAction::TransferOwnership { new_owner },
            sender,
        )
        .await
    }

    /// Queue a change of the trophy ledger's base URI.
    pub async fn submit_set_base_uri(
        &self,
        sender: Address,
        base_uri: &str,
    ) -> GovernanceResult<TransactionId> {
        let mut state = self.state.write().await;
        self.require_member(&state, &sender)?;
        self.queue_and_confirm(
            &mut state,
            ProposalAction::SetBaseUri {
                base_uri: base_uri.to_string(),
            },
            sender,
        )
        .await
    }

    /// Propose or directly execute a trophy hand-off.
    ///
    /// When `sender` holds the current trophy and every recipient is a
    /// member other than `sender`, the hand-off runs immediately without
    /// touching the queue. Every other combination is queued for member
    /// confirmation, fenced to the round it was meant to create.
    pub async fn pass_trophy(
        &self,
        sender: Address,
        name: &str,
        content_hash: &[u8],
        recipients: &[Address],
        winner_names: &[String],
    ) -> GovernanceResult<TrophyPassOutcome> {
        if recipients.len() != winner_names.len() {
            return Err(GovernanceError::LengthMismatch {
                recipients: recipients.len(),
                names: winner_names.len(),
            });
        }

        let mut state = self.state.write().await;
        self.require_member(&state, &sender)?;

        let holder_pass = self.trophy.holds_current_trophy(&sender).await
            && recipients
                .iter()
                .all(|recipient| *recipient != sender && state.registry.is_member(recipient));

        if holder_pass {
            let round_id = self
                .trophy
                .pass_trophy(&self.address, name, content_hash, recipients, winner_names)
                .await?;
            info!(round = round_id, sender = %sender, "trophy passed directly by holder");
            self.journal(vec![GovernanceEvent::TrophyPassed { round_id }])
                .await;
            return Ok(TrophyPassOutcome::Passed { round_id });
        }

        let target_round = self.trophy.current_round_id().await + 1;
        let id = self
            .queue_and_confirm(
                &mut state,
                ProposalAction::PassTrophy(TrophyPassRequest {
                    target_round,
                    name: name.to_string(),
                    content_hash: content_hash.to_vec(),
                    recipients: recipients.to_vec(),
                    winner_names: winner_names.to_vec(),
                }),
                sender,
            )
            .await?;
        Ok(TrophyPassOutcome::Queued { transaction_id: id })
    }

    // ---- voting ---------------------------------------------------------

    /// Confirm a pending transaction. Execution runs inline as the final
    /// step of this call when the confirmation meets quorum.
    pub async fn confirm_transaction(
        &self,
        id: TransactionId,
        sender: Address,
    ) -> GovernanceResult<()> {
        let mut state = self.state.write().await;
        self.require_member(&state, &sender)?;
        let mut events = Vec::new();
        self.confirm_and_maybe_execute(&mut state, &mut events, id, sender)
            .await?;
        self.journal(events).await;
        Ok(())
    }

    /// Withdraw a confirmation from a pending transaction.
    pub async fn revoke_confirmation(
        &self,
        id: TransactionId,
        sender: Address,
    ) -> GovernanceResult<()> {
        let mut state = self.state.write().await;
        self.require_member(&state, &sender)?;
        state.transactions.revoke(id, &sender)?;
        debug!(id, sender = %sender, "confirmation revoked");
        self.journal(vec![GovernanceEvent::Revocation { sender, id }])
            .await;
        Ok(())
    }

    /// Attempt to execute a transaction.
    ///
    /// Probing an unready transaction is normal usage: insufficient
    /// confirmations, an already-executed transaction, and a declined
    /// handler all report [`ExecutionOutcome::NotReady`] rather than an
    /// error. Only the trophy round fence fails the call.
    pub async fn execute_transaction(
        &self,
        id: TransactionId,
        sender: Address,
    ) -> GovernanceResult<ExecutionOutcome> {
        let mut state = self.state.write().await;
        self.require_member(&state, &sender)?;

        let executed = state
            .transactions
            .transaction(id)
            .ok_or(GovernanceError::InvalidTransaction(id))?
            .executed;
        if executed || !Self::meets_quorum(&state, id) {
            debug!(id, "transaction not ready to execute");
            return Ok(ExecutionOutcome::NotReady);
        }

        match self.dispatcher.dispatch(&mut state, id).await {
            Ok(events) => {
                self.journal(events).await;
                Ok(ExecutionOutcome::Executed)
            }
            Err(stale @ GovernanceError::TrophyAlreadyPassed { .. }) => Err(stale),
            Err(err) => {
                warn!(id, error = %err, "execution attempt failed, transaction stays pending");
                Ok(ExecutionOutcome::NotReady)
            }
        }
    }

    // ---- read accessors -------------------------------------------------

    /// The identity under which the engine administers the trophy ledger.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Members in seat order.
    pub async fn members(&self) -> Vec<Address> {
        self.state.read().await.registry.members().to_vec()
    }

    /// Number of seats.
    pub async fn member_count(&self) -> usize {
        self.state.read().await.registry.member_count()
    }

    /// Whether `address` holds a seat.
    pub async fn is_member(&self, address: &Address) -> bool {
        self.state.read().await.registry.is_member(address)
    }

    /// Quorum percentage in [0, 100].
    pub async fn quorum(&self) -> u8 {
        self.state.read().await.registry.quorum()
    }

    /// Confirmations a transaction currently needs before it may execute.
    pub async fn required_votes(&self) -> usize {
        self.state.read().await.registry.required_votes()
    }

    /// Total number of transactions ever submitted.
    pub async fn transaction_count(&self) -> u64 {
        self.state.read().await.transactions.count()
    }

    /// A transaction record by id.
    pub async fn transaction(&self, id: TransactionId) -> Option<Transaction> {
        self.state.read().await.transactions.transaction(id).cloned()
    }

    /// Number of confirmations recorded for `id`; 0 for unknown ids.
    pub async fn confirmation_count(&self, id: TransactionId) -> usize {
        self.state.read().await.transactions.confirmation_count(id)
    }

    /// The members confirming `id`, in seat order.
    pub async fn confirmations(&self, id: TransactionId) -> Vec<Address> {
        let state = self.state.read().await;
        let Some(tx) = state.transactions.transaction(id) else {
            return Vec::new();
        };
        state
            .registry
            .members()
            .iter()
            .filter(|member| tx.confirmations.contains(member))
            .copied()
            .collect()
    }

    /// Whether `member`'s confirmation is recorded on `id`.
    pub async fn has_confirmed(&self, id: TransactionId, member: &Address) -> bool {
        let state = self.state.read().await;
        state
            .transactions
            .transaction(id)
            .map(|tx| tx.confirmations.contains(member))
            .unwrap_or(false)
    }

    /// Whether `id` currently meets quorum, evaluated against the present
    /// required-vote count.
    pub async fn is_confirmed(&self, id: TransactionId) -> bool {
        let state = self.state.read().await;
        state.transactions.transaction(id).is_some() && Self::meets_quorum(&state, id)
    }

    /// Ids of transactions that have not executed, in submission order.
    pub async fn pending_transaction_ids(&self) -> Vec<TransactionId> {
        self.state.read().await.transactions.pending_ids()
    }

    /// Ids of executed transactions, in submission order.
    pub async fn executed_transaction_ids(&self) -> Vec<TransactionId> {
        self.state.read().await.transactions.executed_ids()
    }

    /// The address payload of an add-member, remove-member or
    /// transfer-ownership transaction.
    pub async fn address_payload(&self, id: TransactionId) -> Option<Address> {
        self.with_action(id, |action| match action {
            ProposalAction::AddMember { member } | ProposalAction::RemoveMember { member } => {
                Some(*member)
            }
            ProposalAction::TransferOwnership { new_owner } => Some(*new_owner),
            _ => None,
        })
        .await
    }

    /// The percentage payload of a change-quorum transaction.
    pub async fn quorum_payload(&self, id: TransactionId) -> Option<u8> {
        self.with_action(id, |action| match action {
            ProposalAction::ChangeQuorum { quorum } => Some(*quorum),
            _ => None,
        })
        .await
    }

    /// The URI payload of a set-base-uri transaction.
    pub async fn base_uri_payload(&self, id: TransactionId) -> Option<String> {
        self.with_action(id, |action| match action {
            ProposalAction::SetBaseUri { base_uri } => Some(base_uri.clone()),
            _ => None,
        })
        .await
    }

    /// The (old, new) payload of a replace-member transaction.
    pub async fn replace_member_payload(&self, id: TransactionId) -> Option<(Address, Address)> {
        self.with_action(id, |action| match action {
            ProposalAction::ReplaceMember {
                old_member,
                new_member,
            } => Some((*old_member, *new_member)),
            _ => None,
        })
        .await
    }

    /// The hand-off payload of a pass-trophy transaction.
    pub async fn pass_trophy_payload(&self, id: TransactionId) -> Option<TrophyPassRequest> {
        self.with_action(id, |action| match action {
            ProposalAction::PassTrophy(request) => Some(request.clone()),
            _ => None,
        })
        .await
    }

    /// Snapshot of the event journal, in emission order.
    pub async fn events(&self) -> Vec<GovernanceEvent> {
        self.events.read().await.clone()
    }

    // ---- internals ------------------------------------------------------

    async fn with_action<T>(
        &self,
        id: TransactionId,
        f: impl FnOnce(&ProposalAction) -> Option<T>,
    ) -> Option<T> {
        let state = self.state.read().await;
        state
            .transactions
            .transaction(id)
            .and_then(|tx| f(&tx.action))
    }

    fn require_member(&self, state: &GovernanceState, sender: &Address) -> GovernanceResult<()> {
        if !state.registry.is_member(sender) {
            return Err(GovernanceError::NotMember(*sender));
        }
        Ok(())
    }

    fn meets_quorum(state: &GovernanceState, id: TransactionId) -> bool {
        state.transactions.confirmation_count(id) >= state.registry.required_votes()
    }

    /// Queue `action`, record the submitter's auto-confirmation, and journal
    /// the call's events once its outcome is settled.
    async fn queue_and_confirm(
        &self,
        state: &mut GovernanceState,
        action: ProposalAction,
        sender: Address,
    ) -> GovernanceResult<TransactionId> {
        let kind = action.kind();
        let id = state.transactions.submit(action);
        info!(id, ?kind, sender = %sender, "transaction submitted");

        let mut events = vec![GovernanceEvent::Submission { id }];
        self.confirm_and_maybe_execute(state, &mut events, id, sender)
            .await?;
        self.journal(events).await;
        Ok(id)
    }

    /// Record a confirmation and run the inline execution attempt when the
    /// threshold is now met. A round-fence failure unwinds the confirmation
    /// and fails the whole call; any other handler error leaves the vote
    /// standing and the transaction pending.
    async fn confirm_and_maybe_execute(
        &self,
        state: &mut GovernanceState,
        events: &mut Vec<GovernanceEvent>,
        id: TransactionId,
        sender: Address,
    ) -> GovernanceResult<()> {
        state.transactions.confirm(id, sender)?;
        debug!(id, sender = %sender, "confirmation recorded");
        events.push(GovernanceEvent::Confirmation { sender, id });

        if Self::meets_quorum(state, id) {
            match self.dispatcher.dispatch(state, id).await {
                Ok(executed) => events.extend(executed),
                Err(stale @ GovernanceError::TrophyAlreadyPassed { .. }) => {
                    state.transactions.rescind(id, &sender);
                    return Err(stale);
                }
                Err(err) => {
                    warn!(id, error = %err, "execution attempt failed, transaction stays pending");
                }
            }
        }
        Ok(())
    }

    async fn journal(&self, events: Vec<GovernanceEvent>) {
        if events.is_empty() {
            return;
        }
        self.events.write().await.extend(events);
    }
}
