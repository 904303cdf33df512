//! Transaction execution.
//!
//! The dispatcher runs a transaction's effect exactly once, after the
//! caller has established that quorum is met and the transaction has not
//! executed. Registry and trophy errors abort only the attempt: the
//! transaction stays pending and can be retried once conditions change.
//! The one exception is the trophy round fence, which is a hard failure
//! the manager propagates to the caller.

use std::sync::Arc;

use tracing::{debug, info};

use laurel_common::{Address, TransactionId};
use laurel_trophy::TrophyLedger;

use crate::manager::GovernanceState;
use crate::{GovernanceError, GovernanceEvent, GovernanceResult, ProposalAction};

/// Maps an executable transaction to its effect.
pub(crate) struct Dispatcher {
    /// The governed asset ledger.
    trophy: Arc<dyn TrophyLedger>,
    /// The identity under which the engine administers the trophy ledger.
    address: Address,
}

impl Dispatcher {
    pub(crate) fn new(trophy: Arc<dyn TrophyLedger>, address: Address) -> Self {
        Self { trophy, address }
    }

    /// Run the effect of transaction `id` and mark it executed.
    ///
    /// Returns the domain events the effect produced, ending with the
    /// generic execution signal. On error nothing is marked and no events
    /// are returned.
    pub(crate) async fn dispatch(
        &self,
        state: &mut GovernanceState,
        id: TransactionId,
    ) -> GovernanceResult<Vec<GovernanceEvent>> {
        let action = state
            .transactions
            .transaction(id)
            .map(|tx| tx.action.clone())
            .ok_or(GovernanceError::InvalidTransaction(id))?;
        debug!(id, kind = ?action.kind(), "executing transaction");

        let mut events = Vec::with_capacity(2);
        match action {
            ProposalAction::AddMember { member } => {
                state.registry.add_member(member)?;
                info!(id, member = %member, "member added");
                events.push(GovernanceEvent::MemberAdded { member });
            }
            ProposalAction::RemoveMember { member } => {
                state.registry.remove_member(&member)?;
                info!(id, member = %member, "member removed");
                events.push(GovernanceEvent::MemberRemoved { member });
            }
            ProposalAction::ReplaceMember {
                old_member,
                new_member,
            } => {
                state.registry.replace_member(&old_member, new_member)?;
                info!(id, old = %old_member, new = %new_member, "member replaced");
                events.push(GovernanceEvent::MemberReplaced {
                    old_member,
                    new_member,
                });
            }
            ProposalAction::ChangeQuorum { quorum } => {
                let old_quorum = state.registry.quorum();
                state.registry.change_quorum(quorum)?;
                info!(id, old_quorum, new_quorum = quorum, "quorum changed");
                events.push(GovernanceEvent::QuorumChanged {
                    old_quorum,
                    new_quorum: quorum,
                });
            }
            ProposalAction::TransferOwnership { new_owner } => {
                let previous_owner = self.trophy.owner().await;
                self.trophy
                    .transfer_ownership(&self.address, new_owner)
                    .await?;
                info!(id, previous = %previous_owner, new = %new_owner, "ownership transferred");
                events.push(GovernanceEvent::OwnershipTransferred {
                    previous_owner,
                    new_owner,
                });
            }
            ProposalAction::SetBaseUri { base_uri } => {
                self.trophy.set_base_uri(&self.address, &base_uri).await?;
                info!(id, base_uri = %base_uri, "base URI updated");
            }
            ProposalAction::PassTrophy(request) => {
                // Round fence: the request targeted the round after the one
                // current at submission time. Any hand-off since then makes
                // this transaction permanently unexecutable.
                let current = self.trophy.current_round_id().await;
                if request.target_round != current + 1 {
                    return Err(GovernanceError::TrophyAlreadyPassed { id });
                }
                let round_id = self
                    .trophy
                    .pass_trophy(
                        &self.address,
                        &request.name,
                        &request.content_hash,
                        &request.recipients,
                        &request.winner_names,
                    )
                    .await?;
                info!(id, round = round_id, "trophy passed by quorum");
                events.push(GovernanceEvent::TrophyPassed { round_id });
            }
        }

        state.transactions.mark_executed(id);
        events.push(GovernanceEvent::Execution { id });
        Ok(events)
    }
}
