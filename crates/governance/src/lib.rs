//! Member-quorum governance engine.
//!
//! Privileged actions are queued as typed transactions that accumulate
//! confirmations from a fixed member set and execute automatically once the
//! quorum threshold is met. Trophy hand-offs additionally have a
//! holder-initiated fast path that bypasses the queue entirely; queued
//! hand-offs therefore carry a round fence, checked at execution time, so a
//! proposal superseded by a fast-path pass can never run.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use laurel_common::{Address, RoundId, TransactionId};
use laurel_trophy::TrophyError;

mod execution;
pub mod manager;
pub mod members;
pub mod transactions;

// Re-exports
pub use manager::GovernanceManager;
pub use members::MemberRegistry;
pub use transactions::TransactionLedger;

/// Error types for governance operations.
#[derive(Error, Debug)]
pub enum GovernanceError {
    /// The caller has no voting rights.
    #[error("caller {0} is not a member")]
    NotMember(Address),

    /// The zero address was supplied where a participant is required.
    #[error("address is the zero address")]
    ZeroAddress,

    /// The address is already a member.
    #[error("member {0} already exists")]
    DuplicateMember(Address),

    /// The address is not a member.
    #[error("member {0} does not exist")]
    UnknownMember(Address),

    /// The quorum percentage is outside [0, 100].
    #[error("quorum must be between 0 and 100, got {0}")]
    InvalidQuorum(u8),

    /// Recipient and winner-name lists differ in length.
    #[error("recipient and winner name lists differ in length: {recipients} != {names}")]
    LengthMismatch {
        /// Number of recipient addresses supplied.
        recipients: usize,
        /// Number of winner names supplied.
        names: usize,
    },

    /// The operation would leave the governance without members.
    #[error("the member set must not become empty")]
    EmptyMemberSet,

    /// No transaction with this id has been submitted.
    #[error("transaction {0} does not exist")]
    InvalidTransaction(TransactionId),

    /// The transaction has already executed.
    #[error("transaction {0} has already been executed")]
    AlreadyExecuted(TransactionId),

    /// The member has already confirmed this transaction.
    #[error("transaction {id} is already confirmed by {member}")]
    AlreadyConfirmed {
        /// Transaction in question.
        id: TransactionId,
        /// Member whose confirmation is already recorded.
        member: Address,
    },

    /// The member has no confirmation on this transaction to revoke.
    #[error("transaction {id} is not confirmed by {member}")]
    NotConfirmed {
        /// Transaction in question.
        id: TransactionId,
        /// Member with no recorded confirmation.
        member: Address,
    },

    /// The trophy moved out from under a queued hand-off. The transaction
    /// stays formally pending but can never execute.
    #[error("trophy has been passed already, transaction {id} can no longer execute")]
    TrophyAlreadyPassed {
        /// The permanently invalidated transaction.
        id: TransactionId,
    },

    /// Error reported by the trophy ledger.
    #[error("trophy ledger error: {0}")]
    Trophy(#[from] TrophyError),
}

/// Result type for governance operations.
pub type GovernanceResult<T> = Result<T, GovernanceError>;

/// Kinds of governed actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalKind {
    /// Add an address to the member set.
    AddMember,
    /// Remove an address from the member set.
    RemoveMember,
    /// Swap one member for another, preserving position.
    ReplaceMember,
    /// Change the quorum percentage.
    ChangeQuorum,
    /// Hand the trophy to a new set of winners.
    PassTrophy,
    /// Hand administration of the trophy ledger to another address.
    TransferOwnership,
    /// Change the trophy ledger's base URI.
    SetBaseUri,
}

/// The queued form of a trophy hand-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrophyPassRequest {
    /// The round this hand-off intends to create, fixed at submission time
    /// to `current_round_id + 1`. Execution re-checks it against the ledger;
    /// a mismatch means a fast-path pass superseded this request.
    pub target_round: RoundId,
    /// Name of the round.
    pub name: String,
    /// Hash of the off-ledger content describing the round.
    pub content_hash: Vec<u8>,
    /// Addresses receiving a winner token.
    pub recipients: Vec<Address>,
    /// Winner names, parallel to `recipients`.
    pub winner_names: Vec<String>,
}

/// Typed payload of a governed action; one variant per [`ProposalKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalAction {
    /// Add `member` to the member set.
    AddMember {
        /// Address to add.
        member: Address,
    },
    /// Remove `member` from the member set.
    RemoveMember {
        /// Address to remove.
        member: Address,
    },
    /// Replace `old_member` with `new_member` in place.
    ReplaceMember {
        /// Member being replaced.
        old_member: Address,
        /// Address taking the seat.
        new_member: Address,
    },
    /// Set the quorum percentage.
    ChangeQuorum {
        /// New percentage in [0, 100].
        quorum: u8,
    },
    /// Hand the trophy to a new set of winners.
    PassTrophy(TrophyPassRequest),
    /// Hand administration of the trophy ledger to `new_owner`.
    TransferOwnership {
        /// The new administrator.
        new_owner: Address,
    },
    /// Set the trophy ledger's base URI.
    SetBaseUri {
        /// The new URI prefix.
        base_uri: String,
    },
}

impl ProposalAction {
    /// The kind tag of this action.
    pub fn kind(&self) -> ProposalKind {
        match self {
            ProposalAction::AddMember { .. } => ProposalKind::AddMember,
            ProposalAction::RemoveMember { .. } => ProposalKind::RemoveMember,
            ProposalAction::ReplaceMember { .. } => ProposalKind::ReplaceMember,
            ProposalAction::ChangeQuorum { .. } => ProposalKind::ChangeQuorum,
            ProposalAction::PassTrophy(_) => ProposalKind::PassTrophy,
            ProposalAction::TransferOwnership { .. } => ProposalKind::TransferOwnership,
            ProposalAction::SetBaseUri { .. } => ProposalKind::SetBaseUri,
        }
    }
}

/// A queued governed action and its confirmation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Sequential id, starting at 1, never reused.
    pub id: TransactionId,
    /// The action this transaction will perform.
    pub action: ProposalAction,
    /// Whether the action has run. Set at most once.
    pub executed: bool,
    /// Members whose confirmation is currently recorded.
    pub confirmations: HashSet<Address>,
}

impl Transaction {
    /// The kind tag of the queued action.
    pub fn kind(&self) -> ProposalKind {
        self.action.kind()
    }
}

/// Domain signals journaled on every observable state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GovernanceEvent {
    /// A transaction was queued.
    Submission {
        /// The new transaction.
        id: TransactionId,
    },
    /// A member confirmed a transaction.
    Confirmation {
        /// The confirming member.
        sender: Address,
        /// The confirmed transaction.
        id: TransactionId,
    },
    /// A member revoked a confirmation.
    Revocation {
        /// The revoking member.
        sender: Address,
        /// The transaction the confirmation was removed from.
        id: TransactionId,
    },
    /// A transaction executed.
    Execution {
        /// The executed transaction.
        id: TransactionId,
    },
    /// A member joined the member set.
    MemberAdded {
        /// The new member.
        member: Address,
    },
    /// A member left the member set.
    MemberRemoved {
        /// The removed member.
        member: Address,
    },
    /// A member seat changed hands.
    MemberReplaced {
        /// The member that was replaced.
        old_member: Address,
        /// The member now holding the seat.
        new_member: Address,
    },
    /// The quorum percentage changed.
    QuorumChanged {
        /// Percentage before the change.
        old_quorum: u8,
        /// Percentage after the change.
        new_quorum: u8,
    },
    /// Administration of the trophy ledger changed hands.
    OwnershipTransferred {
        /// Administrator before the change.
        previous_owner: Address,
        /// Administrator after the change.
        new_owner: Address,
    },
    /// The trophy moved to a new round of winners.
    TrophyPassed {
        /// The newly minted round.
        round_id: RoundId,
    },
}

/// Result of an explicit execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The transaction executed in this call.
    Executed,
    /// Nothing happened: not enough confirmations, already executed, or the
    /// handler declined and the transaction stays pending.
    NotReady,
}

/// How a trophy hand-off request was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrophyPassOutcome {
    /// The holder fast path ran; the trophy moved without a transaction.
    Passed {
        /// The newly minted round.
        round_id: RoundId,
    },
    /// The request was queued for member confirmation.
    Queued {
        /// The allocated transaction.
        transaction_id: TransactionId,
    },
}
