//! Trophy asset ledger.
//!
//! The trophy is handed from winners to winners in rounds. Each round mints
//! one winner token per recipient; token ids run sequentially across all
//! rounds. The ledger records who currently holds a token from the most
//! recent round, which is what the governance engine's fast path keys off.
//!
//! Mutations are gated on a single administrator address (normally the
//! governance engine itself).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use laurel_common::{Address, RoundId, TokenId};

pub mod ledger;

pub use ledger::MemoryTrophyLedger;

/// Error types for trophy ledger operations.
#[derive(Error, Debug)]
pub enum TrophyError {
    /// The caller is not the ledger administrator.
    #[error("caller {0} is not the trophy ledger owner")]
    NotOwner(Address),

    /// The proposed new administrator is the zero address.
    #[error("new owner is the zero address")]
    ZeroAddress,

    /// Recipient and winner-name lists differ in length.
    #[error("recipient and winner name lists differ in length: {recipients} != {names}")]
    LengthMismatch {
        /// Number of recipient addresses supplied.
        recipients: usize,
        /// Number of winner names supplied.
        names: usize,
    },

    /// No token with this id has been minted.
    #[error("token {0} does not exist")]
    UnknownToken(TokenId),

    /// No round with this id has been recorded.
    #[error("round {0} does not exist")]
    UnknownRound(RoundId),

    /// The trophy has never been awarded.
    #[error("no trophy has been awarded yet")]
    NoTrophy,
}

/// Result type for trophy ledger operations.
pub type TrophyResult<T> = Result<T, TrophyError>;

/// One hand-off of the trophy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrophyRound {
    /// Round id, starting at 1.
    pub id: RoundId,
    /// Name of the round, e.g. the tournament it was awarded for.
    pub name: String,
    /// Hash of the off-ledger content describing the round.
    pub content_hash: Vec<u8>,
    /// Unix time the round was recorded.
    pub awarded_at: i64,
    /// Tokens minted in this round, in recipient order.
    pub token_ids: Vec<TokenId>,
}

/// The record behind one minted winner token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    /// Round the token was minted in.
    pub round_id: RoundId,
    /// Winner name the token was minted for.
    pub name: String,
}

/// Aggregate view of a round and its winners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundInfo {
    /// Name of the round.
    pub name: String,
    /// Round id.
    pub round_id: RoundId,
    /// Hash of the off-ledger content describing the round.
    pub content_hash: Vec<u8>,
    /// Winner names, in recipient order.
    pub winner_names: Vec<String>,
    /// Tokens minted in the round, in recipient order.
    pub token_ids: Vec<TokenId>,
    /// Unix time the round was recorded.
    pub awarded_at: i64,
}

/// The ledger surface the governance engine administers.
#[async_trait]
pub trait TrophyLedger: Send + Sync {
    /// Id of the most recent round, 0 when nothing has been awarded yet.
    async fn current_round_id(&self) -> RoundId;

    /// Whether `address` owns a token minted in the current round.
    async fn holds_current_trophy(&self, address: &Address) -> bool;

    /// Mint one winner token per (recipient, name) pair into a new round.
    ///
    /// The new round becomes current and its id is returned.
    async fn pass_trophy(
        &self,
        caller: &Address,
        name: &str,
        content_hash: &[u8],
        recipients: &[Address],
        winner_names: &[String],
    ) -> TrophyResult<RoundId>;

    /// Replace the prefix used to derive token URIs.
    async fn set_base_uri(&self, caller: &Address, base_uri: &str) -> TrophyResult<()>;

    /// Current administrator of the ledger.
    async fn owner(&self) -> Address;

    /// Hand administration of the ledger to `new_owner`.
    async fn transfer_ownership(&self, caller: &Address, new_owner: Address) -> TrophyResult<()>;
}
