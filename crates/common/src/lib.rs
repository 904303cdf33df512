//! Common primitives shared across the Laurel workspace.

pub mod address;
pub mod utils;

pub use address::{Address, AddressParseError};

/// Monotonically increasing id of a queued governance transaction.
///
/// Ids start at 1 and are never reused, even for transactions that can no
/// longer execute.
pub type TransactionId = u64;

/// Id of one trophy hand-off round. Round 0 means "no round yet".
pub type RoundId = u64;

/// Id of a minted winner token, sequential across all rounds.
pub type TokenId = u64;
