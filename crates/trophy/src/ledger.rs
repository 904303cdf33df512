//! In-memory trophy ledger.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use laurel_common::utils::timestamp_secs;
use laurel_common::{Address, RoundId, TokenId};

use crate::{RoundInfo, TrophyError, TrophyLedger, TrophyResult, TrophyRound, Winner};

/// Everything the ledger tracks, behind one lock so each call is atomic.
struct LedgerState {
    owner: Address,
    base_uri: String,
    rounds: BTreeMap<RoundId, TrophyRound>,
    winners: HashMap<TokenId, Winner>,
    token_owners: HashMap<TokenId, Address>,
    token_uris: HashMap<TokenId, String>,
    current_round: RoundId,
    next_token: TokenId,
}

impl LedgerState {
    fn require_owner(&self, caller: &Address) -> TrophyResult<()> {
        if *caller != self.owner {
            return Err(TrophyError::NotOwner(*caller));
        }
        Ok(())
    }

    fn round(&self, id: RoundId) -> TrophyResult<&TrophyRound> {
        self.rounds.get(&id).ok_or(TrophyError::UnknownRound(id))
    }

    fn info(&self, round: &TrophyRound) -> RoundInfo {
        let winner_names = round
            .token_ids
            .iter()
            .filter_map(|token| self.winners.get(token))
            .map(|winner| winner.name.clone())
            .collect();

        RoundInfo {
            name: round.name.clone(),
            round_id: round.id,
            content_hash: round.content_hash.clone(),
            winner_names,
            token_ids: round.token_ids.clone(),
            awarded_at: round.awarded_at,
        }
    }
}

/// In-memory [`TrophyLedger`] implementation.
pub struct MemoryTrophyLedger {
    state: RwLock<LedgerState>,
}

impl MemoryTrophyLedger {
    /// Create an empty ledger administered by `owner`.
    pub fn new(owner: Address) -> Self {
        Self {
            state: RwLock::new(LedgerState {
                owner,
                base_uri: String::new(),
                rounds: BTreeMap::new(),
                winners: HashMap::new(),
                token_owners: HashMap::new(),
                token_uris: HashMap::new(),
                current_round: 0,
                next_token: 1,
            }),
        }
    }

    /// Total number of minted winner tokens.
    pub async fn total_supply(&self) -> u64 {
        self.state.read().await.next_token - 1
    }

    /// Owner of a minted token.
    pub async fn owner_of(&self, token: TokenId) -> TrophyResult<Address> {
        let state = self.state.read().await;
        state
            .token_owners
            .get(&token)
            .copied()
            .ok_or(TrophyError::UnknownToken(token))
    }

    /// Winner record behind a minted token.
    pub async fn winner(&self, token: TokenId) -> TrophyResult<Winner> {
        let state = self.state.read().await;
        state
            .winners
            .get(&token)
            .cloned()
            .ok_or(TrophyError::UnknownToken(token))
    }

    /// A recorded round.
    pub async fn round(&self, id: RoundId) -> TrophyResult<TrophyRound> {
        let state = self.state.read().await;
        state.round(id).cloned()
    }

    /// Aggregate view of the current round.
    pub async fn current_trophy(&self) -> TrophyResult<RoundInfo> {
        let state = self.state.read().await;
        if state.current_round == 0 {
            return Err(TrophyError::NoTrophy);
        }
        let round = state.round(state.current_round)?;
        Ok(state.info(round))
    }

    /// Aggregate view of a round by round id.
    pub async fn info_by_round_id(&self, id: RoundId) -> TrophyResult<RoundInfo> {
        let state = self.state.read().await;
        let round = state.round(id)?;
        Ok(state.info(round))
    }

    /// Aggregate view of the round a token was minted in.
    pub async fn info_by_token_id(&self, token: TokenId) -> TrophyResult<RoundInfo> {
        let state = self.state.read().await;
        let winner = state
            .winners
            .get(&token)
            .ok_or(TrophyError::UnknownToken(token))?;
        let round = state.round(winner.round_id)?;
        Ok(state.info(round))
    }

    /// The URI prefix tokens resolve under.
    pub async fn base_uri(&self) -> String {
        self.state.read().await.base_uri.clone()
    }

    /// Resolve a token's URI: `base_uri` followed by the token's explicit
    /// URI when one was set, or by the token id otherwise.
    pub async fn token_uri(&self, token: TokenId) -> TrophyResult<String> {
        let state = self.state.read().await;
        if !state.token_owners.contains_key(&token) {
            return Err(TrophyError::UnknownToken(token));
        }
        let suffix = match state.token_uris.get(&token) {
            Some(uri) => uri.clone(),
            None => token.to_string(),
        };
        Ok(format!("{}{}", state.base_uri, suffix))
    }

    /// Set a token's explicit URI. Administrator only.
    pub async fn set_token_uri(
        &self,
        caller: &Address,
        token: TokenId,
        uri: &str,
    ) -> TrophyResult<()> {
        let mut state = self.state.write().await;
        state.require_owner(caller)?;
        if !state.token_owners.contains_key(&token) {
            return Err(TrophyError::UnknownToken(token));
        }
        state.token_uris.insert(token, uri.to_string());
        Ok(())
    }
}

#[async_trait]
impl TrophyLedger for MemoryTrophyLedger {
    async fn current_round_id(&self) -> RoundId {
        self.state.read().await.current_round
    }

    async fn holds_current_trophy(&self, address: &Address) -> bool {
        let state = self.state.read().await;
        if state.current_round == 0 {
            return false;
        }
        let Some(round) = state.rounds.get(&state.current_round) else {
            return false;
        };
        round
            .token_ids
            .iter()
            .any(|token| state.token_owners.get(token) == Some(address))
    }

    async fn pass_trophy(
        &self,
        caller: &Address,
        name: &str,
        content_hash: &[u8],
        recipients: &[Address],
        winner_names: &[String],
    ) -> TrophyResult<RoundId> {
        let mut state = self.state.write().await;
        state.require_owner(caller)?;
        if recipients.len() != winner_names.len() {
            return Err(TrophyError::LengthMismatch {
                recipients: recipients.len(),
                names: winner_names.len(),
            });
        }

        let round_id = state.current_round + 1;
        let mut token_ids = Vec::with_capacity(recipients.len());
        for (recipient, winner_name) in recipients.iter().zip(winner_names) {
            let token = state.next_token;
            state.next_token += 1;
            state.winners.insert(
                token,
                Winner {
                    round_id,
                    name: winner_name.clone(),
                },
            );
            state.token_owners.insert(token, *recipient);
            token_ids.push(token);
            debug!(token, round = round_id, recipient = %recipient, "minted winner token");
        }

        state.rounds.insert(
            round_id,
            TrophyRound {
                id: round_id,
                name: name.to_string(),
                content_hash: content_hash.to_vec(),
                awarded_at: timestamp_secs(),
                token_ids,
            },
        );
        state.current_round = round_id;

        info!(
            round = round_id,
            name,
            hash = %hex::encode(content_hash),
            winners = recipients.len(),
            "trophy passed"
        );
        Ok(round_id)
    }

    async fn set_base_uri(&self, caller: &Address, base_uri: &str) -> TrophyResult<()> {
        let mut state = self.state.write().await;
        state.require_owner(caller)?;
        state.base_uri = base_uri.to_string();
        Ok(())
    }

    async fn owner(&self) -> Address {
        self.state.read().await.owner
    }

    async fn transfer_ownership(&self, caller: &Address, new_owner: Address) -> TrophyResult<()> {
        let mut state = self.state.write().await;
        state.require_owner(caller)?;
        if new_owner.is_zero() {
            return Err(TrophyError::ZeroAddress);
        }
        info!(previous = %state.owner, new = %new_owner, "trophy ledger ownership transferred");
        state.owner = new_owner;
        Ok(())
    }
}
