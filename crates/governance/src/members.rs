//! Member registry and quorum arithmetic.
//!
//! The registry keeps the ordered member list, the quorum percentage, and
//! the derived required-vote count. Mutators are crate-private: membership
//! only changes as the effect of an executed transaction.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use laurel_common::Address;

use crate::{GovernanceError, GovernanceResult};

/// Ordered set of governance members plus the quorum percentage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRegistry {
    /// Members in seat order.
    members: Vec<Address>,
    /// Parallel set for O(1) membership tests.
    lookup: HashSet<Address>,
    /// Quorum percentage in [0, 100].
    quorum: u8,
    /// Cached `ceil(member_count * quorum / 100)`.
    required_votes: usize,
}

impl MemberRegistry {
    /// Build a registry from the founding member set.
    pub fn new(quorum: u8, members: Vec<Address>) -> GovernanceResult<Self> {
        Self::check_quorum(quorum)?;
        if members.is_empty() {
            return Err(GovernanceError::EmptyMemberSet);
        }

        let mut registry = Self {
            members: Vec::with_capacity(members.len()),
            lookup: HashSet::with_capacity(members.len()),
            quorum,
            required_votes: 0,
        };
        for member in members {
            registry.add_member(member)?;
        }
        Ok(registry)
    }

    /// Whether `address` holds a seat.
    pub fn is_member(&self, address: &Address) -> bool {
        self.lookup.contains(address)
    }

    /// Members in seat order.
    pub fn members(&self) -> &[Address] {
        &self.members
    }

    /// Number of seats.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Quorum percentage in [0, 100].
    pub fn quorum(&self) -> u8 {
        self.quorum
    }

    /// Confirmations a transaction needs before it may execute.
    ///
    /// Always read live: quorum or membership changes retroactively affect
    /// every pending transaction.
    pub fn required_votes(&self) -> usize {
        self.required_votes
    }

    pub(crate) fn check_add(&self, member: &Address) -> GovernanceResult<()> {
        if member.is_zero() {
            return Err(GovernanceError::ZeroAddress);
        }
        if self.lookup.contains(member) {
            return Err(GovernanceError::DuplicateMember(*member));
        }
        Ok(())
    }

    pub(crate) fn check_remove(&self, member: &Address) -> GovernanceResult<()> {
        if !self.lookup.contains(member) {
            return Err(GovernanceError::UnknownMember(*member));
        }
        if self.members.len() == 1 {
            return Err(GovernanceError::EmptyMemberSet);
        }
        Ok(())
    }

    pub(crate) fn check_replace(
        &self,
        old_member: &Address,
        new_member: &Address,
    ) -> GovernanceResult<()> {
        if !self.lookup.contains(old_member) {
            return Err(GovernanceError::UnknownMember(*old_member));
        }
        if new_member.is_zero() {
            return Err(GovernanceError::ZeroAddress);
        }
        // Also rejects new_member == old_member.
        if self.lookup.contains(new_member) {
            return Err(GovernanceError::DuplicateMember(*new_member));
        }
        Ok(())
    }

    pub(crate) fn check_quorum(quorum: u8) -> GovernanceResult<()> {
        if quorum > 100 {
            return Err(GovernanceError::InvalidQuorum(quorum));
        }
        Ok(())
    }

    /// Append a member and recompute the vote threshold.
    pub(crate) fn add_member(&mut self, member: Address) -> GovernanceResult<()> {
        self.check_add(&member)?;
        self.members.push(member);
        self.lookup.insert(member);
        self.recompute_required_votes();
        Ok(())
    }

    /// Remove a member and recompute the vote threshold. The order of the
    /// remaining members may change.
    pub(crate) fn remove_member(&mut self, member: &Address) -> GovernanceResult<()> {
        self.check_remove(member)?;
        if let Some(index) = self.members.iter().position(|m| m == member) {
            self.members.swap_remove(index);
        }
        self.lookup.remove(member);
        self.recompute_required_votes();
        Ok(())
    }

    /// Swap `old_member` for `new_member` in place, preserving the seat
    /// position. The vote threshold is unaffected.
    pub(crate) fn replace_member(
        &mut self,
        old_member: &Address,
        new_member: Address,
    ) -> GovernanceResult<()> {
        self.check_replace(old_member, &new_member)?;
        if let Some(index) = self.members.iter().position(|m| m == old_member) {
            self.members[index] = new_member;
        }
        self.lookup.remove(old_member);
        self.lookup.insert(new_member);
        Ok(())
    }

    /// Set the quorum percentage and recompute the vote threshold.
    pub(crate) fn change_quorum(&mut self, quorum: u8) -> GovernanceResult<()> {
        Self::check_quorum(quorum)?;
        self.quorum = quorum;
        self.recompute_required_votes();
        Ok(())
    }

    fn recompute_required_votes(&mut self) {
        self.required_votes = (self.members.len() * self.quorum as usize).div_ceil(100);
    }
}
