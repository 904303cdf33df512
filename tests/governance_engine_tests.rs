//! Scenario tests for the governance queue and member management.

use std::sync::Arc;

use laurel::common::Address;
use laurel::governance::{
    ExecutionOutcome, GovernanceError, GovernanceEvent, GovernanceManager, ProposalKind,
};
use laurel::trophy::{MemoryTrophyLedger, TrophyLedger};

fn addr(n: u64) -> Address {
    Address::from_low_u64(n)
}

fn engine() -> Address {
    Address::from_low_u64(0xC1F)
}

/// Four members, quorum 50 (two votes), the engine administering its own
/// trophy ledger.
fn deploy() -> (GovernanceManager, Arc<MemoryTrophyLedger>) {
    let trophy = Arc::new(MemoryTrophyLedger::new(engine()));
    let gov = GovernanceManager::new(
        engine(),
        Arc::clone(&trophy) as Arc<dyn TrophyLedger>,
        50,
        (0..4).map(addr).collect(),
    )
    .expect("valid deployment");
    (gov, trophy)
}

#[tokio::test]
async fn deployment_seats_the_founding_members() {
    let (gov, trophy) = deploy();

    assert_eq!(gov.members().await, (0..4).map(addr).collect::<Vec<_>>());
    for n in 0..6 {
        assert_eq!(gov.is_member(&addr(n)).await, n < 4);
    }
    assert_eq!(gov.quorum().await, 50);
    assert_eq!(gov.required_votes().await, 2);
    assert_eq!(gov.transaction_count().await, 0);
    assert_eq!(trophy.owner().await, gov.address());
}

#[tokio::test]
async fn add_member_executes_at_quorum() -> anyhow::Result<()> {
    let (gov, _trophy) = deploy();
    let new_member = addr(9);

    let id = gov.submit_add_member(addr(0), new_member).await?;
    assert_eq!(id, 1);
    assert_eq!(gov.confirmation_count(id).await, 1);
    assert!(gov.confirmation_count(id).await < gov.required_votes().await);
    assert!(!gov.is_confirmed(id).await);
    assert!(gov.has_confirmed(id, &addr(0)).await);
    assert!(!gov.has_confirmed(id, &addr(1)).await);
    assert_eq!(gov.transaction_count().await, 1);

    let tx = gov.transaction(id).await.expect("queued");
    assert_eq!(tx.kind(), ProposalKind::AddMember);
    assert!(!tx.executed);
    assert_eq!(gov.address_payload(id).await, Some(new_member));
    assert_eq!(gov.pending_transaction_ids().await, vec![id]);
    assert!(gov.executed_transaction_ids().await.is_empty());

    // One confirmation is not enough; probing is a no-op, not an error.
    assert_eq!(
        gov.execute_transaction(id, addr(0)).await?,
        ExecutionOutcome::NotReady
    );
    assert!(!gov.is_member(&new_member).await);

    // The second confirmation reaches quorum and executes inline.
    gov.confirm_transaction(id, addr(2)).await?;
    assert_eq!(gov.confirmation_count(id).await, 2);
    assert_eq!(gov.confirmations(id).await, vec![addr(0), addr(2)]);
    assert!(gov.transaction(id).await.expect("queued").executed);
    assert!(gov.pending_transaction_ids().await.is_empty());
    assert_eq!(gov.executed_transaction_ids().await, vec![id]);

    let members = gov.members().await;
    assert_eq!(members.len(), 5);
    assert_eq!(members[4], new_member);
    assert_eq!(gov.required_votes().await, 3);
    // The fifth seat raised the threshold past this transaction's count.
    assert!(!gov.is_confirmed(id).await);

    let events = gov.events().await;
    assert!(events.contains(&GovernanceEvent::MemberAdded { member: new_member }));
    assert_eq!(events.last(), Some(&GovernanceEvent::Execution { id }));

    assert!(matches!(
        gov.confirm_transaction(id, addr(1)).await,
        Err(GovernanceError::AlreadyExecuted(_))
    ));
    Ok(())
}

#[tokio::test]
async fn remove_member_needs_three_of_five() -> anyhow::Result<()> {
    let (gov, _trophy) = deploy();
    let add = gov.submit_add_member(addr(0), addr(9)).await?;
    gov.confirm_transaction(add, addr(2)).await?;
    assert_eq!(gov.member_count().await, 5);
    assert_eq!(gov.required_votes().await, 3);

    let to_remove = addr(1);
    let id = gov.submit_remove_member(addr(0), to_remove).await?;
    assert_eq!(gov.address_payload(id).await, Some(to_remove));

    // Two of three required votes: still pending.
    gov.confirm_transaction(id, addr(2)).await?;
    assert_eq!(gov.confirmation_count(id).await, 2);
    assert!(gov.is_member(&to_remove).await);
    assert_eq!(
        gov.execute_transaction(id, addr(0)).await?,
        ExecutionOutcome::NotReady
    );

    // Confirming twice does not move the count.
    assert!(matches!(
        gov.confirm_transaction(id, addr(0)).await,
        Err(GovernanceError::AlreadyConfirmed { .. })
    ));
    assert_eq!(gov.confirmation_count(id).await, 2);

    gov.confirm_transaction(id, addr(9)).await?;
    assert!(gov.is_confirmed(id).await);
    assert!(!gov.is_member(&to_remove).await);
    assert_eq!(gov.member_count().await, 4);
    assert_eq!(gov.required_votes().await, 2);
    assert!(gov
        .events()
        .await
        .contains(&GovernanceEvent::MemberRemoved { member: to_remove }));
    Ok(())
}

#[tokio::test]
async fn replace_member_keeps_the_seat_position() -> anyhow::Result<()> {
    let (gov, _trophy) = deploy();
    let id = gov.submit_replace_member(addr(0), addr(1), addr(8)).await?;
    assert_eq!(
        gov.replace_member_payload(id).await,
        Some((addr(1), addr(8)))
    );

    gov.confirm_transaction(id, addr(2)).await?;

    let members = gov.members().await;
    assert_eq!(members.len(), 4);
    assert_eq!(members[1], addr(8));
    assert!(!gov.is_member(&addr(1)).await);
    assert!(gov.is_member(&addr(8)).await);
    assert_eq!(gov.required_votes().await, 2);
    assert!(gov.events().await.contains(&GovernanceEvent::MemberReplaced {
        old_member: addr(1),
        new_member: addr(8)
    }));
    Ok(())
}

#[tokio::test]
async fn change_quorum_takes_effect_at_quorum() -> anyhow::Result<()> {
    let (gov, _trophy) = deploy();
    let id = gov.submit_change_quorum(addr(0), 75).await?;
    assert_eq!(gov.quorum_payload(id).await, Some(75));
    assert_eq!(
        gov.execute_transaction(id, addr(0)).await?,
        ExecutionOutcome::NotReady
    );
    assert_eq!(gov.quorum().await, 50);

    gov.confirm_transaction(id, addr(2)).await?;
    assert_eq!(gov.quorum().await, 75);
    assert_eq!(gov.required_votes().await, 3);
    assert!(gov.events().await.contains(&GovernanceEvent::QuorumChanged {
        old_quorum: 50,
        new_quorum: 75
    }));
    Ok(())
}

#[tokio::test]
async fn quorum_changes_apply_to_pending_transactions() -> anyhow::Result<()> {
    let (gov, _trophy) = deploy();

    // Raise the quorum to 75: the threshold becomes three of four.
    let raise = gov.submit_change_quorum(addr(0), 75).await?;
    gov.confirm_transaction(raise, addr(1)).await?;
    assert_eq!(gov.required_votes().await, 3);

    // Two confirmations leave the addition pending under quorum 75...
    let add = gov.submit_add_member(addr(0), addr(9)).await?;
    gov.confirm_transaction(add, addr(1)).await?;
    assert_eq!(gov.confirmation_count(add).await, 2);
    assert!(!gov.is_confirmed(add).await);
    assert_eq!(
        gov.execute_transaction(add, addr(0)).await?,
        ExecutionOutcome::NotReady
    );

    // ...but lowering the quorum again makes those two votes sufficient.
    let lower = gov.submit_change_quorum(addr(0), 50).await?;
    gov.confirm_transaction(lower, addr(1)).await?;
    gov.confirm_transaction(lower, addr(2)).await?;
    assert_eq!(gov.required_votes().await, 2);

    assert!(gov.is_confirmed(add).await);
    assert_eq!(
        gov.execute_transaction(add, addr(0)).await?,
        ExecutionOutcome::Executed
    );
    assert!(gov.is_member(&addr(9)).await);
    Ok(())
}

#[tokio::test]
async fn failed_execution_leaves_the_transaction_pending() -> anyhow::Result<()> {
    let (gov, _trophy) = deploy();
    let member = addr(9);

    // Two identical additions pass submission-time validation.
    let first = gov.submit_add_member(addr(0), member).await?;
    let second = gov.submit_add_member(addr(1), member).await?;

    gov.confirm_transaction(first, addr(1)).await?;
    assert!(gov.is_member(&member).await);
    assert_eq!(gov.required_votes().await, 3);

    // The duplicate reaches quorum but fails at execution time; the votes
    // stand and the transaction stays pending.
    gov.confirm_transaction(second, addr(2)).await?;
    gov.confirm_transaction(second, addr(3)).await?;
    let tx = gov.transaction(second).await.expect("queued");
    assert!(!tx.executed);
    assert_eq!(gov.confirmation_count(second).await, 3);
    assert_eq!(
        gov.execute_transaction(second, addr(0)).await?,
        ExecutionOutcome::NotReady
    );

    // Once the member leaves, the pending addition can execute after all.
    let removal = gov.submit_remove_member(addr(0), member).await?;
    gov.confirm_transaction(removal, addr(1)).await?;
    gov.confirm_transaction(removal, addr(2)).await?;
    assert!(!gov.is_member(&member).await);

    assert_eq!(
        gov.execute_transaction(second, addr(0)).await?,
        ExecutionOutcome::Executed
    );
    assert!(gov.is_member(&member).await);
    Ok(())
}

#[tokio::test]
async fn transfer_ownership_hands_off_the_trophy_ledger() -> anyhow::Result<()> {
    let (gov, trophy) = deploy();
    let new_owner = addr(0);

    let id = gov.submit_transfer_ownership(addr(0), new_owner).await?;
    assert_eq!(gov.address_payload(id).await, Some(new_owner));
    assert_eq!(
        gov.execute_transaction(id, addr(0)).await?,
        ExecutionOutcome::NotReady
    );
    assert_eq!(trophy.owner().await, gov.address());

    gov.confirm_transaction(id, addr(2)).await?;
    assert_eq!(trophy.owner().await, new_owner);
    assert!(gov
        .events()
        .await
        .contains(&GovernanceEvent::OwnershipTransferred {
            previous_owner: gov.address(),
            new_owner
        }));

    // The engine no longer administers the ledger; governed trophy actions
    // now fail at execution time and stay pending.
    let uri = gov.submit_set_base_uri(addr(0), "http://example.com/").await?;
    gov.confirm_transaction(uri, addr(2)).await?;
    assert!(!gov.transaction(uri).await.expect("queued").executed);
    Ok(())
}

#[tokio::test]
async fn set_base_uri_updates_the_ledger() -> anyhow::Result<()> {
    let (gov, trophy) = deploy();
    let id = gov
        .submit_set_base_uri(addr(0), "http://example.com/laurel/")
        .await?;
    assert_eq!(
        gov.base_uri_payload(id).await,
        Some("http://example.com/laurel/".to_string())
    );
    assert_eq!(trophy.base_uri().await, "");

    gov.confirm_transaction(id, addr(2)).await?;
    assert_eq!(trophy.base_uri().await, "http://example.com/laurel/");
    Ok(())
}

#[tokio::test]
async fn journal_orders_signals_by_emission() -> anyhow::Result<()> {
    let (gov, _trophy) = deploy();
    let id = gov.submit_add_member(addr(0), addr(9)).await?;
    gov.revoke_confirmation(id, addr(0)).await?;
    gov.confirm_transaction(id, addr(0)).await?;
    gov.confirm_transaction(id, addr(1)).await?;

    assert_eq!(
        gov.events().await,
        vec![
            GovernanceEvent::Submission { id },
            GovernanceEvent::Confirmation { sender: addr(0), id },
            GovernanceEvent::Revocation { sender: addr(0), id },
            GovernanceEvent::Confirmation { sender: addr(0), id },
            GovernanceEvent::Confirmation { sender: addr(1), id },
            GovernanceEvent::MemberAdded { member: addr(9) },
            GovernanceEvent::Execution { id },
        ]
    );
    Ok(())
}
