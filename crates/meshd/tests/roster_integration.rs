//! Integration tests for the roster actor.
//!
//! These drive `spawn_roster()` through `RosterHandle` only, the way the
//! listeners use it.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::collections::BTreeSet;

use mesh_core::{NodeId, NodeState, PeerAddr, Roster};
use meshd::registry::{spawn_roster, NodeEvent, Role, RosterError};

// ============================================================================
// Test Helpers
// ============================================================================

fn coordinator_role() -> Role {
    Role::Coordinator {
        addr: PeerAddr::new("localhost", 50010),
    }
}

fn member(port: u16) -> PeerAddr {
    PeerAddr::new("localhost", port)
}

// ============================================================================
// Admission Tests
// ============================================================================

#[tokio::test]
async fn test_sequential_admissions_are_dense() {
    let handle = spawn_roster(coordinator_role());

    let mut assigned = Vec::new();
    for i in 0..20u16 {
        let admission = handle.admit(member(50011 + i)).await.expect("should admit");
        assigned.push(admission.id.get());
    }

    let expected: Vec<u32> = (2..=21).collect();
    assert_eq!(assigned, expected);

    let view = handle.membership().await.unwrap();
    assert_eq!(view.roster.len(), 21);
    assert_eq!(view.roster.get(NodeId::COORDINATOR), Some(&member(50010)));
}

#[tokio::test]
async fn test_concurrent_admissions_get_distinct_ids() {
    let handle = spawn_roster(coordinator_role());

    let mut tasks = Vec::new();
    for i in 0..50u16 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            handle.admit(member(51000 + i)).await.unwrap().id
        }));
    }

    let mut ids = BTreeSet::new();
    for task in tasks {
        assert!(ids.insert(task.await.unwrap()), "duplicate ID assigned");
    }

    let expected: BTreeSet<NodeId> = (2..=51).map(NodeId::new).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_admission_snapshot_includes_new_member() {
    let handle = spawn_roster(coordinator_role());

    let admission = handle.admit(member(50020)).await.unwrap();

    let mut expected = Roster::seeded(member(50010));
    expected.insert(NodeId::new(2), member(50020));
    assert_eq!(admission.roster, expected);
    assert_eq!(admission.addr, member(50020));
}

#[tokio::test]
async fn test_admission_publishes_event() {
    let handle = spawn_roster(coordinator_role());
    let mut events = handle.subscribe();

    handle.admit(member(50020)).await.unwrap();

    match events.recv().await.unwrap() {
        NodeEvent::MemberAdmitted { id, addr } => {
            assert_eq!(id, NodeId::new(2));
            assert_eq!(addr, member(50020));
        }
        other => panic!("Expected MemberAdmitted, got {other:?}"),
    }
}

// ============================================================================
// Member Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_member_registration_flow() {
    let handle = spawn_roster(Role::Member);
    let mut events = handle.subscribe();

    let view = handle.membership().await.unwrap();
    assert_eq!(view.state, NodeState::Unregistered);
    assert_eq!(view.id, None);
    assert!(view.roster.is_empty());
    assert!(!view.is_coordinator);

    handle.begin_join().await.unwrap();

    let mut snapshot = Roster::seeded(member(50010));
    snapshot.insert(NodeId::new(2), member(50020));
    handle
        .complete_registration(NodeId::new(2), snapshot.clone())
        .await
        .unwrap();

    let view = handle.membership().await.unwrap();
    assert_eq!(view.state, NodeState::Registered);
    assert_eq!(view.id, Some(NodeId::new(2)));
    assert_eq!(view.roster, snapshot);

    assert!(matches!(
        events.recv().await.unwrap(),
        NodeEvent::Registered { id, .. } if id == NodeId::new(2)
    ));
}

#[tokio::test]
async fn test_roster_update_adds_exactly_one_entry() {
    let handle = spawn_roster(Role::Member);
    handle.begin_join().await.unwrap();

    let mut snapshot = Roster::seeded(member(50010));
    snapshot.insert(NodeId::new(2), member(50020));
    handle
        .complete_registration(NodeId::new(2), snapshot.clone())
        .await
        .unwrap();

    let mut updated = snapshot.clone();
    updated.insert(NodeId::new(3), member(50030));
    handle.replace_roster(updated).await.unwrap();

    let view = handle.membership().await.unwrap();
    assert_eq!(view.roster.len(), snapshot.len() + 1);
    for (id, addr) in snapshot.iter() {
        assert_eq!(view.roster.get(id), Some(addr));
    }
    assert_eq!(view.roster.get(NodeId::new(3)), Some(&member(50030)));
    assert_eq!(view.id, Some(NodeId::new(2)));
}

#[tokio::test]
async fn test_member_rejects_admission() {
    let handle = spawn_roster(Role::Member);
    assert_eq!(
        handle.admit(member(50020)).await.unwrap_err(),
        RosterError::NotCoordinator
    );
}

#[tokio::test]
async fn test_second_join_response_is_ignored() {
    let handle = spawn_roster(Role::Member);
    handle.begin_join().await.unwrap();
    handle
        .complete_registration(NodeId::new(2), Roster::seeded(member(50010)))
        .await
        .unwrap();

    let err = handle
        .complete_registration(NodeId::new(7), Roster::new())
        .await
        .unwrap_err();

    assert_eq!(err, RosterError::AlreadyRegistered { id: NodeId::new(2) });
    let view = handle.membership().await.unwrap();
    assert_eq!(view.id, Some(NodeId::new(2)));
    assert_eq!(view.roster, Roster::seeded(member(50010)));
}

#[tokio::test]
async fn test_handle_survives_clone_and_drop() {
    let handle = spawn_roster(coordinator_role());
    let clone = handle.clone();
    drop(handle);

    assert!(clone.is_connected());
    assert!(clone.membership().await.is_ok());
}
