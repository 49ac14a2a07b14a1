use std::{future::Future, sync::Arc, time::Duration};

use client_core::{
    ClientError, ClientSettings, ClientEvent, Outcome, ProposalView, SyncCoordinator,
};
use ledger_gateway::{InMemoryLedger, DEFAULT_CONTRACT_ADDRESS};
use shared::domain::{Address, ProposalId, ProposalStatus};

const ALICE: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
const BOB: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

fn ledger() -> InMemoryLedger {
    InMemoryLedger::deploy(Address::new(DEFAULT_CONTRACT_ADDRESS))
}

async fn connect_as(ledger: &InMemoryLedger, signer: &str) -> Arc<SyncCoordinator> {
    let coordinator = SyncCoordinator::new_with_gateway(
        ClientSettings::default(),
        Arc::new(ledger.gateway(Some(Address::new(signer)))),
    );
    assert_eq!(
        coordinator.connect().await.expect("connect"),
        Outcome::Applied
    );
    coordinator
}

async fn wait_for_snapshot<F, Fut>(coordinator: &SyncCoordinator, what: &str, condition: F)
where
    F: Fn(Arc<Vec<ProposalView>>) -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition(coordinator.snapshot().await).await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

#[tokio::test]
async fn two_members_stay_in_sync_through_a_proposal_lifecycle() {
    let ledger = ledger();
    let alice = connect_as(&ledger, ALICE).await;
    let bob = connect_as(&ledger, BOB).await;

    assert_eq!(
        alice.create_proposal("Fund the audit").await.expect("create"),
        Outcome::Applied
    );
    let created = alice.snapshot().await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].id, ProposalId(1));
    assert_eq!(created[0].status, ProposalStatus::Pending);

    wait_for_snapshot(&bob, "bob to see the new proposal", |snapshot| async move {
        snapshot.len() == 1
    })
    .await;

    assert_eq!(bob.vote(ProposalId(1)).await.expect("vote"), Outcome::Applied);
    let after_vote = bob.snapshot().await;
    assert_eq!(after_vote[0].vote_count, 1);
    assert!(after_vote[0].has_voted);

    wait_for_snapshot(&alice, "alice to see bob's vote", |snapshot| async move {
        snapshot.first().is_some_and(|p| p.vote_count == 1)
    })
    .await;
    assert!(!alice.snapshot().await[0].has_voted);

    let err = bob.vote(ProposalId(1)).await.expect_err("second vote reverts");
    assert!(matches!(err, ClientError::Submission(ref message) if message.contains("already voted")));
    assert!(bob.is_idle());

    assert_eq!(
        alice.execute_proposal(ProposalId(1)).await.expect("execute"),
        Outcome::Applied
    );
    assert_eq!(alice.snapshot().await[0].status, ProposalStatus::Executed);
    wait_for_snapshot(&bob, "bob to see execution", |snapshot| async move {
        snapshot.first().is_some_and(|p| p.executed)
    })
    .await;

    let err = bob
        .execute_proposal(ProposalId(1))
        .await
        .expect_err("already executed");
    assert!(err.message().contains("already executed"));
}

#[tokio::test]
async fn twenty_votes_activate_a_proposal() {
    let ledger = ledger();
    let author = connect_as(&ledger, ALICE).await;
    author
        .create_proposal("Raise quorum")
        .await
        .expect("create");

    for n in 1..=20u64 {
        let voter = connect_as(&ledger, &format!("0x{n:040x}")).await;
        voter.vote(ProposalId(1)).await.expect("vote");
        let status = voter.snapshot().await[0].status;
        let expected = if n < 20 {
            ProposalStatus::Pending
        } else {
            ProposalStatus::Active
        };
        assert_eq!(status, expected, "after {n} votes");
    }

    wait_for_snapshot(&author, "author to see activation", |snapshot| async move {
        snapshot.first().is_some_and(|p| p.vote_count == 20)
    })
    .await;
    let view = author.snapshot().await[0].clone();
    assert_eq!(view.status, ProposalStatus::Active);
    assert!(!view.has_voted);
}

#[tokio::test]
async fn wrong_contract_address_fails_setup() {
    let ledger = ledger();
    let mut settings = ClientSettings::default();
    settings.contract_address = Address::new("0x0000000000000000000000000000000000000001");
    let coordinator = SyncCoordinator::new_with_gateway(
        settings,
        Arc::new(ledger.gateway(Some(Address::new(ALICE)))),
    );
    let mut events = coordinator.subscribe_events();

    let err = coordinator.connect().await.expect_err("no contract there");
    assert!(matches!(err, ClientError::ContractSetup(_)));
    assert!(!coordinator.session().await.is_connected());

    let mut titles = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ClientEvent::Notification(notification) = event {
            titles.push(notification.title);
        }
    }
    assert_eq!(titles, vec!["Contract Setup Failed"]);
}

#[tokio::test]
async fn provider_without_signer_cannot_connect() {
    let ledger = ledger();
    let coordinator =
        SyncCoordinator::new_with_gateway(ClientSettings::default(), Arc::new(ledger.gateway(None)));

    let err = coordinator.connect().await.expect_err("no signer");
    assert_eq!(
        err,
        ClientError::Connection("no signer available from provider".to_string())
    );
    assert_eq!(
        coordinator.refresh().await.expect("refresh"),
        Outcome::Skipped(client_core::SkipReason::NotConnected)
    );
}
