//! Access-right registry lifecycle tests
//!
//! Project creation, registry attachment under the well-known name, and
//! the gated grant/revoke/modify pipeline with ungated verification.

mod common;

use assert_matches::assert_matches;
use std::sync::Arc;

use common::single_admin;
use concord_client::AdminClient;
use concord_core::charter::CharterId;
use concord_core::errors::Error;
use concord_core::instruction::InstanceId;
use concord_core::ledger::Ledger;
use concord_core::registry::CapabilitySet;
use concord_testkit::InMemoryLedger;

/// Run a proposal through the single-admin pipeline: sign, then execute.
async fn run(client: &mut AdminClient, proposal: &InstanceId) {
    client.sign_proposal(proposal).await.unwrap();
    client.execute_proposal(proposal).await.unwrap();
}

/// Project with an attached empty access registry
async fn project_with_registry(
) -> (Arc<InMemoryLedger>, AdminClient, CharterId, CharterId) {
    let (ledger, mut admin, charter) = single_admin().await;

    let (proposal, project) = admin.create_project(&charter, "site query governance").await.unwrap();
    run(&mut admin, &proposal).await;

    let proposal = admin.create_access_registry(&charter, &project).await.unwrap();
    run(&mut admin, &proposal).await;

    let registry = admin.registry_instance_of(&proposal).await.unwrap();
    admin.attach_access_registry(&project, &registry).await.unwrap();

    (ledger, admin, charter, project)
}

#[tokio::test]
async fn granted_capabilities_verify_as_whole_tokens() {
    let (_ledger, mut admin, charter, project) = project_with_registry().await;

    let caps = CapabilitySet::from_tokens(["count_per_site_shuffled", "count_global"]);
    let proposal = admin.grant_querier(&charter, &project, "1:1", caps).await.unwrap();
    run(&mut admin, &proposal).await;

    assert!(admin.verify_access(&project, "1:1", "count_per_site_shuffled").await.unwrap());
    assert!(admin.verify_access(&project, "1:1", "count_global").await.unwrap());
    // Token comparison, not substring containment.
    assert!(!admin.verify_access(&project, "1:1", "count").await.unwrap());

    let caps = CapabilitySet::from_tokens(["count_per_site_shuffled"]);
    let proposal = admin.modify_querier(&charter, &project, "1:1", caps).await.unwrap();
    run(&mut admin, &proposal).await;

    assert!(admin.verify_access(&project, "1:1", "count_per_site_shuffled").await.unwrap());
    assert!(!admin.verify_access(&project, "1:1", "count_global").await.unwrap());
    assert_matches!(
        admin.verify_access(&project, "2:1", "count_global").await,
        Err(Error::NotFound { .. })
    );
}

#[tokio::test]
async fn duplicate_grants_and_unknown_modifications_are_rejected_locally() {
    let (ledger, mut admin, charter, project) = project_with_registry().await;
    let height_before = ledger.current_height().await.unwrap();

    let caps = CapabilitySet::from_tokens(["count_global"]);
    let proposal = admin.grant_querier(&charter, &project, "1:1", caps.clone()).await.unwrap();
    run(&mut admin, &proposal).await;
    let height_after_grant = ledger.current_height().await.unwrap();
    assert!(height_after_grant > height_before);

    // Rejected against the committed record before any instruction is built.
    assert_matches!(
        admin.grant_querier(&charter, &project, "1:1", caps.clone()).await,
        Err(Error::AlreadyExists { .. })
    );
    assert_matches!(
        admin.modify_querier(&charter, &project, "2:1", caps).await,
        Err(Error::NotFound { .. })
    );
    assert_eq!(ledger.current_height().await.unwrap(), height_after_grant);
}

#[tokio::test]
async fn revoking_an_absent_querier_is_a_silent_no_op() {
    let (_ledger, mut admin, charter, project) = project_with_registry().await;

    let caps = CapabilitySet::from_tokens(["count_global"]);
    let proposal = admin.grant_querier(&charter, &project, "1:1", caps).await.unwrap();
    run(&mut admin, &proposal).await;

    // Unknown querier: the revocation still proposes and commits an
    // unchanged record.
    let proposal = admin.revoke_querier(&charter, &project, "ghost").await.unwrap();
    run(&mut admin, &proposal).await;
    assert!(admin.verify_access(&project, "1:1", "count_global").await.unwrap());

    let proposal = admin.revoke_querier(&charter, &project, "1:1").await.unwrap();
    run(&mut admin, &proposal).await;
    assert_matches!(
        admin.verify_access(&project, "1:1", "count_global").await,
        Err(Error::NotFound { .. })
    );
}

#[tokio::test]
async fn registry_lookups_fail_before_attachment() {
    let (_ledger, mut admin, charter) = single_admin().await;

    let (proposal, project) = admin.create_project(&charter, "unattached").await.unwrap();
    run(&mut admin, &proposal).await;

    // No "AR" binding yet: verification and mutation both miss.
    assert_matches!(
        admin.verify_access(&project, "1:1", "count_global").await,
        Err(Error::NotFound { .. })
    );
    assert_matches!(
        admin
            .grant_querier(&charter, &project, "1:1", CapabilitySet::from_tokens(["count_global"]))
            .await,
        Err(Error::NotFound { .. })
    );
}

#[tokio::test]
async fn registry_mutations_stay_gated_when_the_admin_set_grows() {
    let (ledger, mut admin, charter, project) = project_with_registry().await;
    let mut second = common::admit_admin(&ledger, &mut [&mut admin], &charter, 2).await;

    // The project charter still lists only the creator, so the creator's
    // single countersignature executes registry updates even though the
    // governance charter now has two voters.
    let caps = CapabilitySet::from_tokens(["count_global"]);
    let proposal = admin.grant_querier(&charter, &project, "1:1", caps).await.unwrap();
    run(&mut admin, &proposal).await;
    assert!(admin.verify_access(&project, "1:1", "count_global").await.unwrap());

    // The second admin's signature alone does not satisfy the project
    // charter's update rule.
    let proposal = second
        .revoke_querier(&charter, &project, "1:1")
        .await
        .unwrap();
    second.sign_proposal(&proposal).await.unwrap();
    assert_matches!(
        second.execute_proposal(&proposal).await,
        Err(Error::Authorization { .. })
    );
}
