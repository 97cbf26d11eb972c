//! Shared setup for governance and registry lifecycle tests

use std::sync::Arc;

use concord_client::AdminClient;
use concord_core::charter::CharterId;
use concord_testkit::{seeded_signer, InMemoryLedger};

/// Install a test subscriber once so `RUST_LOG` surfaces client and
/// ledger events in failing tests
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One-admin chain: bootstrapped ledger, client, and governance charter
pub async fn single_admin() -> (Arc<InMemoryLedger>, AdminClient, CharterId) {
    init_tracing();
    let signer = seeded_signer(1);
    let ledger = Arc::new(InMemoryLedger::bootstrap(signer.identity()).unwrap());
    let mut client = AdminClient::with_signer(ledger.clone(), signer).await.unwrap();
    let charter = client.spawn_governance_charter().await.unwrap();
    (ledger, client, charter)
}

/// Admit a new admin through the full deferred pipeline: one existing
/// admin proposes, every existing admin countersigns, the proposer
/// executes. Returns the new admin's client.
pub async fn admit_admin(
    ledger: &Arc<InMemoryLedger>,
    existing: &mut [&mut AdminClient],
    charter: &CharterId,
    seed: u8,
) -> AdminClient {
    let signer = seeded_signer(seed);
    let identity = signer.identity();

    let proposal = existing[0].add_admin(charter, &identity).await.unwrap();
    for client in existing.iter_mut() {
        client.sign_proposal(&proposal).await.unwrap();
    }
    existing[0].execute_proposal(&proposal).await.unwrap();

    AdminClient::with_signer(ledger.clone(), signer).await.unwrap()
}
