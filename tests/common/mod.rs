#![allow(dead_code, missing_docs, clippy::unwrap_used)]

pub mod remote_mocks;

use std::time::Duration;

use chirp_fs::fs::Namespace;

use remote_mocks::{MockRemote, MockRemoteState};

/// Id of the root location in every mock tree.
pub const ROOT: &str = "root";

/// The tree most tests start from:
///
/// ```text
/// /            (root)
/// ├── A/       (loc-a)
/// │   ├── B/   (loc-b)
/// │   └── dev1 (Temp01 / abc123, owned by Alice)
/// └── C/       (loc-c)
///     └── D/   (loc-d)
/// ```
pub fn sample_tree() -> MockRemoteState {
    MockRemoteState::default()
        .location(ROOT, "root", &["loc-a", "loc-c"])
        .location("loc-a", "A", &["loc-b"])
        .location("loc-b", "B", &[])
        .location("loc-c", "C", &["loc-d"])
        .location("loc-d", "D", &[])
        .device("loc-a", "abc123", "Temp01", "Alice", "a@x.com")
}

/// Connect a namespace to `state`, panicking if the root cannot be fetched.
pub async fn connect(state: MockRemoteState) -> (Namespace<MockRemote>, MockRemote) {
    let remote = MockRemote::new(state);
    let namespace = Namespace::connect(remote.clone(), ROOT).await.unwrap();
    (namespace, remote)
}

/// Fail the test if `fut` does not finish within a generous bound.
pub async fn within<F: std::future::Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .unwrap_or_else(|_| panic!("operation did not complete; possible deadlock"))
}
