//! Scenario: Directory Snapshot pages through every member
//!
//! # Invariants under test
//!
//! 1. Members are fetched page by page with the `after` cursor set to the
//!    last identity of the previous page.
//! 2. Paging stops at the first page shorter than the limit (an exact
//!    multiple costs one extra, empty page).
//! 3. A failed listing fails the capture.

use stb_reconcile::DirectorySnapshot;
use stb_schemas::{IdentityId, ServiceError};
use stb_testkit::{Call, FakeDirectory, FakeOp};

fn directory(n: usize) -> FakeDirectory {
    (1..=n).fold(FakeDirectory::new().with_role("9", "Zerg"), |d, i| {
        d.with_member(&format!("{i}"), &format!("user{i}"), "0")
    })
}

fn member_pages(dir: &FakeDirectory) -> Vec<Option<String>> {
    dir.calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::ListMembers { after, .. } => Some(after.map(|a| a.as_str().to_string())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn pages_follow_the_cursor() -> anyhow::Result<()> {
    let dir = directory(5);
    let snap = DirectorySnapshot::capture(&dir, "g", 2).await?;

    assert_eq!(snap.member_count(), 5);
    assert_eq!(
        member_pages(&dir),
        vec![None, Some("2".to_string()), Some("4".to_string())]
    );
    assert_eq!(snap.resolve("user5"), Some(&IdentityId::new("5")));
    assert!(snap.role_named("Zerg").is_some());
    Ok(())
}

#[tokio::test]
async fn exact_multiple_costs_one_empty_page() -> anyhow::Result<()> {
    let dir = directory(4);
    let snap = DirectorySnapshot::capture(&dir, "g", 2).await?;

    assert_eq!(snap.member_count(), 4);
    assert_eq!(member_pages(&dir).len(), 3);
    Ok(())
}

#[tokio::test]
async fn listing_failure_fails_the_capture() {
    let dir = directory(3);
    dir.inject_failure(FakeOp::ListMembers, None);

    let err = DirectorySnapshot::capture(&dir, "g", 2).await.unwrap_err();
    assert!(matches!(err, ServiceError::Api { status: 500, .. }));
}
