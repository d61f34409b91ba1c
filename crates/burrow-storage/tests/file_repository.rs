//! Snapshot persistence tests for the file-backed repository.

use burrow_core::{Incoming, OwnerId, RequestContext, ShortLinkRecord};
use burrow_storage::{FileRepository, Storage, StorageError};
use tempfile::TempDir;

fn ctx(owner: &str) -> RequestContext {
    RequestContext::new(OwnerId::new(owner))
}

async fn read_snapshot(repo: &FileRepository) -> Vec<ShortLinkRecord> {
    let bytes = tokio::fs::read(repo.path()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn open_creates_missing_directory_and_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("urls.json");

    let repo = FileRepository::open(&path).await.unwrap();

    assert!(path.exists());
    assert!(read_snapshot(&repo).await.is_empty());
    assert!(repo.ping(&ctx("alice")).await.is_ok());
}

#[tokio::test]
async fn open_accepts_an_empty_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("urls.json");
    tokio::fs::write(&path, b"").await.unwrap();

    let repo = FileRepository::open(&path).await.unwrap();
    assert!(repo
        .get_user_urls(&ctx("alice"), "http://s")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn open_rejects_a_corrupt_snapshot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("urls.json");
    tokio::fs::write(&path, b"{ not json").await.unwrap();

    let err = FileRepository::open(&path).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidData(_)));
}

#[tokio::test]
async fn records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("urls.json");
    let alice = ctx("alice");

    let (kept, deleted) = {
        let repo = FileRepository::open(&path).await.unwrap();
        let kept = repo.save_url(&alice, "https://kept.example").await.unwrap();
        let deleted = repo.save_url(&alice, "https://gone.example").await.unwrap();
        repo.delete_user_urls(&alice, vec![deleted.clone()])
            .await
            .unwrap();
        (kept, deleted)
    };

    let reopened = FileRepository::open(&path).await.unwrap();

    assert_eq!(
        reopened.get_by_id(&alice, &kept).await.unwrap(),
        "https://kept.example"
    );
    assert!(matches!(
        reopened.get_by_id(&alice, &deleted).await,
        Err(StorageError::Gone(_))
    ));
    let err = reopened
        .save_url(&ctx("bob"), "https://kept.example")
        .await
        .unwrap_err();
    assert_eq!(err.conflict_code(), Some(&kept));
}

#[tokio::test]
async fn snapshot_is_ordered_by_sequence() {
    let dir = TempDir::new().unwrap();
    let repo = FileRepository::open(dir.path().join("urls.json"))
        .await
        .unwrap();
    let alice = ctx("alice");

    repo.load_urls(
        &alice,
        vec![
            Incoming::new("1", "https://a.com"),
            Incoming::new("2", "https://b.com"),
            Incoming::new("3", "https://c.com"),
        ],
        "http://s",
    )
    .await
    .unwrap();

    let records = read_snapshot(&repo).await;
    let urls: Vec<&str> = records.iter().map(|r| r.original_url.as_str()).collect();
    let sequences: Vec<u64> = records.iter().map(|r| r.sequence).collect();

    assert_eq!(urls, vec!["https://a.com", "https://b.com", "https://c.com"]);
    assert_eq!(sequences, vec![1, 2, 3]);
    assert!(records.iter().all(|r| r.owner_id == OwnerId::new("alice")));
}

#[tokio::test]
async fn delete_hard_is_persisted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("urls.json");
    let alice = ctx("alice");

    let repo = FileRepository::open(&path).await.unwrap();
    let code = repo.save_url(&alice, "https://example.com").await.unwrap();
    repo.delete_user_urls(&alice, vec![code.clone()]).await.unwrap();
    assert_eq!(repo.delete_hard(&alice).await.unwrap(), 1);

    assert!(read_snapshot(&repo).await.is_empty());

    let reopened = FileRepository::open(&path).await.unwrap();
    assert!(matches!(
        reopened.get_by_id(&alice, &code).await,
        Err(StorageError::NotFound(_))
    ));
}

#[tokio::test]
async fn failed_snapshot_withdraws_the_insert() {
    let dir = TempDir::new().unwrap();
    let sub = dir.path().join("data");
    let repo = FileRepository::open(sub.join("urls.json")).await.unwrap();
    let alice = ctx("alice");

    tokio::fs::remove_dir_all(&sub).await.unwrap();

    let err = repo
        .save_url(&alice, "https://example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Io(_)));
    assert!(repo
        .get_user_urls(&alice, "http://s")
        .await
        .unwrap()
        .is_none());
    assert!(repo.ping(&alice).await.is_err());

    let err = repo
        .load_urls(&alice, vec![Incoming::new("1", "https://a.com")], "http://s")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Io(_)));
    assert!(repo
        .get_user_urls(&alice, "http://s")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn concurrent_saves_all_reach_the_snapshot() {
    let dir = TempDir::new().unwrap();
    let repo = FileRepository::open(dir.path().join("urls.json"))
        .await
        .unwrap();

    let mut handles = vec![];
    for i in 0..16 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.save_url(&ctx("alice"), &format!("https://example{i}.com"))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(read_snapshot(&repo).await.len(), 16);
}

/// Makes the snapshot's temp path a directory so the next write fails.
async fn block_snapshot_writes(path: &std::path::Path) -> std::path::PathBuf {
    let tmp = path.with_extension("tmp");
    tokio::fs::create_dir(&tmp).await.unwrap();
    tmp
}

#[tokio::test]
async fn soft_delete_reaches_the_file_after_a_failed_snapshot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("urls.json");
    let alice = ctx("alice");

    let repo = FileRepository::open(&path).await.unwrap();
    let code = repo.save_url(&alice, "https://example.com").await.unwrap();

    let tmp = block_snapshot_writes(&path).await;
    let err = repo
        .delete_user_urls(&alice, vec![code.clone()])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Io(_)));
    assert!(matches!(
        repo.get_by_id(&alice, &code).await,
        Err(StorageError::Gone(_))
    ));
    tokio::fs::remove_dir(&tmp).await.unwrap();

    // Flips nothing, but the pending change is written.
    repo.delete_user_urls(&alice, vec![code.clone()])
        .await
        .unwrap();

    let reopened = FileRepository::open(&path).await.unwrap();
    assert!(matches!(
        reopened.get_by_id(&alice, &code).await,
        Err(StorageError::Gone(_))
    ));
}

#[tokio::test]
async fn next_sweep_writes_a_purge_whose_snapshot_failed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("urls.json");
    let alice = ctx("alice");

    let repo = FileRepository::open(&path).await.unwrap();
    let code = repo.save_url(&alice, "https://example.com").await.unwrap();
    repo.delete_user_urls(&alice, vec![code.clone()]).await.unwrap();

    let tmp = block_snapshot_writes(&path).await;
    assert!(matches!(
        repo.delete_hard(&alice).await,
        Err(StorageError::Io(_))
    ));
    tokio::fs::remove_dir(&tmp).await.unwrap();

    assert_eq!(repo.delete_hard(&alice).await.unwrap(), 0);
    assert!(read_snapshot(&repo).await.is_empty());

    let reopened = FileRepository::open(&path).await.unwrap();
    assert!(matches!(
        reopened.get_by_id(&alice, &code).await,
        Err(StorageError::NotFound(_))
    ));
}

#[tokio::test]
async fn pending_delete_is_written_by_the_next_insert() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("urls.json");
    let alice = ctx("alice");

    let repo = FileRepository::open(&path).await.unwrap();
    let code = repo.save_url(&alice, "https://example.com").await.unwrap();

    let tmp = block_snapshot_writes(&path).await;
    assert!(repo
        .delete_user_urls(&alice, vec![code.clone()])
        .await
        .is_err());
    tokio::fs::remove_dir(&tmp).await.unwrap();

    repo.save_url(&alice, "https://other.example").await.unwrap();

    let records = read_snapshot(&repo).await;
    let deleted = records.iter().find(|r| r.short_code == code).unwrap();
    assert!(deleted.is_deleted);
}
