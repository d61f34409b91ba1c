//! Runs against a throwaway MySQL container: `cargo test -- --ignored`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use burrow_core::{Incoming, OwnerId, RequestContext, ShortCode};
use burrow_generator::Generator;
use burrow_storage::{MySqlRepository, Storage, StorageError};
use burrow_test_infra::mysql::{MySqlServer, MysqlConfig};

struct Fixture {
    _mysql: MySqlServer,
    repo: MySqlRepository,
}

impl Fixture {
    async fn start() -> Self {
        Self::start_with(MySqlRepository::new).await
    }

    async fn start_with(build: impl FnOnce(sqlx::MySqlPool) -> MySqlRepository) -> Self {
        let mysql = MySqlServer::start(MysqlConfig::default())
            .await
            .expect("start mysql");
        let pool = mysql.connect().await.expect("connect mysql");

        let repo = build(pool);
        repo.ensure_schema().await.expect("create schema");

        Self {
            _mysql: mysql,
            repo,
        }
    }
}

struct Scripted {
    codes: Vec<&'static str>,
    next: AtomicUsize,
}

impl Generator for Scripted {
    type Output = ShortCode;

    fn generate(&self) -> ShortCode {
        let i = self.next.fetch_add(1, Ordering::SeqCst);
        ShortCode::new_unchecked(self.codes[i % self.codes.len()])
    }
}

fn ctx(owner: &str) -> RequestContext {
    RequestContext::new(OwnerId::new(owner))
}

#[tokio::test]
#[ignore = "requires docker"]
async fn save_and_resolve() {
    let fixture = Fixture::start().await;
    let alice = ctx("alice");

    let code = fixture
        .repo
        .save_url(&alice, "https://example.com")
        .await
        .unwrap();

    assert_eq!(code.as_str().len(), 7);
    assert_eq!(
        fixture.repo.get_by_id(&alice, &code).await.unwrap(),
        "https://example.com"
    );
    assert!(fixture.repo.ping(&alice).await.is_ok());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn duplicate_url_conflicts_with_existing_code() {
    let fixture = Fixture::start().await;

    let first = fixture
        .repo
        .save_url(&ctx("alice"), "https://example.com")
        .await
        .unwrap();
    let err = fixture
        .repo
        .save_url(&ctx("bob"), "https://example.com")
        .await
        .unwrap_err();

    assert_eq!(err.conflict_code(), Some(&first));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn codes_are_case_sensitive() {
    let fixture = Fixture::start_with(|pool| {
        MySqlRepository::with_generator(
            pool,
            Scripted {
                codes: vec!["abcdefg", "ABCDEFG"],
                next: AtomicUsize::new(0),
            },
        )
    })
    .await;
    let alice = ctx("alice");

    let lower = fixture.repo.save_url(&alice, "https://lower.example").await.unwrap();
    let upper = fixture.repo.save_url(&alice, "https://upper.example").await.unwrap();

    assert_eq!(lower.as_str(), "abcdefg");
    assert_eq!(upper.as_str(), "ABCDEFG");
    assert_eq!(
        fixture.repo.get_by_id(&alice, &upper).await.unwrap(),
        "https://upper.example"
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn exhausted_generator_reports_generation_exhausted() {
    let fixture = Fixture::start_with(|pool| {
        MySqlRepository::with_generator(
            pool,
            Scripted {
                codes: vec!["taken00"],
                next: AtomicUsize::new(0),
            },
        )
    })
    .await;
    let alice = ctx("alice");

    fixture.repo.save_url(&alice, "https://one.example").await.unwrap();
    let err = fixture
        .repo
        .save_url(&alice, "https://two.example")
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::GenerationExhausted { .. }));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn lifecycle_gone_then_not_found() {
    let fixture = Fixture::start().await;
    let alice = ctx("alice");

    let code = fixture
        .repo
        .save_url(&alice, "https://example.com")
        .await
        .unwrap();
    fixture
        .repo
        .delete_user_urls(&alice, vec![code.clone()])
        .await
        .unwrap();

    assert!(matches!(
        fixture.repo.get_by_id(&alice, &code).await,
        Err(StorageError::Gone(_))
    ));
    assert!(fixture.repo.is_exists(&alice, &code).await.unwrap());

    assert_eq!(fixture.repo.delete_hard(&alice).await.unwrap(), 1);
    assert!(matches!(
        fixture.repo.get_by_id(&alice, &code).await,
        Err(StorageError::NotFound(_))
    ));
    assert_eq!(fixture.repo.delete_hard(&alice).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn delete_only_touches_callers_codes() {
    let fixture = Fixture::start().await;
    let alice = ctx("alice");
    let bob = ctx("bob");

    let bobs = fixture
        .repo
        .save_url(&bob, "https://bob.example")
        .await
        .unwrap();
    fixture
        .repo
        .delete_user_urls(&alice, vec![bobs.clone()])
        .await
        .unwrap();

    assert_eq!(
        fixture.repo.get_by_id(&bob, &bobs).await.unwrap(),
        "https://bob.example"
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn user_urls_in_insertion_order() {
    let fixture = Fixture::start().await;
    let alice = ctx("alice");

    for url in ["https://a.com", "https://b.com", "https://c.com"] {
        fixture.repo.save_url(&alice, url).await.unwrap();
    }
    fixture
        .repo
        .save_url(&ctx("bob"), "https://bob.example")
        .await
        .unwrap();

    let urls = fixture
        .repo
        .get_user_urls(&alice, "http://s")
        .await
        .unwrap()
        .unwrap();
    let originals: Vec<&str> = urls.iter().map(|u| u.original_url.as_str()).collect();

    assert_eq!(originals, vec!["https://a.com", "https://b.com", "https://c.com"]);
    assert!(fixture
        .repo
        .get_user_urls(&ctx("carol"), "http://s")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn batch_with_duplicate_urls_commits_the_rest() {
    let fixture = Fixture::start().await;
    let alice = ctx("alice");

    let outcome = fixture
        .repo
        .load_urls(
            &alice,
            vec![
                Incoming::new("1", "https://a.com"),
                Incoming::new("2", "https://a.com"),
                Incoming::new("3", "https://b.com"),
            ],
            "http://s",
        )
        .await
        .unwrap();

    assert_eq!(outcome.outputs.len(), 3);
    assert_eq!(outcome.outputs[0].short_url, outcome.outputs[1].short_url);
    assert_eq!(outcome.conflicts, vec!["2".to_string()]);

    let stored: HashSet<String> = fixture
        .repo
        .get_user_urls(&alice, "http://s")
        .await
        .unwrap()
        .unwrap()
        .into_iter()
        .map(|u| u.original_url)
        .collect();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn invalid_batch_item_writes_nothing() {
    let fixture = Fixture::start().await;
    let alice = ctx("alice");

    let err = fixture
        .repo
        .load_urls(
            &alice,
            vec![Incoming::new("1", "https://a.com"), Incoming::new("2", "")],
            "http://s",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::InvalidUrl(_)));
    assert!(fixture
        .repo
        .get_user_urls(&alice, "http://s")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn concurrent_batches_beyond_pool_size_all_commit() {
    let fixture = Fixture::start().await;

    let mut handles = vec![];
    for i in 0..12 {
        let repo = fixture.repo.clone();
        handles.push(tokio::spawn(async move {
            let incoming = (0..3)
                .map(|j| Incoming::new(j.to_string(), format!("https://batch{i}-{j}.example")))
                .collect();
            let owner = ctx(&format!("owner-{i}"));
            repo.load_urls(&owner, incoming, "http://s").await
        }));
    }

    let mut codes = HashSet::new();
    for handle in handles {
        let outcome = tokio::time::timeout(std::time::Duration::from_secs(30), handle)
            .await
            .expect("batch finished")
            .unwrap()
            .unwrap();
        assert!(!outcome.has_conflicts());
        codes.extend(outcome.outputs.into_iter().map(|o| o.short_url));
    }

    assert_eq!(codes.len(), 36);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn allocation_makes_at_most_three_draws() {
    let draws = std::sync::Arc::new(AtomicUsize::new(0));

    struct CountingTaken(std::sync::Arc<AtomicUsize>);

    impl Generator for CountingTaken {
        type Output = ShortCode;

        fn generate(&self) -> ShortCode {
            self.0.fetch_add(1, Ordering::SeqCst);
            ShortCode::new_unchecked("taken00")
        }
    }

    let counter = std::sync::Arc::clone(&draws);
    let fixture =
        Fixture::start_with(move |pool| MySqlRepository::with_generator(pool, CountingTaken(counter)))
            .await;
    let alice = ctx("alice");

    fixture.repo.save_url(&alice, "https://one.example").await.unwrap();
    draws.store(0, Ordering::SeqCst);

    let err = fixture
        .repo
        .save_url(&alice, "https://two.example")
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::GenerationExhausted { attempts: 3 }));
    assert_eq!(draws.load(Ordering::SeqCst), 3);
}
