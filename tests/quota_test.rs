//! Windowed counter tests: global model quota and per-address limits.

use std::time::Duration;

use itinera::error::ErrorKind;
use itinera::limit::{self, RateWindow, WindowPolicy};
use itinera::store::{KeyValueStore, MemoryStore};

#[tokio::test(start_paused = true)]
async fn quota_admits_ten_then_rejects() {
    let store = MemoryStore::new();
    let quota = RateWindow::gemini_quota(limit::GEMINI_QUOTA);

    for expected in 1..=10 {
        let admission = quota.admit(&store).await.unwrap();
        assert_eq!(admission.count, expected);
    }

    tokio::time::advance(Duration::from_secs(25)).await;
    let err = quota.admit(&store).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimit);
    assert_eq!(err.status(), 429);
    assert_eq!(err.retry_after(), Some(Duration::from_secs(35)));

    // Rejected attempts are still counted.
    assert_eq!(store.get("geminiLimit").await.unwrap().as_deref(), Some("11"));
}

#[tokio::test(start_paused = true)]
async fn window_starts_over_after_expiry() {
    let store = MemoryStore::new();
    let quota = RateWindow::gemini_quota(limit::GEMINI_QUOTA);

    for _ in 0..11 {
        let _ = quota.admit(&store).await;
    }

    tokio::time::advance(Duration::from_secs(60)).await;
    let admission = quota.admit(&store).await.unwrap();
    assert_eq!(admission.count, 1);
    assert_eq!(admission.window_remaining, Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn window_is_fixed_not_sliding() {
    let store = MemoryStore::new();
    let window = RateWindow::new("custom", Duration::from_secs(10), 2);

    window.admit(&store).await.unwrap();
    tokio::time::advance(Duration::from_secs(9)).await;
    let second = window.admit(&store).await.unwrap();
    assert_eq!(second.window_remaining, Duration::from_secs(1));

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(window.admit(&store).await.unwrap().count, 1);
}

#[tokio::test]
async fn reset_clears_the_counter() {
    let store = MemoryStore::new();
    let login = RateWindow::login("ada@example.com", limit::LOGIN);

    for _ in 0..5 {
        login.admit(&store).await.unwrap();
    }
    login.reset(&store).await.unwrap();

    assert!(store.get("login:ada@example.com").await.unwrap().is_none());
    assert_eq!(login.admit(&store).await.unwrap().count, 1);
}

#[tokio::test]
async fn addresses_are_counted_separately() {
    let store = MemoryStore::new();
    let policy = WindowPolicy::new(600, 1);

    RateWindow::forget_password("a@example.com", policy)
        .admit(&store)
        .await
        .unwrap();
    RateWindow::forget_password("b@example.com", policy)
        .admit(&store)
        .await
        .unwrap();

    let err = RateWindow::forget_password("a@example.com", policy)
        .admit(&store)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimit);
}

#[tokio::test(start_paused = true)]
async fn concurrent_admissions_never_exceed_threshold() {
    let store = std::sync::Arc::new(MemoryStore::new());
    let quota = RateWindow::gemini_quota(limit::GEMINI_QUOTA);

    let handles: Vec<_> = (0..25)
        .map(|_| {
            let store = store.clone();
            let quota = quota.clone();
            tokio::spawn(async move { quota.admit(&*store).await.is_ok() })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 10);
}
