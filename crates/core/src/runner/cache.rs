//! Invocation-scoped artifact cache with single-flight fetches.
//!
//! Each distinct filename is fetched from storage at most once per
//! invocation: the first task to claim a filename performs the fetch, every
//! other task awaits the claimant's result on a watch channel. The cache
//! holds no data, only per-filename download state; it never survives past
//! the invocation.

use std::collections::HashMap;

use tokio::sync::{watch, Mutex};
use tracing::debug;

/// Download state of one cached filename.
///
/// Transitions are one-directional: `Pending` resolves to exactly one of
/// `Ready` or `Failed` and never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// Claimed, fetch in flight.
    Pending,
    /// Fetch complete, file usable in the scratch directory.
    Ready,
    /// Fetch failed; waiters must not use the file.
    Failed,
}

/// Outcome of claiming a filename.
pub enum Claim {
    /// The caller owns the fetch and must resolve the claim.
    Fetch(FetchClaim),
    /// Another task owns the fetch; await its result.
    Wait(watch::Receiver<ArtifactState>),
}

/// Exclusive right to fetch one filename.
///
/// Dropping an unresolved claim marks the entry `Failed` so waiters are
/// released instead of hanging on a fetch that will never finish.
pub struct FetchClaim {
    filename: String,
    tx: Option<watch::Sender<ArtifactState>>,
}

impl FetchClaim {
    /// Mark the fetch complete; releases all waiters with `Ready`.
    pub fn complete(mut self) {
        self.resolve(ArtifactState::Ready);
    }

    /// Mark the fetch failed; releases all waiters with `Failed`.
    pub fn fail(mut self) {
        self.resolve(ArtifactState::Failed);
    }

    fn resolve(&mut self, state: ArtifactState) {
        if let Some(tx) = self.tx.take() {
            debug!(filename = %self.filename, ?state, "Artifact claim resolved");
            let _ = tx.send(state);
        }
    }
}

impl Drop for FetchClaim {
    fn drop(&mut self) {
        self.resolve(ArtifactState::Failed);
    }
}

/// Deduplicates concurrent fetches of the same filename within one batch
/// invocation.
#[derive(Default)]
pub struct ArtifactCache {
    entries: Mutex<HashMap<String, watch::Receiver<ArtifactState>>>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim a filename or join an in-flight fetch.
    ///
    /// Insert and check happen under one lock, so two tasks racing on the
    /// same filename can never both end up fetching.
    pub async fn claim(&self, filename: &str) -> Claim {
        let mut entries = self.entries.lock().await;
        if let Some(rx) = entries.get(filename) {
            return Claim::Wait(rx.clone());
        }

        let (tx, rx) = watch::channel(ArtifactState::Pending);
        entries.insert(filename.to_string(), rx);
        Claim::Fetch(FetchClaim {
            filename: filename.to_string(),
            tx: Some(tx),
        })
    }

    /// Begin tracking an upload of a filename.
    ///
    /// Uploads are not deduplicated: any existing entry is replaced with a
    /// fresh `Pending` one. This is state bookkeeping only; nothing awaits
    /// upload entries.
    pub async fn track(&self, filename: &str) -> FetchClaim {
        let (tx, rx) = watch::channel(ArtifactState::Pending);
        self.entries.lock().await.insert(filename.to_string(), rx);
        FetchClaim {
            filename: filename.to_string(),
            tx: Some(tx),
        }
    }

    /// Await the resolution of an in-flight fetch.
    pub async fn wait(mut rx: watch::Receiver<ArtifactState>) -> ArtifactState {
        match rx.wait_for(|s| *s != ArtifactState::Pending).await {
            Ok(state) => *state,
            // Sender dropped without resolving; treat as failed.
            Err(_) => ArtifactState::Failed,
        }
    }

    /// Current state of a filename, if any task has touched it.
    pub async fn state(&self, filename: &str) -> Option<ArtifactState> {
        self.entries
            .lock()
            .await
            .get(filename)
            .map(|rx| *rx.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_claim_owns_fetch() {
        let cache = ArtifactCache::new();
        match cache.claim("run.bin").await {
            Claim::Fetch(claim) => claim.complete(),
            Claim::Wait(_) => panic!("first claim should own the fetch"),
        }
        assert_eq!(cache.state("run.bin").await, Some(ArtifactState::Ready));
    }

    #[tokio::test]
    async fn test_second_claim_waits_for_ready() {
        let cache = ArtifactCache::new();
        let claim = match cache.claim("run.bin").await {
            Claim::Fetch(c) => c,
            Claim::Wait(_) => panic!("expected fetch claim"),
        };

        let rx = match cache.claim("run.bin").await {
            Claim::Wait(rx) => rx,
            Claim::Fetch(_) => panic!("second claim must not fetch"),
        };

        claim.complete();
        assert_eq!(ArtifactCache::wait(rx).await, ArtifactState::Ready);
    }

    #[tokio::test]
    async fn test_failed_fetch_releases_waiters() {
        let cache = ArtifactCache::new();
        let claim = match cache.claim("a.txt").await {
            Claim::Fetch(c) => c,
            Claim::Wait(_) => panic!("expected fetch claim"),
        };
        let rx = match cache.claim("a.txt").await {
            Claim::Wait(rx) => rx,
            Claim::Fetch(_) => panic!("second claim must not fetch"),
        };

        claim.fail();
        assert_eq!(ArtifactCache::wait(rx).await, ArtifactState::Failed);
    }

    #[tokio::test]
    async fn test_dropped_claim_fails_entry() {
        let cache = ArtifactCache::new();
        let rx = {
            let _claim = match cache.claim("a.txt").await {
                Claim::Fetch(c) => c,
                Claim::Wait(_) => panic!("expected fetch claim"),
            };
            match cache.claim("a.txt").await {
                Claim::Wait(rx) => rx,
                Claim::Fetch(_) => panic!("second claim must not fetch"),
            }
            // _claim dropped here without resolving
        };
        assert_eq!(ArtifactCache::wait(rx).await, ArtifactState::Failed);
    }

    #[tokio::test]
    async fn test_concurrent_first_claims_yield_one_fetcher() {
        let cache = Arc::new(ArtifactCache::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                match cache.claim("contested.bin").await {
                    Claim::Fetch(claim) => {
                        claim.complete();
                        true
                    }
                    Claim::Wait(rx) => {
                        assert_eq!(ArtifactCache::wait(rx).await, ArtifactState::Ready);
                        false
                    }
                }
            }));
        }

        let mut fetchers = 0;
        for handle in handles {
            if handle.await.unwrap() {
                fetchers += 1;
            }
        }
        assert_eq!(fetchers, 1);
    }

    #[tokio::test]
    async fn test_track_replaces_existing_entry() {
        let cache = ArtifactCache::new();
        match cache.claim("out.txt").await {
            Claim::Fetch(c) => c.complete(),
            Claim::Wait(_) => panic!("expected fetch claim"),
        }

        let upload = cache.track("out.txt").await;
        assert_eq!(cache.state("out.txt").await, Some(ArtifactState::Pending));
        upload.complete();
        assert_eq!(cache.state("out.txt").await, Some(ArtifactState::Ready));
    }
}
