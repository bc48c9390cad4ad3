//! Query cache in front of a pool backend.
//!
//! Reads are memoized per query kind, keyed by the exact parameters. Errors
//! are returned uncached so the next request tries again. Writes go straight
//! through and never invalidate anything: an ingest shows up after restart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{PoolStore, StoreResult};
use crate::db::models::*;

type Map<K, V> = RwLock<HashMap<K, V>>;

#[derive(Default)]
struct CacheInner {
    seasons: Map<(), Vec<i32>>,
    usernames: Map<(), Vec<String>>,
    spread_stats: Map<Vec<i32>, Vec<SpreadStatRow>>,
    global_stats: Map<Vec<i32>, Vec<GlobalGameRow>>,
    mnf_medians: Map<Vec<i32>, Vec<MnfMedianRow>>,
    decided_games: Map<Vec<i32>, Vec<GameRecord>>,
    game_ids: Map<Vec<i32>, Vec<i64>>,
    consensus: Map<Vec<i64>, Vec<ConsensusRow>>,
    user_picks: Map<(String, Vec<i64>), Vec<UserPickRow>>,
}

/// Memoizing decorator over any [`PoolStore`].
pub struct CachedStore<S> {
    inner: S,
    cache: Arc<CacheInner>,
}

impl<S: PoolStore> CachedStore<S> {
    pub fn new(inner: S) -> Self {
        CachedStore {
            inner,
            cache: Arc::new(CacheInner::default()),
        }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

async fn memoize<K, V, F, Fut>(map: &Map<K, V>, key: K, kind: &str, fetch: F) -> StoreResult<V>
where
    K: Eq + Hash,
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = StoreResult<V>>,
{
    if let Some(hit) = map.read().await.get(&key) {
        debug!("cache hit: {}", kind);
        return Ok(hit.clone());
    }
    let value = fetch().await?;
    map.write().await.insert(key, value.clone());
    Ok(value)
}

#[async_trait]
impl<S: PoolStore> PoolStore for CachedStore<S> {
    async fn available_seasons(&self) -> StoreResult<Vec<i32>> {
        memoize(&self.cache.seasons, (), "seasons", || self.inner.available_seasons()).await
    }

    async fn spread_stats(&self, seasons: &[i32]) -> StoreResult<Vec<SpreadStatRow>> {
        memoize(&self.cache.spread_stats, seasons.to_vec(), "spread_stats", || {
            self.inner.spread_stats(seasons)
        })
        .await
    }

    async fn game_consensus(&self, game_ids: &[i64]) -> StoreResult<Vec<ConsensusRow>> {
        memoize(&self.cache.consensus, game_ids.to_vec(), "consensus", || {
            self.inner.game_consensus(game_ids)
        })
        .await
    }

    async fn global_game_stats(&self, seasons: &[i32]) -> StoreResult<Vec<GlobalGameRow>> {
        memoize(&self.cache.global_stats, seasons.to_vec(), "global_stats", || {
            self.inner.global_game_stats(seasons)
        })
        .await
    }

    async fn mnf_medians(&self, seasons: &[i32]) -> StoreResult<Vec<MnfMedianRow>> {
        memoize(&self.cache.mnf_medians, seasons.to_vec(), "mnf_medians", || {
            self.inner.mnf_medians(seasons)
        })
        .await
    }

    async fn decided_games(&self, seasons: &[i32]) -> StoreResult<Vec<GameRecord>> {
        memoize(&self.cache.decided_games, seasons.to_vec(), "decided_games", || {
            self.inner.decided_games(seasons)
        })
        .await
    }

    async fn season_game_ids(&self, seasons: &[i32]) -> StoreResult<Vec<i64>> {
        memoize(&self.cache.game_ids, seasons.to_vec(), "game_ids", || {
            self.inner.season_game_ids(seasons)
        })
        .await
    }

    async fn user_picks(&self, username: &str, game_ids: &[i64]) -> StoreResult<Vec<UserPickRow>> {
        let key = (username.to_string(), game_ids.to_vec());
        memoize(&self.cache.user_picks, key, "user_picks", || {
            self.inner.user_picks(username, game_ids)
        })
        .await
    }

    async fn usernames(&self) -> StoreResult<Vec<String>> {
        memoize(&self.cache.usernames, (), "usernames", || self.inner.usernames()).await
    }

    async fn upsert_users(&self, usernames: &[String], season: i32) -> StoreResult<usize> {
        self.inner.upsert_users(usernames, season).await
    }

    async fn upsert_game(&self, game: &NewGame) -> StoreResult<i64> {
        self.inner.upsert_game(game).await
    }

    async fn upsert_picks(&self, picks: &[PickRecord]) -> StoreResult<usize> {
        self.inner.upsert_picks(picks).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::seeded;
    use crate::error::StoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts season lookups and fails the first one.
    struct Flaky {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PoolStore for Flaky {
        async fn available_seasons(&self) -> StoreResult<Vec<i32>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(StoreError::Backend { status: 503, body: "busy".into() });
            }
            Ok(vec![2024])
        }
        async fn spread_stats(&self, _: &[i32]) -> StoreResult<Vec<SpreadStatRow>> {
            Ok(Vec::new())
        }
        async fn game_consensus(&self, _: &[i64]) -> StoreResult<Vec<ConsensusRow>> {
            Ok(Vec::new())
        }
        async fn global_game_stats(&self, _: &[i32]) -> StoreResult<Vec<GlobalGameRow>> {
            Ok(Vec::new())
        }
        async fn mnf_medians(&self, _: &[i32]) -> StoreResult<Vec<MnfMedianRow>> {
            Ok(Vec::new())
        }
        async fn decided_games(&self, _: &[i32]) -> StoreResult<Vec<GameRecord>> {
            Ok(Vec::new())
        }
        async fn season_game_ids(&self, _: &[i32]) -> StoreResult<Vec<i64>> {
            Ok(Vec::new())
        }
        async fn user_picks(&self, _: &str, _: &[i64]) -> StoreResult<Vec<UserPickRow>> {
            Ok(Vec::new())
        }
        async fn usernames(&self) -> StoreResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn upsert_users(&self, u: &[String], _: i32) -> StoreResult<usize> {
            Ok(u.len())
        }
        async fn upsert_game(&self, _: &NewGame) -> StoreResult<i64> {
            Ok(1)
        }
        async fn upsert_picks(&self, p: &[PickRecord]) -> StoreResult<usize> {
            Ok(p.len())
        }
        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let store = CachedStore::new(Flaky { calls: AtomicUsize::new(0) });
        assert!(store.available_seasons().await.is_err());
        assert_eq!(store.available_seasons().await.unwrap(), vec![2024]);
        assert_eq!(store.available_seasons().await.unwrap(), vec![2024]);
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn results_stay_stale_after_writes() {
        let (db, ids) = seeded();
        let store = CachedStore::new(db);
        let before = store.user_picks("cat", &ids).await.unwrap();
        store
            .upsert_picks(&[crate::db::tests::pick("cat", ids[0], true, None)])
            .await
            .unwrap();
        assert_eq!(store.user_picks("cat", &ids).await.unwrap(), before);
        // a different key goes to the backend
        assert_eq!(store.user_picks("cat", &ids[..1]).await.unwrap().len(), 1);
    }
}
