//! The pool data contract shared by the SQLite and Supabase backends.

pub mod cache;
pub mod supabase;

pub use cache::CachedStore;
pub use supabase::SupabaseClient;

use async_trait::async_trait;

use crate::db::models::*;
use crate::db::Database;
use crate::error::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Game ids per consensus / pick request
pub const GAME_ID_BATCH: usize = 200;

/// Everything the dashboard reads and the importer writes.
#[async_trait]
pub trait PoolStore: Send + Sync {
    /// Distinct seasons, newest first.
    async fn available_seasons(&self) -> StoreResult<Vec<i32>>;

    /// Per-spread aggregates over non-tie games of the seasons.
    async fn spread_stats(&self, seasons: &[i32]) -> StoreResult<Vec<SpreadStatRow>>;

    /// Valid-pick consensus; games nobody picked are absent.
    async fn game_consensus(&self, game_ids: &[i64]) -> StoreResult<Vec<ConsensusRow>>;

    async fn global_game_stats(&self, seasons: &[i32]) -> StoreResult<Vec<GlobalGameRow>>;

    async fn mnf_medians(&self, seasons: &[i32]) -> StoreResult<Vec<MnfMedianRow>>;

    /// Non-tie games.
    async fn decided_games(&self, seasons: &[i32]) -> StoreResult<Vec<GameRecord>>;

    async fn season_game_ids(&self, seasons: &[i32]) -> StoreResult<Vec<i64>>;

    /// Made, non-overwritten picks of one user.
    async fn user_picks(&self, username: &str, game_ids: &[i64]) -> StoreResult<Vec<UserPickRow>>;

    /// Sorted roster.
    async fn usernames(&self) -> StoreResult<Vec<String>>;

    async fn upsert_users(&self, usernames: &[String], season: i32) -> StoreResult<usize>;

    async fn upsert_game(&self, game: &NewGame) -> StoreResult<i64>;

    async fn upsert_picks(&self, picks: &[PickRecord]) -> StoreResult<usize>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

#[async_trait]
impl PoolStore for Database {
    async fn available_seasons(&self) -> StoreResult<Vec<i32>> {
        self.list_seasons()
    }

    async fn spread_stats(&self, seasons: &[i32]) -> StoreResult<Vec<SpreadStatRow>> {
        Database::spread_stats(self, seasons)
    }

    async fn game_consensus(&self, game_ids: &[i64]) -> StoreResult<Vec<ConsensusRow>> {
        Database::game_consensus(self, game_ids)
    }

    async fn global_game_stats(&self, seasons: &[i32]) -> StoreResult<Vec<GlobalGameRow>> {
        Database::global_game_stats(self, seasons)
    }

    async fn mnf_medians(&self, seasons: &[i32]) -> StoreResult<Vec<MnfMedianRow>> {
        Database::mnf_medians(self, seasons)
    }

    async fn decided_games(&self, seasons: &[i32]) -> StoreResult<Vec<GameRecord>> {
        Database::decided_games(self, seasons)
    }

    async fn season_game_ids(&self, seasons: &[i32]) -> StoreResult<Vec<i64>> {
        Database::season_game_ids(self, seasons)
    }

    async fn user_picks(&self, username: &str, game_ids: &[i64]) -> StoreResult<Vec<UserPickRow>> {
        Database::user_picks(self, username, game_ids)
    }

    async fn usernames(&self) -> StoreResult<Vec<String>> {
        self.list_usernames()
    }

    async fn upsert_users(&self, usernames: &[String], season: i32) -> StoreResult<usize> {
        Database::upsert_users(self, usernames, season)
    }

    async fn upsert_game(&self, game: &NewGame) -> StoreResult<i64> {
        Database::upsert_game(self, game)
    }

    async fn upsert_picks(&self, picks: &[PickRecord]) -> StoreResult<usize> {
        Database::upsert_picks(self, picks)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
