//! Credits ledger.
//!
//! The Postgres `user_credits` table is authoritative. When it cannot be
//! reached the ledger degrades to a local cache keyed by user id, and says so
//! through [`CreditSource::LocalFallback`].
//!
//! The fallback path is a plain read, compare, write with no lock. Two
//! deductions racing on the fallback can both read the pre-decrement balance
//! and both succeed. This is a known double-spend gap and is left as is.

use async_trait::async_trait;
use redis::AsyncCommands;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::credits::Ledgered;

const CREDITS_KEY: &str = "mymeme_user_credits";

/// Authoritative balance store.
#[async_trait]
pub trait RemoteCredits: Send + Sync {
    /// Current balance, or `None` if the user has no row.
    async fn fetch(&self, user_id: &str) -> Result<Option<i64>, LedgerError>;
    /// Create the row with `initial` if absent. Returns the stored balance.
    async fn initialize(&self, user_id: &str, initial: i64) -> Result<i64, LedgerError>;
    /// Atomically subtract `amount` if the balance covers it. A user with no
    /// row starts from `initial`.
    async fn deduct(&self, user_id: &str, amount: i64, initial: i64) -> Result<bool, LedgerError>;
    /// Add `amount`. A user with no row starts from `initial`.
    async fn add(&self, user_id: &str, amount: i64, initial: i64) -> Result<(), LedgerError>;
}

/// Local fallback cache.
#[async_trait]
pub trait CreditCache: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<i64>, LedgerError>;
    async fn set(&self, user_id: &str, credits: i64) -> Result<(), LedgerError>;
}

/// `user_credits` over the Supabase Postgres pool.
pub struct PgCreditStore {
    pool: PgPool,
}

impl PgCreditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RemoteCredits for PgCreditStore {
    async fn fetch(&self, user_id: &str) -> Result<Option<i64>, LedgerError> {
        let row = sqlx::query("SELECT credits FROM user_credits WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(i64::from(r.try_get::<i32, _>("credits")?))),
            None => Ok(None),
        }
    }

    async fn initialize(&self, user_id: &str, initial: i64) -> Result<i64, LedgerError> {
        // The no-op update makes RETURNING yield the existing row too.
        let row = sqlx::query(
            r#"
            INSERT INTO user_credits (user_id, credits)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING credits
            "#,
        )
        .bind(user_id)
        .bind(to_db_amount(initial)?)
        .fetch_one(&self.pool)
        .await?;
        Ok(i64::from(row.try_get::<i32, _>("credits")?))
    }

    async fn deduct(&self, user_id: &str, amount: i64, initial: i64) -> Result<bool, LedgerError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO user_credits (user_id, credits)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(to_db_amount(initial)?)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            r#"
            UPDATE user_credits
            SET credits = credits - $2, updated_at = NOW()
            WHERE user_id = $1 AND credits >= $2
            "#,
        )
        .bind(user_id)
        .bind(to_db_amount(amount)?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }

    async fn add(&self, user_id: &str, amount: i64, initial: i64) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO user_credits (user_id, credits)
            VALUES ($1, $3 + $2)
            ON CONFLICT (user_id)
            DO UPDATE SET credits = user_credits.credits + $2, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(to_db_amount(amount)?)
        .bind(to_db_amount(initial)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn to_db_amount(amount: i64) -> Result<i32, LedgerError> {
    i32::try_from(amount).map_err(|_| LedgerError::InvalidAmount(amount))
}

/// Redis string per user: `mymeme_user_credits_{user_id}`.
pub struct RedisCreditCache {
    client: redis::Client,
}

impl RedisCreditCache {
    pub fn new(redis_url: &str) -> Result<Self, LedgerError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    fn key(user_id: &str) -> String {
        format!("{CREDITS_KEY}_{user_id}")
    }
}

#[async_trait]
impl CreditCache for RedisCreditCache {
    async fn get(&self, user_id: &str) -> Result<Option<i64>, LedgerError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let stored: Option<String> = conn.get(Self::key(user_id)).await?;
        // A garbled value counts as no cache entry.
        Ok(stored.and_then(|s| s.trim().parse().ok()))
    }

    async fn set(&self, user_id: &str, credits: i64) -> Result<(), LedgerError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set::<_, _, ()>(Self::key(user_id), credits.to_string())
            .await?;
        Ok(())
    }
}

/// In-process credit cache.
#[derive(Default)]
pub struct MemoryCreditCache {
    balances: Mutex<HashMap<String, i64>>,
}

impl MemoryCreditCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CreditCache for MemoryCreditCache {
    async fn get(&self, user_id: &str) -> Result<Option<i64>, LedgerError> {
        Ok(self.balances.lock().await.get(user_id).copied())
    }

    async fn set(&self, user_id: &str, credits: i64) -> Result<(), LedgerError> {
        self.balances.lock().await.insert(user_id.to_string(), credits);
        Ok(())
    }
}

pub struct CreditsLedger {
    remote: Arc<dyn RemoteCredits>,
    cache: Arc<dyn CreditCache>,
    initial_credits: i64,
}

impl CreditsLedger {
    pub fn new(
        remote: Arc<dyn RemoteCredits>,
        cache: Arc<dyn CreditCache>,
        initial_credits: i64,
    ) -> Self {
        Self {
            remote,
            cache,
            initial_credits,
        }
    }

    pub fn initial_credits(&self) -> i64 {
        self.initial_credits
    }

    /// Balance from the remote store. A user without a row has the initial
    /// grant, which the first deduction or top-up materializes. When the
    /// remote is unreachable, the cache, else the initial grant.
    pub async fn get_user_credits(&self, user_id: &str) -> Ledgered<i64> {
        match self.remote.fetch(user_id).await {
            Ok(Some(credits)) => Ledgered::remote(credits),
            Ok(None) => Ledgered::remote(self.initial_credits),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Remote credit read failed, using local cache");
                metrics::counter!("credits_fallback_total").increment(1);
                Ledgered::local(self.cached_or_initial(user_id).await)
            }
        }
    }

    async fn cached_or_initial(&self, user_id: &str) -> i64 {
        match self.cache.get(user_id).await {
            Ok(Some(credits)) => credits,
            Ok(None) => self.initial_credits,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Local credit cache unreadable");
                self.initial_credits
            }
        }
    }

    /// Grant the initial credits to a new user. An existing balance is kept
    /// and returned.
    pub async fn initialize_user_credits(&self, user_id: &str) -> Result<Ledgered<i64>, LedgerError> {
        match self.remote.initialize(user_id, self.initial_credits).await {
            Ok(credits) => Ok(Ledgered::remote(credits)),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Remote credit init failed, using local cache");
                metrics::counter!("credits_fallback_total").increment(1);
                self.cache.set(user_id, self.initial_credits).await?;
                Ok(Ledgered::local(self.initial_credits))
            }
        }
    }

    /// Spend `amount` credits. `false` means the balance did not cover it and
    /// nothing changed.
    pub async fn deduct_credits(&self, user_id: &str, amount: i64) -> Result<Ledgered<bool>, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        match self.remote.deduct(user_id, amount, self.initial_credits).await {
            Ok(approved) => {
                if approved {
                    metrics::counter!("credits_deducted_total").increment(amount as u64);
                }
                Ok(Ledgered::remote(approved))
            }
            Err(e) => {
                tracing::warn!(user_id, amount, error = %e, "Remote deduction failed, using local cache");
                metrics::counter!("credits_fallback_total").increment(1);
                let current = self.cached_or_initial(user_id).await;
                if current < amount {
                    return Ok(Ledgered::local(false));
                }
                self.cache.set(user_id, current - amount).await?;
                Ok(Ledgered::local(true))
            }
        }
    }

    /// Credit `amount` to the user, e.g. after a completed checkout.
    pub async fn add_credits(&self, user_id: &str, amount: i64) -> Result<Ledgered<()>, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        match self.remote.add(user_id, amount, self.initial_credits).await {
            Ok(()) => {
                metrics::counter!("credits_added_total").increment(amount as u64);
                Ok(Ledgered::remote(()))
            }
            Err(e) => {
                tracing::warn!(user_id, amount, error = %e, "Remote credit add failed, using local cache");
                metrics::counter!("credits_fallback_total").increment(1);
                let current = self.cached_or_initial(user_id).await;
                self.cache.set(user_id, current + amount).await?;
                Ok(Ledgered::local(()))
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Invalid credit amount: {0}")]
    InvalidAmount(i64),

    #[error("Credit store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credits::CreditSource;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Barrier;

    /// Remote store backed by a map, with a switch to simulate an outage.
    #[derive(Default)]
    struct FakeRemote {
        balances: Mutex<HashMap<String, i64>>,
        down: AtomicBool,
    }

    impl FakeRemote {
        fn with(user: &str, credits: i64) -> Self {
            let remote = Self::default();
            remote
                .balances
                .try_lock()
                .unwrap()
                .insert(user.to_string(), credits);
            remote
        }

        fn offline() -> Self {
            let remote = Self::default();
            remote.down.store(true, Ordering::SeqCst);
            remote
        }

        fn check(&self) -> Result<(), LedgerError> {
            if self.down.load(Ordering::SeqCst) {
                Err(LedgerError::Unavailable("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RemoteCredits for FakeRemote {
        async fn fetch(&self, user_id: &str) -> Result<Option<i64>, LedgerError> {
            self.check()?;
            Ok(self.balances.lock().await.get(user_id).copied())
        }

        async fn initialize(&self, user_id: &str, initial: i64) -> Result<i64, LedgerError> {
            self.check()?;
            Ok(*self
                .balances
                .lock()
                .await
                .entry(user_id.to_string())
                .or_insert(initial))
        }

        async fn deduct(&self, user_id: &str, amount: i64, initial: i64) -> Result<bool, LedgerError> {
            self.check()?;
            let mut balances = self.balances.lock().await;
            let balance = balances.entry(user_id.to_string()).or_insert(initial);
            if *balance < amount {
                return Ok(false);
            }
            *balance -= amount;
            Ok(true)
        }

        async fn add(&self, user_id: &str, amount: i64, initial: i64) -> Result<(), LedgerError> {
            self.check()?;
            *self
                .balances
                .lock()
                .await
                .entry(user_id.to_string())
                .or_insert(initial) += amount;
            Ok(())
        }
    }

    /// Cache whose reads rendezvous at a barrier, forcing two callers to
    /// interleave between read and write.
    struct RendezvousCache {
        inner: MemoryCreditCache,
        barrier: Barrier,
    }

    #[async_trait]
    impl CreditCache for RendezvousCache {
        async fn get(&self, user_id: &str) -> Result<Option<i64>, LedgerError> {
            let value = self.inner.get(user_id).await;
            self.barrier.wait().await;
            value
        }

        async fn set(&self, user_id: &str, credits: i64) -> Result<(), LedgerError> {
            self.inner.set(user_id, credits).await
        }
    }

    fn ledger(remote: FakeRemote) -> (CreditsLedger, Arc<FakeRemote>, Arc<MemoryCreditCache>) {
        let remote = Arc::new(remote);
        let cache = Arc::new(MemoryCreditCache::new());
        let ledger = CreditsLedger::new(remote.clone(), cache.clone(), 3);
        (ledger, remote, cache)
    }

    #[tokio::test]
    async fn test_insufficient_balance_is_refused_and_unchanged() {
        let (ledger, _, _) = ledger(FakeRemote::with("u", 3));

        let result = ledger.deduct_credits("u", 5).await.unwrap();
        assert_eq!(result, Ledgered::remote(false));
        assert_eq!(ledger.get_user_credits("u").await, Ledgered::remote(3));
    }

    #[tokio::test]
    async fn test_serialized_deductions_never_go_negative() {
        let (ledger, _, _) = ledger(FakeRemote::with("u", 5));

        let mut approved = 0;
        for _ in 0..4 {
            if ledger.deduct_credits("u", 2).await.unwrap().value {
                approved += 1;
            }
        }

        assert_eq!(approved, 2);
        assert_eq!(ledger.get_user_credits("u").await.value, 1);
    }

    #[tokio::test]
    async fn test_unknown_user_gets_initial_grant() {
        let (ledger, _, _) = ledger(FakeRemote::default());
        let balance = ledger.get_user_credits("new").await;
        assert_eq!(balance.value, 3);
        assert_eq!(balance.source, CreditSource::Remote);
    }

    #[tokio::test]
    async fn test_new_user_can_spend_the_grant_they_are_shown() {
        let (ledger, remote, _) = ledger(FakeRemote::default());
        assert_eq!(ledger.get_user_credits("new").await, Ledgered::remote(3));

        assert_eq!(ledger.deduct_credits("new", 1).await.unwrap(), Ledgered::remote(true));
        assert_eq!(ledger.get_user_credits("new").await, Ledgered::remote(2));
        assert_eq!(remote.balances.lock().await.get("new"), Some(&2));

        // shown 2, so 3 is refused
        assert_eq!(ledger.deduct_credits("new", 3).await.unwrap(), Ledgered::remote(false));
    }

    #[tokio::test]
    async fn test_first_top_up_builds_on_the_grant() {
        let (ledger, _, _) = ledger(FakeRemote::default());
        ledger.add_credits("buyer", 10).await.unwrap();
        assert_eq!(ledger.get_user_credits("buyer").await.value, 13);
    }

    #[tokio::test]
    async fn test_initialize_keeps_existing_balance() {
        let (ledger, _, _) = ledger(FakeRemote::with("u", 1));
        assert_eq!(ledger.initialize_user_credits("u").await.unwrap(), Ledgered::remote(1));
        assert_eq!(ledger.get_user_credits("u").await.value, 1);
    }

    #[tokio::test]
    async fn test_remote_outage_falls_back_to_cache() {
        let (ledger, _, cache) = ledger(FakeRemote::offline());
        cache.set("u", 4).await.unwrap();

        let balance = ledger.get_user_credits("u").await;
        assert_eq!(balance, Ledgered::local(4));
        assert!(balance.is_degraded());

        assert_eq!(ledger.deduct_credits("u", 3).await.unwrap(), Ledgered::local(true));
        assert_eq!(cache.get("u").await.unwrap(), Some(1));
        assert_eq!(ledger.deduct_credits("u", 2).await.unwrap(), Ledgered::local(false));
        assert_eq!(cache.get("u").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_add_credits_remote_and_fallback() {
        let (ledger, remote, cache) = ledger(FakeRemote::with("u", 1));
        assert_eq!(ledger.add_credits("u", 10).await.unwrap(), Ledgered::remote(()));
        assert_eq!(ledger.get_user_credits("u").await.value, 11);

        remote.down.store(true, Ordering::SeqCst);
        assert_eq!(ledger.add_credits("u", 10).await.unwrap(), Ledgered::local(()));
        // no cache entry yet, so the initial grant is the base
        assert_eq!(cache.get("u").await.unwrap(), Some(13));
    }

    #[tokio::test]
    async fn test_initialize_falls_back_to_cache() {
        let (ledger, _, cache) = ledger(FakeRemote::offline());
        let granted = ledger.initialize_user_credits("u").await.unwrap();
        assert_eq!(granted, Ledgered::local(3));
        assert_eq!(cache.get("u").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amounts() {
        let (ledger, _, _) = ledger(FakeRemote::with("u", 3));
        assert!(matches!(
            ledger.deduct_credits("u", 0).await,
            Err(LedgerError::InvalidAmount(0))
        ));
        assert!(matches!(
            ledger.add_credits("u", -2).await,
            Err(LedgerError::InvalidAmount(-2))
        ));
    }

    /// Known limitation: the local fallback is not atomic. Two concurrent
    /// deductions that each fit the balance but not together both succeed.
    #[tokio::test]
    async fn test_concurrent_fallback_deductions_can_double_spend() {
        let cache = Arc::new(RendezvousCache {
            inner: MemoryCreditCache::new(),
            barrier: Barrier::new(2),
        });
        cache.inner.set("u", 5).await.unwrap();
        let ledger = CreditsLedger::new(Arc::new(FakeRemote::offline()), cache.clone(), 3);

        let (a, b) = futures::join!(ledger.deduct_credits("u", 5), ledger.deduct_credits("u", 5));

        assert!(a.unwrap().value);
        assert!(b.unwrap().value);
        // 10 credits spent against a balance of 5
        assert_eq!(cache.inner.get("u").await.unwrap(), Some(0));
    }
}
