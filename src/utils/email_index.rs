use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures_util::StreamExt;
use moka::future::Cache;
use sqlx::MySqlPool;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Expected capacity and false-positive rate of the filter.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

const CACHE_CAPACITY: u64 = 500_000;
const CACHE_TTL: Duration = Duration::from_secs(86_400);

#[inline]
fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registered-email lookup used by registration.
///
/// The cuckoo filter answers "definitely free" without touching the database,
/// the moka cache answers "definitely taken" for recently active accounts, and
/// anything else falls through to MySQL.
pub struct EmailIndex {
    filter: RwLock<CuckooFilter<String>>,
    cache: Cache<String, bool>,
}

impl Default for EmailIndex {
    fn default() -> Self {
        Self::new(FILTER_CAPACITY)
    }
}

impl EmailIndex {
    pub fn new(capacity: usize) -> Self {
        Self {
            filter: RwLock::new(CuckooFilter::new(capacity, FALSE_POSITIVE_RATE)),
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// False positives possible, false negatives not.
    pub fn might_exist(&self, email: &str) -> bool {
        self.filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&normalize(email))
    }

    pub fn insert(&self, email: &str) {
        self.filter
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(&normalize(email));
    }

    fn insert_batch(&self, emails: &[String]) {
        let mut filter = self.filter.write().unwrap_or_else(PoisonError::into_inner);
        for email in emails {
            filter.add(email);
        }
    }

    pub async fn mark_taken(&self, email: &str) {
        self.cache.insert(normalize(email), true).await;
    }

    pub async fn is_taken(&self, email: &str) -> bool {
        self.cache.get(&normalize(email)).await.unwrap_or(false)
    }

    /// Records a freshly registered email in both layers.
    pub async fn register(&self, email: &str) {
        self.insert(email);
        self.mark_taken(email).await;
    }

    /// true  => email AVAILABLE
    /// false => email TAKEN (or the database could not tell)
    pub async fn is_available(&self, email: &str, pool: &MySqlPool) -> bool {
        let email = normalize(email);

        if !self.might_exist(&email) {
            return true;
        }
        if self.is_taken(&email).await {
            return false;
        }

        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? LIMIT 1)",
        )
        .bind(&email)
        .fetch_one(pool)
        .await;

        match exists {
            Ok(0) => true,
            Ok(_) => {
                self.mark_taken(&email).await;
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Email availability lookup failed");
                false
            }
        }
    }

    /// Loads every email into the filter and the recently active ones into
    /// the cache, streaming rows in batches.
    pub async fn warmup(&self, pool: &MySqlPool, recent_days: u32, batch_size: usize) -> Result<()> {
        let mut stream = sqlx::query_as::<_, (String,)>("SELECT email FROM users").fetch(pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            let (email,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;
            batch.push(normalize(&email));
            total += 1;

            if batch.len() == batch_size {
                self.insert_batch(&batch);
                batch.clear();
            }
        }
        if !batch.is_empty() {
            self.insert_batch(&batch);
        }
        drop(stream);

        log::info!("Email filter warmup complete: {} users", total);

        let mut stream = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT email
            FROM users
            WHERE last_login_at >= NOW() - INTERVAL ? DAY
            ORDER BY last_login_at DESC
            "#,
        )
        .bind(recent_days)
        .fetch(pool);

        let mut recent = 0usize;
        while let Some(row) = stream.next().await {
            let (email,) = row?;
            batch.push(normalize(&email));
            recent += 1;

            if batch.len() >= batch_size {
                self.cache_batch(&batch).await;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            self.cache_batch(&batch).await;
        }

        log::info!(
            "Email cache warmup complete: {} recent users (last {} days)",
            recent,
            recent_days
        );
        Ok(())
    }

    async fn cache_batch(&self, emails: &[String]) {
        let inserts: Vec<_> = emails
            .iter()
            .map(|e| self.cache.insert(e.clone(), true))
            .collect();
        futures::future::join_all(inserts).await;
    }
}
