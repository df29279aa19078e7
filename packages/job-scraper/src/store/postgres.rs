use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, PgPool, Postgres};

use crate::error::StoreResult;
use crate::models::{DedupKey, JobId, JobRecord, NewJob};
use crate::store::{JobStore, StoreSession};

/// Postgres-backed job store.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a job by its natural key
    pub async fn find_by_key(&self, key: &DedupKey) -> StoreResult<Option<JobRecord>> {
        let job = sqlx::query_as::<_, JobRecord>(
            "SELECT * FROM jobs WHERE title = $1 AND company = $2 ORDER BY id LIMIT 1",
        )
        .bind(&key.title)
        .bind(&key.company)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    /// Count all stored jobs
    pub async fn count(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    type Session = PgStoreSession;

    async fn open_session(&self) -> StoreResult<PgStoreSession> {
        let conn = self.pool.acquire().await?;
        Ok(PgStoreSession { conn })
    }
}

/// One pooled connection checked out for the length of a cycle.
pub struct PgStoreSession {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl StoreSession for PgStoreSession {
    async fn exists(&mut self, key: &DedupKey) -> StoreResult<bool> {
        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM jobs WHERE title = $1 AND company = $2)",
        )
        .bind(&key.title)
        .bind(&key.company)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(found)
    }

    async fn insert(&mut self, job: &NewJob) -> StoreResult<JobId> {
        let mut tx = self.conn.begin().await?;

        let id = sqlx::query_scalar::<_, JobId>(
            r#"
            INSERT INTO jobs (title, company, location, tags, date_posted, link, logo)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.tags)
        .bind(&job.date_posted)
        .bind(&job.link)
        .bind(&job.logo)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    async fn close(self) {
        // Dropping the pooled connection hands it back to the pool.
        drop(self.conn);
    }
}
