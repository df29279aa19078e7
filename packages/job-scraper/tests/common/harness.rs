//! Postgres test harness backed by testcontainers.
//!
//! One container serves the whole test binary. Each test gets its own
//! freshly created and migrated database, so row counts never leak
//! between tests.

use anyhow::{Context, Result};
use job_scraper::db;
use job_scraper::PgJobStore;
use sqlx::PgPool;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

struct SharedTestInfra {
    server_url: String,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        // Run tests with: RUST_LOG=debug cargo test -- --ignored --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let host = postgres.get_host().await?;
        let port = postgres.get_host_port_ipv4(5432).await?;

        Ok(Self {
            server_url: format!("postgresql://postgres:postgres@{}:{}", host, port),
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// A migrated database of its own, plus a store over it.
///
/// ```ignore
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// #[ignore = "requires docker"]
/// async fn my_test(ctx: &TestHarness) {
///     let mut session = ctx.store.open_session().await.unwrap();
/// }
/// ```
pub struct TestHarness {
    pub database_url: String,
    pub db_pool: PgPool,
    pub store: PgJobStore,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }

    async fn teardown(self) {
        self.db_pool.close().await;
    }
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;
        let database_url = format!("{}/jobs_{}", infra.server_url, Uuid::now_v7().simple());

        let created = db::ensure_database(&database_url)
            .await
            .context("Failed to create test database")?;
        assert!(created, "test database names are unique");

        let db_pool = db::connect(&database_url, 5).await?;
        db::migrate(&db_pool).await?;

        Ok(Self {
            database_url,
            store: PgJobStore::new(db_pool.clone()),
            db_pool,
        })
    }
}
