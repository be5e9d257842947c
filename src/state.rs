use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::mailer::{HttpMailer, Mailer};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let mailer = Arc::new(HttpMailer::new(&config.mail)) as Arc<dyn Mailer>;

        Ok(Self { db, config, mailer })
    }

    /// State for unit tests: noop mailer, pool that never actually connects.
    #[cfg(test)]
    pub fn fake_with_config(config: AppConfig) -> Self {
        use async_trait::async_trait;

        struct NoopMailer;

        #[async_trait]
        impl Mailer for NoopMailer {
            async fn send(&self, _to: &str, _subject: &str, _body: &str) -> anyhow::Result<()> {
                Ok(())
            }
        }

        // Lazily connecting pool; unit tests never actually touch Postgres.
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .expect("lazy pool should construct");

        Self {
            db,
            config: Arc::new(config),
            mailer: Arc::new(NoopMailer) as Arc<dyn Mailer>,
        }
    }
}
