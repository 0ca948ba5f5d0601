use crate::auth::repo::{PgResetTokenStore, PgUserStore, ResetTokenStore, UserStore};
use crate::config::AppConfig;
use crate::mail::{Mailer, SmtpMailer};
use crate::products::repo::{PgProductStore, ProductStore};
use crate::storage::{S3Storage, StorageClient};
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub reset_tokens: Arc<dyn ResetTokenStore>,
    pub products: Arc<dyn ProductStore>,
    pub mailer: Arc<dyn Mailer>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        let storage = Arc::new(S3Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;
        let mailer = Arc::new(SmtpMailer::new(&config.mail)?) as Arc<dyn Mailer>;

        Ok(Self {
            users: Arc::new(PgUserStore::new(db.clone())),
            reset_tokens: Arc::new(PgResetTokenStore::new(db.clone())),
            products: Arc::new(PgProductStore::new(db)),
            mailer,
            storage,
            config,
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        crate::testing::Fakes::new().state()
    }
}
