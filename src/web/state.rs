use anyhow::{Context, Result};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

use crate::{config::AppConfig, web::storage::MediaStore};

#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    media: MediaStore,
    max_image_bytes: u64,
}

impl AppState {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await
            .with_context(|| format!("failed to open database at {}", config.database_url))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        let media = MediaStore::new(&config.media_root);
        media.ensure_root().await?;

        Ok(Self {
            pool,
            media,
            max_image_bytes: config.max_image_bytes,
        })
    }

    pub fn pool_ref(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    pub fn max_image_bytes(&self) -> u64 {
        self.max_image_bytes
    }
}
