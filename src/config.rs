use std::env;

use crate::validation::DEFAULT_MAX_IMAGE_BYTES;

/// Runtime configuration, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub media_root: String,
    pub max_image_bytes: u64,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://atelier.db?mode=rwc".to_string());

        let media_root = env::var("MEDIA_ROOT").unwrap_or_else(|_| "storage/media".to_string());

        let max_image_bytes = env::var("MAX_IMAGE_BYTES")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_IMAGE_BYTES);

        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(8080);

        Self {
            database_url,
            media_root,
            max_image_bytes,
            port,
        }
    }
}
