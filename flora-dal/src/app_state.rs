//! Encrypted and plain key/value bootstrap state (e.g. `epoch_origin_ms`,
//! wrapped petal operator secrets).

use sqlx::SqlitePool;
use thiserror::Error;

use crate::crypto::{CryptoError, SecretCipher};

#[derive(Debug, Error)]
pub enum AppStateError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

pub struct AppStateDal {
    pool: SqlitePool,
    cipher: SecretCipher,
}

impl AppStateDal {
    pub fn new(pool: SqlitePool, key_secret: &str) -> Self {
        Self {
            pool,
            cipher: SecretCipher::new(key_secret),
        }
    }

    pub async fn get_raw(&self, key: &str) -> Result<Option<String>, AppStateError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM app_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    pub async fn set_raw(&self, key: &str, value: &str) -> Result<(), AppStateError> {
        sqlx::query(
            "INSERT INTO app_state (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_secret(&self, key: &str) -> Result<Option<String>, AppStateError> {
        match self.get_raw(key).await? {
            Some(wrapped) => Ok(Some(self.cipher.decrypt(&wrapped)?)),
            None => Ok(None),
        }
    }

    pub async fn set_secret(&self, key: &str, plaintext: &str) -> Result<(), AppStateError> {
        let wrapped = self.cipher.encrypt(plaintext);
        self.set_raw(key, &wrapped).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_dal() -> AppStateDal {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        AppStateDal::new(pool, "test-secret")
    }

    #[tokio::test]
    async fn raw_round_trips() {
        let dal = memory_dal().await;
        dal.set_raw("epoch_origin_ms", "1700000000000").await.unwrap();
        assert_eq!(
            dal.get_raw("epoch_origin_ms").await.unwrap(),
            Some("1700000000000".to_string())
        );
    }

    #[tokio::test]
    async fn secret_is_stored_encrypted_but_reads_back_plain() {
        let dal = memory_dal().await;
        dal.set_secret("operator_key", "my-private-key").await.unwrap();
        let raw = dal.get_raw("operator_key").await.unwrap().unwrap();
        assert!(raw.starts_with("enc:v1:"));
        assert_eq!(
            dal.get_secret("operator_key").await.unwrap(),
            Some("my-private-key".to_string())
        );
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let dal = memory_dal().await;
        assert_eq!(dal.get_raw("missing").await.unwrap(), None);
        assert_eq!(dal.get_secret("missing").await.unwrap(), None);
    }
}
