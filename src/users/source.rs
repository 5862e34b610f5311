//! User Source Backends
//!
//! Lists the accounts a run sweeps and looks up their settings.

use crate::error::LedgerError;
use crate::types::{UserAccount, UserId, UserSettings};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::SqlitePool;
use std::collections::HashMap;

/// Where the sweep gets its users from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserSource: Send + Sync {
    /// Accounts to consider this run, in ascending id order
    async fn accounts(&self) -> Result<Vec<UserAccount>, LedgerError>;

    /// Saved settings for a user, `None` when the user never saved any
    async fn settings(&self, user_id: UserId) -> Result<Option<UserSettings>, LedgerError>;
}

/// Reads users from the `users` and `user_settings` tables
///
/// # Tables
/// - `users(id, username, total_coins_collected)`
/// - `user_settings(user_id, key, value)`
#[derive(Clone)]
pub struct SqliteUserSource {
    pool: SqlitePool,
}

impl SqliteUserSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserSource for SqliteUserSource {
    async fn accounts(&self) -> Result<Vec<UserAccount>, LedgerError> {
        let rows = sqlx::query(
            "SELECT id, username, total_coins_collected FROM users ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<UserAccount, LedgerError> {
                Ok(UserAccount {
                    id: row.try_get("id")?,
                    username: row.try_get("username")?,
                    earned_amount_total: row.try_get("total_coins_collected")?,
                })
            })
            .collect()
    }

    async fn settings(&self, user_id: UserId) -> Result<Option<UserSettings>, LedgerError> {
        let rows = sqlx::query("SELECT key, value FROM user_settings WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut values: HashMap<String, String> = HashMap::with_capacity(rows.len());
        for row in &rows {
            values.insert(row.try_get("key")?, row.try_get("value")?);
        }
        Ok(Some(UserSettings::new(user_id, values)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn source() -> SqliteUserSource {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for statement in [
            "CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT NOT NULL, total_coins_collected INTEGER NOT NULL)",
            "CREATE TABLE user_settings (user_id INTEGER NOT NULL, key TEXT NOT NULL, value TEXT NOT NULL)",
            "INSERT INTO users VALUES (2, 'bob', 250), (1, 'alice', 100)",
            "INSERT INTO user_settings VALUES (1, 'web3_wallet_move', '0xa11ce'), (1, 'theme', 'dark')",
        ] {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        SqliteUserSource::new(pool)
    }

    #[tokio::test]
    async fn test_accounts_are_ordered_by_id() {
        let source = source().await;

        let accounts = source.accounts().await.unwrap();

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].id, 1);
        assert_eq!(accounts[0].earned_amount_total, 100);
        assert_eq!(accounts[1].username, "bob");
    }

    #[tokio::test]
    async fn test_settings_are_collected_per_user() {
        let source = source().await;

        let settings = source.settings(1).await.unwrap().unwrap();

        assert_eq!(settings.get("web3_wallet_move"), Some("0xa11ce"));
        assert_eq!(settings.get("theme"), Some("dark"));
        assert!(source.settings(2).await.unwrap().is_none());
    }
}
