//! libSQL backend: async `PlanStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::planning::{AttributeStore, Budget};
use crate::store::migrations;
use crate::store::traits::PlanStore;

/// Settings key the exported budget is stored under.
const BUDGET_SETTING: &str = "budget";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn get_setting(&self, user_id: &str, key: &str) -> Result<Option<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT value FROM settings WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_setting: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("get_setting: {e}")))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_setting: {e}"))),
        }
    }

    async fn set_setting(&self, user_id: &str, key: &str, value: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO settings (user_id, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, key) DO UPDATE SET value = ?3, updated_at = ?4",
                params![user_id, key, value, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_setting: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl PlanStore for LibSqlStore {
    async fn load_plan_attributes(&self, user_id: &str) -> Result<AttributeStore, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT key, value FROM plan_attributes WHERE user_id = ?1 ORDER BY key",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_plan_attributes: {e}")))?;

        let mut pairs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("load_plan_attributes: {e}")))?
        {
            let key: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("load_plan_attributes: {e}")))?;
            let value: String = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("load_plan_attributes: {e}")))?;
            pairs.push((key, value));
        }

        debug!(user_id, count = pairs.len(), "Loaded plan attributes");
        Ok(AttributeStore::from_map(pairs))
    }

    async fn save_plan_attributes(
        &self,
        user_id: &str,
        attrs: &AttributeStore,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("save_plan_attributes: {e}")))?;

        tx.execute(
            "DELETE FROM plan_attributes WHERE user_id = ?1",
            params![user_id],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("save_plan_attributes: {e}")))?;

        for (key, value) in attrs.iter() {
            tx.execute(
                "INSERT INTO plan_attributes (user_id, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, key, value, now.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_plan_attributes: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("save_plan_attributes: {e}")))?;

        debug!(user_id, count = attrs.len(), "Saved plan attributes");
        Ok(())
    }

    async fn clear_plan_attributes(&self, user_id: &str) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM plan_attributes WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("clear_plan_attributes: {e}")))?;
        Ok(count > 0)
    }

    async fn save_budget(&self, user_id: &str, budget: &Budget) -> Result<(), DatabaseError> {
        let json =
            serde_json::to_string(budget).map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.set_setting(user_id, BUDGET_SETTING, &json).await
    }

    async fn load_budget(&self, user_id: &str) -> Result<Option<Budget>, DatabaseError> {
        match self.get_setting(user_id, BUDGET_SETTING).await? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| DatabaseError::Serialization(format!("stored budget: {e}"))),
            None => Ok(None),
        }
    }
}
