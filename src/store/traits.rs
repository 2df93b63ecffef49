//! `PlanStore` trait: async interface for planning persistence.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::planning::{AttributeStore, Budget};

/// Storage for interview progress and exported budgets, keyed by user.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Load the attributes gathered so far. Unknown users get an empty store.
    async fn load_plan_attributes(&self, user_id: &str) -> Result<AttributeStore, DatabaseError>;

    /// Replace every stored attribute for `user_id` with `attrs`.
    async fn save_plan_attributes(
        &self,
        user_id: &str,
        attrs: &AttributeStore,
    ) -> Result<(), DatabaseError>;

    /// Forget the user's attributes. Returns whether anything was deleted.
    async fn clear_plan_attributes(&self, user_id: &str) -> Result<bool, DatabaseError>;

    /// Store the user's exported budget, overwriting any previous one.
    async fn save_budget(&self, user_id: &str, budget: &Budget) -> Result<(), DatabaseError>;

    async fn load_budget(&self, user_id: &str) -> Result<Option<Budget>, DatabaseError>;
}
