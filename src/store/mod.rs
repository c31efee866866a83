pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::models::auth_app::{AuthApp, AuthAppUpdate, NewAuthApp};
use crate::models::user::{NewStaffUser, StaffUser};

/// Persistence for the access registry and staff accounts.
/// Implementations: PgStore (production), MemoryStore (development and tests).
#[async_trait]
pub trait PortalStore: Send + Sync {
    // -- AuthApp Operations --

    async fn insert_auth_app(&self, app: &NewAuthApp) -> anyhow::Result<AuthApp>;

    /// Newest first.
    async fn list_auth_apps(&self) -> anyhow::Result<Vec<AuthApp>>;

    async fn get_auth_app(&self, id: i64) -> anyhow::Result<Option<AuthApp>>;

    async fn update_auth_app(
        &self,
        id: i64,
        update: &AuthAppUpdate,
    ) -> anyhow::Result<Option<AuthApp>>;

    async fn delete_auth_app(&self, id: i64) -> anyhow::Result<bool>;

    /// Flips `status` in place and returns the new value.
    async fn toggle_auth_app_status(&self, id: i64) -> anyhow::Result<Option<bool>>;

    /// Exact token match among active apps only.
    async fn find_active_auth_app(&self, token: &str) -> anyhow::Result<Option<AuthApp>>;

    /// Atomically bumps `request_count` and stamps `last_accessed_at`.
    async fn record_auth_app_access(&self, id: i64) -> anyhow::Result<()>;

    // -- Staff Operations --

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<StaffUser>>;

    /// Creates the account or replaces name and password of an existing one.
    async fn upsert_user(&self, user: &NewStaffUser) -> anyhow::Result<i64>;
}
