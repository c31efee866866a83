use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::models::auth_app::{AuthApp, AuthAppUpdate, NewAuthApp};
use crate::models::user::{NewStaffUser, StaffUser};
use crate::store::PortalStore;

/// Process-local store. Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    apps: DashMap<i64, AuthApp>,
    users: DashMap<String, StaffUser>,
    next_app_id: AtomicI64,
    next_user_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PortalStore for MemoryStore {
    async fn insert_auth_app(&self, app: &NewAuthApp) -> anyhow::Result<AuthApp> {
        if self.apps.iter().any(|a| a.token == app.token) {
            anyhow::bail!("duplicate key value violates unique constraint on auth_apps.token");
        }
        let now = Utc::now();
        let row = AuthApp {
            id: self.next_app_id.fetch_add(1, Ordering::SeqCst) + 1,
            app_name: app.app_name.clone(),
            token: app.token.clone(),
            whitelisted_ips: app.whitelisted_ips.clone(),
            request_count: 0,
            status: true,
            last_accessed_at: None,
            description: app.description.clone(),
            created_at: now,
            updated_at: now,
        };
        self.apps.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_auth_apps(&self) -> anyhow::Result<Vec<AuthApp>> {
        let mut rows: Vec<AuthApp> = self.apps.iter().map(|a| a.value().clone()).collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn get_auth_app(&self, id: i64) -> anyhow::Result<Option<AuthApp>> {
        Ok(self.apps.get(&id).map(|a| a.value().clone()))
    }

    async fn update_auth_app(
        &self,
        id: i64,
        update: &AuthAppUpdate,
    ) -> anyhow::Result<Option<AuthApp>> {
        Ok(self.apps.get_mut(&id).map(|mut app| {
            app.app_name = update.app_name.clone();
            app.whitelisted_ips = update.whitelisted_ips.clone();
            app.description = update.description.clone();
            app.updated_at = Utc::now();
            app.value().clone()
        }))
    }

    async fn delete_auth_app(&self, id: i64) -> anyhow::Result<bool> {
        Ok(self.apps.remove(&id).is_some())
    }

    async fn toggle_auth_app_status(&self, id: i64) -> anyhow::Result<Option<bool>> {
        Ok(self.apps.get_mut(&id).map(|mut app| {
            app.status = !app.status;
            app.updated_at = Utc::now();
            app.status
        }))
    }

    async fn find_active_auth_app(&self, token: &str) -> anyhow::Result<Option<AuthApp>> {
        Ok(self
            .apps
            .iter()
            .find(|a| a.status && a.token == token)
            .map(|a| a.value().clone()))
    }

    async fn record_auth_app_access(&self, id: i64) -> anyhow::Result<()> {
        // The shard write lock makes the read-modify-write atomic.
        if let Some(mut app) = self.apps.get_mut(&id) {
            app.request_count += 1;
            app.last_accessed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<StaffUser>> {
        Ok(self
            .users
            .get(&email.trim().to_lowercase())
            .map(|u| u.value().clone()))
    }

    async fn upsert_user(&self, user: &NewStaffUser) -> anyhow::Result<i64> {
        let key = user.email.trim().to_lowercase();
        let mut entry = self.users.entry(key).or_insert_with(|| StaffUser {
            id: self.next_user_id.fetch_add(1, Ordering::SeqCst) + 1,
            name: String::new(),
            email: user.email.clone(),
            password_hash: String::new(),
        });
        entry.name = user.name.clone();
        entry.password_hash = user.password_hash.clone();
        Ok(entry.id)
    }
}
