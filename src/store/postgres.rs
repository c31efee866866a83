use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::auth_app::{AuthApp, AuthAppUpdate, NewAuthApp};
use crate::models::user::{NewStaffUser, StaffUser};
use crate::store::PortalStore;

const AUTH_APP_COLUMNS: &str = "id, app_name, token, whitelisted_ips, request_count, status, last_accessed_at, description, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PortalStore for PgStore {
    async fn insert_auth_app(&self, app: &NewAuthApp) -> anyhow::Result<AuthApp> {
        let row = sqlx::query_as::<_, AuthApp>(&format!(
            r#"INSERT INTO auth_apps (app_name, token, whitelisted_ips, description)
               VALUES ($1, $2, $3, $4)
               RETURNING {}"#,
            AUTH_APP_COLUMNS
        ))
        .bind(&app.app_name)
        .bind(&app.token)
        .bind(&app.whitelisted_ips)
        .bind(&app.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_auth_apps(&self) -> anyhow::Result<Vec<AuthApp>> {
        let rows = sqlx::query_as::<_, AuthApp>(&format!(
            "SELECT {} FROM auth_apps ORDER BY created_at DESC, id DESC",
            AUTH_APP_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn get_auth_app(&self, id: i64) -> anyhow::Result<Option<AuthApp>> {
        let row = sqlx::query_as::<_, AuthApp>(&format!(
            "SELECT {} FROM auth_apps WHERE id = $1",
            AUTH_APP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn update_auth_app(
        &self,
        id: i64,
        update: &AuthAppUpdate,
    ) -> anyhow::Result<Option<AuthApp>> {
        let row = sqlx::query_as::<_, AuthApp>(&format!(
            r#"UPDATE auth_apps
               SET app_name = $2, whitelisted_ips = $3, description = $4, updated_at = NOW()
               WHERE id = $1
               RETURNING {}"#,
            AUTH_APP_COLUMNS
        ))
        .bind(id)
        .bind(&update.app_name)
        .bind(&update.whitelisted_ips)
        .bind(&update.description)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn delete_auth_app(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM auth_apps WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn toggle_auth_app_status(&self, id: i64) -> anyhow::Result<Option<bool>> {
        let status = sqlx::query_scalar::<_, bool>(
            "UPDATE auth_apps SET status = NOT status, updated_at = NOW() WHERE id = $1 RETURNING status",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(status)
    }

    async fn find_active_auth_app(&self, token: &str) -> anyhow::Result<Option<AuthApp>> {
        let row = sqlx::query_as::<_, AuthApp>(&format!(
            "SELECT {} FROM auth_apps WHERE token = $1 AND status = true",
            AUTH_APP_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn record_auth_app_access(&self, id: i64) -> anyhow::Result<()> {
        // Single statement: concurrent hits from one app never lose an increment.
        sqlx::query(
            "UPDATE auth_apps SET request_count = request_count + 1, last_accessed_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<StaffUser>> {
        let row = sqlx::query_as::<_, StaffUser>(
            "SELECT id, name, email, password_hash FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn upsert_user(&self, user: &NewStaffUser) -> anyhow::Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO users (name, email, password_hash)
               VALUES ($1, $2, $3)
               ON CONFLICT (email) DO UPDATE
               SET name = EXCLUDED.name, password_hash = EXCLUDED.password_hash, updated_at = NOW()
               RETURNING id"#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}
