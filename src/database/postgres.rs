use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::auth::Permission;
use crate::config::DatabaseConfig;
use crate::database::models::{Organization, OrganizationSettings, Subscription, User, UserProfile};
use crate::database::store::{CascadeReport, ContentStore, OrganizationStore, Record, StoreError, UserStore};
use crate::scope::{Predicate, PredicateSql};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS organizations (
        organization_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        domain TEXT UNIQUE,
        settings JSONB NOT NULL DEFAULT '{}'::jsonb,
        subscription JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL,
        organization_id TEXT,
        permissions JSONB NOT NULL DEFAULT '[]'::jsonb,
        profile JSONB NOT NULL DEFAULT '{}'::jsonb,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        last_login TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS users_organization_idx ON users (organization_id)",
    r#"CREATE TABLE IF NOT EXISTS records (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        organization_id TEXT NOT NULL,
        data JSONB NOT NULL,
        PRIMARY KEY (collection, id)
    )"#,
    "CREATE INDEX IF NOT EXISTS records_organization_idx ON records (collection, organization_id)",
];

const ORGANIZATION_COLUMNS: &str = "organization_id, name, domain, settings, subscription, created_at, updated_at";

const USER_COLUMNS: &str = "id, username, email, password_hash, role, organization_id, permissions, profile, \
     is_active, last_login, created_at, updated_at";

/// PostgreSQL backend over a single pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| StoreError::Backend("DATABASE_URL is not configured".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Connected PostgreSQL pool (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    fn organization_from_row(row: &PgRow) -> Result<Organization, StoreError> {
        let settings: Json<OrganizationSettings> = row.try_get("settings")?;
        let subscription: Json<Subscription> = row.try_get("subscription")?;
        Ok(Organization {
            organization_id: row.try_get("organization_id")?,
            name: row.try_get("name")?,
            domain: row.try_get("domain")?,
            settings: settings.0,
            subscription: subscription.0,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
        let role: String = row.try_get("role")?;
        let permissions: Json<BTreeSet<Permission>> = row.try_get("permissions")?;
        let profile: Json<UserProfile> = row.try_get("profile")?;
        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role: role.parse().map_err(StoreError::Backend)?,
            organization_id: row.try_get("organization_id")?,
            permissions: permissions.0,
            profile: profile.0,
            is_active: row.try_get("is_active")?,
            last_login: row.try_get("last_login")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn record_owner(record: &Record) -> Result<(String, String), StoreError> {
        let id = record
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| StoreError::Backend("record is missing its id".to_string()))?;
        let organization_id = record
            .get("organizationId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| StoreError::Backend("record is missing its organizationId".to_string()))?;
        Ok((id.to_string(), organization_id.to_string()))
    }

    fn where_clause(predicate: &Predicate, after: usize) -> Result<(String, Vec<String>), StoreError> {
        PredicateSql::generate(predicate, after).map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl OrganizationStore for PgStore {
    async fn get(&self, organization_id: &str) -> Result<Option<Organization>, StoreError> {
        let sql = format!("SELECT {} FROM organizations WHERE organization_id = $1", ORGANIZATION_COLUMNS);
        let row = sqlx::query(&sql).bind(organization_id).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::organization_from_row).transpose()
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Option<Organization>, StoreError> {
        let sql = format!("SELECT {} FROM organizations WHERE domain = $1", ORGANIZATION_COLUMNS);
        let row = sqlx::query(&sql).bind(domain).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::organization_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Organization>, StoreError> {
        let sql = format!("SELECT {} FROM organizations ORDER BY created_at DESC", ORGANIZATION_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(Self::organization_from_row).collect()
    }

    async fn insert(&self, organization: &Organization) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO organizations (organization_id, name, domain, settings, subscription, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&organization.organization_id)
        .bind(&organization.name)
        .bind(&organization.domain)
        .bind(Json(&organization.settings))
        .bind(Json(&organization.subscription))
        .bind(organization.created_at)
        .bind(organization.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace(&self, organization: &Organization) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE organizations SET name = $2, domain = $3, settings = $4, subscription = $5, updated_at = $6 \
             WHERE organization_id = $1",
        )
        .bind(&organization.organization_id)
        .bind(&organization.name)
        .bind(&organization.domain)
        .bind(Json(&organization.settings))
        .bind(Json(&organization.subscription))
        .bind(organization.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, organization_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM organizations WHERE organization_id = $1")
            .bind(organization_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_cascade(
        &self,
        organization_id: &str,
        collections: &[&str],
    ) -> Result<Option<CascadeReport>, StoreError> {
        let collections: Vec<String> = collections.iter().map(|c| c.to_string()).collect();
        let mut tx = self.pool.begin().await?;

        let users = sqlx::query("DELETE FROM users WHERE organization_id = $1")
            .bind(organization_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let records = sqlx::query("DELETE FROM records WHERE organization_id = $1 AND collection = ANY($2)")
            .bind(organization_id)
            .bind(&collections)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM organizations WHERE organization_id = $1")
            .bind(organization_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(CascadeReport { users, records }))
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn get(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::user_from_row).transpose()
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1 OR username = $1 LIMIT 1", USER_COLUMNS);
        let row = sqlx::query(&sql).bind(identifier).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::user_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {} FROM users ORDER BY created_at DESC", USER_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(Self::user_from_row).collect()
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO users ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            USER_COLUMNS
        );
        sqlx::query(&sql)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(&user.organization_id)
            .bind(Json(&user.permissions))
            .bind(Json(&user.profile))
            .bind(user.is_active)
            .bind(user.last_login)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace(&self, user: &User) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET username = $2, email = $3, password_hash = $4, role = $5, organization_id = $6, \
             permissions = $7, profile = $8, is_active = $9, last_login = $10, updated_at = $11 WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.organization_id)
        .bind(Json(&user.permissions))
        .bind(Json(&user.profile))
        .bind(user.is_active)
        .bind(user.last_login)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_organization(&self, organization_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE organization_id = $1")
            .bind(organization_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn find(&self, collection: &str, predicate: &Predicate) -> Result<Vec<Record>, StoreError> {
        let (where_clause, params) = Self::where_clause(predicate, 1)?;
        let sql = format!(
            "SELECT data FROM records WHERE collection = $1 AND {} ORDER BY id",
            where_clause
        );

        let mut query = sqlx::query(&sql).bind(collection);
        for param in params {
            query = query.bind(param);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let data: Json<Record> = row.try_get("data")?;
                Ok(data.0)
            })
            .collect()
    }

    async fn insert_one(&self, collection: &str, record: Record) -> Result<Record, StoreError> {
        let (id, organization_id) = Self::record_owner(&record)?;
        sqlx::query("INSERT INTO records (collection, id, organization_id, data) VALUES ($1, $2, $3, $4)")
            .bind(collection)
            .bind(id)
            .bind(organization_id)
            .bind(Json(&record))
            .execute(&self.pool)
            .await?;
        Ok(record)
    }

    async fn update_one(&self, collection: &str, predicate: &Predicate, patch: Record) -> Result<u64, StoreError> {
        let (where_clause, params) = Self::where_clause(predicate, 2)?;
        let sql = format!(
            "UPDATE records SET data = data || $1 WHERE (collection, id) IN \
             (SELECT collection, id FROM records WHERE collection = $2 AND {} LIMIT 1)",
            where_clause
        );

        let mut query = sqlx::query(&sql).bind(Json(&patch)).bind(collection);
        for param in params {
            query = query.bind(param);
        }
        Ok(query.execute(&self.pool).await?.rows_affected())
    }

    async fn delete_one(&self, collection: &str, predicate: &Predicate) -> Result<u64, StoreError> {
        let (where_clause, params) = Self::where_clause(predicate, 1)?;
        let sql = format!(
            "DELETE FROM records WHERE (collection, id) IN \
             (SELECT collection, id FROM records WHERE collection = $1 AND {} LIMIT 1)",
            where_clause
        );

        let mut query = sqlx::query(&sql).bind(collection);
        for param in params {
            query = query.bind(param);
        }
        Ok(query.execute(&self.pool).await?.rows_affected())
    }

    async fn delete_many(&self, collection: &str, predicate: &Predicate) -> Result<u64, StoreError> {
        let (where_clause, params) = Self::where_clause(predicate, 1)?;
        let sql = format!("DELETE FROM records WHERE collection = $1 AND {}", where_clause);

        let mut query = sqlx::query(&sql).bind(collection);
        for param in params {
            query = query.bind(param);
        }
        Ok(query.execute(&self.pool).await?.rows_affected())
    }

    async fn count(&self, collection: &str, predicate: &Predicate) -> Result<u64, StoreError> {
        let (where_clause, params) = Self::where_clause(predicate, 1)?;
        let sql = format!("SELECT COUNT(*) FROM records WHERE collection = $1 AND {}", where_clause);

        let mut query = sqlx::query_as::<_, (i64,)>(&sql).bind(collection);
        for param in params {
            query = query.bind(param);
        }
        let (count,) = query.fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}
