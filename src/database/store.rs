// Storage collaborators
//
// The core only ever talks to these traits. `memory` and `postgres` provide
// the two reference backends.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{Organization, User};
use crate::scope::Predicate;

pub type Record = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some("23505") {
                return StoreError::Conflict(db.message().to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(format!("Corrupt stored document: {}", err))
    }
}

/// Counts removed by a cascading organization delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    pub users: u64,
    pub records: u64,
}

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    async fn get(&self, organization_id: &str) -> Result<Option<Organization>, StoreError>;

    async fn find_by_domain(&self, domain: &str) -> Result<Option<Organization>, StoreError>;

    async fn list(&self) -> Result<Vec<Organization>, StoreError>;

    async fn insert(&self, organization: &Organization) -> Result<(), StoreError>;

    /// Returns false when no row carries the id.
    async fn replace(&self, organization: &Organization) -> Result<bool, StoreError>;

    async fn remove(&self, organization_id: &str) -> Result<bool, StoreError>;

    /// Backends that can delete an organization together with its users and
    /// records in one transaction override this. `Ok(None)` means the caller
    /// must cascade step by step.
    async fn remove_cascade(
        &self,
        _organization_id: &str,
        _collections: &[&str],
    ) -> Result<Option<CascadeReport>, StoreError> {
        Ok(None)
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Matches either the email or the username.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError>;

    async fn list(&self) -> Result<Vec<User>, StoreError>;

    async fn insert(&self, user: &User) -> Result<(), StoreError>;

    async fn replace(&self, user: &User) -> Result<bool, StoreError>;

    async fn remove(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn delete_by_organization(&self, organization_id: &str) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn find(&self, collection: &str, predicate: &Predicate) -> Result<Vec<Record>, StoreError>;

    async fn insert_one(&self, collection: &str, record: Record) -> Result<Record, StoreError>;

    /// Shallow-merges `patch` into the first matching record. Returns the
    /// matched count.
    async fn update_one(&self, collection: &str, predicate: &Predicate, patch: Record) -> Result<u64, StoreError>;

    async fn delete_one(&self, collection: &str, predicate: &Predicate) -> Result<u64, StoreError>;

    async fn delete_many(&self, collection: &str, predicate: &Predicate) -> Result<u64, StoreError>;

    async fn count(&self, collection: &str, predicate: &Predicate) -> Result<u64, StoreError> {
        Ok(self.find(collection, predicate).await?.len() as u64)
    }
}
