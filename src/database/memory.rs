use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::models::{Organization, User};
use crate::database::store::{ContentStore, OrganizationStore, Record, StoreError, UserStore};
use crate::scope::Predicate;

/// In-process backend for development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    organizations: RwLock<HashMap<String, Organization>>,
    users: RwLock<HashMap<Uuid, User>>,
    records: RwLock<HashMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrganizationStore for MemoryStore {
    async fn get(&self, organization_id: &str) -> Result<Option<Organization>, StoreError> {
        Ok(self.organizations.read().await.get(organization_id).cloned())
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Option<Organization>, StoreError> {
        let organizations = self.organizations.read().await;
        Ok(organizations
            .values()
            .find(|o| o.domain.as_deref() == Some(domain))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Organization>, StoreError> {
        let mut all: Vec<Organization> = self.organizations.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn insert(&self, organization: &Organization) -> Result<(), StoreError> {
        let mut organizations = self.organizations.write().await;
        if organizations.contains_key(&organization.organization_id) {
            return Err(StoreError::Conflict(format!(
                "organization '{}' already exists",
                organization.organization_id
            )));
        }
        if let Some(domain) = organization.domain.as_deref() {
            if organizations.values().any(|o| o.domain.as_deref() == Some(domain)) {
                return Err(StoreError::Conflict(format!("domain '{}' already in use", domain)));
            }
        }
        organizations.insert(organization.organization_id.clone(), organization.clone());
        Ok(())
    }

    async fn replace(&self, organization: &Organization) -> Result<bool, StoreError> {
        let mut organizations = self.organizations.write().await;
        if let Some(domain) = organization.domain.as_deref() {
            let taken = organizations
                .values()
                .any(|o| o.organization_id != organization.organization_id && o.domain.as_deref() == Some(domain));
            if taken {
                return Err(StoreError::Conflict(format!("domain '{}' already in use", domain)));
            }
        }
        match organizations.get_mut(&organization.organization_id) {
            Some(slot) => {
                *slot = organization.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, organization_id: &str) -> Result<bool, StoreError> {
        Ok(self.organizations.write().await.remove(organization_id).is_some())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email == identifier || u.username == identifier)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let mut all: Vec<User> = self.users.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email || u.username == user.username) {
            return Err(StoreError::Conflict("user with this email or username already exists".to_string()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn replace(&self, user: &User) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let clash = users
            .values()
            .any(|u| u.id != user.id && (u.email == user.email || u.username == user.username));
        if clash {
            return Err(StoreError::Conflict("user with this email or username already exists".to_string()));
        }
        match users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }

    async fn delete_by_organization(&self, organization_id: &str) -> Result<u64, StoreError> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|_, u| u.organization_id.as_deref() != Some(organization_id));
        Ok((before - users.len()) as u64)
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn find(&self, collection: &str, predicate: &Predicate) -> Result<Vec<Record>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .get(collection)
            .map(|rows| rows.iter().filter(|r| predicate.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_one(&self, collection: &str, record: Record) -> Result<Record, StoreError> {
        let mut records = self.records.write().await;
        records.entry(collection.to_string()).or_default().push(record.clone());
        Ok(record)
    }

    async fn update_one(&self, collection: &str, predicate: &Predicate, patch: Record) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let Some(rows) = records.get_mut(collection) else {
            return Ok(0);
        };
        match rows.iter_mut().find(|r| predicate.matches(r)) {
            Some(row) => {
                for (key, value) in patch {
                    row.insert(key, value);
                }
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_one(&self, collection: &str, predicate: &Predicate) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let Some(rows) = records.get_mut(collection) else {
            return Ok(0);
        };
        match rows.iter().position(|r| predicate.matches(r)) {
            Some(index) => {
                rows.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, predicate: &Predicate) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let Some(rows) = records.get_mut(collection) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !predicate.matches(r));
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, org: &str) -> Record {
        match json!({"id": id, "organizationId": org, "name": "Ada"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_compound_predicate_leaves_other_tenant_untouched() {
        let store = MemoryStore::new();
        store.insert_one("students", record("r1", "t1")).await.unwrap();

        let foreign = Predicate::by_id("r1").eq("organizationId", "t2");
        let mut patch = Record::new();
        patch.insert("name".into(), json!("Mallory"));

        assert_eq!(store.update_one("students", &foreign, patch).await.unwrap(), 0);
        assert_eq!(store.delete_one("students", &foreign).await.unwrap(), 0);

        let rows = store.find("students", &Predicate::all()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Ada");
    }

    #[tokio::test]
    async fn test_delete_many_by_organization() {
        let store = MemoryStore::new();
        store.insert_one("news_events", record("a", "t1")).await.unwrap();
        store.insert_one("news_events", record("b", "t1")).await.unwrap();
        store.insert_one("news_events", record("c", "t2")).await.unwrap();

        let removed = store
            .delete_many("news_events", &Predicate::by_organization("t1"))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count("news_events", &Predicate::all()).await.unwrap(), 1);
        assert_eq!(store.delete_many("missing", &Predicate::all()).await.unwrap(), 0);
    }
}
