use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::auth::{hash_password, CredentialError, Role};
use crate::database::models::user::role_stats;
use crate::database::models::{NewUser, RoleStats, User, UserProfile, UserQuery, UserUpdate};
use crate::database::{OrganizationStore, StoreError, UserStore};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Email or username already exists")]
    AlreadyExists,

    #[error("Invalid user: {0}")]
    Invalid(String),

    #[error("User storage failure: {0}")]
    Storage(String),
}

impl From<StoreError> for UserError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => UserError::AlreadyExists,
            StoreError::Backend(msg) => UserError::Storage(msg),
        }
    }
}

impl From<CredentialError> for UserError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Store(e) => e.into(),
            CredentialError::Hashing(msg) => UserError::Storage(msg),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

/// Operator account management for the super-admin surface.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    organizations: Arc<dyn OrganizationStore>,
}

impl UserService {
    pub const MIN_PASSWORD_LENGTH: usize = 6;

    pub fn new(users: Arc<dyn UserStore>, organizations: Arc<dyn OrganizationStore>) -> Self {
        Self { users, organizations }
    }

    pub async fn create(&self, request: NewUser) -> Result<User, UserError> {
        let email = Self::validate_email(&request.email)?;
        Self::validate_password(&request.password)?;

        let role = request.role.unwrap_or(Role::Staff);
        let organization_id = self.check_binding(role, request.organization_id.as_deref()).await?;

        let username = request
            .username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| email.clone());

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash: hash_password(&request.password)?,
            role,
            organization_id,
            permissions: request.permissions.unwrap_or_else(|| role.default_permissions()),
            profile: UserProfile {
                name: request.name.unwrap_or_default(),
                phone: request.phone.unwrap_or_default(),
                avatar: request.avatar,
            },
            is_active: request.is_active.unwrap_or(true),
            last_login: None,
            created_at: now,
            updated_at: now,
        };

        self.users.insert(&user).await?;
        info!("Created {} user {}", user.role, user.id);
        Ok(user)
    }

    pub async fn get(&self, id: Uuid) -> Result<User, UserError> {
        self.users
            .get(id)
            .await?
            .ok_or_else(|| UserError::NotFound(id.to_string()))
    }

    pub async fn list(&self, query: &UserQuery) -> Result<UserPage, UserError> {
        let matching: Vec<User> = self
            .users
            .list()
            .await?
            .into_iter()
            .filter(|u| query.matches(u))
            .collect();

        let total = matching.len();
        let users = matching
            .into_iter()
            .skip(query.offset())
            .take(query.limit())
            .collect();

        Ok(UserPage {
            users,
            total,
            page: query.page(),
            limit: query.limit(),
        })
    }

    pub async fn update(&self, id: Uuid, changes: UserUpdate) -> Result<User, UserError> {
        let mut user = self.get(id).await?;

        if let Some(username) = changes.username {
            let username = username.trim().to_string();
            if username.is_empty() {
                return Err(UserError::Invalid("username cannot be empty".to_string()));
            }
            user.username = username;
        }
        if let Some(email) = changes.email {
            user.email = Self::validate_email(&email)?;
        }
        if let Some(password) = changes.password {
            Self::validate_password(&password)?;
            user.password_hash = hash_password(&password)?;
        }

        let role_changed = changes.role.map_or(false, |r| r != user.role);
        if let Some(role) = changes.role {
            user.role = role;
        }
        if changes.organization_id.is_some() || role_changed {
            let requested = match changes.organization_id.as_deref() {
                Some(org) => Some(org.to_string()),
                None if user.role.is_super_admin() => None,
                None => user.organization_id.clone(),
            };
            user.organization_id = self.check_binding(user.role, requested.as_deref()).await?;
        }

        match changes.permissions {
            Some(permissions) => user.permissions = permissions,
            None if role_changed => user.permissions = user.role.default_permissions(),
            None => {}
        }
        if let Some(profile) = changes.profile {
            user.profile = profile;
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        user.updated_at = Utc::now();

        if !self.users.replace(&user).await? {
            return Err(UserError::NotFound(id.to_string()));
        }
        info!("Updated user {}", id);
        Ok(user)
    }

    pub async fn toggle_status(&self, id: Uuid) -> Result<User, UserError> {
        let mut user = self.get(id).await?;
        user.is_active = !user.is_active;
        user.updated_at = Utc::now();
        if !self.users.replace(&user).await? {
            return Err(UserError::NotFound(id.to_string()));
        }
        info!("User {} is now {}", id, if user.is_active { "active" } else { "inactive" });
        Ok(user)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), UserError> {
        if !self.users.remove(id).await? {
            return Err(UserError::NotFound(id.to_string()));
        }
        info!("Deleted user {}", id);
        Ok(())
    }

    pub async fn stats(&self) -> Result<Vec<RoleStats>, UserError> {
        let users = self.users.list().await?;
        Ok(role_stats(&users))
    }

    /// Most recently created accounts first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<User>, UserError> {
        let mut users = self.users.list().await?;
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        users.truncate(limit);
        Ok(users)
    }

    /// Super admins float free; every other role belongs to an existing organization.
    async fn check_binding(&self, role: Role, organization_id: Option<&str>) -> Result<Option<String>, UserError> {
        let organization_id = organization_id.map(str::trim).filter(|o| !o.is_empty());
        match (role, organization_id) {
            (Role::SuperAdmin, None) => Ok(None),
            (Role::SuperAdmin, Some(_)) => Err(UserError::Invalid(
                "super_admin users cannot belong to an organization".to_string(),
            )),
            (_, None) => Err(UserError::Invalid(format!("{} users require an organizationId", role))),
            (_, Some(org)) => {
                if self.organizations.get(org).await?.is_none() {
                    return Err(UserError::Invalid(format!("organization '{}' does not exist", org)));
                }
                Ok(Some(org.to_string()))
            }
        }
    }

    fn validate_email(email: &str) -> Result<String, UserError> {
        let email = email.trim().to_ascii_lowercase();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
            _ => Err(UserError::Invalid("a valid email is required".to_string())),
        }
    }

    fn validate_password(password: &str) -> Result<(), UserError> {
        if password.chars().count() < Self::MIN_PASSWORD_LENGTH {
            return Err(UserError::Invalid(format!(
                "password must be at least {} characters",
                Self::MIN_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewOrganization;
    use crate::database::MemoryStore;
    use crate::services::OrganizationRegistry;

    async fn setup() -> (UserService, String) {
        let store = Arc::new(MemoryStore::new());
        let registry = OrganizationRegistry::new(store.clone(), store.clone(), store.clone());
        let org = registry
            .create(NewOrganization {
                name: "Holy Cross".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        (UserService::new(store.clone(), store), org.organization_id)
    }

    fn new_user(email: &str, role: Option<Role>, org: Option<&str>) -> NewUser {
        NewUser {
            username: None,
            email: email.into(),
            password: "changeme".into(),
            role,
            organization_id: org.map(str::to_string),
            permissions: None,
            name: Some("Pat".into()),
            phone: None,
            avatar: None,
            is_active: None,
        }
    }

    #[tokio::test]
    async fn test_create_defaults_from_role() {
        let (service, org) = setup().await;
        let user = service
            .create(new_user("Admin@HolyCross.edu", Some(Role::SchoolAdmin), Some(&org)))
            .await
            .unwrap();
        assert_eq!(user.email, "admin@holycross.edu");
        assert_eq!(user.username, "admin@holycross.edu");
        assert_eq!(user.permissions, Role::SchoolAdmin.default_permissions());
        assert!(user.is_active);
        assert_ne!(user.password_hash, "changeme");
    }

    #[tokio::test]
    async fn test_role_organization_binding() {
        let (service, org) = setup().await;
        assert!(matches!(
            service.create(new_user("a@x.io", Some(Role::Staff), None)).await,
            Err(UserError::Invalid(_))
        ));
        assert!(matches!(
            service.create(new_user("b@x.io", Some(Role::SuperAdmin), Some(&org))).await,
            Err(UserError::Invalid(_))
        ));
        assert!(matches!(
            service.create(new_user("c@x.io", Some(Role::Staff), Some("ghost_000000"))).await,
            Err(UserError::Invalid(_))
        ));
        let root = service.create(new_user("root@x.io", Some(Role::SuperAdmin), None)).await.unwrap();
        assert_eq!(root.organization_id, None);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let (service, org) = setup().await;
        service.create(new_user("dup@x.io", None, Some(&org))).await.unwrap();
        assert!(matches!(
            service.create(new_user("dup@x.io", None, Some(&org))).await,
            Err(UserError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_toggle_and_list() {
        let (service, org) = setup().await;
        let user = service.create(new_user("t@x.io", None, Some(&org))).await.unwrap();
        service.create(new_user("root@x.io", Some(Role::SuperAdmin), None)).await.unwrap();

        let toggled = service.toggle_status(user.id).await.unwrap();
        assert!(!toggled.is_active);

        let page = service
            .list(&UserQuery {
                organization_id: Some(org.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.users[0].id, user.id);

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.len(), 2);
    }

    #[tokio::test]
    async fn test_promoting_to_super_admin_drops_organization() {
        let (service, org) = setup().await;
        let user = service.create(new_user("p@x.io", None, Some(&org))).await.unwrap();
        let promoted = service
            .update(
                user.id,
                UserUpdate {
                    role: Some(Role::SuperAdmin),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(promoted.organization_id, None);
        assert_eq!(promoted.permissions, Role::SuperAdmin.default_permissions());
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (service, _) = setup().await;
        assert!(matches!(service.delete(Uuid::new_v4()).await, Err(UserError::NotFound(_))));
    }
}
