use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::database::models::collection::collection_names;
use crate::database::models::organization::{default_expiry, generate_organization_id};
use crate::database::models::{
    Feature, NewOrganization, Organization, OrganizationUpdate, Plan, PlanStats, Subscription, SubscriptionStatus,
    SubscriptionUpdate,
};
use crate::database::{CascadeReport, ContentStore, OrganizationStore, StoreError, UserStore};
use crate::scope::Predicate;

#[derive(Debug, Error)]
pub enum OrgError {
    #[error("Organization not found: {0}")]
    NotFound(String),

    #[error("Organization is inactive or its subscription has expired: {0}")]
    Inactive(String),

    #[error("Organization already exists: {0}")]
    AlreadyExists(String),

    #[error("Domain already in use: {0}")]
    DomainTaken(String),

    #[error("Invalid organization: {0}")]
    Invalid(String),

    #[error("Organization storage failure: {0}")]
    Storage(String),
}

impl From<StoreError> for OrgError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => OrgError::AlreadyExists(msg),
            StoreError::Backend(msg) => OrgError::Storage(msg),
        }
    }
}

/// Tenant lookups, subscription checks and tenant lifecycle.
///
/// Reads go to the store on every call. Status and expiry are never cached.
#[derive(Clone)]
pub struct OrganizationRegistry {
    organizations: Arc<dyn OrganizationStore>,
    users: Arc<dyn UserStore>,
    content: Arc<dyn ContentStore>,
}

impl OrganizationRegistry {
    pub const MAX_NAME_LENGTH: usize = 100;

    pub fn new(
        organizations: Arc<dyn OrganizationStore>,
        users: Arc<dyn UserStore>,
        content: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            organizations,
            users,
            content,
        }
    }

    pub async fn find_by_id(&self, organization_id: &str) -> Result<Organization, OrgError> {
        self.load(organization_id)
            .await?
            .ok_or_else(|| OrgError::NotFound(organization_id.to_string()))
    }

    pub async fn load(&self, organization_id: &str) -> Result<Option<Organization>, OrgError> {
        Ok(self.organizations.get(organization_id).await?)
    }

    pub fn is_usable(organization: &Organization, now: DateTime<Utc>) -> bool {
        organization.is_usable(now)
    }

    pub fn has_feature(organization: &Organization, feature: Feature) -> bool {
        organization.has_feature(feature)
    }

    /// An existing but unusable organization is `Inactive`, never `NotFound`.
    pub fn check_usable(organization: &Organization, now: DateTime<Utc>) -> Result<(), OrgError> {
        if Self::is_usable(organization, now) {
            Ok(())
        } else {
            Err(OrgError::Inactive(organization.organization_id.clone()))
        }
    }

    pub async fn create(&self, request: NewOrganization) -> Result<Organization, OrgError> {
        let name = Self::validate_name(&request.name)?;
        let domain = Self::normalize_domain(request.domain.as_deref());
        if let Some(domain) = domain.as_deref() {
            self.ensure_domain_free(domain, None).await?;
        }

        let now = Utc::now();
        let organization_id = generate_organization_id(&name, now);
        if organization_id.starts_with('_') {
            return Err(OrgError::Invalid("name must contain letters or digits".to_string()));
        }
        if self.organizations.get(&organization_id).await?.is_some() {
            return Err(OrgError::AlreadyExists(organization_id));
        }

        let organization = Organization {
            organization_id,
            name,
            domain,
            settings: request.settings.unwrap_or_default(),
            subscription: Subscription::for_plan(
                request.plan.unwrap_or_default(),
                SubscriptionStatus::Active,
                request.expires_at.unwrap_or_else(|| default_expiry(now)),
            ),
            created_at: now,
            updated_at: now,
        };

        self.organizations.insert(&organization).await?;
        info!(
            "Created organization '{}' on plan {}",
            organization.organization_id,
            organization.subscription.plan.as_str()
        );
        Ok(organization)
    }

    /// Changes name, domain and settings only.
    pub async fn update(&self, organization_id: &str, changes: OrganizationUpdate) -> Result<Organization, OrgError> {
        let mut organization = self.find_by_id(organization_id).await?;

        if let Some(name) = changes.name {
            organization.name = Self::validate_name(&name)?;
        }
        if let Some(domain) = changes.domain {
            let domain = Self::normalize_domain(Some(&domain));
            if let Some(domain) = domain.as_deref() {
                self.ensure_domain_free(domain, Some(organization_id)).await?;
            }
            organization.domain = domain;
        }
        if let Some(settings) = changes.settings {
            organization.settings = settings;
        }
        organization.updated_at = Utc::now();

        if !self.organizations.replace(&organization).await? {
            return Err(OrgError::NotFound(organization_id.to_string()));
        }
        info!("Updated organization '{}'", organization_id);
        Ok(organization)
    }

    pub async fn update_subscription(
        &self,
        organization_id: &str,
        changes: SubscriptionUpdate,
    ) -> Result<Organization, OrgError> {
        let mut organization = self.find_by_id(organization_id).await?;
        let now = Utc::now();

        organization.subscription = changes.into_subscription(now);
        organization.updated_at = now;

        if !self.organizations.replace(&organization).await? {
            return Err(OrgError::NotFound(organization_id.to_string()));
        }
        info!(
            "Subscription for '{}' set to {} ({})",
            organization_id,
            organization.subscription.plan.as_str(),
            organization.subscription.status.as_str()
        );
        Ok(organization)
    }

    /// Removes the organization's users, then its rows in every content
    /// collection, then the organization itself. The organization row stays
    /// when any earlier step fails.
    pub async fn delete(&self, organization_id: &str) -> Result<CascadeReport, OrgError> {
        self.find_by_id(organization_id).await?;

        let collections: Vec<&str> = collection_names().collect();
        if let Some(report) = self.organizations.remove_cascade(organization_id, &collections).await? {
            info!(
                "Deleted organization '{}' ({} users, {} records)",
                organization_id, report.users, report.records
            );
            return Ok(report);
        }

        let mut report = CascadeReport::default();
        report.users = self.users.delete_by_organization(organization_id).await.map_err(|e| {
            error!("Cascade delete of users for '{}' failed: {}", organization_id, e);
            OrgError::from(e)
        })?;

        let scope = Predicate::by_organization(organization_id);
        for collection in collections {
            report.records += self.content.delete_many(collection, &scope).await.map_err(|e| {
                error!(
                    "Cascade delete of '{}' for '{}' failed: {}",
                    collection, organization_id, e
                );
                OrgError::from(e)
            })?;
        }

        if !self.organizations.remove(organization_id).await? {
            warn!("Organization '{}' vanished during cascade delete", organization_id);
        }
        info!(
            "Deleted organization '{}' ({} users, {} records)",
            organization_id, report.users, report.records
        );
        Ok(report)
    }

    pub async fn list(&self) -> Result<Vec<Organization>, OrgError> {
        Ok(self.organizations.list().await?)
    }

    /// Count and active count per plan, every plan listed.
    pub async fn stats(&self, now: DateTime<Utc>) -> Result<Vec<PlanStats>, OrgError> {
        let organizations = self.list().await?;
        Ok(Plan::ALL
            .iter()
            .map(|plan| {
                let on_plan = organizations.iter().filter(|o| o.subscription.plan == *plan);
                let (count, active) = on_plan.fold((0, 0), |(count, active), o| {
                    (count + 1, active + usize::from(o.is_usable(now)))
                });
                PlanStats {
                    plan: *plan,
                    count,
                    active,
                }
            })
            .collect())
    }

    pub async fn expired_count(&self, now: DateTime<Utc>) -> Result<usize, OrgError> {
        let organizations = self.list().await?;
        Ok(organizations
            .iter()
            .filter(|o| o.subscription.expires_at < now)
            .count())
    }

    fn validate_name(name: &str) -> Result<String, OrgError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OrgError::Invalid("name is required".to_string()));
        }
        if name.chars().count() > Self::MAX_NAME_LENGTH {
            return Err(OrgError::Invalid(format!(
                "name must be at most {} characters",
                Self::MAX_NAME_LENGTH
            )));
        }
        Ok(name.to_string())
    }

    fn normalize_domain(domain: Option<&str>) -> Option<String> {
        domain
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
    }

    async fn ensure_domain_free(&self, domain: &str, owner: Option<&str>) -> Result<(), OrgError> {
        match self.organizations.find_by_domain(domain).await? {
            Some(existing) if Some(existing.organization_id.as_str()) != owner => {
                Err(OrgError::DomainTaken(domain.to_string()))
            }
            _ => Ok(()),
        }
    }
}
