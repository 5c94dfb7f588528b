use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Basic,
    Premium,
    Enterprise,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Basic, Plan::Premium, Plan::Enterprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Basic => "basic",
            Plan::Premium => "premium",
            Plan::Enterprise => "enterprise",
        }
    }

    pub fn features(&self) -> BTreeSet<Feature> {
        features_for_plan(*self)
    }
}

impl Default for Plan {
    fn default() -> Self {
        Plan::Basic
    }
}

impl std::str::FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Plan::Basic),
            "premium" => Ok(Plan::Premium),
            "enterprise" => Ok(Plan::Enterprise),
            other => Err(format!("unknown plan '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Suspended,
    Inactive,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Suspended => "suspended",
            SubscriptionStatus::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "suspended" => Ok(SubscriptionStatus::Suspended),
            "inactive" => Ok(SubscriptionStatus::Inactive),
            other => Err(format!("unknown subscription status '{}'", other)),
        }
    }
}

/// Capability entitlement derived from a subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Students,
    Contacts,
    BasicGallery,
    Gallery,
    Events,
    News,
    Faculty,
    Admissions,
    CustomDomain,
    ApiAccess,
    AdvancedAnalytics,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Students => "students",
            Feature::Contacts => "contacts",
            Feature::BasicGallery => "basic_gallery",
            Feature::Gallery => "gallery",
            Feature::Events => "events",
            Feature::News => "news",
            Feature::Faculty => "faculty",
            Feature::Admissions => "admissions",
            Feature::CustomDomain => "custom_domain",
            Feature::ApiAccess => "api_access",
            Feature::AdvancedAnalytics => "advanced_analytics",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const BASIC_FEATURES: &[Feature] = &[Feature::Students, Feature::Contacts, Feature::BasicGallery];

const PREMIUM_FEATURES: &[Feature] = &[
    Feature::Students,
    Feature::Contacts,
    Feature::Gallery,
    Feature::Events,
    Feature::News,
    Feature::Faculty,
    Feature::Admissions,
];

const ENTERPRISE_FEATURES: &[Feature] = &[
    Feature::Students,
    Feature::Contacts,
    Feature::Gallery,
    Feature::Events,
    Feature::News,
    Feature::Faculty,
    Feature::Admissions,
    Feature::CustomDomain,
    Feature::ApiAccess,
    Feature::AdvancedAnalytics,
];

pub fn features_for_plan(plan: Plan) -> BTreeSet<Feature> {
    let table = match plan {
        Plan::Basic => BASIC_FEATURES,
        Plan::Premium => PREMIUM_FEATURES,
        Plan::Enterprise => ENTERPRISE_FEATURES,
    };
    table.iter().copied().collect()
}

/// Default subscription term for new organizations and subscription resets.
pub fn default_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(365)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub expires_at: DateTime<Utc>,
    pub features: BTreeSet<Feature>,
}

impl Subscription {
    /// The only way to build a subscription: features always follow the plan.
    pub fn for_plan(plan: Plan, status: SubscriptionStatus, expires_at: DateTime<Utc>) -> Self {
        Self {
            plan,
            status,
            expires_at,
            features: features_for_plan(plan),
        }
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && now <= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSettings {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default = "empty_object")]
    pub contact: Value,
    #[serde(default = "empty_object")]
    pub address: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_theme() -> String {
    "blue".to_string()
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Default for OrganizationSettings {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            logo: None,
            contact: empty_object(),
            address: empty_object(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub organization_id: String,
    pub name: String,
    pub domain: Option<String>,
    pub settings: OrganizationSettings,
    pub subscription: Subscription,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.subscription.is_usable(now)
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.subscription.features.contains(&feature)
    }
}

/// Create payload. Unknown keys (including any client `features`) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrganization {
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub settings: Option<OrganizationSettings>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Mutable organization fields. Identity and subscription are not part of it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationUpdate {
    #[serde(default)]
    pub name: Option<String>,
    /// `Some("")` clears the domain.
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub settings: Option<OrganizationSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUpdate {
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub status: Option<SubscriptionStatus>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SubscriptionUpdate {
    pub fn into_subscription(self, now: DateTime<Utc>) -> Subscription {
        Subscription::for_plan(
            self.plan.unwrap_or_default(),
            self.status.unwrap_or(SubscriptionStatus::Active),
            self.expires_at.unwrap_or_else(|| default_expiry(now)),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStats {
    pub plan: Plan,
    pub count: usize,
    pub active: usize,
}

/// URL-safe organization id: slugged name plus a six digit time suffix.
pub fn generate_organization_id(name: &str, now: DateTime<Utc>) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();
    let slug: String = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .take(50)
        .collect();

    let millis = now.timestamp_millis().rem_euclid(1_000_000);
    format!("{}_{:06}", slug, millis)
}
