pub mod collection;
pub mod organization;
pub mod user;

pub use collection::{Collection, COLLECTIONS};
pub use organization::{
    Feature, NewOrganization, Organization, OrganizationSettings, OrganizationUpdate, Plan, PlanStats,
    Subscription, SubscriptionStatus, SubscriptionUpdate,
};
pub use user::{NewUser, RoleStats, User, UserProfile, UserQuery, UserUpdate};
