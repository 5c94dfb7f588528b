pub mod organization_registry;
pub mod user_service;

pub use organization_registry::{OrgError, OrganizationRegistry};
pub use user_service::{UserError, UserPage, UserService};
