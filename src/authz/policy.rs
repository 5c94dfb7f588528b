use crate::auth::Permission;
use crate::database::models::{Collection, Feature};
use crate::scope::Operation;

/// Static authorization requirements attached to a route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePolicy {
    pub protected: bool,
    pub requires_super_admin: bool,
    pub requires_org_validity: bool,
    pub permission: Option<Permission>,
    pub feature: Option<Feature>,
}

impl RoutePolicy {
    /// Anonymous callers allowed. A presented token is still verified.
    pub fn public() -> Self {
        Self::default()
    }

    pub fn protected() -> Self {
        Self {
            protected: true,
            ..Self::default()
        }
    }

    /// Platform surface: the caller's role must be `super_admin`, whatever
    /// permission tags the token carries.
    pub fn super_admin_only() -> Self {
        Self {
            requires_super_admin: true,
            ..Self::protected()
        }
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = Some(permission);
        self
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.feature = Some(feature);
        self
    }

    pub fn requiring_valid_organization(mut self) -> Self {
        self.requires_org_validity = true;
        self
    }

    /// Collection routes: reads carry no permission tag, writes need the
    /// collection's write permission. All are validity and feature gated.
    pub fn for_collection(collection: &Collection, operation: Operation) -> Self {
        Self {
            protected: true,
            requires_super_admin: false,
            requires_org_validity: true,
            permission: match operation {
                Operation::Read => None,
                _ => Some(collection.write_permission),
            },
            feature: collection.feature,
        }
    }
}
