use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Closed set of operator roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    SchoolAdmin,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::SchoolAdmin => "school_admin",
            Role::Staff => "staff",
        }
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }

    /// Permission set a freshly created user of this role receives.
    pub fn default_permissions(&self) -> BTreeSet<Permission> {
        ROLE_PERMISSIONS
            .iter()
            .find(|(role, _)| role == self)
            .map(|(_, perms)| perms.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "school_admin" => Ok(Role::SchoolAdmin),
            "staff" => Ok(Role::Staff),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    // Platform
    ManageOrganizations,
    ManageAllUsers,
    ViewAnalytics,
    ManageSubscriptions,
    SystemConfig,

    // Tenant
    ManageStudents,
    ViewStudents,
    ManageContent,
    ManageSchoolUsers,
    ManageAdmissions,
    ViewSchoolAnalytics,
    ManageSettings,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageOrganizations => "manage_organizations",
            Permission::ManageAllUsers => "manage_all_users",
            Permission::ViewAnalytics => "view_analytics",
            Permission::ManageSubscriptions => "manage_subscriptions",
            Permission::SystemConfig => "system_config",
            Permission::ManageStudents => "manage_students",
            Permission::ViewStudents => "view_students",
            Permission::ManageContent => "manage_content",
            Permission::ManageSchoolUsers => "manage_school_users",
            Permission::ManageAdmissions => "manage_admissions",
            Permission::ViewSchoolAnalytics => "view_school_analytics",
            Permission::ManageSettings => "manage_settings",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role -> default permission table. Adding a role is a data change here.
const ROLE_PERMISSIONS: &[(Role, &[Permission])] = &[
    (
        Role::SuperAdmin,
        &[
            Permission::ManageOrganizations,
            Permission::ManageAllUsers,
            Permission::ViewAnalytics,
            Permission::ManageSubscriptions,
            Permission::SystemConfig,
        ],
    ),
    (
        Role::SchoolAdmin,
        &[
            Permission::ManageStudents,
            Permission::ManageContent,
            Permission::ManageSchoolUsers,
            Permission::ManageAdmissions,
            Permission::ViewSchoolAnalytics,
            Permission::ManageSettings,
        ],
    ),
    (
        Role::Staff,
        &[
            Permission::ViewStudents,
            Permission::ManageContent,
            Permission::ViewAnalytics,
        ],
    ),
];

/// The authenticated actor, rebuilt from verified token claims on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub subject_id: String,
    pub email: String,
    pub role: Role,
    pub organization_id: Option<String>,
    pub permissions: BTreeSet<Permission>,
}

impl Principal {
    pub fn is_super_admin(&self) -> bool {
        self.role.is_super_admin()
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Role/tenant consistency: only super admins float free of an organization.
    pub fn is_well_formed(&self) -> bool {
        match (self.role, self.organization_id.as_deref()) {
            (Role::SuperAdmin, None) => true,
            (Role::SuperAdmin, Some(_)) => false,
            (_, Some(org)) => !org.trim().is_empty(),
            (_, None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_permission_table() {
        let admin = Role::SchoolAdmin.default_permissions();
        assert!(admin.contains(&Permission::ManageStudents));
        assert!(admin.contains(&Permission::ManageSettings));
        assert!(!admin.contains(&Permission::ManageOrganizations));

        let staff = Role::Staff.default_permissions();
        assert_eq!(staff.len(), 3);
        assert!(staff.contains(&Permission::ViewStudents));
        assert!(!staff.contains(&Permission::ManageStudents));

        let root = Role::SuperAdmin.default_permissions();
        assert!(root.contains(&Permission::ManageOrganizations));
        assert!(root.contains(&Permission::ManageAllUsers));
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_value(Role::SchoolAdmin).unwrap(), "school_admin");
        assert_eq!("super_admin".parse::<Role>(), Ok(Role::SuperAdmin));
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_principal_shape() {
        let mut p = Principal {
            subject_id: "u1".into(),
            email: "a@b.c".into(),
            role: Role::Staff,
            organization_id: Some("my_tenant".into()),
            permissions: Role::Staff.default_permissions(),
        };
        assert!(p.is_well_formed());

        p.organization_id = None;
        assert!(!p.is_well_formed());

        p.role = Role::SuperAdmin;
        assert!(p.is_well_formed());
    }
}
