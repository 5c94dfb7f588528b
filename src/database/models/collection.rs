use crate::auth::Permission;
use crate::database::models::organization::Feature;

/// A tenant-scoped content collection and the gates on its routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    /// Storage name.
    pub name: &'static str,
    /// Segment under `/api/` and `/api/org/:org_id/`.
    pub route_prefix: &'static str,
    pub feature: Option<Feature>,
    pub write_permission: Permission,
}

pub const STUDENTS: Collection = Collection {
    name: "students",
    route_prefix: "students",
    feature: Some(Feature::Students),
    write_permission: Permission::ManageStudents,
};

pub const CONTACTS: Collection = Collection {
    name: "contacts",
    route_prefix: "contacts",
    feature: Some(Feature::Contacts),
    write_permission: Permission::ManageContent,
};

pub const COLLECTIONS: &[Collection] = &[
    STUDENTS,
    Collection {
        name: "programs",
        route_prefix: "programs",
        feature: None,
        write_permission: Permission::ManageContent,
    },
    CONTACTS,
    Collection {
        name: "news_events",
        route_prefix: "newsEvents",
        feature: Some(Feature::Events),
        write_permission: Permission::ManageContent,
    },
    Collection {
        name: "testimonials",
        route_prefix: "testimonials",
        feature: None,
        write_permission: Permission::ManageContent,
    },
    Collection {
        name: "faculty",
        route_prefix: "faculty",
        feature: Some(Feature::Faculty),
        write_permission: Permission::ManageContent,
    },
    Collection {
        name: "quick_links",
        route_prefix: "quickLinks",
        feature: None,
        write_permission: Permission::ManageContent,
    },
    Collection {
        name: "gallery",
        route_prefix: "gallery",
        feature: None,
        write_permission: Permission::ManageContent,
    },
];

pub fn collection_names() -> impl Iterator<Item = &'static str> {
    COLLECTIONS.iter().map(|c| c.name)
}

pub fn by_name(name: &str) -> Option<&'static Collection> {
    COLLECTIONS.iter().find(|c| c.name == name)
}
