// handlers/elevated/mod.rs - Super admin surface
//
// Guarded by ManageOrganizations or ManageAllUsers. Only the super admin
// role carries either permission.

pub mod dashboard;
pub mod organizations;
pub mod users;
