use serde_json::{Map, Value};

use super::types::{Operation, Predicate, ID_FIELD, LEGACY_ID_FIELD, ORGANIZATION_FIELD};
use crate::authz::Decision;
use crate::tenant::TenantError;

/// Turns an admitted [`Decision`] into store predicates and shaped records.
pub struct ScopeFilterBuilder<'a> {
    decision: &'a Decision,
}

impl<'a> ScopeFilterBuilder<'a> {
    pub fn new(decision: &'a Decision) -> Self {
        Self { decision }
    }

    fn resolved(&self) -> Option<&str> {
        self.decision.resolved_organization_id.as_deref()
    }

    /// Tenant part of every predicate. Empty only for the super-admin bypass.
    fn tenant_scope(&self) -> Result<Predicate, TenantError> {
        match self.resolved() {
            Some(org) => Ok(Predicate::by_organization(org)),
            None if self.decision.is_super_admin_bypass && self.decision.is_super_admin() => Ok(Predicate::all()),
            None => Err(TenantError::MissingTenantContext),
        }
    }

    pub fn predicate(&self, operation: Operation, id: Option<&str>) -> Result<Predicate, TenantError> {
        let scope = self.tenant_scope()?;
        Ok(match (operation, id) {
            (_, Some(id)) => scope.eq(ID_FIELD, id),
            (_, None) => scope,
        })
    }

    pub fn read(&self) -> Result<Predicate, TenantError> {
        self.predicate(Operation::Read, None)
    }

    pub fn find_one(&self, id: &str) -> Result<Predicate, TenantError> {
        self.predicate(Operation::Read, Some(id))
    }

    /// Shapes a new record: client identifiers are dropped and the owning
    /// organization is pinned. Only a super admin may name another one.
    pub fn create(&self, mut record: Map<String, Value>) -> Result<Map<String, Value>, TenantError> {
        record.remove(ID_FIELD);
        record.remove(LEGACY_ID_FIELD);

        let supplied = record
            .remove(ORGANIZATION_FIELD)
            .and_then(|v| v.as_str().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string));

        let owner = if self.decision.is_super_admin() {
            supplied.or_else(|| self.resolved().map(str::to_string))
        } else {
            self.resolved().map(str::to_string)
        };

        let owner = owner.ok_or(TenantError::MissingTenantContext)?;
        record.insert(ORGANIZATION_FIELD.to_string(), Value::String(owner));
        Ok(record)
    }

    /// Compound target predicate plus the patch with identity fields removed.
    pub fn update(&self, id: &str, patch: Map<String, Value>) -> Result<(Predicate, Map<String, Value>), TenantError> {
        let predicate = self.predicate(Operation::Update, Some(id))?;
        Ok((predicate, strip_identity(patch)))
    }

    pub fn delete(&self, id: &str) -> Result<Predicate, TenantError> {
        self.predicate(Operation::Delete, Some(id))
    }
}

/// Drops `organizationId`, `id` and `_id` from a patch.
pub fn strip_identity(mut patch: Map<String, Value>) -> Map<String, Value> {
    patch.remove(ORGANIZATION_FIELD);
    patch.remove(ID_FIELD);
    patch.remove(LEGACY_ID_FIELD);
    patch
}
