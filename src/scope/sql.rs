use serde_json::Value;

use super::error::ScopeError;
use super::types::{Predicate, ID_FIELD, ORGANIZATION_FIELD};

/// Renders a [`Predicate`] as a parameterised WHERE clause over the
/// `records` table, where `id` and `organization_id` are real columns and
/// every other field lives in the `data` JSONB document.
pub struct PredicateSql {
    param_values: Vec<String>,
    param_index: usize,
}

impl PredicateSql {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Returns the clause and the text parameters in bind order.
    pub fn generate(predicate: &Predicate, starting_param_index: usize) -> Result<(String, Vec<String>), ScopeError> {
        let mut sql = Self::new(starting_param_index);
        sql.build(predicate)
    }

    fn build(&mut self, predicate: &Predicate) -> Result<(String, Vec<String>), ScopeError> {
        let mut conditions = vec![];
        for (field, value) in predicate.conditions() {
            conditions.push(self.build_condition(field, value)?);
        }
        let where_clause = if conditions.is_empty() { "1=1".to_string() } else { conditions.join(" AND ") };
        Ok((where_clause, std::mem::take(&mut self.param_values)))
    }

    fn build_condition(&mut self, field: &str, value: &Value) -> Result<String, ScopeError> {
        Self::validate_field(field)?;

        match field {
            ID_FIELD => Ok(format!("\"id\" = {}", self.param(Self::as_text(value)))),
            ORGANIZATION_FIELD => Ok(format!("\"organization_id\" = {}", self.param(Self::as_text(value)))),
            _ => Ok(format!("\"data\"->'{}' = {}::jsonb", field, self.param(value.to_string()))),
        }
    }

    fn as_text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn validate_field(field: &str) -> Result<(), ScopeError> {
        if field.is_empty() || field.len() > 64 {
            return Err(ScopeError::InvalidField(field.to_string()));
        }
        if !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ScopeError::InvalidField(field.to_string()));
        }
        Ok(())
    }

    fn param(&mut self, value: String) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrestricted_predicate() {
        let (sql, params) = PredicateSql::generate(&Predicate::all(), 1).unwrap();
        assert_eq!(sql, "1=1");
        assert!(params.is_empty());
    }

    #[test]
    fn test_compound_predicate_uses_columns() {
        let p = Predicate::by_id("r1").eq(ORGANIZATION_FIELD, "t1");
        let (sql, params) = PredicateSql::generate(&p, 1).unwrap();
        assert_eq!(sql, "\"id\" = $2 AND \"organization_id\" = $3");
        assert_eq!(params, vec!["r1".to_string(), "t1".to_string()]);
    }

    #[test]
    fn test_document_fields_compare_as_jsonb() {
        let p = Predicate::all().eq("status", "pending");
        let (sql, params) = PredicateSql::generate(&p, 0).unwrap();
        assert_eq!(sql, "\"data\"->'status' = $1::jsonb");
        assert_eq!(params, vec!["\"pending\"".to_string()]);
    }

    #[test]
    fn test_injection_in_field_name_rejected() {
        let p = Predicate::all().eq("x' OR '1'='1", "y");
        assert!(matches!(PredicateSql::generate(&p, 0), Err(ScopeError::InvalidField(_))));
    }
}
