pub mod builder;
pub mod error;
pub mod sql;
pub mod types;

pub use builder::{strip_identity, ScopeFilterBuilder};
pub use error::{RecordError, ScopeError};
pub use sql::PredicateSql;
pub use types::{Operation, Predicate, ID_FIELD, LEGACY_ID_FIELD, ORGANIZATION_FIELD};
