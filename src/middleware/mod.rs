pub mod auth;
pub mod response;

pub use auth::{authorize, RouteGuard};
pub use response::{ApiResponse, ApiResult};
