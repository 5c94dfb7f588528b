// handlers/protected/mod.rs - Bearer token required

pub mod content;
pub mod session;
