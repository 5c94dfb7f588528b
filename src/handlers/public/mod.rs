// handlers/public/mod.rs - No authentication required

pub mod login;
pub mod status;
pub mod submissions;

pub use login::login;
pub use status::{health, root};
