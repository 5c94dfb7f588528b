pub mod credentials;
pub mod principal;
pub mod token;

pub use credentials::{hash_password, verify_password, CredentialError, CredentialStore};
pub use principal::{Permission, Principal, Role};
pub use token::{bearer_token, Claims, RevocationCheck, RevocationList, TokenCodec, TokenError};
