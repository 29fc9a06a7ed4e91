pub mod claims;
pub mod error;
pub mod extractors;
pub mod guards;
pub mod jwks;
pub mod roles;
pub mod verifier;

pub use claims::Claims;
pub use error::{AuthError, AuthResult};
pub use extractors::AuthContext;
pub use guards::{ensure_role, GuardError};
pub use jwks::JwksFetcher;
pub use roles::{BIN_WRITE_ROLES, ROLE_ADMIN, ROLE_OFFICER, ROLE_USER};
pub use verifier::{InMemoryKeyStore, JwtConfig, JwtVerifier, JwtVerifierBuilder, VerifierKey, DEFAULT_KID};
