pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_OFFICER: &str = "officer";
/// Fallback for tokens that carry no application role.
pub const ROLE_USER: &str = "user";

/// Roles allowed to create or modify bin records.
pub const BIN_WRITE_ROLES: &[&str] = &[ROLE_OFFICER, ROLE_ADMIN];
