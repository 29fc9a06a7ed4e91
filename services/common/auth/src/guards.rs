use tracing::warn;

use crate::AuthContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    Forbidden { role: String, required: Vec<String> },
}

impl GuardError {
    pub fn required(&self) -> &[String] {
        match self {
            GuardError::Forbidden { required, .. } => required,
        }
    }
}

pub fn ensure_role(auth: &AuthContext, allowed: &[&str]) -> Result<(), GuardError> {
    if allowed.is_empty() || allowed.iter().any(|required| auth.has_role(required)) {
        return Ok(());
    }

    warn!(caller = %auth.caller_id(), role = %auth.role(), ?allowed, "role_check_failed");
    Err(GuardError::Forbidden {
        role: auth.role().to_string(),
        required: allowed.iter().map(|value| value.to_string()).collect(),
    })
}
