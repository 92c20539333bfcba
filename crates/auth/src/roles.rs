use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier carried in token claims.
///
/// Roles are intentionally opaque strings at this layer; the queue only
/// distinguishes "may drive the queue" from "may merely look at it".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Full control, including queue mutation.
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));

    /// Machine credential used by the cron trigger and sibling services.
    pub const SERVICE: Role = Role(Cow::Borrowed("service"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether this role set may enqueue jobs, trigger processing, or sweep.
///
/// Read-only endpoints accept any verified caller; mutation is reserved for
/// admin sessions and service credentials.
pub fn is_operator(roles: &[Role]) -> bool {
    roles.iter().any(|r| *r == Role::ADMIN || *r == Role::SERVICE)
}
