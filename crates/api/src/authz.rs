//! API-side authorization guard for queue mutations.
//!
//! Token verification says who the caller is; this says what they may do.
//! Read endpoints accept any verified caller, mutation requires an operator
//! role, and the check runs before anything touches the store.

use axum::http::StatusCode;

use conveyor_auth::is_operator;

use crate::app::errors;
use crate::context::PrincipalContext;

/// Gate for the mutating queue actions (`add`, `bulk_add`, `process`,
/// `clear`). Returns the ready-to-send 403 response on refusal so handlers
/// can `?`-style early-return it.
pub fn require_operator(principal: &PrincipalContext) -> Result<(), axum::response::Response> {
    if is_operator(principal.roles()) {
        Ok(())
    } else {
        Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "operator role required",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_auth::{PrincipalId, Role};

    #[test]
    fn admin_and_service_pass_the_gate() {
        let admin = PrincipalContext::new(PrincipalId::new(), vec![Role::ADMIN]);
        let service = PrincipalContext::new(PrincipalId::new(), vec![Role::SERVICE]);
        assert!(require_operator(&admin).is_ok());
        assert!(require_operator(&service).is_ok());
    }

    #[test]
    fn viewer_is_refused() {
        let viewer = PrincipalContext::new(PrincipalId::new(), vec![Role::new("viewer")]);
        assert!(require_operator(&viewer).is_err());
    }
}
