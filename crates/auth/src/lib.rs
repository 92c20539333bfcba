//! `conveyor-auth` — authentication boundary for the queue API.
//!
//! The queue itself trusts its caller; this crate is where that trust is
//! established. Claims and their validation are transport-agnostic; HS256
//! decoding lives behind the [`JwtValidator`] seam.

pub mod claims;
pub mod jwt;
pub mod principal;
pub mod roles;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator, TokenError};
pub use principal::PrincipalId;
pub use roles::{Role, is_operator};
