//! Token verification and principal types for the incident API.
//!
//! This crate provides JWT-based authentication utilities and the role
//! hierarchy consumed by the guard's policy engine.

mod claims;
mod jwt;

pub use claims::{Claims, Principal, Role, PERMISSION_CATALOG};
pub use jwt::{decode_token, encode_token, JwtConfig};
