//! API access for the shell
//!
//! Requests go through [`ApiClient`], which unwraps the standard response
//! envelope and attaches the stored bearer token for `auth_*` calls. A
//! response carrying code 403 broadcasts [`LOGIN_INVALID`] on the event bus.

pub mod client;
pub mod errors;
pub mod token;

pub use client::{ApiClient, RequestOptions, StandardResponse, JWT_KEY};
pub use errors::{NetworkError, NetworkResult};
pub use token::{decode_claims, JwtClaims};

/// Bus event raised when the server reports an invalid login
pub const LOGIN_INVALID: &str = "loginInvalid";
