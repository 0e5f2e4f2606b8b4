//! Strata Authentication
//!
//! This crate provides:
//! - Credential lookup against a static user list
//! - Bearer token issuance and verification (HS256 JWT)

pub mod error;
pub mod token;
pub mod user;

// Re-export core types
pub use error::AuthError;
pub use token::{Claims, JwtTokens, TokenVerifier};
pub use user::{MemUserDriver, UserDriver};
