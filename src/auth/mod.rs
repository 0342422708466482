//! Password hashing and access tokens.

mod jwt;
mod password;

pub use jwt::{Claims, TokenManager};
pub use password::{hash_password, verify_password};
