pub mod jwt;
pub mod password;

pub use jwt::JwtKeys;
pub use password::{hash_password, verify_password};
