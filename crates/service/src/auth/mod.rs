//! Password hashing and JWT issuing/verification used by the users service and the HTTP middleware.

pub mod password;
pub mod tokens;

pub use tokens::{Claims, JwtKeys, TokenKind, TokenPair, TokenSubject};
