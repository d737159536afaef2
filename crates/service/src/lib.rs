//! Service layer: business rules on top of `models`, independent of HTTP.
//! - Users and authentication (argon2 password hashes, JWT access/refresh tokens).
//! - Outgoing mail behind the `Mailer` trait.
//! - Task queue (brokers, registry, worker) and the dynamic scheduler.

pub mod auth;
pub mod errors;
pub mod mail;
pub mod pagination;
pub mod scheduler;
pub mod tasks;
pub mod users;
pub mod validation;

#[cfg(test)]
pub mod test_support;
