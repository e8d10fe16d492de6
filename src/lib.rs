//! # Bileto (Session & Authentication Authority)
//!
//! `bileto` owns the session/authentication lifecycle for the Bileto ticket
//! platform: password login, short-lived stateless access tokens, rotating
//! refresh tokens with replay detection, edge-level route gating, and the
//! single-use password-recovery token registry.
//!
//! ## Token model
//!
//! - **Access tokens** are HS256-signed, ~15 minutes, validated purely by
//!   signature + expiry; they are never persisted or individually revoked.
//! - **Refresh tokens** live in an `HttpOnly` cookie and are rotated on every
//!   use. Each carries a rotation generation checked against a per-subject
//!   counter; presenting a superseded generation is treated as credential
//!   theft and revokes every session for that subject.
//!
//! ## Enumeration resistance
//!
//! Login returns the identical 401 body for unknown identifiers and wrong
//! passwords, and forgot-password always answers the same 202 whether or not
//! the account exists.
//!
//! ## Stores
//!
//! The subsystem only sees narrow store traits (credentials, refresh
//! sessions, reset tokens). Postgres backs them in production; in-memory
//! variants cover tests and database-free runs.

pub mod api;
pub mod cli;
pub mod client;
pub mod gate;
pub mod store;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
