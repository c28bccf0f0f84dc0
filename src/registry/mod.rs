//! Support for asking a registry server which image a tag points at

mod auth;
mod client;
mod credentials;
mod default;

pub use auth::BearerChallenge;
pub use client::*;
pub use credentials::{Credential, CredentialStore};
pub use default::*;
