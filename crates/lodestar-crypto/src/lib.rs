//! # lodestar-crypto
//!
//! Credential encoding and verification for Lodestar.
//!
//! Persisted credentials use the modular crypt format
//! `$<tag>$<rounds>$<salt>$<key>` with unpadded base64 salt/key fields and
//! a PBKDF2-derived key. This crate owns that format contract; the rest of
//! the system treats encoded credentials as opaque strings.

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod authmethods;
pub mod error;
pub mod password;

pub use authmethods::AuthMethodGenerator;
pub use error::{CredentialError, CredentialResult};
pub use password::{verify_password, Pbkdf2, PseudoRandomFunction};
