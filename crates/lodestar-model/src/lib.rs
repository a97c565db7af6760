//! # lodestar-model
//!
//! Domain models for the Lodestar directory backend.
//!
//! Users and groups are loaded from the document store in one of two
//! representations: a brief subset for list views and the full record for
//! everything else. Only full records may be written back; the store layer
//! enforces that invariant through [`Representation`].

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod error;
pub mod group;
pub mod representation;
pub mod user;
pub mod validation;

pub use error::{ValidationError, ValidationResult};
pub use group::ManagedUserGroup;
pub use representation::Representation;
pub use user::ManagedUser;
