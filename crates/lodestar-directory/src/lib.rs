//! # lodestar-directory
//!
//! Directory services for Lodestar: user and group lifecycle operations
//! and the relationship consistency engine that keeps `memberOf`,
//! `nestedGroups`, and `members` mirrored on both sides of every edge.
//!
//! Consistency is eventual, not transactional: peer updates are a batch of
//! independent optimistic writes, and a partial failure is reported as one
//! combined error that callers must log as requiring repair.

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod diff;
pub mod error;
pub mod groups;
pub mod notify;
pub mod relationship;
pub mod users;

pub use diff::diff_ids;
pub use error::{DirectoryError, DirectoryResult};
pub use groups::{CreateGroupRequest, GroupService, UpdateGroupRequest};
pub use notify::{ChangeNotifier, NoopNotifier};
pub use relationship::RelationshipEngine;
pub use users::{CreateUserRequest, UpdateUserRequest, UserService};
