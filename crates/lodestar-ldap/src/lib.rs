//! # lodestar-ldap
//!
//! The LDAP-facing projection of the Lodestar directory.
//!
//! A per-request [`DirectoryTree`] turns the flat document collection into
//! the fixed hierarchy LDAP clients expect (root DSE → domain →
//! `cn=users`/`cn=groups` containers → leaf records), the
//! [`FilterEngine`] answers arbitrary boolean filter queries against a
//! candidate set, and the [`LdapGateway`] is the seam the protocol bridge
//! calls with decoded search and bind requests.

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod error;
pub mod filter;
pub mod gateway;
pub mod record;
pub mod tree;

pub use error::{LdapError, LdapResult};
pub use filter::{Filter, FilterEngine, FilterNode, SubstringPart, MATCHING_RULE_IN_CHAIN};
pub use gateway::{AuthRequest, AuthScheme, AuthVerdict, LdapGateway, SearchEntry, SearchRequest};
pub use record::DirectoryRecord;
pub use tree::{DirectoryTree, SearchScope};
