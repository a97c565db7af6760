//! Auth-method map expansion.
//!
//! Administration requests submit credentials as a map of scheme name to
//! value. A `cleartext` entry is expanded server-side into the stored
//! schemes (plain digests for legacy clients plus the PBKDF2 modular
//! string) and the cleartext itself is discarded before persistence.

use std::collections::HashMap;

use sha1::{Digest, Sha1};
use sha2::{Sha256, Sha512};

use crate::error::{CredentialError, CredentialResult};
use crate::password::Pbkdf2;

/// Scheme name carrying a cleartext secret in incoming requests.
pub const CLEARTEXT_SCHEME: &str = "cleartext";

/// Scheme name of the PBKDF2 modular string, the only scheme used for
/// verification.
pub const PBKDF2_SCHEME: &str = "pbkdf2";

/// Expands incoming auth-method maps into their stored form.
#[derive(Debug, Clone, Default)]
pub struct AuthMethodGenerator {
    generator: Pbkdf2,
}

impl AuthMethodGenerator {
    /// Creates a generator with default PBKDF2 settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a generator around a specific PBKDF2 configuration.
    #[must_use]
    pub const fn with_generator(generator: Pbkdf2) -> Self {
        Self { generator }
    }

    /// Expands a submitted auth-method map into its stored form.
    ///
    /// A `cleartext` entry is replaced by `sha1`/`sha256`/`sha512` hex
    /// digests and a `pbkdf2` modular string; other entries pass through
    /// untouched.
    ///
    /// ## Errors
    ///
    /// Returns [`CredentialError::MissingAuthMethods`] when the map is
    /// empty.
    pub fn generate(
        &self,
        auth_methods: &HashMap<String, String>,
    ) -> CredentialResult<HashMap<String, String>> {
        if auth_methods.is_empty() {
            return Err(CredentialError::MissingAuthMethods);
        }

        let mut generated = auth_methods.clone();
        if let Some(cleartext) = generated.remove(CLEARTEXT_SCHEME) {
            generated.insert("sha1".to_string(), hex::encode(Sha1::digest(&cleartext)));
            generated.insert(
                "sha256".to_string(),
                hex::encode(Sha256::digest(&cleartext)),
            );
            generated.insert(
                "sha512".to_string(),
                hex::encode(Sha512::digest(&cleartext)),
            );
            generated.insert(
                PBKDF2_SCHEME.to_string(),
                self.generator.generate_string(&cleartext),
            );
        }
        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::verify_password;

    #[test]
    fn empty_map_is_rejected() {
        let generator = AuthMethodGenerator::new();
        assert!(matches!(
            generator.generate(&HashMap::new()),
            Err(CredentialError::MissingAuthMethods)
        ));
    }

    #[test]
    fn cleartext_is_expanded_and_removed() {
        let generator = AuthMethodGenerator::new();
        let mut submitted = HashMap::new();
        submitted.insert(CLEARTEXT_SCHEME.to_string(), "hunter2".to_string());

        let generated = generator.generate(&submitted).unwrap();

        assert!(!generated.contains_key(CLEARTEXT_SCHEME));
        assert!(generated.contains_key("sha1"));
        assert!(generated.contains_key("sha256"));
        assert!(generated.contains_key("sha512"));
        assert!(verify_password("hunter2", &generated[PBKDF2_SCHEME]));
    }

    #[test]
    fn pre_encoded_methods_pass_through() {
        let generator = AuthMethodGenerator::new();
        let mut submitted = HashMap::new();
        submitted.insert("pbkdf2".to_string(), "$pbkdf2$1$AA$BB".to_string());

        let generated = generator.generate(&submitted).unwrap();
        assert_eq!(generated, submitted);
    }

    #[test]
    fn sha256_digest_is_stable() {
        let generator = AuthMethodGenerator::new();
        let mut submitted = HashMap::new();
        submitted.insert(CLEARTEXT_SCHEME.to_string(), "abc".to_string());

        let generated = generator.generate(&submitted).unwrap();
        assert_eq!(
            generated["sha256"],
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
