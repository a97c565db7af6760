//! PBKDF2 password derivation in modular crypt format.
//!
//! Encoded strings look like
//! `$pbkdf2-sha512$210000$<base64 salt>$<base64 key>` with base64 padding
//! stripped from both binary fields. Verification honors whatever tag and
//! round count the stored string embeds, so credentials written under an
//! older configuration keep verifying.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};

/// Default PBKDF2 iteration count for newly generated credentials.
///
/// Fixed rather than calibrated at startup; stored strings embed their own
/// round count, so this only affects new credentials.
pub const DEFAULT_ROUNDS: u32 = 210_000;

/// Default salt length in bytes.
pub const DEFAULT_SALT_LENGTH: usize = 32;

/// Default derived key length in bytes.
pub const DEFAULT_KEY_LENGTH: usize = 32;

/// Pseudo-random function driving the key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoRandomFunction {
    /// HMAC-SHA-1 (scheme tag `pbkdf2`).
    Sha1,
    /// HMAC-SHA-224 (scheme tag `pbkdf2-sha224`).
    Sha224,
    /// HMAC-SHA-256 (scheme tag `pbkdf2-sha256`).
    Sha256,
    /// HMAC-SHA-384 (scheme tag `pbkdf2-sha384`).
    Sha384,
    /// HMAC-SHA-512 (scheme tag `pbkdf2-sha512`).
    Sha512,
}

impl PseudoRandomFunction {
    /// Returns the scheme tag embedded in the modular string.
    #[must_use]
    pub const fn scheme_tag(self) -> &'static str {
        match self {
            Self::Sha1 => "pbkdf2",
            Self::Sha224 => "pbkdf2-sha224",
            Self::Sha256 => "pbkdf2-sha256",
            Self::Sha384 => "pbkdf2-sha384",
            Self::Sha512 => "pbkdf2-sha512",
        }
    }

    /// Resolves a scheme tag back to its PRF.
    #[must_use]
    pub fn from_scheme_tag(tag: &str) -> Option<Self> {
        match tag {
            "pbkdf2" => Some(Self::Sha1),
            "pbkdf2-sha224" => Some(Self::Sha224),
            "pbkdf2-sha256" => Some(Self::Sha256),
            "pbkdf2-sha384" => Some(Self::Sha384),
            "pbkdf2-sha512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

fn derive(
    prf: PseudoRandomFunction,
    password: &[u8],
    salt: &[u8],
    rounds: u32,
    out: &mut [u8],
) {
    match prf {
        PseudoRandomFunction::Sha1 => pbkdf2_hmac::<Sha1>(password, salt, rounds, out),
        PseudoRandomFunction::Sha224 => pbkdf2_hmac::<Sha224>(password, salt, rounds, out),
        PseudoRandomFunction::Sha256 => pbkdf2_hmac::<Sha256>(password, salt, rounds, out),
        PseudoRandomFunction::Sha384 => pbkdf2_hmac::<Sha384>(password, salt, rounds, out),
        PseudoRandomFunction::Sha512 => pbkdf2_hmac::<Sha512>(password, salt, rounds, out),
    }
}

/// PBKDF2 credential generator.
#[derive(Debug, Clone)]
pub struct Pbkdf2 {
    prf: PseudoRandomFunction,
    rounds: u32,
    salt_length: usize,
    derived_key_length: usize,
}

impl Default for Pbkdf2 {
    fn default() -> Self {
        Self::new(PseudoRandomFunction::Sha512, DEFAULT_ROUNDS)
    }
}

impl Pbkdf2 {
    /// Creates a generator with the given PRF and round count.
    #[must_use]
    pub const fn new(prf: PseudoRandomFunction, rounds: u32) -> Self {
        Self {
            prf,
            rounds,
            salt_length: DEFAULT_SALT_LENGTH,
            derived_key_length: DEFAULT_KEY_LENGTH,
        }
    }

    /// Returns the PRF used for new credentials.
    #[must_use]
    pub const fn prf(&self) -> PseudoRandomFunction {
        self.prf
    }

    /// Derives a key from `password` with a fresh random salt and encodes
    /// it as a modular crypt string.
    #[must_use]
    pub fn generate_string(&self, password: &str) -> String {
        let mut salt = vec![0u8; self.salt_length];
        OsRng.fill_bytes(&mut salt);

        let mut key = vec![0u8; self.derived_key_length];
        derive(self.prf, password.as_bytes(), &salt, self.rounds, &mut key);

        format!(
            "${}${}${}${}",
            self.prf.scheme_tag(),
            self.rounds,
            STANDARD_NO_PAD.encode(&salt),
            STANDARD_NO_PAD.encode(&key)
        )
    }
}

fn decode_unpadded(field: &str) -> Option<Vec<u8>> {
    STANDARD_NO_PAD.decode(field.trim_end_matches('=')).ok()
}

/// Verifies a cleartext password against a stored modular crypt string.
///
/// Re-derives the key with the embedded PRF, rounds, and salt, matching the
/// embedded key's length, and compares byte-for-byte. Malformed strings
/// verify as `false` rather than erroring: a corrupt stored credential must
/// never authenticate anyone.
#[must_use]
pub fn verify_password(password: &str, modular_string: &str) -> bool {
    let components: Vec<&str> = modular_string.split('$').collect();
    // Leading '$' yields an empty first component.
    if components.len() != 5 || !components[0].is_empty() {
        return false;
    }

    let (tag, rounds_field, salt_field, key_field) =
        (components[1], components[2], components[3], components[4]);

    let Some(prf) = PseudoRandomFunction::from_scheme_tag(tag) else {
        return false;
    };
    let Ok(rounds) = rounds_field.parse::<u32>() else {
        return false;
    };
    let Some(salt) = decode_unpadded(salt_field) else {
        return false;
    };
    let Some(expected) = decode_unpadded(key_field) else {
        return false;
    };
    if expected.is_empty() {
        return false;
    }

    let mut derived = vec![0u8; expected.len()];
    derive(prf, password.as_bytes(), &salt, rounds, &mut derived);
    derived == expected
}
