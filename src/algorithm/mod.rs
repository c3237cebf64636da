//! Key-derivation algorithm plugins.
//!
//! Every algorithm is identified by a short, case-sensitive string (for
//! example `argon2`).  That identifier is:
//!   - Written into the second field of every record it produces.
//!   - The key under which the algorithm is registered in a [`Registry`].
//!
//! # Configuration model
//! An algorithm instance is an immutable configuration value.  Reconfiguring
//! (from a record's parameter string, or with a different output length)
//! always returns a *new* boxed instance and never touches the receiver, so a
//! single registered default can be shared by any number of threads.
//!
//! [`Registry`]: crate::registry::Registry

pub mod argon;

use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

// ── Error type ───────────────────────────────────────────────────────────────

/// Failures raised while building, parsing or checking a record.
///
/// A password that simply does not match is *not* an error: verification
/// returns `Ok(false)` for that case.  Any `Err` means the validity of the
/// presented password could not be determined.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Too few `$` fields, or a base64 segment that does not decode.
    #[error("invalid hash record format")]
    BadFormat,
    #[error("unknown hash algorithm '{0}'")]
    UnknownAlgorithm(String),
    /// Parameter string malformed, short, non-numeric or out of range.
    #[error("malformed hash parameters")]
    BadParameters,
    #[error("unknown hash mode '{0}'")]
    UnknownMode(String),
    #[error("bad hash size")]
    BadHashSize,
    #[error("secure random source failed: {0}")]
    RandomSource(String),
    /// The underlying KDF rejected its inputs (e.g. salt or memory too small).
    #[error("key derivation failed: {0}")]
    Derivation(String),
}

// ── Derived key ──────────────────────────────────────────────────────────────

/// Output of [`Algorithm::hash`]: the encoded parameter string that
/// reproduces this derivation, plus the secret key bytes.
///
/// The key is wiped from memory on drop and is never printed by `Debug`.
pub struct DerivedKey {
    pub params: String,
    pub key:    Zeroizing<Vec<u8>>,
}

impl DerivedKey {
    pub fn new(params: String, key: Vec<u8>) -> Self {
        Self { params, key: Zeroizing::new(key) }
    }

    pub fn len(&self) -> usize { self.key.len() }

    pub fn is_empty(&self) -> bool { self.key.is_empty() }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("params", &self.params)
            .field("key", &format_args!("<{} bytes redacted>", self.key.len()))
            .finish()
    }
}

// ── Algorithm trait ──────────────────────────────────────────────────────────

/// Capability set every key-derivation plugin exposes.
///
/// Implementations must be deterministic: the same `(password, salt)` under
/// the same configuration always yields the same [`DerivedKey`].
pub trait Algorithm: Send + Sync + fmt::Debug + fmt::Display {
    /// Stable identifier used as the record's algorithm field.
    fn id(&self) -> &str;

    /// Algorithm-specific mode code of this configuration.
    fn mode(&self) -> &str;

    /// Output length in bytes this configuration derives.
    fn hash_size(&self) -> u32;

    /// Derive a key from `password` and `salt` with the current configuration.
    fn hash(&self, password: &[u8], salt: &[u8]) -> Result<DerivedKey, HashError>;

    /// Parse `params` (fields split on `separator`) into a new, independent
    /// configuration deriving `hash_size` bytes.
    ///
    /// # Errors
    /// [`HashError::BadParameters`] on missing or malformed fields and on any
    /// out-of-range value.
    fn configure(
        &self,
        params:    &str,
        separator: &str,
        hash_size: u32,
    ) -> Result<Box<dyn Algorithm>, HashError>;

    /// Copy of this configuration with a different output length.
    ///
    /// # Errors
    /// [`HashError::BadHashSize`] if `size` is zero.
    fn with_hash_size(&self, size: u32) -> Result<Box<dyn Algorithm>, HashError>;

    /// Output length of a freshly registered instance of this algorithm.
    fn default_hash_size(&self) -> u32;

    /// Number of fields a well-formed parameter string carries.
    fn parameter_count(&self) -> usize;

    /// Degree of parallelism baked into derivation but not carried in the
    /// parameter string.  `None` if the algorithm has no such setting.
    fn parallelism(&self) -> Option<u32> {
        None
    }

    /// Human-readable summary (diagnostics only, never parsed).
    fn describe(&self) -> String {
        self.to_string()
    }
}
