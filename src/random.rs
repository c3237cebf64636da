//! Salt generation.
//!
//! Salts come from a [`SaltSource`].  The engine uses [`OsSaltSource`], which
//! reads the operating system's CSPRNG; tests may inject their own source to
//! make output reproducible or to exercise failure paths.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::algorithm::HashError;

/// A cryptographically secure byte generator, safe to share between threads.
pub trait SaltSource: Send + Sync {
    /// Fill `buf` completely or fail.
    fn fill(&self, buf: &mut [u8]) -> Result<(), HashError>;
}

/// The platform's secure RNG (e.g. `getrandom(2)` or `/dev/urandom`).
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSaltSource;

impl SaltSource for OsSaltSource {
    fn fill(&self, buf: &mut [u8]) -> Result<(), HashError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| HashError::RandomSource(e.to_string()))
    }
}

/// Generate `len` fresh salt bytes from `source`.
pub fn generate_salt(source: &dyn SaltSource, len: usize) -> Result<Vec<u8>, HashError> {
    let mut salt = vec![0u8; len];
    source.fill(&mut salt)?;
    Ok(salt)
}
