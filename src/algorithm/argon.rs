//! Argon2 key derivation plugin.
//!
//! Parameter string: `<mode>:<passes>:<memory KiB>`, e.g. `id:4:65536`.
//!
//! The lane (thread) count is **not** part of the parameter string.  It is
//! fixed once per process from the number of available cores, and every
//! deployment that verifies a record must use the same value that created it,
//! otherwise the derived keys legitimately differ.  Pin it explicitly with
//! [`Argon2Hasher::with_lanes`] when records move between machines.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use argon2::{Argon2, Params, Version};

use super::{Algorithm, DerivedKey, HashError};

/// Registry identifier written into every record.
pub const ARGON2_ID: &str = "argon2";
/// Fields in a well-formed parameter string.
pub const PARAMETER_COUNT: usize = 3;

pub const DEFAULT_MODE:       Mode = Mode::Hybrid;
pub const DEFAULT_PASSES:     u32  = 4;
/// 64 MiB.
pub const DEFAULT_MEMORY_KIB: u32  = 64 * 1024;
pub const DEFAULT_HASH_SIZE:  u32  = 32;

/// Lane count shared by every Argon2 instance in this process: half the
/// available cores, never less than one.
pub fn default_lanes() -> u32 {
    static LANES: OnceLock<u32> = OnceLock::new();
    *LANES.get_or_init(|| {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        (cores / 2).max(1)
    })
}

// ── Mode ─────────────────────────────────────────────────────────────────────

/// Argon2 variant.  Serialized as its short code in the parameter string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Argon2i, data-independent memory access (`i`).
    Sequential,
    /// Argon2id, hybrid access pattern (`id`).
    Hybrid,
}

impl Mode {
    #[inline]
    pub fn code(self) -> &'static str {
        match self {
            Mode::Sequential => "i",
            Mode::Hybrid     => "id",
        }
    }

    fn variant(self) -> argon2::Algorithm {
        match self {
            Mode::Sequential => argon2::Algorithm::Argon2i,
            Mode::Hybrid     => argon2::Algorithm::Argon2id,
        }
    }
}

impl FromStr for Mode {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "i"  => Ok(Mode::Sequential),
            "id" => Ok(Mode::Hybrid),
            _    => Err(HashError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ── Hasher ───────────────────────────────────────────────────────────────────

/// One immutable Argon2 configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argon2Hasher {
    mode:       Mode,
    passes:     u32,
    memory_kib: u32,
    hash_size:  u32,
    lanes:      u32,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            mode:       DEFAULT_MODE,
            passes:     DEFAULT_PASSES,
            memory_kib: DEFAULT_MEMORY_KIB,
            hash_size:  DEFAULT_HASH_SIZE,
            lanes:      default_lanes(),
        }
    }
}

impl Argon2Hasher {
    /// Build a configuration with the process lane count.
    ///
    /// # Errors
    /// [`HashError::BadParameters`] if any cost or the output length is zero.
    pub fn new(mode: Mode, passes: u32, memory_kib: u32, hash_size: u32) -> Result<Self, HashError> {
        Self::default().reconfigured(mode, i64::from(passes), i64::from(memory_kib), hash_size)
    }

    /// Copy of this configuration running on `lanes` lanes.
    pub fn with_lanes(&self, lanes: u32) -> Result<Self, HashError> {
        if lanes == 0 {
            return Err(HashError::BadParameters);
        }
        Ok(Self { lanes, ..self.clone() })
    }

    pub fn passes(&self) -> u32 { self.passes }
    pub fn memory_kib(&self) -> u32 { self.memory_kib }
    pub fn lanes(&self) -> u32 { self.lanes }
    pub fn argon_mode(&self) -> Mode { self.mode }

    /// The `<mode>:<passes>:<memory>` string stored in records.
    pub fn encoded_params(&self) -> String {
        format!("{}:{}:{}", self.mode, self.passes, self.memory_kib)
    }

    fn reconfigured(&self, mode: Mode, passes: i64, memory: i64, hash_size: u32) -> Result<Self, HashError> {
        if hash_size == 0 || passes <= 0 || memory <= 0 {
            return Err(HashError::BadParameters);
        }
        let (passes, memory_kib) = match (u32::try_from(passes), u32::try_from(memory)) {
            (Ok(p), Ok(m)) => (p, m),
            _ => return Err(HashError::BadParameters),
        };
        Ok(Self { mode, passes, memory_kib, hash_size, ..self.clone() })
    }
}

impl Algorithm for Argon2Hasher {
    fn id(&self) -> &str { ARGON2_ID }

    fn mode(&self) -> &str { self.mode.code() }

    fn hash_size(&self) -> u32 { self.hash_size }

    fn hash(&self, password: &[u8], salt: &[u8]) -> Result<DerivedKey, HashError> {
        let params = Params::new(self.memory_kib, self.passes, self.lanes, Some(self.hash_size as usize))
            .map_err(|e| HashError::Derivation(e.to_string()))?;
        let argon2 = Argon2::new(self.mode.variant(), Version::V0x13, params);

        let mut key = vec![0u8; self.hash_size as usize];
        argon2
            .hash_password_into(password, salt, &mut key)
            .map_err(|e| HashError::Derivation(e.to_string()))?;

        Ok(DerivedKey::new(self.encoded_params(), key))
    }

    fn configure(
        &self,
        params:    &str,
        separator: &str,
        hash_size: u32,
    ) -> Result<Box<dyn Algorithm>, HashError> {
        if separator.is_empty() {
            return Err(HashError::BadParameters);
        }
        let fields: Vec<&str> = params.split(separator).collect();
        if fields.len() < PARAMETER_COUNT {
            return Err(HashError::BadParameters);
        }

        let mode: Mode = fields[0].parse().map_err(|_| HashError::BadParameters)?;
        let passes: i8 = fields[1].parse().map_err(|_| HashError::BadParameters)?;
        let memory: i32 = fields[2].parse().map_err(|_| HashError::BadParameters)?;

        let next = self.reconfigured(mode, i64::from(passes), i64::from(memory), hash_size)?;
        Ok(Box::new(next))
    }

    fn with_hash_size(&self, size: u32) -> Result<Box<dyn Algorithm>, HashError> {
        if size == 0 {
            return Err(HashError::BadHashSize);
        }
        Ok(Box::new(Self { hash_size: size, ..self.clone() }))
    }

    fn default_hash_size(&self) -> u32 { DEFAULT_HASH_SIZE }

    fn parameter_count(&self) -> usize { PARAMETER_COUNT }

    fn parallelism(&self) -> Option<u32> { Some(self.lanes) }
}

impl fmt::Display for Argon2Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "algo:{} mode:{} passes:{} memory:{}",
            ARGON2_ID, self.mode, self.passes, self.memory_kib,
        )
    }
}
