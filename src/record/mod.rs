//! Password hash records: creation, verification and rehash policy.
//!
//! # Record layout
//! ```text
//! $<algorithm id>$<params>$<base64(len ‖ salt)>$<base64(tag)>
//! ```
//! - `len` is one byte holding the derived-key length.
//! - `tag` is HMAC-SHA256 keyed with the UTF-8 prefix `$id$params$salt$`
//!   over the raw derived key.  The derived key itself is never stored.
//!
//! The HMAC orientation (public prefix as key, secret as message) is the
//! frozen on-disk construction.  Changing it invalidates every record already
//! written, so it is kept as-is.
//!
//! Base64 uses the standard alphabet with padding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::algorithm::{Algorithm, HashError};
use crate::config::{ConfigError, EngineOptions};
use crate::random::{generate_salt, OsSaltSource, SaltSource};
use crate::registry::Registry;

/// Field separator of a record.
pub const SEPARATOR: char = '$';
/// Separator inside the parameter field.
pub const PARAMETER_SEPARATOR: &str = ":";
/// Fields produced by splitting a well-formed record on `$`.
pub const MIN_FIELDS: usize = 5;

type HmacSha256 = Hmac<Sha256>;

fn integrity_mac(prefix: &str, key: &[u8]) -> Result<HmacSha256, HashError> {
    // HMAC takes keys of any length; this error cannot occur.
    let mut mac = HmacSha256::new_from_slice(prefix.as_bytes())
        .map_err(|_| HashError::BadFormat)?;
    mac.update(key);
    Ok(mac)
}

// ── Parsed record ────────────────────────────────────────────────────────────

/// A record split into its fields, with the algorithm resolved and the salt
/// blob decoded.  No key has been derived yet.
#[derive(Debug)]
pub struct ParsedRecord<'a> {
    /// Registered default instance of the record's algorithm.
    pub algorithm: &'a dyn Algorithm,
    pub params:    &'a str,
    /// Derived-key length recorded in the salt blob.
    pub hash_size: u8,
    pub salt:      Vec<u8>,
    /// `$id$params$salt$`, the HMAC key.
    pub prefix:    &'a str,
    /// Base64 integrity tag as stored.
    pub tag:       &'a str,
}

impl ParsedRecord<'_> {
    pub fn algorithm_id(&self) -> &str { self.algorithm.id() }
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// Creates and checks records against an immutable [`Registry`].
///
/// `Engine` is `Send + Sync`; share one instance (e.g. in an `Arc`) across
/// threads.  Every call runs to completion synchronously.  Key derivation is
/// deliberately expensive and there is no internal timeout.
pub struct Engine {
    registry:    Registry,
    options:     EngineOptions,
    salt_source: Box<dyn SaltSource>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        // Default options name the built-in default and pin nothing.
        Self {
            registry:    Registry::with_defaults(),
            options:     EngineOptions::default(),
            salt_source: Box::new(OsSaltSource),
        }
    }
}

impl Engine {
    /// Engine over `registry`, salting from the OS CSPRNG.
    ///
    /// # Errors
    /// - [`ConfigError::Invalid`] if `options` fail [`EngineOptions::validate`].
    /// - [`ConfigError::UnregisteredDefault`] if `options.default_algorithm`
    ///   is not in `registry`.
    /// - [`ConfigError::LanesMismatch`] if `options.lanes` is set and differs
    ///   from the parallelism of the registered default algorithm.
    pub fn new(registry: Registry, options: EngineOptions) -> Result<Self, ConfigError> {
        options.validate()?;

        let default = registry
            .get(&options.default_algorithm)
            .map_err(|_| ConfigError::UnregisteredDefault(options.default_algorithm.clone()))?;

        if let (Some(configured), Some(registered)) = (options.lanes, default.parallelism()) {
            if configured != registered {
                return Err(ConfigError::LanesMismatch { configured, registered });
            }
        }

        Ok(Self { registry, options, salt_source: Box::new(OsSaltSource) })
    }

    /// Engine with the built-in algorithms, honouring `options.lanes`.
    pub fn from_options(options: EngineOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let registry = match options.lanes {
            Some(lanes) => Registry::with_lanes(lanes)?,
            None        => Registry::with_defaults(),
        };
        Self::new(registry, options)
    }

    /// Replace the salt source.
    pub fn with_salt_source(mut self, source: Box<dyn SaltSource>) -> Self {
        self.salt_source = source;
        self
    }

    pub fn registry(&self) -> &Registry { &self.registry }

    pub fn options(&self) -> &EngineOptions { &self.options }

    /// Hash `password` with the default algorithm and a fresh salt.
    pub fn hash(&self, password: &[u8]) -> Result<String, HashError> {
        let id = self.options.default_algorithm.as_str();
        let algorithm = self.registry.get(id)?;

        let salt = generate_salt(self.salt_source.as_ref(), self.options.salt_size)?;
        let derived = algorithm.hash(password, &salt)?;
        let key_len = u8::try_from(derived.len()).map_err(|_| HashError::BadHashSize)?;

        let mut blob = Vec::with_capacity(1 + salt.len());
        blob.push(key_len);
        blob.extend_from_slice(&salt);

        let prefix = format!("${}${}${}$", id, derived.params, STANDARD.encode(&blob));
        let tag = integrity_mac(&prefix, &derived.key)?.finalize().into_bytes();

        tracing::debug!(algorithm = id, params = %derived.params, key_len, "created hash record");
        Ok(prefix + &STANDARD.encode(tag))
    }

    /// Check `password` against `record`.
    ///
    /// Returns `Ok(false)` on a mismatch.  `Err` means the record could not be
    /// interpreted, which is not the same as a wrong password.
    pub fn verify_hash(&self, record: &str, password: &[u8]) -> Result<bool, HashError> {
        let parsed = self.parse(record)?;
        let configured = parsed.algorithm.configure(
            parsed.params,
            PARAMETER_SEPARATOR,
            u32::from(parsed.hash_size),
        )?;
        let candidate = configured.hash(password, &parsed.salt)?;
        let mac = integrity_mac(parsed.prefix, &candidate.key)?;

        let stored = STANDARD.decode(parsed.tag).map_err(|_| HashError::BadFormat)?;
        // verify_slice compares in constant time.
        let valid = mac.verify_slice(&stored).is_ok();

        tracing::debug!(algorithm = parsed.algorithm_id(), valid, "verified hash record");
        Ok(valid)
    }

    /// Whether `record` should be regenerated under the current defaults.
    ///
    /// True only when the record uses a different algorithm than the default
    /// **and** a shorter salt **and** a shorter derived key than that
    /// algorithm's default.  A record on the default algorithm is never
    /// flagged.
    pub fn needs_rehash(&self, record: &str) -> Result<bool, HashError> {
        let parsed = self.parse(record)?;
        let algorithm = parsed.algorithm;

        let stale = algorithm.id() != self.options.default_algorithm
            && parsed.salt.len() < self.options.salt_size
            && u32::from(parsed.hash_size) < algorithm.default_hash_size();

        tracing::debug!(
            algorithm = algorithm.id(),
            salt_len = parsed.salt.len(),
            hash_size = parsed.hash_size,
            stale,
            "rehash check"
        );
        Ok(stale)
    }

    /// Split `record`, resolve its algorithm and decode its salt blob.
    pub fn parse<'a>(&'a self, record: &'a str) -> Result<ParsedRecord<'a>, HashError> {
        let fields: Vec<&str> = record.split(SEPARATOR).collect();
        if fields.len() < MIN_FIELDS {
            return Err(HashError::BadFormat);
        }

        let algorithm = self.registry.get(fields[1]).map_err(|e| {
            tracing::warn!(algorithm = fields[1], "record references unregistered algorithm");
            e
        })?;

        let blob = STANDARD.decode(fields[3]).map_err(|_| HashError::BadFormat)?;
        let (&hash_size, salt) = blob.split_first().ok_or(HashError::BadFormat)?;

        // Four fields, each followed by its `$`.
        let prefix_len: usize = fields[..4].iter().map(|f| f.len() + 1).sum();

        Ok(ParsedRecord {
            algorithm,
            params: fields[2],
            hash_size,
            salt: salt.to_vec(),
            prefix: &record[..prefix_len],
            tag: fields[4],
        })
    }
}

#[cfg(test)]
mod tests;
