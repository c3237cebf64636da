use std::fmt;
use std::sync::Arc;

use base64::Engine as _;

use super::*;
use crate::algorithm::argon::{Argon2Hasher, Mode};
use crate::algorithm::DerivedKey;

struct FixedSalt(u8);
impl SaltSource for FixedSalt {
    fn fill(&self, buf: &mut [u8]) -> Result<(), HashError> {
        buf.fill(self.0);
        Ok(())
    }
}

struct NoEntropy;
impl SaltSource for NoEntropy {
    fn fill(&self, _: &mut [u8]) -> Result<(), HashError> {
        Err(HashError::RandomSource("short read".into()))
    }
}

/// Second algorithm under another id, so rehash decisions can be exercised.
#[derive(Debug)]
struct Legacy(Box<dyn Algorithm>);

impl fmt::Display for Legacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "legacy({})", self.0)
    }
}

impl Algorithm for Legacy {
    fn id(&self) -> &str { "legacy" }
    fn mode(&self) -> &str { self.0.mode() }
    fn hash_size(&self) -> u32 { self.0.hash_size() }
    fn hash(&self, password: &[u8], salt: &[u8]) -> Result<DerivedKey, HashError> {
        self.0.hash(password, salt)
    }
    fn configure(&self, params: &str, sep: &str, size: u32) -> Result<Box<dyn Algorithm>, HashError> {
        Ok(Box::new(Legacy(self.0.configure(params, sep, size)?)))
    }
    fn with_hash_size(&self, size: u32) -> Result<Box<dyn Algorithm>, HashError> {
        Ok(Box::new(Legacy(self.0.with_hash_size(size)?)))
    }
    fn default_hash_size(&self) -> u32 { 32 }
    fn parameter_count(&self) -> usize { 3 }
    fn parallelism(&self) -> Option<u32> { self.0.parallelism() }
}

fn cheap_argon(hash_size: u32) -> Argon2Hasher {
    Argon2Hasher::new(Mode::Hybrid, 1, 64, hash_size)
        .unwrap()
        .with_lanes(1)
        .unwrap()
}

fn legacy(hash_size: u32) -> Box<dyn Algorithm> {
    Box::new(Legacy(Box::new(cheap_argon(hash_size))))
}

fn engine() -> Engine {
    Engine::new(
        Registry::new().register(Box::new(cheap_argon(32))),
        EngineOptions::default(),
    )
    .unwrap()
}

fn options(default_algorithm: &str, salt_size: usize, lanes: Option<u32>) -> EngineOptions {
    EngineOptions { default_algorithm: default_algorithm.to_string(), salt_size, lanes }
}

fn engine_with(registry: Registry, default_algorithm: &str, salt_size: usize) -> Engine {
    Engine::new(registry, options(default_algorithm, salt_size, Some(1))).unwrap()
}

#[test]
fn hash_then_verify() {
    let e = engine();
    let record = e.hash(b"correct-password").unwrap();
    assert!(e.verify_hash(&record, b"correct-password").unwrap());
    assert!(!e.verify_hash(&record, b"wrong-password").unwrap());
}

#[test]
fn empty_password_roundtrips() {
    let e = engine();
    let record = e.hash(b"").unwrap();
    assert!(e.verify_hash(&record, b"").unwrap());
    assert!(!e.verify_hash(&record, b" ").unwrap());
}

#[test]
fn record_layout() {
    let e = engine();
    let record = e.hash(b"pw").unwrap();
    let fields: Vec<&str> = record.split('$').collect();
    assert_eq!(fields.len(), 5);
    assert_eq!(fields[0], "");
    assert_eq!(fields[1], "argon2");
    assert_eq!(fields[2], "id:1:64");

    let blob = STANDARD.decode(fields[3]).unwrap();
    assert_eq!(blob.len(), 11);
    assert_eq!(blob[0], 32);
    assert_eq!(STANDARD.decode(fields[4]).unwrap().len(), 32);
}

#[test]
fn salts_differ_between_calls() {
    let e = engine();
    let a = e.hash(b"same").unwrap();
    let b = e.hash(b"same").unwrap();
    assert_ne!(a, b);
    assert!(e.verify_hash(&a, b"same").unwrap());
    assert!(e.verify_hash(&b, b"same").unwrap());
}

#[test]
fn fixed_salt_is_deterministic() {
    let e = engine().with_salt_source(Box::new(FixedSalt(9)));
    assert_eq!(e.hash(b"pw").unwrap(), e.hash(b"pw").unwrap());
}

#[test]
fn tag_is_hmac_keyed_by_prefix_over_derived_key() {
    let e = engine().with_salt_source(Box::new(FixedSalt(5)));
    let record = e.hash(b"pw").unwrap();

    let key = cheap_argon(32).hash(b"pw", &[5u8; 10]).unwrap();
    let mut blob = vec![32u8];
    blob.extend_from_slice(&[5u8; 10]);
    let prefix = format!("$argon2$id:1:64${}$", STANDARD.encode(&blob));

    let mut mac = HmacSha256::new_from_slice(prefix.as_bytes()).unwrap();
    mac.update(&key.key);
    let expected = format!("{prefix}{}", STANDARD.encode(mac.finalize().into_bytes()));
    assert_eq!(record, expected);
}

#[test]
fn any_single_character_flip_fails() {
    let e = engine();
    let record = e.hash(b"pw").unwrap();
    let first_field = record[1..].find('$').unwrap() + 1;

    for (i, c) in record.char_indices().skip(first_field) {
        if c == '$' {
            continue;
        }
        let replacement = if c == 'A' { 'B' } else { 'A' };
        let mut tampered = record.clone();
        tampered.replace_range(i..i + 1, &replacement.to_string());

        let outcome = e.verify_hash(&tampered, b"pw");
        assert_ne!(outcome, Ok(true), "flip at {i} in {tampered}");
    }

    for (i, c) in record.char_indices().skip(1).take(first_field - 1) {
        let replacement = if c == 'A' { 'B' } else { 'A' };
        let mut tampered = record.clone();
        tampered.replace_range(i..i + 1, &replacement.to_string());
        assert!(matches!(
            e.verify_hash(&tampered, b"pw"),
            Err(HashError::UnknownAlgorithm(_)),
        ));
    }
}

#[test]
fn too_few_fields_is_bad_format() {
    let e = engine();
    for record in ["", "$", "$argon2$id:1:64$AAAA", "argon2$id:1:64$AAAA", "$$$"] {
        assert_eq!(e.verify_hash(record, b"pw"), Err(HashError::BadFormat), "{record:?}");
        assert_eq!(e.needs_rehash(record), Err(HashError::BadFormat), "{record:?}");
    }
}

#[test]
fn unknown_algorithm() {
    let e = engine();
    let record = e.hash(b"pw").unwrap().replacen("argon2", "scrypt", 1);
    assert_eq!(
        e.verify_hash(&record, b"pw"),
        Err(HashError::UnknownAlgorithm("scrypt".into())),
    );
    assert_eq!(
        e.needs_rehash(&record),
        Err(HashError::UnknownAlgorithm("scrypt".into())),
    );
}

#[test]
fn field_count_is_checked_before_algorithm() {
    let e = engine();
    assert_eq!(e.verify_hash("$scrypt$x$y", b"pw"), Err(HashError::BadFormat));
}

#[test]
fn undecodable_or_empty_salt_is_bad_format() {
    let e = engine();
    assert_eq!(e.verify_hash("$argon2$id:1:64$!!!!$AAAA", b"pw"), Err(HashError::BadFormat));
    assert_eq!(e.verify_hash("$argon2$id:1:64$$AAAA", b"pw"), Err(HashError::BadFormat));
    assert_eq!(e.needs_rehash("$argon2$id:1:64$$AAAA"), Err(HashError::BadFormat));
}

#[test]
fn undecodable_tag_is_bad_format() {
    let e = engine();
    let record = e.hash(b"pw").unwrap();
    let cut = record.rfind('$').unwrap() + 1;
    let broken = format!("{}not*base64", &record[..cut]);
    assert_eq!(e.verify_hash(&broken, b"pw"), Err(HashError::BadFormat));
}

#[test]
fn bad_parameters_propagate() {
    let e = engine();
    let record = e.hash(b"pw").unwrap();
    for params in ["x:1:64", "id:0:64", "id:1:0", "id:1"] {
        let tampered = record.replacen("id:1:64", params, 1);
        assert_eq!(e.verify_hash(&tampered, b"pw"), Err(HashError::BadParameters), "{params}");
    }
}

#[test]
fn zero_hash_size_byte_is_bad_parameters() {
    let e = engine().with_salt_source(Box::new(FixedSalt(1)));
    let record = e.hash(b"pw").unwrap();
    let fields: Vec<&str> = record.split('$').collect();
    let mut blob = STANDARD.decode(fields[3]).unwrap();
    blob[0] = 0;
    let tampered = record.replacen(fields[3], &STANDARD.encode(&blob), 1);
    assert_eq!(e.verify_hash(&tampered, b"pw"), Err(HashError::BadParameters));
}

#[test]
fn trailing_fields_are_ignored() {
    let e = engine();
    let record = e.hash(b"pw").unwrap();
    let extended = format!("{record}$extra");
    assert!(e.verify_hash(&extended, b"pw").unwrap());
}

#[test]
fn parse_exposes_fields() {
    let e = engine().with_salt_source(Box::new(FixedSalt(3)));
    let record = e.hash(b"pw").unwrap();
    let parsed = e.parse(&record).unwrap();
    assert_eq!(parsed.algorithm_id(), "argon2");
    assert_eq!(parsed.params, "id:1:64");
    assert_eq!(parsed.hash_size, 32);
    assert_eq!(parsed.salt, vec![3u8; 10]);
    assert!(record.starts_with(parsed.prefix));
    assert!(parsed.prefix.ends_with('$'));
    assert_eq!(format!("{}{}", parsed.prefix, parsed.tag), record);
}

#[test]
fn random_failure_propagates() {
    let e = engine().with_salt_source(Box::new(NoEntropy));
    assert!(matches!(e.hash(b"pw"), Err(HashError::RandomSource(_))));
}

#[test]
fn unregistered_default_is_rejected_at_construction() {
    let err = Engine::new(Registry::new(), options("argon2", 10, None)).unwrap_err();
    assert!(matches!(err, ConfigError::UnregisteredDefault(id) if id == "argon2"));

    let err = Engine::from_options(options("scrypt", 10, None)).unwrap_err();
    assert!(matches!(err, ConfigError::UnregisteredDefault(id) if id == "scrypt"));
}

#[test]
fn invalid_options_are_rejected_at_construction() {
    let registry = || Registry::new().register(Box::new(cheap_argon(32)));
    for opts in [options("argon2", 0, None), options("argon2", 10, Some(0)), options("", 10, None)] {
        assert!(matches!(
            Engine::new(registry(), opts.clone()),
            Err(ConfigError::Invalid { .. }),
        ));
        assert!(matches!(
            Engine::from_options(opts),
            Err(ConfigError::Invalid { .. }),
        ));
    }
}

#[test]
fn pinned_lanes_must_match_registry() {
    let registry = Registry::new().register(Box::new(cheap_argon(32)));
    let err = Engine::new(registry, options("argon2", 10, Some(2))).unwrap_err();
    assert!(matches!(err, ConfigError::LanesMismatch { configured: 2, registered: 1 }));
}

#[test]
fn engines_from_same_options_interoperate() {
    let opts = options("argon2", 10, Some(2));
    let built = Engine::new(Registry::with_lanes(2).unwrap(), opts.clone()).unwrap();
    let derived = Engine::from_options(opts.clone()).unwrap();

    assert_eq!(built.registry().get("argon2").unwrap().parallelism(), Some(2));
    assert_eq!(derived.options(), &opts);

    let record = built.hash(b"pw").unwrap();
    assert!(derived.verify_hash(&record, b"pw").unwrap());
    let record = derived.hash(b"pw").unwrap();
    assert!(built.verify_hash(&record, b"pw").unwrap());
}

#[test]
fn oversized_key_cannot_be_recorded() {
    let e = Engine::new(
        Registry::new().register(Box::new(cheap_argon(256))),
        EngineOptions::default(),
    )
    .unwrap();
    assert_eq!(e.hash(b"pw"), Err(HashError::BadHashSize));
}

#[test]
fn default_algorithm_never_needs_rehash() {
    // Weak salt and short key, but on the default algorithm.
    let weak = engine_with(Registry::new().register(Box::new(cheap_argon(16))), "argon2", 8);
    let record = weak.hash(b"pw").unwrap();

    let current = engine_with(Registry::new().register(Box::new(cheap_argon(32))), "argon2", 10);
    assert!(current.verify_hash(&record, b"pw").unwrap());
    assert!(!current.needs_rehash(&record).unwrap());
}

#[test]
fn rehash_requires_all_three_conditions() {
    let current = || {
        let registry = Registry::new()
            .register(Box::new(cheap_argon(32)))
            .register(legacy(32));
        engine_with(registry, "argon2", 10)
    };
    let old = |salt_size: usize, hash_size: u32| {
        engine_with(Registry::new().register(legacy(hash_size)), "legacy", salt_size)
            .hash(b"pw")
            .unwrap()
    };

    let e = current();
    assert!(e.needs_rehash(&old(8, 16)).unwrap());
    // Salt already long enough.
    assert!(!e.needs_rehash(&old(10, 16)).unwrap());
    // Key already at the default length.
    assert!(!e.needs_rehash(&old(8, 32)).unwrap());
    // Still verifies under the new engine.
    assert!(e.verify_hash(&old(8, 16), b"pw").unwrap());
}

#[test]
fn engine_is_shareable_across_threads() {
    let e = Arc::new(engine());
    let records: Vec<String> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let e = Arc::clone(&e);
                s.spawn(move || {
                    let pw = format!("password-{i}");
                    let record = e.hash(pw.as_bytes()).unwrap();
                    assert!(e.verify_hash(&record, pw.as_bytes()).unwrap());
                    record
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(!e.verify_hash(&records[0], b"password-1").unwrap());
}
