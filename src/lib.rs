pub mod algorithm;
pub mod registry;
pub mod random;
pub mod record;
pub mod config;
pub mod audit;

pub use algorithm::{Algorithm, DerivedKey, HashError};
pub use algorithm::argon::{Argon2Hasher, Mode};
pub use config::EngineOptions;
pub use record::{Engine, ParsedRecord};
pub use registry::Registry;
