//! Password hashing with Argon2id
//!
//! Hashes are PHC strings:
//! `$argon2id$v=19$m=<memory KiB>,t=<passes>,p=<lanes>$<salt>$<key>`
//! (standard base64, no padding). Verification reads the cost parameters
//! back out of the string, so raising the defaults never breaks old hashes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use argon2::{
    password_hash::{
        Error as PhcError, Output, PasswordHash, PasswordHasher, PasswordVerifier, Salt, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use going_shared::config::HashingSettings;
use going_shared::constants::{
    DEFAULT_HASH_KEY_LENGTH, DEFAULT_HASH_MEMORY_KIB, DEFAULT_HASH_PARALLELISM,
    DEFAULT_HASH_SALT_LENGTH, DEFAULT_HASH_TIME_COST, MAX_HASH_MEMORY_KIB, MAX_HASH_PARALLELISM,
    MAX_HASH_TIME_COST,
};
use thiserror::Error;

use crate::entropy::{EntropySource, OsEntropy};

pub const ALGORITHM_TAG: &str = "argon2id";
pub const ARGON2_VERSION: u32 = 0x13;

const SEGMENT_COUNT: usize = 6;
const MIN_SALT_LENGTH: usize = 8;
/// Longest salt a PHC salt field can carry.
const MAX_SALT_LENGTH: usize = Salt::MAX_LENGTH * 3 / 4;
const DECOY_PASSWORD: &str = "going:decoy";

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("invalid hash format")]
    InvalidHashFormat,
    #[error("incompatible argon2 version {found} (expected {expected})")]
    IncompatibleVersion { found: u32, expected: u32 },
    #[error("failed to generate salt: {0}")]
    RandomSourceFailure(String),
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("invalid hash parameters: {0}")]
    InvalidParams(String),
    #[error("hash error: {0}")]
    HashError(String),
}

/// Argon2id cost parameters plus the salt and key sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub time_cost: u32,
    /// Number of lanes.
    pub parallelism: u32,
    pub key_length: usize,
    pub salt_length: usize,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_HASH_MEMORY_KIB,
            time_cost: DEFAULT_HASH_TIME_COST,
            parallelism: DEFAULT_HASH_PARALLELISM,
            key_length: DEFAULT_HASH_KEY_LENGTH,
            salt_length: DEFAULT_HASH_SALT_LENGTH,
        }
    }
}

impl From<&HashingSettings> for HashParams {
    fn from(settings: &HashingSettings) -> Self {
        Self {
            memory_kib: settings.memory_kib,
            time_cost: settings.time_cost,
            parallelism: settings.parallelism,
            key_length: settings.key_length,
            salt_length: settings.salt_length,
        }
    }
}

impl HashParams {
    fn argon2(&self) -> Result<Argon2<'static>, argon2::Error> {
        let params = Params::new(
            self.memory_kib,
            self.time_cost,
            self.parallelism,
            Some(self.key_length),
        )?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn validate(&self) -> Result<(), PasswordError> {
        self.check_bounds().map_err(PasswordError::InvalidParams)?;
        self.argon2()
            .map(|_| ())
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))
    }

    /// Limits on top of Argon2's own: PHC field sizes and cost ceilings.
    fn check_bounds(&self) -> Result<(), String> {
        if !(MIN_SALT_LENGTH..=MAX_SALT_LENGTH).contains(&self.salt_length) {
            return Err(format!(
                "salt length {} outside {}..={}",
                self.salt_length, MIN_SALT_LENGTH, MAX_SALT_LENGTH
            ));
        }
        if !(Output::MIN_LENGTH..=Output::MAX_LENGTH).contains(&self.key_length) {
            return Err(format!(
                "key length {} outside {}..={}",
                self.key_length,
                Output::MIN_LENGTH,
                Output::MAX_LENGTH
            ));
        }
        if self.memory_kib > MAX_HASH_MEMORY_KIB {
            return Err(format!("memory cost {} KiB above {}", self.memory_kib, MAX_HASH_MEMORY_KIB));
        }
        if self.time_cost > MAX_HASH_TIME_COST {
            return Err(format!("time cost {} above {}", self.time_cost, MAX_HASH_TIME_COST));
        }
        if self.parallelism > MAX_HASH_PARALLELISM {
            return Err(format!("parallelism {} above {}", self.parallelism, MAX_HASH_PARALLELISM));
        }
        Ok(())
    }
}

/// `PasswordHash::new` accepts any PHC string. On top of it: exactly six
/// segments, the `argon2id` tag, version 19 reported on its own, and cost
/// fields in `m,t,p` order.
fn parse_strict(encoded: &str) -> Result<PasswordHash<'_>, PasswordError> {
    let parts: Vec<&str> = encoded.split('$').collect();
    if parts.len() != SEGMENT_COUNT || !parts[0].is_empty() || parts[1] != ALGORITHM_TAG {
        return Err(PasswordError::InvalidHashFormat);
    }

    let version: u32 = parts[2]
        .strip_prefix("v=")
        .and_then(|v| v.parse().ok())
        .ok_or(PasswordError::InvalidHashFormat)?;
    if version != ARGON2_VERSION {
        return Err(PasswordError::IncompatibleVersion {
            found: version,
            expected: ARGON2_VERSION,
        });
    }

    let names: Vec<&str> = parts[3]
        .split(',')
        .map(|field| field.split_once('=').map_or("", |(name, _)| name))
        .collect();
    if names != ["m", "t", "p"] {
        return Err(PasswordError::InvalidHashFormat);
    }

    PasswordHash::new(encoded).map_err(|_| PasswordError::InvalidHashFormat)
}

/// Parameters a parsed hash asks for. Out-of-bounds costs are a format
/// error, checked before anything is derived.
fn embedded_params(hash: &PasswordHash<'_>) -> Result<HashParams, PasswordError> {
    let params = Params::try_from(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    let salt = hash.salt.as_ref().ok_or(PasswordError::InvalidHashFormat)?;
    let mut buf = [0u8; Salt::MAX_LENGTH];
    let salt_length = salt
        .decode_b64(&mut buf)
        .map_err(|_| PasswordError::InvalidHashFormat)?
        .len();
    let key_length = hash
        .hash
        .as_ref()
        .map(Output::len)
        .ok_or(PasswordError::InvalidHashFormat)?;

    let embedded = HashParams {
        memory_kib: params.m_cost(),
        time_cost: params.t_cost(),
        parallelism: params.p_cost(),
        key_length,
        salt_length,
    };
    embedded
        .check_bounds()
        .map_err(|_| PasswordError::InvalidHashFormat)?;
    Ok(embedded)
}

/// Hashes with the configured parameters and verifies against any
/// well-formed Argon2id v19 string.
pub struct PasswordService {
    params: HashParams,
    entropy: Arc<dyn EntropySource>,
    /// Hash of no real password under `params`; stands in for unknown accounts.
    decoy: String,
    verifications: AtomicU64,
}

impl fmt::Debug for PasswordService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordService")
            .field("params", &self.params)
            .field("verifications", &self.verifications())
            .finish_non_exhaustive()
    }
}

impl PasswordService {
    /// Validates `params` and derives the decoy hash, so this costs one full hash.
    pub fn new(params: HashParams) -> Result<Self, PasswordError> {
        params.validate()?;
        let decoy = hash_with_salt(&params, DECOY_PASSWORD, &vec![0u8; params.salt_length])?;
        Ok(Self {
            params,
            entropy: Arc::new(OsEntropy),
            decoy,
            verifications: AtomicU64::new(0),
        })
    }

    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    pub fn params(&self) -> &HashParams {
        &self.params
    }

    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        if password.is_empty() {
            return Err(PasswordError::EmptyPassword);
        }

        let mut salt = vec![0u8; self.params.salt_length];
        self.entropy
            .try_fill(&mut salt)
            .map_err(|e| PasswordError::RandomSourceFailure(e.to_string()))?;

        hash_with_salt(&self.params, password, &salt)
    }

    /// Mismatch is `Ok(false)`; only malformed or unsupported hashes are errors.
    pub fn verify(password: &str, encoded: &str) -> Result<bool, PasswordError> {
        let hash = parse_strict(encoded)?;
        embedded_params(&hash)?;

        // Re-derives with the embedded parameters; `Output` compares in constant time.
        match Argon2::default().verify_password(password.as_bytes(), &hash) {
            Ok(()) => Ok(true),
            Err(PhcError::Password) => Ok(false),
            Err(_) => Err(PasswordError::InvalidHashFormat),
        }
    }

    /// Login check. With no stored hash the password is still run against
    /// the decoy and the result is always `false`, so an unknown account
    /// costs the same derive as a wrong password.
    pub fn check(&self, password: &str, stored: Option<&str>) -> Result<bool, PasswordError> {
        self.verifications.fetch_add(1, Ordering::Relaxed);
        match stored {
            Some(encoded) => Self::verify(password, encoded),
            None => Self::verify(password, &self.decoy).map(|_| false),
        }
    }

    /// Number of `check` calls so far.
    pub fn verifications(&self) -> u64 {
        self.verifications.load(Ordering::Relaxed)
    }

    /// True when `encoded` was produced under different parameters than the
    /// ones this service hashes with now.
    pub fn needs_rehash(&self, encoded: &str) -> Result<bool, PasswordError> {
        let hash = parse_strict(encoded)?;
        Ok(embedded_params(&hash)? != self.params)
    }
}

fn hash_with_salt(params: &HashParams, password: &str, salt: &[u8]) -> Result<String, PasswordError> {
    let argon2 = params
        .argon2()
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
    let salt = SaltString::encode_b64(salt).map_err(|e| PasswordError::HashError(e.to_string()))?;
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::{EntropyError, MockEntropySource};
    use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

    fn fast_params() -> HashParams {
        HashParams {
            memory_kib: 64,
            time_cost: 1,
            parallelism: 1,
            key_length: 32,
            salt_length: 16,
        }
    }

    fn fast_service() -> PasswordService {
        PasswordService::new(fast_params()).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let service = fast_service();
        let hash = service.hash("correct-password").unwrap();

        assert!(PasswordService::verify("correct-password", &hash).unwrap());
        assert!(!PasswordService::verify("wrong-password", &hash).unwrap());
    }

    #[test]
    fn test_hash_layout() {
        let hash = fast_service().hash("hunter22").unwrap();
        let parts: Vec<&str> = hash.split('$').collect();

        assert_eq!(parts.len(), 6);
        assert_eq!(parts[0], "");
        assert_eq!(parts[1], "argon2id");
        assert_eq!(parts[2], "v=19");
        assert_eq!(parts[3], "m=64,t=1,p=1");
        assert_eq!(STANDARD_NO_PAD.decode(parts[4]).unwrap().len(), 16);
        assert_eq!(STANDARD_NO_PAD.decode(parts[5]).unwrap().len(), 32);
        assert!(!parts[4].contains('=') && !parts[5].contains('='));
    }

    #[test]
    fn test_default_params_encoding() {
        let hash = PasswordService::new(HashParams::default())
            .unwrap()
            .hash("correct-password")
            .unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=65536,t=3,p=4$"));
        assert!(PasswordService::verify("correct-password", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let service = fast_service();
        let first = service.hash("same-password").unwrap();
        let second = service.hash("same-password").unwrap();

        assert_ne!(first, second);
        assert!(PasswordService::verify("same-password", &first).unwrap());
        assert!(PasswordService::verify("same-password", &second).unwrap());
    }

    #[test]
    fn test_long_password_not_truncated() {
        let service = fast_service();
        let long = "x".repeat(4096);
        let hash = service.hash(&long).unwrap();

        assert!(PasswordService::verify(&long, &hash).unwrap());
        assert!(!PasswordService::verify(&long[..4095], &hash).unwrap());
    }

    #[test]
    fn test_verify_uses_embedded_params() {
        let old = PasswordService::new(HashParams {
            memory_kib: 32,
            time_cost: 2,
            parallelism: 2,
            key_length: 24,
            salt_length: 12,
        })
        .unwrap();
        let hash = old.hash("legacy-password").unwrap();

        // A service with different defaults still verifies the old hash.
        let current = fast_service();
        assert!(current.needs_rehash(&hash).unwrap());
        assert!(PasswordService::verify("legacy-password", &hash).unwrap());
    }

    #[test]
    fn test_needs_rehash_false_for_current_params() {
        let service = fast_service();
        let hash = service.hash("fresh-password").unwrap();
        assert!(!service.needs_rehash(&hash).unwrap());
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(matches!(
            fast_service().hash(""),
            Err(PasswordError::EmptyPassword)
        ));
    }

    #[test]
    fn test_segment_count_mismatch() {
        let hash = fast_service().hash("password").unwrap();
        let fewer = hash.rsplit_once('$').unwrap().0.to_string();
        let more = format!("{}$extra", hash);

        assert!(matches!(
            PasswordService::verify("password", &fewer),
            Err(PasswordError::InvalidHashFormat)
        ));
        assert!(matches!(
            PasswordService::verify("password", &more),
            Err(PasswordError::InvalidHashFormat)
        ));
    }

    #[test]
    fn test_wrong_algorithm_tag() {
        let hash = fast_service().hash("password").unwrap();
        let argon2i = hash.replacen("$argon2id$", "$argon2i$", 1);
        assert!(matches!(
            PasswordService::verify("password", &argon2i),
            Err(PasswordError::InvalidHashFormat)
        ));
    }

    #[test]
    fn test_incompatible_version() {
        let hash = fast_service().hash("password").unwrap();
        let v16 = hash.replacen("$v=19$", "$v=16$", 1);
        assert!(matches!(
            PasswordService::verify("password", &v16),
            Err(PasswordError::IncompatibleVersion { found: 16, expected: 19 })
        ));
    }

    #[test]
    fn test_malformed_fields() {
        let hash = fast_service().hash("password").unwrap();
        let cases = [
            hash.replacen("$v=19$", "$v=nineteen$", 1),
            hash.replacen("m=64,t=1,p=1", "t=1,m=64,p=1", 1),
            hash.replacen("m=64,t=1,p=1", "m=64,t=1", 1),
            hash.replacen("m=64,t=1,p=1", "m=64,t=1,p=1,x=2", 1),
            hash.replacen("m=64,t=1,p=1", "m=0,t=1,p=1", 1),
            format!("x{}", hash),
            "$argon2id$v=19$m=64,t=1,p=1$!!!$!!!".to_string(),
            String::new(),
        ];

        for case in cases {
            assert!(
                matches!(
                    PasswordService::verify("password", &case),
                    Err(PasswordError::InvalidHashFormat)
                ),
                "expected InvalidHashFormat for {case:?}"
            );
        }
    }

    #[test]
    fn test_hostile_costs_rejected_before_deriving() {
        let service = fast_service();
        let hash = service.hash("password").unwrap();
        let cases = [
            hash.replacen("m=64,", "m=4294967295,", 1),
            hash.replacen(",t=1,", ",t=4294967295,", 1),
            hash.replacen("m=64,t=1,p=1", "m=65536,t=1,p=1000", 1),
            hash.replacen("m=64,", &format!("m={},", MAX_HASH_MEMORY_KIB + 1), 1),
        ];

        for case in cases {
            assert!(
                matches!(
                    PasswordService::verify("password", &case),
                    Err(PasswordError::InvalidHashFormat)
                ),
                "expected InvalidHashFormat for {case:?}"
            );
            assert!(matches!(
                service.needs_rehash(&case),
                Err(PasswordError::InvalidHashFormat)
            ));
        }
    }

    #[test]
    fn test_check_without_stored_hash_runs_decoy() {
        let service = fast_service();
        let hash = service.hash("password").unwrap();

        assert!(!service.check("password", None).unwrap());
        assert!(!service.check(DECOY_PASSWORD, None).unwrap());
        assert!(service.check("password", Some(&hash)).unwrap());
        assert_eq!(service.verifications(), 3);

        // The decoy costs exactly what a fresh hash does.
        assert!(PasswordService::verify(DECOY_PASSWORD, &service.decoy).unwrap());
        assert!(!service.needs_rehash(&service.decoy).unwrap());
    }

    #[test]
    fn test_padded_base64_rejected() {
        let hash = fast_service().hash("password").unwrap();
        let padded = format!("{}=", hash);
        assert!(matches!(
            PasswordService::verify("password", &padded),
            Err(PasswordError::InvalidHashFormat)
        ));
    }

    #[test]
    fn test_random_source_failure() {
        let mut entropy = MockEntropySource::new();
        entropy
            .expect_try_fill()
            .returning(|_| Err(EntropyError::Unavailable("getrandom failed".into())));
        let service = fast_service().with_entropy(Arc::new(entropy));

        assert!(matches!(
            service.hash("password"),
            Err(PasswordError::RandomSourceFailure(_))
        ));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let short_salt = HashParams {
            salt_length: 4,
            ..fast_params()
        };
        let starved_memory = HashParams {
            memory_kib: 1,
            parallelism: 4,
            ..fast_params()
        };

        assert!(matches!(
            PasswordService::new(short_salt),
            Err(PasswordError::InvalidParams(_))
        ));
        assert!(matches!(
            PasswordService::new(starved_memory),
            Err(PasswordError::InvalidParams(_))
        ));

        let over_limits = [
            HashParams { key_length: 4, ..fast_params() },
            HashParams { salt_length: 64, ..fast_params() },
            HashParams { memory_kib: MAX_HASH_MEMORY_KIB + 1, ..fast_params() },
            HashParams { time_cost: MAX_HASH_TIME_COST + 1, ..fast_params() },
            HashParams {
                parallelism: MAX_HASH_PARALLELISM + 1,
                memory_kib: 8 * 1024,
                ..fast_params()
            },
        ];
        for params in over_limits {
            assert!(
                matches!(PasswordService::new(params), Err(PasswordError::InvalidParams(_))),
                "expected InvalidParams for {params:?}"
            );
        }
    }
}
