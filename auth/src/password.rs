use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use vaultvoice_kv::{KVStore, WriteOp, encode_record, get_record};

use crate::AuthError;

/// Key prefix under which password credentials are stored.
pub const CREDENTIAL_PREFIX: &str = "auth:credential:";

/// Characters that satisfy [`PasswordPolicy::require_symbol`].
pub const SYMBOLS: &str = "!@#$%^&*(),.?\":{}|<>";

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const DEFAULT_ROUNDS: u32 = 10_000;

/// Returns the KV key holding `user_id`'s credential.
pub fn credential_key(user_id: &str) -> String {
    format!("{CREDENTIAL_PREFIX}{user_id}")
}

/// Complexity rule applied at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    /// Minimum length in characters (default: 8).
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_digit: bool,
    /// Require one of [`SYMBOLS`].
    pub require_symbol: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_digit: true,
            require_symbol: true,
        }
    }
}

impl PasswordPolicy {
    pub fn check(&self, password: &str) -> Result<(), AuthError> {
        let weak = |msg: String| Err(AuthError::WeakPassword(msg));
        if password.chars().count() < self.min_length {
            return weak(format!("must be at least {} characters", self.min_length));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return weak("must contain an uppercase letter".into());
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return weak("must contain a digit".into());
        }
        if self.require_symbol && !password.chars().any(|c| SYMBOLS.contains(c)) {
            return weak(format!("must contain one of {SYMBOLS}"));
        }
        Ok(())
    }
}

/// A salted PBKDF2-HMAC-SHA256 password digest. The plaintext is never
/// stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: String,
    /// Hex-encoded salt.
    pub salt: String,
    /// Hex-encoded digest.
    pub digest: String,
    /// PBKDF2 iteration count.
    pub rounds: u32,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    /// Hashes `password` under a fresh random salt.
    pub fn new(user_id: &str, password: &str) -> Result<Self, AuthError> {
        let mut salt = [0u8; SALT_LEN];
        getrandom::fill(&mut salt).map_err(|e| AuthError::Random(e.to_string()))?;
        Ok(Self {
            user_id: user_id.to_string(),
            salt: hex::encode(salt),
            digest: hex::encode(digest(&salt, password, DEFAULT_ROUNDS)),
            rounds: DEFAULT_ROUNDS,
            created_at: Utc::now(),
        })
    }

    /// Checks `password` against the stored digest in constant time.
    pub fn matches(&self, password: &str) -> Result<bool, AuthError> {
        let corrupt = |_| AuthError::CorruptCredential(self.user_id.clone());
        let salt = hex::decode(&self.salt).map_err(corrupt)?;
        let want = hex::decode(&self.digest).map_err(corrupt)?;
        let got = digest(&salt, password, self.rounds);
        Ok(bool::from(want.as_slice().ct_eq(got.as_slice())))
    }
}

fn digest(salt: &[u8], password: &str, rounds: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut key);
    key
}

/// Password credentials persisted in a [`KVStore`].
#[derive(Debug, Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KVStore>,
    policy: PasswordPolicy,
    registering: Arc<Mutex<()>>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KVStore>, policy: PasswordPolicy) -> Self {
        Self {
            kv,
            policy,
            registering: Arc::new(Mutex::new(())),
        }
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// Stores a credential for a new user after checking the policy.
    ///
    /// The existence check and the write happen under one lock shared by
    /// every clone of this store, so concurrent registrations of the same
    /// user leave exactly one credential.
    pub fn register(&self, user_id: &str, password: &str) -> Result<(), AuthError> {
        self.policy.check(password)?;
        let cred = Credential::new(user_id, password)?;
        let _guard = self.registering.lock();
        if self.exists(user_id)? {
            return Err(AuthError::UserExists(user_id.to_string()));
        }
        self.kv.set(&credential_key(user_id), &encode_record(&cred)?)?;
        tracing::info!(user = %user_id, "auth: credential registered");
        Ok(())
    }

    /// Returns false for an unknown user or a wrong password.
    pub fn verify(&self, user_id: &str, password: &str) -> Result<bool, AuthError> {
        match get_record::<Credential>(self.kv.as_ref(), &credential_key(user_id))? {
            Some(cred) => cred.matches(password),
            None => Ok(false),
        }
    }

    pub fn exists(&self, user_id: &str) -> Result<bool, AuthError> {
        Ok(self.kv.get(&credential_key(user_id))?.is_some())
    }

    /// Removes the credential. Removing a missing one is a no-op.
    pub fn delete(&self, user_id: &str) -> Result<(), AuthError> {
        self.kv.apply(&[self.delete_op(user_id)])?;
        Ok(())
    }

    /// The write that removes `user_id`'s credential, for use in a larger
    /// atomic batch.
    pub fn delete_op(&self, user_id: &str) -> WriteOp {
        WriteOp::delete(credential_key(user_id))
    }

    pub fn list(&self) -> Result<BTreeSet<String>, AuthError> {
        Ok(self
            .kv
            .keys(CREDENTIAL_PREFIX)?
            .into_iter()
            .filter_map(|k| k.strip_prefix(CREDENTIAL_PREFIX).map(str::to_owned))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultvoice_kv::MemoryStore;

    fn store() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryStore::new()), PasswordPolicy::default())
    }

    #[test]
    fn policy_rules() {
        let p = PasswordPolicy::default();
        assert!(p.check("Secret#123").is_ok());
        assert!(matches!(p.check("S#1a"), Err(AuthError::WeakPassword(_))));
        assert!(p.check("secret#123").is_err());
        assert!(p.check("Secret#abc").is_err());
        assert!(p.check("Secret1234").is_err());
    }

    #[test]
    fn relaxed_policy() {
        let p = PasswordPolicy {
            min_length: 4,
            require_uppercase: false,
            require_digit: false,
            require_symbol: false,
        };
        assert!(p.check("abcd").is_ok());
        assert!(p.check("abc").is_err());
    }

    #[test]
    fn register_and_verify() {
        let s = store();
        s.register("alice", "Secret#123").unwrap();
        assert!(s.verify("alice", "Secret#123").unwrap());
        assert!(!s.verify("alice", "Secret#124").unwrap());
        assert!(!s.verify("bob", "Secret#123").unwrap());
    }

    #[test]
    fn duplicate_registration_fails() {
        let s = store();
        s.register("alice", "Secret#123").unwrap();
        assert!(matches!(
            s.register("alice", "Other#456x"),
            Err(AuthError::UserExists(_))
        ));
        assert!(s.verify("alice", "Secret#123").unwrap());
    }

    #[test]
    fn plaintext_is_not_stored() {
        let kv = Arc::new(MemoryStore::new());
        let s = CredentialStore::new(kv.clone(), PasswordPolicy::default());
        s.register("alice", "Secret#123").unwrap();
        let raw = kv.get(&credential_key("alice")).unwrap().unwrap();
        let needle = b"Secret#123";
        assert!(!raw.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn salts_differ_per_credential() {
        let a = Credential::new("alice", "Secret#123").unwrap();
        let b = Credential::new("alice", "Secret#123").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.digest, b.digest);
        assert!(a.matches("Secret#123").unwrap());
        assert!(b.matches("Secret#123").unwrap());
    }

    #[test]
    fn corrupt_credential_is_an_error() {
        let mut c = Credential::new("alice", "Secret#123").unwrap();
        c.salt = "not hex".into();
        assert!(matches!(
            c.matches("Secret#123"),
            Err(AuthError::CorruptCredential(_))
        ));
    }

    #[test]
    fn delete_and_list() {
        let s = store();
        s.register("bob", "Secret#123").unwrap();
        s.register("alice", "Secret#123").unwrap();
        assert_eq!(
            s.list().unwrap().into_iter().collect::<Vec<_>>(),
            vec!["alice".to_string(), "bob".to_string()]
        );
        s.delete("alice").unwrap();
        s.delete("alice").unwrap();
        assert!(!s.exists("alice").unwrap());
        assert!(!s.verify("alice", "Secret#123").unwrap());
    }

    #[test]
    fn digest_is_pbkdf2_hmac_sha256() {
        // RFC 7914 section 11, first 32 bytes.
        assert_eq!(
            hex::encode(digest(b"salt", "passwd", 1)),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[test]
    fn stored_rounds_are_honoured() {
        let mut c = Credential::new("alice", "Secret#123").unwrap();
        let salt = hex::decode(&c.salt).unwrap();
        c.rounds = 3;
        c.digest = hex::encode(digest(&salt, "Secret#123", 3));
        assert!(c.matches("Secret#123").unwrap());
        c.rounds = 4;
        assert!(!c.matches("Secret#123").unwrap());
    }

    #[test]
    fn truncated_digest_never_matches() {
        let mut c = Credential::new("alice", "Secret#123").unwrap();
        c.digest.truncate(32);
        assert!(!c.matches("Secret#123").unwrap());
    }

    #[test]
    fn concurrent_registration_keeps_one_credential() {
        let s = store();
        let passwords: Vec<String> = (0..8).map(|i| format!("Secret#12{i}")).collect();
        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = passwords
                .iter()
                .map(|p| {
                    let s = s.clone();
                    scope.spawn(move || s.register("alice", p))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners: Vec<&String> = passwords
            .iter()
            .zip(&results)
            .filter(|(_, r)| r.is_ok())
            .map(|(p, _)| p)
            .collect();
        assert_eq!(winners.len(), 1);
        assert!(
            results
                .iter()
                .filter(|r| r.is_err())
                .all(|r| matches!(r, Err(AuthError::UserExists(_))))
        );
        assert!(s.verify("alice", winners[0]).unwrap());
    }
}
