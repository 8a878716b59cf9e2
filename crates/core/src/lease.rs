//! Exclusive, TTL-bounded claims on named resources (sync jobs, conversations under review).
//!
//! A successful claim hands back a secret token. Only the holder of that token can release the
//! claim; owners can be swept in bulk after a crash.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const TOKEN_LEN: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimToken {
    pub key: String,
    pub owner: String,
    pub secret: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
struct Lease {
    owner: String,
    tag: Vec<u8>,
    expires_at: DateTime<Utc>,
}

pub struct ClaimRegistry {
    signing_key: Vec<u8>,
    leases: Mutex<HashMap<String, Lease>>,
}

impl Default for ClaimRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimRegistry {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let signing_key = (0..32).map(|_| rng.gen::<u8>()).collect();
        Self { signing_key, leases: Mutex::new(HashMap::new()) }
    }

    pub fn claim(&self, key: &str, owner: &str, ttl: Duration) -> Option<ClaimToken> {
        self.claim_at(key, owner, ttl, Utc::now())
    }

    /// Set-if-not-exists. Expired leases are replaced.
    pub fn claim_at(
        &self,
        key: &str,
        owner: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Option<ClaimToken> {
        let secret = generate_token();
        let tag = self.tag(key, &secret)?;
        let expires_at = now + ttl;

        let mut leases = self.lock();
        if leases.get(key).is_some_and(|lease| lease.expires_at > now) {
            return None;
        }
        leases.insert(key.to_string(), Lease { owner: owner.to_string(), tag, expires_at });

        Some(ClaimToken { key: key.to_string(), owner: owner.to_string(), secret, expires_at })
    }

    /// Releases only when `secret` matches the active claim. Anything else is a no-op.
    pub fn release(&self, key: &str, secret: &str) -> bool {
        let mut leases = self.lock();
        let Some(lease) = leases.get(key) else {
            return false;
        };
        if !self.verify(key, secret, &lease.tag) {
            return false;
        }
        leases.remove(key);
        true
    }

    pub fn force_release(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn release_all_for_owner(&self, owner: &str) -> usize {
        let mut leases = self.lock();
        let before = leases.len();
        leases.retain(|_, lease| lease.owner != owner);
        before - leases.len()
    }

    pub fn holder_at(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        self.lock()
            .get(key)
            .filter(|lease| lease.expires_at > now)
            .map(|lease| lease.owner.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Lease>> {
        match self.leases.lock() {
            Ok(leases) => leases,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn mac(&self, key: &str, secret: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key).ok()?;
        mac.update(key.as_bytes());
        mac.update(b"\0");
        mac.update(secret.as_bytes());
        Some(mac)
    }

    fn tag(&self, key: &str, secret: &str) -> Option<Vec<u8>> {
        self.mac(key, secret).map(|mac| mac.finalize().into_bytes().to_vec())
    }

    // verify_slice compares in constant time.
    fn verify(&self, key: &str, secret: &str, tag: &[u8]) -> bool {
        self.mac(key, secret).map(|mac| mac.verify_slice(tag).is_ok()).unwrap_or(false)
    }
}

fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..TOKEN_CHARSET.len());
            TOKEN_CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::ClaimRegistry;

    #[test]
    fn second_claim_is_refused_while_lease_is_live() {
        let registry = ClaimRegistry::new();
        let now = Utc::now();

        let token = registry.claim_at("catalog-sync:42", "worker-a", Duration::seconds(30), now);
        assert!(token.is_some());
        assert!(registry
            .claim_at("catalog-sync:42", "worker-b", Duration::seconds(30), now)
            .is_none());
        assert_eq!(registry.holder_at("catalog-sync:42", now).as_deref(), Some("worker-a"));
    }

    #[test]
    fn expired_lease_can_be_claimed_again() {
        let registry = ClaimRegistry::new();
        let now = Utc::now();

        registry.claim_at("job", "worker-a", Duration::seconds(5), now).expect("first claim");
        let later = now + Duration::seconds(6);
        let token = registry.claim_at("job", "worker-b", Duration::seconds(5), later).expect("reclaim");

        assert_eq!(token.owner, "worker-b");
        assert_eq!(registry.holder_at("job", later).as_deref(), Some("worker-b"));
    }

    #[test]
    fn release_requires_the_matching_token() {
        let registry = ClaimRegistry::new();
        let token = registry.claim("job", "worker-a", Duration::seconds(30)).expect("claim");

        assert!(!registry.release("job", "not-the-token"));
        assert!(registry.holder_at("job", Utc::now()).is_some());

        assert!(registry.release("job", &token.secret));
        assert!(!registry.release("job", &token.secret));
        assert_eq!(token.secret.len(), 32);
    }

    #[test]
    fn owner_sweep_and_force_release() {
        let registry = ClaimRegistry::new();
        registry.claim("a", "worker-a", Duration::seconds(30)).expect("claim a");
        registry.claim("b", "worker-a", Duration::seconds(30)).expect("claim b");
        registry.claim("c", "worker-b", Duration::seconds(30)).expect("claim c");

        assert_eq!(registry.release_all_for_owner("worker-a"), 2);
        assert!(registry.force_release("c"));
        assert!(!registry.force_release("c"));
    }
}
