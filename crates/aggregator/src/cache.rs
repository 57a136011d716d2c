//! LRU cache of verified signatures, keyed by job fingerprint.

use crosslink_types::{BlsSignature, SubnetId};
use parking_lot::RwLock;
use quick_cache::sync::Cache;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

/// Cache key: hash of the message bytes, justification, signing subnet, and
/// quorum numerator.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute the fingerprint of an aggregation job.
    pub fn new(
        message_bytes: &[u8],
        justification: Option<&[u8]>,
        signing_subnet: SubnetId,
        quorum_numerator: u64,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(message_bytes);
        hasher.update(justification.unwrap_or_default());
        hasher.update(signing_subnet.as_bytes());
        hasher.update(&quorum_numerator.to_be_bytes());
        Self(*hasher.finalize().as_bytes())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Fingerprint({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Signatures gathered so far for one fingerprint, by canonical validator
/// index. Grows monotonically across jobs with the same fingerprint.
type SignatureMap = Arc<RwLock<BTreeMap<usize, BlsSignature>>>;

/// A write that disagrees with an already-cached signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("conflicting cached signature for validator index {index}")]
pub struct CacheConflict {
    /// Canonical validator index with the conflicting entry.
    pub index: usize,
}

/// Bounded, thread-safe mapping from fingerprint to gathered signatures.
///
/// Eviction is LRU by fingerprint. A running job keeps its own entry's map
/// alive through the shared handle even if the fingerprint is evicted, so
/// eviction never disturbs a job in flight.
pub struct SignatureCache {
    entries: Cache<Fingerprint, SignatureMap>,
}

impl SignatureCache {
    /// Create a cache retaining at most `capacity` fingerprints.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Cache::new(capacity),
        }
    }

    /// Snapshot the signatures gathered for a fingerprint, if any.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<BTreeMap<usize, BlsSignature>> {
        self.entries
            .get(fingerprint)
            .map(|signatures| signatures.read().clone())
    }

    /// Record a verified signature for `(fingerprint, index)`.
    ///
    /// Re-inserting the same signature is a no-op; a different signature for
    /// an already-populated index is rejected.
    pub fn insert(
        &self,
        fingerprint: Fingerprint,
        index: usize,
        signature: BlsSignature,
    ) -> Result<(), CacheConflict> {
        let entry = self
            .entries
            .get_or_insert_with(&fingerprint, || -> Result<SignatureMap, Infallible> {
                Ok(Arc::new(RwLock::new(BTreeMap::new())))
            });
        let entry = match entry {
            Ok(entry) => entry,
            Err(never) => match never {},
        };

        let mut signatures = entry.write();
        match signatures.get(&index) {
            Some(existing) if *existing != signature => Err(CacheConflict { index }),
            Some(_) => Ok(()),
            None => {
                signatures.insert(index, signature);
                Ok(())
            }
        }
    }

    /// Number of fingerprints currently retained.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosslink_types::bls_keypair_from_seed;

    fn fingerprint(tag: u8) -> Fingerprint {
        Fingerprint::new(&[tag], None, SubnetId::PRIMARY, 67)
    }

    fn signature(seed: u8) -> BlsSignature {
        bls_keypair_from_seed(&[seed; 32]).sign(b"message")
    }

    #[test]
    fn test_insert_then_get() {
        let cache = SignatureCache::new(8);
        let fp = fingerprint(1);

        cache.insert(fp, 0, signature(1)).unwrap();
        cache.insert(fp, 2, signature(2)).unwrap();

        let snapshot = cache.get(&fp).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&0], signature(1));
        assert_eq!(snapshot[&2], signature(2));
    }

    #[test]
    fn test_insert_is_idempotent() {
        let cache = SignatureCache::new(8);
        let fp = fingerprint(1);

        cache.insert(fp, 0, signature(1)).unwrap();
        cache.insert(fp, 0, signature(1)).unwrap();
        assert_eq!(cache.get(&fp).unwrap().len(), 1);
    }

    #[test]
    fn test_conflicting_insert_rejected() {
        let cache = SignatureCache::new(8);
        let fp = fingerprint(1);

        cache.insert(fp, 0, signature(1)).unwrap();
        assert_eq!(
            cache.insert(fp, 0, signature(2)),
            Err(CacheConflict { index: 0 })
        );
        // Original survives.
        assert_eq!(cache.get(&fp).unwrap()[&0], signature(1));
    }

    #[test]
    fn test_capacity_bound() {
        let cache = SignatureCache::new(2);
        for tag in 0..10u8 {
            cache.insert(fingerprint(tag), 0, signature(1)).unwrap();
        }
        assert!(cache.len() <= 2);
    }

    #[test]
    fn test_fingerprint_sensitivity() {
        let base = Fingerprint::new(b"msg", None, SubnetId::PRIMARY, 67);
        assert_ne!(base, Fingerprint::new(b"other", None, SubnetId::PRIMARY, 67));
        assert_ne!(
            base,
            Fingerprint::new(b"msg", Some(b"just"), SubnetId::PRIMARY, 67)
        );
        assert_ne!(
            base,
            Fingerprint::new(b"msg", None, SubnetId::from_bytes([1; 32]), 67)
        );
        assert_ne!(base, Fingerprint::new(b"msg", None, SubnetId::PRIMARY, 80));
        assert_eq!(base, Fingerprint::new(b"msg", None, SubnetId::PRIMARY, 67));
    }
}
