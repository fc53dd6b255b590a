//! Bundle identifier: keccak256 over the concatenated transaction hashes.

use alloy::primitives::{Keccak256, B256};

/// Incremental hasher fed one transaction hash per processed transaction.
#[derive(Clone, Default)]
pub struct BundleHasher {
    hasher: Keccak256,
    len: usize,
}

impl BundleHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tx_hash: &B256) {
        self.hasher.update(tx_hash);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finish(self) -> B256 {
        self.hasher.finalize()
    }
}

/// One-shot form of [`BundleHasher`].
pub fn bundle_hash<'a>(tx_hashes: impl IntoIterator<Item = &'a B256>) -> B256 {
    let mut hasher = BundleHasher::new();
    for hash in tx_hashes {
        hasher.push(hash);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;

    #[test]
    fn test_matches_keccak_of_concatenation() {
        let a = B256::repeat_byte(0x11);
        let b = B256::repeat_byte(0x22);
        let mut joined = Vec::new();
        joined.extend_from_slice(a.as_slice());
        joined.extend_from_slice(b.as_slice());

        assert_eq!(bundle_hash([&a, &b]), keccak256(&joined));
    }

    #[test]
    fn test_order_matters() {
        let a = B256::repeat_byte(0x11);
        let b = B256::repeat_byte(0x22);
        assert_ne!(bundle_hash([&a, &b]), bundle_hash([&b, &a]));
    }

    #[test]
    fn test_hex_rendering() {
        let hash = bundle_hash([&B256::ZERO]);
        let rendered = hash.to_string();
        assert!(rendered.starts_with("0x"));
        assert_eq!(rendered.len(), 66);
    }
}
