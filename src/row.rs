//! Synthetic dataset generation.

/// Length of every generated key, in bytes.
pub const KEY_LEN: usize = 32;

/// Payload prefix used when none is configured.
pub const DEFAULT_PAYLOAD_PREFIX: &str = "Test performance data";

/// One generated row. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row {
    key: [u8; KEY_LEN],
    payload: String,
}

impl Row {
    /// Build a row from its parts.
    pub fn new(key: [u8; KEY_LEN], payload: String) -> Self {
        Self { key, payload }
    }

    /// Random key bytes.
    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// Human-readable payload.
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// Payload text for the row at `index`.
pub fn payload_for(prefix: &str, index: usize) -> String {
    format!("{prefix} {index}")
}

/// Generate `count` rows with fresh random keys.
///
/// Keys are 256 independent random bits; collisions are not checked.
pub fn generate(count: usize) -> Vec<Row> {
    generate_with_rng(count, DEFAULT_PAYLOAD_PREFIX, &mut fastrand::Rng::new())
}

/// Generate `count` rows drawing key bytes from `rng`.
pub fn generate_with_rng(count: usize, prefix: &str, rng: &mut fastrand::Rng) -> Vec<Row> {
    (0..count)
        .map(|index| {
            let mut key = [0u8; KEY_LEN];
            rng.fill(&mut key);
            Row::new(key, payload_for(prefix, index))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn generates_exact_count_with_indexed_payloads() {
        let rows = generate(1000);
        assert_eq!(rows.len(), 1000);
        assert_eq!(rows[0].payload(), "Test performance data 0");
        assert_eq!(rows[999].payload(), "Test performance data 999");

        let keys: HashSet<_> = rows.iter().map(|row| *row.key()).collect();
        assert_eq!(keys.len(), 1000);
    }

    #[test]
    fn zero_count_is_empty() {
        assert!(generate(0).is_empty());
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let a = generate_with_rng(64, "p", &mut fastrand::Rng::with_seed(3));
        let b = generate_with_rng(64, "p", &mut fastrand::Rng::with_seed(3));
        let c = generate_with_rng(64, "p", &mut fastrand::Rng::with_seed(4));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a[5].payload(), "p 5");
    }
}
