//! Round-robin partitioning of a dataset into per-worker shards.

use crate::row::Row;

/// Rows assigned to one worker, in their original relative order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    index: usize,
    rows: Vec<Row>,
}

impl Shard {
    /// Position of this shard among its siblings.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Rows of this shard.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the shard holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Split `rows` into exactly `worker_count` shards; row `i` lands in shard
/// `i % worker_count`.
///
/// When `worker_count` exceeds the number of rows the trailing shards are
/// empty.
///
/// # Panics
///
/// Panics if `worker_count` is zero.
pub fn partition(rows: Vec<Row>, worker_count: usize) -> Vec<Shard> {
    assert!(worker_count > 0, "worker_count must be positive");
    let per_shard = rows.len().div_ceil(worker_count);
    let mut shards: Vec<Shard> = (0..worker_count)
        .map(|index| Shard {
            index,
            rows: Vec::with_capacity(per_shard),
        })
        .collect();
    for (i, row) in rows.into_iter().enumerate() {
        shards[i % worker_count].rows.push(row);
    }
    shards
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::row::{generate, generate_with_rng};

    #[test]
    fn shards_cover_dataset_exactly_once() {
        for (count, workers) in [(0, 1), (1, 1), (10, 3), (1000, 4), (7, 7), (997, 16)] {
            let rows = generate(count);
            let expected: HashSet<Row> = rows.iter().cloned().collect();
            let shards = partition(rows, workers);

            assert_eq!(shards.len(), workers);
            assert_eq!(shards.iter().map(Shard::len).sum::<usize>(), count);
            let seen: HashSet<Row> = shards.iter().flat_map(|s| s.rows().to_vec()).collect();
            assert_eq!(seen, expected);
        }
    }

    #[test]
    fn assignment_is_round_robin_and_ordered() {
        let rows = generate(10);
        let shards = partition(rows.clone(), 3);
        assert_eq!(
            shards[0].rows(),
            &[rows[0].clone(), rows[3].clone(), rows[6].clone(), rows[9].clone()]
        );
        assert_eq!(shards[1].rows(), &[rows[1].clone(), rows[4].clone(), rows[7].clone()]);
        assert_eq!(shards[2].rows(), &[rows[2].clone(), rows[5].clone(), rows[8].clone()]);
        for (i, shard) in shards.iter().enumerate() {
            assert_eq!(shard.index(), i);
        }
    }

    #[test]
    fn partitioning_is_deterministic() {
        let rows = generate_with_rng(50, "x", &mut fastrand::Rng::with_seed(9));
        assert_eq!(partition(rows.clone(), 6), partition(rows, 6));
    }

    #[test]
    fn more_workers_than_rows_leaves_trailing_shards_empty() {
        let shards = partition(generate(3), 5);
        let sizes: Vec<usize> = shards.iter().map(Shard::len).collect();
        assert_eq!(sizes, vec![1, 1, 1, 0, 0]);
        assert!(shards[4].is_empty());
    }

    #[test]
    fn even_split_for_divisible_counts() {
        let shards = partition(generate(1000), 4);
        assert!(shards.iter().all(|s| s.len() == 250));
    }
}
