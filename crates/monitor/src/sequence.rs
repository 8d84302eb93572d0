//! Operations on sorted sequences of update ids.
//!
//! Comparisons look only at the overlapping prefix of their operands:
//! `min(left.len(), right.len())` positions are compared and anything past
//! the shorter sequence is unconstrained. A longer history is therefore
//! never a violation by itself.

use chainwatch_types::{InvariantKind, SentLog, SeqId, Violation};

/// Maximum number of ids the monitor's working buffer may hold.
///
/// Bounds the in-flight window expected from the system under test.
pub const SCRATCH_CAPACITY: usize = 6;

/// Check that a sequence is strictly increasing.
pub fn check_sorted(sequence: &[SeqId]) -> Result<(), Violation> {
    match sequence.windows(2).position(|pair| pair[0] >= pair[1]) {
        Some(index) => Err(Violation::UnsortedSequence {
            sequence: sequence.to_vec(),
            position: index + 1,
        }),
        None => Ok(()),
    }
}

/// Check `left[i] <= right[i]` for every position both sequences have.
pub fn less_or_equal(
    left: &[SeqId],
    right: &[SeqId],
    kind: InvariantKind,
) -> Result<(), Violation> {
    compare_prefix(left, right, kind, |l, r| l <= r)
}

/// Check `left[i] == right[i]` for every position both sequences have.
pub fn equal(left: &[SeqId], right: &[SeqId], kind: InvariantKind) -> Result<(), Violation> {
    compare_prefix(left, right, kind, |l, r| l == r)
}

fn compare_prefix(
    left: &[SeqId],
    right: &[SeqId],
    kind: InvariantKind,
    holds: impl Fn(SeqId, SeqId) -> bool,
) -> Result<(), Violation> {
    let mismatch = left
        .iter()
        .zip(right.iter())
        .position(|(l, r)| !holds(*l, *r));

    match mismatch {
        Some(position) => Err(Violation::InvariantViolated {
            kind,
            left: left.to_vec(),
            right: right.to_vec(),
            position,
        }),
        None => Ok(()),
    }
}

/// Combine a committed prefix with a sequence that is further ahead.
///
/// Keeps the ids of `lower` that precede `upper[0]`, then appends all of
/// `upper`. Ids of `lower` at or past `upper[0]` are superseded and dropped.
/// An empty operand yields the other one unchanged.
pub fn merge(lower: &[SeqId], upper: &[SeqId]) -> Result<Vec<SeqId>, Violation> {
    let merged: Vec<SeqId> = match upper.first() {
        None => lower.to_vec(),
        Some(&first) => lower
            .iter()
            .copied()
            .filter(|id| *id < first)
            .chain(upper.iter().copied())
            .collect(),
    };
    check_sorted(&merged)?;
    Ok(merged)
}

/// Bounded working buffer used for sent-log extraction and merging.
///
/// Refuses to hold more than its capacity; the push that would exceed it
/// fails with [`Violation::ScratchOverflow`].
#[derive(Debug, Clone)]
pub struct ScratchBuffer {
    items: Vec<SeqId>,
    capacity: usize,
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScratchBuffer {
    /// Create a buffer bounded by [`SCRATCH_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(SCRATCH_CAPACITY)
    }

    /// Create a buffer with a custom bound.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of elements.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current contents.
    pub fn as_slice(&self) -> &[SeqId] {
        &self.items
    }

    /// Drop all contents.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Append one id.
    pub fn push(&mut self, id: SeqId) -> Result<(), Violation> {
        if self.items.len() >= self.capacity {
            return Err(Violation::ScratchOverflow {
                capacity: self.capacity,
            });
        }
        self.items.push(id);
        Ok(())
    }

    /// Replace the contents with the ids of a sent log, in log order.
    ///
    /// Fails if the log does not fit or the ids are not strictly increasing.
    pub fn extract(&mut self, sent_log: &[SentLog]) -> Result<&[SeqId], Violation> {
        self.clear();
        for entry in sent_log {
            self.push(entry.next_seq_id)?;
        }
        check_sorted(&self.items)?;
        Ok(&self.items)
    }

    /// Replace the contents with the result of [`merge`].
    ///
    /// The merged sequence must also fit in the buffer.
    pub fn merge(&mut self, lower: &[SeqId], upper: &[SeqId]) -> Result<&[SeqId], Violation> {
        self.clear();
        for id in merge(lower, upper)? {
            self.push(id)?;
        }
        Ok(&self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainwatch_types::test_utils::sent_log;

    #[test]
    fn test_sorted_detection() {
        assert!(check_sorted(&[]).is_ok());
        assert!(check_sorted(&[4]).is_ok());
        assert!(check_sorted(&[1, 3, 5]).is_ok());

        assert_eq!(
            check_sorted(&[1, 3, 3]),
            Err(Violation::UnsortedSequence {
                sequence: vec![1, 3, 3],
                position: 2,
            })
        );
        assert!(matches!(
            check_sorted(&[2, 1]),
            Err(Violation::UnsortedSequence { position: 1, .. })
        ));
    }

    #[test]
    fn test_less_or_equal_prefix_only() {
        let kind = InvariantKind::UpdatePropagation;
        assert!(less_or_equal(&[1, 3], &[1, 3, 5], kind).is_ok());
        assert!(less_or_equal(&[1], &[1, 3], kind).is_ok());
        assert!(less_or_equal(&[], &[1, 3], kind).is_ok());
        // Longer left side is fine as long as the shared prefix holds.
        assert!(less_or_equal(&[1, 3, 9, 12], &[1, 3], kind).is_ok());

        assert_eq!(
            less_or_equal(&[1, 3, 6], &[1, 3, 5], kind),
            Err(Violation::InvariantViolated {
                kind,
                left: vec![1, 3, 6],
                right: vec![1, 3, 5],
                position: 2,
            })
        );
    }

    #[test]
    fn test_equal_prefix_only() {
        let kind = InvariantKind::InProcessRequests;
        assert!(equal(&[1, 3, 5], &[1, 3, 5], kind).is_ok());
        assert!(equal(&[1, 3], &[1, 3, 5], kind).is_ok());
        assert!(equal(&[], &[7], kind).is_ok());

        assert!(matches!(
            equal(&[1, 3, 4], &[1, 3, 5], kind),
            Err(Violation::InvariantViolated { position: 2, .. })
        ));
    }

    #[test]
    fn test_merge_literals() {
        assert_eq!(merge(&[], &[2, 4]).unwrap(), vec![2, 4]);
        assert_eq!(merge(&[2, 4], &[]).unwrap(), vec![2, 4]);
        assert_eq!(merge(&[], &[]).unwrap(), Vec::<SeqId>::new());
        assert_eq!(merge(&[1, 3, 5], &[4, 6]).unwrap(), vec![1, 3, 4, 6]);
        assert_eq!(merge(&[5, 6], &[4, 6]).unwrap(), vec![4, 6]);
        assert_eq!(merge(&[1, 3], &[3, 5]).unwrap(), vec![1, 3, 5]);
    }

    #[test]
    fn test_merge_rejects_unsorted_upper() {
        assert!(matches!(
            merge(&[1], &[4, 2]),
            Err(Violation::UnsortedSequence { .. })
        ));
    }

    #[test]
    fn test_scratch_extract_preserves_log_order() {
        let mut scratch = ScratchBuffer::new();
        assert_eq!(scratch.extract(&sent_log(&[3, 5])).unwrap(), &[3, 5]);

        assert!(matches!(
            scratch.extract(&sent_log(&[5, 3])),
            Err(Violation::UnsortedSequence { position: 1, .. })
        ));
    }

    #[test]
    fn test_scratch_overflow() {
        let mut scratch = ScratchBuffer::new();
        assert!(scratch.extract(&sent_log(&[1, 2, 3, 4, 5, 6])).is_ok());
        assert_eq!(scratch.len(), SCRATCH_CAPACITY);

        assert_eq!(
            scratch.extract(&sent_log(&[1, 2, 3, 4, 5, 6, 7])),
            Err(Violation::ScratchOverflow {
                capacity: SCRATCH_CAPACITY
            })
        );
        assert!(scratch.len() <= SCRATCH_CAPACITY);
    }

    #[test]
    fn test_scratch_merge_matches_unbounded_merge() {
        let mut scratch = ScratchBuffer::new();
        assert_eq!(scratch.merge(&[1, 3, 5], &[4, 6]).unwrap(), &[1, 3, 4, 6]);
        assert_eq!(scratch.merge(&[5, 6], &[4, 6]).unwrap(), &[4, 6]);
        assert_eq!(scratch.merge(&[], &[8]).unwrap(), &[8]);
        assert_eq!(scratch.merge(&[8], &[]).unwrap(), &[8]);
    }

    #[test]
    fn test_scratch_merge_overflow() {
        let mut scratch = ScratchBuffer::new();
        assert!(matches!(
            scratch.merge(&[1, 2, 3, 4], &[5, 6, 7]),
            Err(Violation::ScratchOverflow { .. })
        ));
        // The buffer is reusable after an overflow.
        assert_eq!(scratch.merge(&[1], &[2]).unwrap(), &[1, 2]);
    }
}
