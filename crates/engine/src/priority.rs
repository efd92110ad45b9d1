//! Priority reorganization over one partition's records.
//!
//! Priorities are 1-based and dense: a partition of `N` records holds exactly
//! the priorities `1..=N`. Every function here takes the partition sorted
//! ascending by priority, works on 0-based positions internally, and returns
//! only the records whose priority it changed so callers write the minimal
//! set back.
//!
//! Passing records that are not sorted, or whose priorities are not already
//! dense, is a caller error; debug builds assert the result instead of
//! silently producing gaps.

use rollout_core::Prioritized;

/// Move the record at `old_priority` to `new_priority`.
///
/// Both positions are clamped: anything outside `1..=N` means "the end".
/// Records between the two positions shift by one toward the vacated slot.
/// Returns the contiguous span of changed records in priority order, moved
/// record included, or nothing when the positions are equal.
pub fn reorganize<T>(records: &mut [T], old_priority: u32, new_priority: u32) -> Vec<T>
where
    T: Prioritized + Clone,
{
    let len = records.len();
    if len == 0 {
        return Vec::new();
    }
    let old = clamp_position(old_priority, len);
    let new = clamp_position(new_priority, len);
    if old == new {
        return Vec::new();
    }

    let (lo, hi) = (old.min(new), old.max(new));
    let span = &mut records[lo - 1..hi];
    if old < new {
        span.rotate_left(1);
    } else {
        span.rotate_right(1);
    }
    for (offset, record) in span.iter_mut().enumerate() {
        record.set_priority(to_priority(lo + offset));
    }
    let changed = span.to_vec();
    debug_assert!(is_contiguous(records), "priorities not dense after move");
    changed
}

/// Append `record`, then move it to `requested`.
///
/// `0` or anything past the end appends. The inserted record is always part
/// of the returned set.
pub fn insert<T>(records: &mut Vec<T>, mut record: T, requested: u32) -> Vec<T>
where
    T: Prioritized + Clone,
{
    let appended = to_priority(records.len() + 1);
    record.set_priority(appended);
    records.push(record);
    let changed = reorganize(records, appended, requested);
    if changed.is_empty() {
        records.last().cloned().into_iter().collect()
    } else {
        changed
    }
}

/// Remove the record with `id` and compact the remaining priorities.
///
/// Returns the removed record and every remaining record whose priority
/// changed, or `None` when `id` is not present.
pub fn remove<T>(records: &mut Vec<T>, id: &str) -> Option<(T, Vec<T>)>
where
    T: Prioritized + Clone,
{
    let index = records.iter().position(|r| r.id() == id)?;
    let removed = records.remove(index);
    let changed = compact(records);
    Some((removed, changed))
}

/// Reassign `1, 2, 3, ...` in slice order, returning the records whose
/// priority changed.
pub fn compact<T>(records: &mut [T]) -> Vec<T>
where
    T: Prioritized + Clone,
{
    let mut changed = Vec::new();
    for (index, record) in records.iter_mut().enumerate() {
        let priority = to_priority(index + 1);
        if record.priority() != priority {
            record.set_priority(priority);
            changed.push(record.clone());
        }
    }
    changed
}

/// Current 1-based priority of the record with `id`.
pub fn position_of<T: Prioritized>(records: &[T], id: &str) -> Option<u32> {
    records
        .iter()
        .position(|r| r.id() == id)
        .map(|index| to_priority(index + 1))
}

/// Stable sort ascending by priority.
pub fn sort_by_priority<T: Prioritized>(records: &mut [T]) {
    records.sort_by_key(Prioritized::priority);
}

/// Returns `true` when the priorities are exactly `1..=N`, in any order.
pub fn is_contiguous<T: Prioritized>(records: &[T]) -> bool {
    let mut priorities: Vec<u32> = records.iter().map(Prioritized::priority).collect();
    priorities.sort_unstable();
    priorities
        .iter()
        .enumerate()
        .all(|(index, &priority)| priority == to_priority(index + 1))
}

fn clamp_position(priority: u32, len: usize) -> usize {
    match usize::try_from(priority) {
        Ok(position) if (1..=len).contains(&position) => position,
        _ => len,
    }
}

fn to_priority(position: usize) -> u32 {
    u32::try_from(position).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        priority: u32,
    }

    impl Prioritized for Item {
        fn id(&self) -> &str {
            &self.id
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn set_priority(&mut self, priority: u32) {
            self.priority = priority;
        }
    }

    fn items(n: u32) -> Vec<Item> {
        (1..=n)
            .map(|p| Item {
                id: format!("r{p}"),
                priority: p,
            })
            .collect()
    }

    fn summary(records: &[Item]) -> Vec<(String, u32)> {
        records.iter().map(|r| (r.id.clone(), r.priority)).collect()
    }

    fn pairs(expected: &[(&str, u32)]) -> Vec<(String, u32)> {
        expected.iter().map(|(id, p)| ((*id).to_string(), *p)).collect()
    }

    #[test]
    fn move_to_front() {
        let mut records = items(3);
        let changed = reorganize(&mut records, 3, 1);
        assert_eq!(summary(&changed), pairs(&[("r3", 1), ("r1", 2), ("r2", 3)]));
        assert_eq!(summary(&records), pairs(&[("r3", 1), ("r1", 2), ("r2", 3)]));
    }

    #[test]
    fn move_toward_end_returns_bounded_span() {
        let mut records = items(5);
        let changed = reorganize(&mut records, 2, 4);
        assert_eq!(summary(&changed), pairs(&[("r3", 2), ("r4", 3), ("r2", 4)]));
        assert_eq!(records[0].priority, 1);
        assert_eq!(records[4].id, "r5");
        assert_eq!(records[4].priority, 5);
    }

    #[test]
    fn no_op_move_changes_nothing() {
        let mut records = items(4);
        assert!(reorganize(&mut records, 2, 2).is_empty());
        assert_eq!(records, items(4));
    }

    #[rstest]
    #[case(0)]
    #[case(9)]
    #[case(u32::MAX)]
    fn out_of_range_target_means_end(#[case] target: u32) {
        let mut records = items(3);
        let changed = reorganize(&mut records, 1, target);
        assert_eq!(summary(&changed), pairs(&[("r2", 1), ("r3", 2), ("r1", 3)]));
    }

    #[test]
    fn empty_partition() {
        let mut records: Vec<Item> = Vec::new();
        assert!(reorganize(&mut records, 1, 1).is_empty());
    }

    #[test]
    fn insert_appends_by_default() {
        let mut records = items(2);
        let new = Item {
            id: "n".into(),
            priority: 0,
        };
        let changed = insert(&mut records, new, 0);
        assert_eq!(summary(&changed), pairs(&[("n", 3)]));
        assert!(is_contiguous(&records));
    }

    #[test]
    fn insert_at_front_shifts_everyone() {
        let mut records = items(2);
        let new = Item {
            id: "n".into(),
            priority: 1,
        };
        let changed = insert(&mut records, new, 1);
        assert_eq!(summary(&changed), pairs(&[("n", 1), ("r1", 2), ("r2", 3)]));
    }

    #[test]
    fn insert_into_empty_partition() {
        let mut records = Vec::new();
        let changed = insert(
            &mut records,
            Item {
                id: "n".into(),
                priority: 7,
            },
            7,
        );
        assert_eq!(summary(&changed), pairs(&[("n", 1)]));
    }

    #[test]
    fn remove_compacts_tail() {
        let mut records = items(4);
        let (removed, changed) = remove(&mut records, "r2").unwrap();
        assert_eq!(removed.id, "r2");
        assert_eq!(summary(&changed), pairs(&[("r3", 2), ("r4", 3)]));
        assert!(is_contiguous(&records));
        assert!(remove(&mut records, "missing").is_none());
    }

    #[test]
    fn removing_last_changes_nothing_else() {
        let mut records = items(3);
        let (_, changed) = remove(&mut records, "r3").unwrap();
        assert!(changed.is_empty());
    }

    #[test]
    fn compact_repairs_gaps() {
        let mut records = vec![
            Item {
                id: "a".into(),
                priority: 2,
            },
            Item {
                id: "b".into(),
                priority: 5,
            },
        ];
        assert!(!is_contiguous(&records));
        let changed = compact(&mut records);
        assert_eq!(summary(&changed), pairs(&[("a", 1), ("b", 2)]));
        assert!(is_contiguous(&records));
    }

    #[test]
    fn contiguity_ignores_order_but_not_duplicates() {
        let mut records = items(3);
        records.reverse();
        assert!(is_contiguous(&records));
        records[0].priority = 1;
        assert!(!is_contiguous(&records));
    }

    #[test]
    fn lookup_and_sort() {
        let mut records = items(3);
        records.reverse();
        sort_by_priority(&mut records);
        assert_eq!(records, items(3));
        assert_eq!(position_of(&records, "r2"), Some(2));
        assert_eq!(position_of(&records, "zz"), None);
    }
}
