//! Enumeration of injective assignments between two sets, used to pair up attachment points.

/// One key to assign, with the values it may take.
#[derive(Debug, Clone)]
pub struct MappingSlot<K, V> {
    pub key: K,
    pub candidates: Vec<V>,
    /// A required slot must receive a value; an optional one may stay unassigned.
    pub required: bool,
}

impl<K, V> MappingSlot<K, V> {
    pub fn required(key: K, candidates: Vec<V>) -> Self {
        Self {
            key,
            candidates,
            required: true,
        }
    }

    pub fn optional(key: K, candidates: Vec<V>) -> Self {
        Self {
            key,
            candidates,
            required: false,
        }
    }
}

/// Enumerates injective assignments of values to slots.
///
/// No value is used twice within one assignment. Slots are visited in order and each tries its
/// candidates before (for optional slots) being left unassigned, so assignments covering more
/// slots come first. Enumeration stops once `limit` accepted assignments have been found.
///
/// # Arguments
///
/// * `slots` - The keys to assign, with their candidate values.
/// * `limit` - Maximum number of assignments to return.
/// * `accept` - Final filter on complete assignments.
///
/// # Return
///
/// The accepted assignments as `(key, value)` lists in slot order.
pub fn enumerate_mappings<K, V>(
    slots: &[MappingSlot<K, V>],
    limit: usize,
    accept: impl Fn(&[(K, V)]) -> bool,
) -> Vec<Vec<(K, V)>>
where
    K: Copy,
    V: Copy + PartialEq,
{
    let mut found = Vec::new();
    let mut current = Vec::with_capacity(slots.len());
    descend(slots, 0, limit, &accept, &mut current, &mut found);
    found
}

fn descend<K, V>(
    slots: &[MappingSlot<K, V>],
    depth: usize,
    limit: usize,
    accept: &impl Fn(&[(K, V)]) -> bool,
    current: &mut Vec<(K, V)>,
    found: &mut Vec<Vec<(K, V)>>,
) where
    K: Copy,
    V: Copy + PartialEq,
{
    if found.len() >= limit {
        return;
    }
    let Some(slot) = slots.get(depth) else {
        if accept(current) {
            found.push(current.clone());
        }
        return;
    };
    for &value in &slot.candidates {
        if current.iter().any(|(_, used)| *used == value) {
            continue;
        }
        current.push((slot.key, value));
        descend(slots, depth + 1, limit, accept, current, found);
        current.pop();
        if found.len() >= limit {
            return;
        }
    }
    if !slot.required {
        descend(slots, depth + 1, limit, accept, current, found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_slots_get_distinct_values() {
        let slots = vec![
            MappingSlot::required('a', vec![1, 2]),
            MappingSlot::required('b', vec![1]),
        ];
        let all = enumerate_mappings(&slots, 10, |_| true);
        assert_eq!(all, vec![vec![('a', 2), ('b', 1)]]);
    }

    #[test]
    fn unsatisfiable_required_slot_yields_nothing() {
        let slots = vec![
            MappingSlot::required('a', vec![1]),
            MappingSlot::required('b', vec![1]),
        ];
        assert!(enumerate_mappings(&slots, 10, |_| true).is_empty());
    }

    #[test]
    fn optional_slots_may_stay_unassigned() {
        let slots = vec![
            MappingSlot::required('a', vec![1]),
            MappingSlot::optional('b', vec![1]),
        ];
        let all = enumerate_mappings(&slots, 10, |_| true);
        assert_eq!(all, vec![vec![('a', 1)]]);
    }

    #[test]
    fn fuller_assignments_come_first_and_limit_applies() {
        let slots = vec![
            MappingSlot::optional('a', vec![1, 2]),
            MappingSlot::optional('b', vec![2, 3]),
        ];
        let all = enumerate_mappings(&slots, 100, |_| true);
        assert_eq!(all[0], vec![('a', 1), ('b', 2)]);
        assert_eq!(all.last(), Some(&vec![]));
        assert_eq!(enumerate_mappings(&slots, 2, |_| true).len(), 2);
    }

    #[test]
    fn accept_filters_complete_assignments() {
        let slots = vec![MappingSlot::optional('a', vec![1, 2])];
        let all = enumerate_mappings(&slots, 10, |m| !m.is_empty());
        assert_eq!(all.len(), 2);
    }
}
