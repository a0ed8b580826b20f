//! Reconciliation of customer lists.

use std::collections::BTreeSet;

/// Changes needed to move a feature from its current customers to the desired ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementDiff {
    pub to_add: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
}

impl EntitlementDiff {
    /// `to_add = desired - current`, `to_remove = current - desired`.
    ///
    /// Duplicates on either side are irrelevant. Output order carries no meaning.
    pub fn between<D, C>(desired: D, current: C) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let desired: BTreeSet<String> = desired.into_iter().map(|s| s.as_ref().to_owned()).collect();
        let current: BTreeSet<String> = current.into_iter().map(|s| s.as_ref().to_owned()).collect();

        Self {
            to_add: desired.difference(&current).cloned().collect(),
            to_remove: current.difference(&desired).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Drop repeated customer ids, keeping first occurrences in order.
pub fn dedup_customer_ids(customer_ids: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    customer_ids
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIVERSE: [&str; 4] = ["a", "b", "c", "d"];

    fn subset(mask: u8) -> Vec<&'static str> {
        UNIVERSE
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, s)| *s)
            .collect()
    }

    #[test]
    fn test_diff_laws_for_every_pair_of_subsets() {
        for d in 0..16u8 {
            for c in 0..16u8 {
                let desired: BTreeSet<String> = subset(d).into_iter().map(String::from).collect();
                let current: BTreeSet<String> = subset(c).into_iter().map(String::from).collect();
                let diff = EntitlementDiff::between(&desired, &current);

                assert!(diff.to_add.is_disjoint(&current));
                assert!(diff.to_remove.is_disjoint(&desired));

                let rebuilt: BTreeSet<String> = current
                    .difference(&diff.to_remove)
                    .cloned()
                    .chain(diff.to_add.iter().cloned())
                    .collect();
                assert_eq!(rebuilt, desired);
            }
        }
    }

    #[test]
    fn test_identical_lists_need_no_writes() {
        let diff = EntitlementDiff::between(["1", "2"], ["2", "1", "1"]);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_empty_desired_removes_everything() {
        let diff = EntitlementDiff::between(Vec::<String>::new(), ["1", "2"]);
        assert!(diff.to_add.is_empty());
        assert_eq!(diff.to_remove, BTreeSet::from(["1".to_string(), "2".to_string()]));
    }

    #[test]
    fn test_duplicates_in_desired() {
        let diff = EntitlementDiff::between(["3", "3", "1"], ["1"]);
        assert_eq!(diff.to_add, BTreeSet::from(["3".to_string()]));
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn test_dedup_keeps_order() {
        let ids = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(dedup_customer_ids(ids), vec!["b", "a"]);
    }
}
