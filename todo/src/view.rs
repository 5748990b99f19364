//! Derived list view: filter, then title search, over a sorted snapshot.

use crate::types::{TodoFilter, TodoItem};

/// Applies `filter`, then a case-insensitive title search, preserving order
///
/// Search only applies when `search` is not blank; surrounding whitespace is
/// kept as part of the needle once it does.
#[must_use]
pub fn derive_view(items: &[TodoItem], filter: &TodoFilter, search: &str) -> Vec<TodoItem> {
    let needle = (!search.trim().is_empty()).then(|| search.to_lowercase());

    items
        .iter()
        .filter(|item| filter.matches(item))
        .filter(|item| {
            needle
                .as_deref()
                .is_none_or(|needle| item.title.to_lowercase().contains(needle))
        })
        .cloned()
        .collect()
}

/// Counters shown above the list
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewSummary {
    /// Items in the snapshot
    pub total: usize,
    /// Completed items
    pub completed: usize,
    /// Incomplete items
    pub incomplete: usize,
}

impl ViewSummary {
    /// Counts a snapshot
    #[must_use]
    pub fn of(items: &[TodoItem]) -> Self {
        let completed = items.iter().filter(|item| item.is_completed).count();
        Self {
            total: items.len(),
            completed,
            incomplete: items.len() - completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::sort_snapshot;
    use crate::types::{Category, Priority, TodoId};
    use proptest::prelude::*;

    fn item(id: &str, title: &str, category: Category, done: bool) -> TodoItem {
        TodoItem::new(title, Priority::Medium, category, 0)
            .with_id(TodoId::new(id))
            .completed(done)
    }

    fn sample() -> Vec<TodoItem> {
        vec![
            item("1", "Study for Exam", Category::Kuliah, false),
            item("2", "Buy milk", Category::Kerja, false),
            item("3", "exam registration", Category::Kuliah, true),
        ]
    }

    fn ids(items: &[TodoItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let view = derive_view(&sample(), &TodoFilter::All, "EXAM");
        assert_eq!(ids(&view), ["1", "3"]);
    }

    #[test]
    fn blank_search_shows_everything() {
        assert_eq!(derive_view(&sample(), &TodoFilter::All, "   ").len(), 3);
        assert_eq!(derive_view(&sample(), &TodoFilter::All, "").len(), 3);
    }

    #[test]
    fn incomplete_with_empty_search_keeps_base_order() {
        let view = derive_view(&sample(), &TodoFilter::Incomplete, "");
        assert_eq!(ids(&view), ["1", "2"]);
    }

    #[test]
    fn filter_and_search_combine() {
        let view = derive_view(&sample(), &TodoFilter::Incomplete, "exam");
        assert_eq!(ids(&view), ["1"]);

        let view = derive_view(&sample(), &TodoFilter::ByCategory(Category::Kerja), "exam");
        assert!(view.is_empty());
    }

    #[test]
    fn summary_counts() {
        let summary = ViewSummary::of(&sample());
        assert_eq!(
            summary,
            ViewSummary {
                total: 3,
                completed: 1,
                incomplete: 2
            }
        );
    }

    fn arb_item() -> impl Strategy<Value = TodoItem> {
        (
            "[a-zA-Z ]{0,12}",
            any::<bool>(),
            prop_oneof![
                Just(Category::Kerja),
                Just(Category::Kuliah),
                Just(Category::Hobby)
            ],
            0_i64..100,
        )
            .prop_map(|(title, done, category, created_at)| {
                TodoItem::new(title, Priority::Low, category, created_at).completed(done)
            })
    }

    fn arb_filter() -> impl Strategy<Value = TodoFilter> {
        prop_oneof![
            Just(TodoFilter::All),
            Just(TodoFilter::Incomplete),
            Just(TodoFilter::ByCategory(Category::Hobby)),
        ]
    }

    proptest! {
        #[test]
        fn view_is_ordered_subsequence(
            items in prop::collection::vec(arb_item(), 0..30),
            filter in arb_filter(),
            search in "[a-z ]{0,3}",
        ) {
            let sorted = sort_snapshot(items);
            let view = derive_view(&sorted, &filter, &search);

            let mut rest = sorted.iter();
            for shown in &view {
                prop_assert!(filter.matches(shown));
                prop_assert!(rest.any(|candidate| candidate == shown));
            }
        }

        #[test]
        fn incomplete_filter_keeps_exactly_incomplete(items in prop::collection::vec(arb_item(), 0..30)) {
            let sorted = sort_snapshot(items);
            let view = derive_view(&sorted, &TodoFilter::Incomplete, "");
            let expected: Vec<TodoItem> = sorted.iter().filter(|i| !i.is_completed).cloned().collect();
            prop_assert_eq!(view, expected);
        }
    }
}
