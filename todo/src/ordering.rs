//! Display order of a snapshot.
//!
//! Incomplete items first, then by priority rank, then newest first. The sort
//! is stable, so items that tie on all three keys keep the store's order.

use crate::types::TodoItem;
use std::cmp::Ordering;

/// Compares two items by display order
#[must_use]
pub fn compare(a: &TodoItem, b: &TodoItem) -> Ordering {
    a.is_completed
        .cmp(&b.is_completed)
        .then_with(|| a.priority.rank().cmp(&b.priority.rank()))
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Sorts a snapshot into display order
#[must_use]
pub fn sort_snapshot(mut items: Vec<TodoItem>) -> Vec<TodoItem> {
    items.sort_by(compare);
    items
}

/// `true` when `items` is already in display order
#[must_use]
pub fn is_sorted(items: &[TodoItem]) -> bool {
    items
        .windows(2)
        .all(|pair| compare(&pair[0], &pair[1]) != Ordering::Greater)
}
