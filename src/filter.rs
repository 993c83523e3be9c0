//! Batch filtering over content collections. Every function here takes a
//! borrowed slice and returns a freshly allocated `Vec`, never mutating or
//! reordering its input; surviving items keep their relative order.

use std::collections::HashSet;

use serde::Serialize;

use crate::classify;
use crate::dedup;
use crate::models::{ContentItem, ContentKey, FilterSpec};

/// Removes restricted items when safety is enabled. With safety off this
/// is still a copy, never the caller's allocation, so downstream code can
/// never alias the input.
pub fn by_restriction_flag(items: &[ContentItem], safety_enabled: bool) -> Vec<ContentItem> {
    if !safety_enabled {
        return items.to_vec();
    }
    items
        .iter()
        .filter(|item| !classify::is_restricted(item, safety_enabled))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FilterOutcome {
    pub items: Vec<ContentItem>,
    pub shown: usize,
    pub hidden: usize,
    pub total_before: usize,
}

/// [`by_restriction_flag`] plus counts. `shown + hidden == total_before`
/// holds for every input, including the empty one.
pub fn with_statistics(items: &[ContentItem], safety_enabled: bool) -> FilterOutcome {
    let total_before = items.len();
    let kept = by_restriction_flag(items, safety_enabled);
    let shown = kept.len();
    FilterOutcome {
        items: kept,
        shown,
        hidden: total_before - shown,
        total_before,
    }
}

/// Drops items the user has disliked or hidden. Keys are media-type
/// qualified, so a disliked movie never shadows the series sharing its
/// numeric id. An empty set is a plain copy-through.
pub fn by_user_dislikes(items: &[ContentItem], disliked: &HashSet<ContentKey>) -> Vec<ContentItem> {
    if disliked.is_empty() {
        return items.to_vec();
    }
    items
        .iter()
        .filter(|item| !disliked.contains(&item.key()))
        .cloned()
        .collect()
}

/// Keeps only candidates whose normalized title+year pair is not already
/// present in `existing`. Title+year, not id, because suggested content
/// may resolve to different provider ids for the same title across
/// repeated queries.
pub fn drop_known_titles(candidates: &[ContentItem], existing: &[ContentItem]) -> Vec<ContentItem> {
    if candidates.is_empty() {
        return Vec::new();
    }
    if existing.is_empty() {
        return candidates.to_vec();
    }
    let known: HashSet<String> = existing.iter().map(dedup::item_key).collect();
    candidates
        .iter()
        .filter(|c| !known.contains(&dedup::item_key(c)))
        .cloned()
        .collect()
}

/// Applies the closed filter spec (content type, rating threshold, year
/// bucket) and then its sort order.
pub fn apply_spec(items: &[ContentItem], spec: &FilterSpec) -> Vec<ContentItem> {
    let mut kept: Vec<ContentItem> = items
        .iter()
        .filter(|item| spec.matches(item))
        .cloned()
        .collect();
    spec.sort_items(&mut kept);
    kept
}

/// The composed visibility pipeline: restriction filter, then dislikes.
/// The two are independent predicates, so the order does not change the
/// result set, but it is fixed here so statistics stay consistent.
pub fn visible(
    items: &[ContentItem],
    safety_enabled: bool,
    disliked: &HashSet<ContentKey>,
) -> Vec<ContentItem> {
    by_user_dislikes(&by_restriction_flag(items, safety_enabled), disliked)
}
