//! In-memory search over fetched entries.
//!
//! [`filter_entries`] and [`available_topics`] are pure functions of the
//! fetched data and a [`FilterState`]; they are recomputed in full on every
//! change. [`SearchView`] bundles the data with the filter state and guards
//! against a slow fetch overwriting the result of a newer one.

use crate::{Entry, EntryKind, Topic};
use std::collections::HashSet;

/// The five filter dimensions of the search screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    /// Case-insensitive substring matched against the heading and topic names.
    pub query: String,
    /// Selected topic names; an entry matches if it carries any of them.
    pub topics: Vec<String>,
    pub kind: Option<EntryKind>,
    pub drafts_only: bool,
    /// User ID matched against the author and the last modifier.
    pub author: Option<String>,
}

impl FilterState {
    /// Clears every dimension at once.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Adds `name` to the topic selection, or removes it if already selected.
    pub fn toggle_topic(&mut self, name: &str) {
        if let Some(pos) = self.topics.iter().position(|t| t == name) {
            self.topics.remove(pos);
        } else {
            self.topics.push(name.to_string());
        }
    }

    /// Selects `kind`, or clears the selection if `kind` is already selected.
    pub fn toggle_kind(&mut self, kind: EntryKind) {
        self.kind = if self.kind == Some(kind) { None } else { Some(kind) };
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether `entry` passes all five predicates.
    #[must_use]
    pub fn matches(&self, entry: &Entry) -> bool {
        self.matches_text(entry)
            && self.matches_topics(entry)
            && self.matches_kind(entry)
            && self.matches_draft(entry)
            && self.matches_author(entry)
    }

    fn matches_text(&self, entry: &Entry) -> bool {
        let needle = self.query.to_lowercase();
        entry.heading.to_lowercase().contains(&needle)
            || entry.topics.iter().any(|t| t.to_lowercase().contains(&needle))
    }

    fn matches_topics(&self, entry: &Entry) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|sel| entry.topics.contains(sel))
    }

    fn matches_kind(&self, entry: &Entry) -> bool {
        self.kind.map_or(true, |k| entry.kind() == k)
    }

    fn matches_draft(&self, entry: &Entry) -> bool {
        !self.drafts_only || entry.is_draft()
    }

    fn matches_author(&self, entry: &Entry) -> bool {
        match &self.author {
            None => true,
            Some(user_id) => {
                entry.author.id == *user_id
                    || entry
                        .last_modified_by
                        .as_ref()
                        .is_some_and(|m| m.id == *user_id)
            }
        }
    }
}

/// Returns the entries that pass `state`, in their original order.
pub fn filter_entries<'a>(entries: &'a [Entry], state: &FilterState) -> Vec<&'a Entry> {
    entries.iter().filter(|e| state.matches(e)).collect()
}

/// Returns the catalogue topics that occur on at least one entry of `kind`
/// (or on any entry when `kind` is `None`), sorted by name.
///
/// Only the type filter narrows this list; the other dimensions do not.
pub fn available_topics<'a>(
    entries: &[Entry],
    catalogue: &'a [Topic],
    kind: Option<EntryKind>,
) -> Vec<&'a Topic> {
    let used: HashSet<&str> = entries
        .iter()
        .filter(|e| kind.map_or(true, |k| e.kind() == k))
        .flat_map(|e| e.topics.iter().map(String::as_str))
        .collect();
    let mut topics: Vec<&Topic> = catalogue
        .iter()
        .filter(|t| used.contains(t.name.as_str()))
        .collect();
    topics.sort_by(|a, b| a.name.cmp(&b.name));
    topics
}

/// Proof that a fetch was started; hand it back to [`SearchView::apply_fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

/// Fetched entries plus the filter state of one search screen.
#[derive(Debug, Default)]
pub struct SearchView {
    entries: Vec<Entry>,
    catalogue: Vec<Topic>,
    pub filter: FilterState,
    generation: u64,
}

impl SearchView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new fetch; every earlier ticket becomes stale.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.generation += 1;
        FetchTicket(self.generation)
    }

    /// Installs fetched data if `ticket` belongs to the most recent fetch.
    ///
    /// Returns `false` and leaves the view untouched for a stale ticket.
    pub fn apply_fetch(&mut self, ticket: FetchTicket, entries: Vec<Entry>, catalogue: Vec<Topic>) -> bool {
        if ticket.0 != self.generation {
            log::debug!(
                "dropping stale fetch {} (current {})",
                ticket.0,
                self.generation
            );
            return false;
        }
        self.entries = entries;
        self.catalogue = catalogue;
        true
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn visible(&self) -> Vec<&Entry> {
        filter_entries(&self.entries, &self.filter)
    }

    pub fn available_topics(&self) -> Vec<&Topic> {
        available_topics(&self.entries, &self.catalogue, self.filter.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntryDetails, EntryStatus, UserRef};
    use chrono::{TimeZone, Utc};

    fn user(id: &str) -> UserRef {
        UserRef { id: id.to_string(), username: format!("user-{id}") }
    }

    fn entry(id: &str, heading: &str, kind: EntryKind, topics: &[&str]) -> Entry {
        let details = match kind {
            EntryKind::SupportCase => EntryDetails::SupportCase {
                problem: "p".to_string(),
                solution: "s".to_string(),
                customer_satisfaction: 4,
            },
            EntryKind::ProductKnowledge => EntryDetails::ProductKnowledge {
                knowledge_content: "c".to_string(),
            },
            EntryKind::Process => EntryDetails::Process { description: "d".to_string() },
        };
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Entry {
            id: id.to_string(),
            heading: heading.to_string(),
            details,
            created_at: ts,
            updated_at: ts,
            last_modified_at: None,
            is_frequent: false,
            needs_improvement: false,
            status: EntryStatus::Published,
            author: user("u1"),
            last_modified_by: None,
            topics: topics.iter().map(|t| t.to_string()).collect(),
            images: vec![],
        }
    }

    fn topic(name: &str) -> Topic {
        Topic { id: format!("t-{name}"), name: name.to_string() }
    }

    fn ids(entries: &[&Entry]) -> Vec<String> {
        entries.iter().map(|e| e.id.clone()).collect()
    }

    fn sample() -> Vec<Entry> {
        let mut draft = entry("4", "Draft refund flow", EntryKind::Process, &["Billing"]);
        draft.status = EntryStatus::Draft;
        draft.author = user("u2");
        draft.last_modified_by = Some(user("u3"));
        vec![
            entry("1", "Printer offline", EntryKind::SupportCase, &["Hardware"]),
            entry("2", "Invoice layout", EntryKind::ProductKnowledge, &["Billing"]),
            entry("3", "Ship a parcel", EntryKind::Process, &["Shipping", "Hardware"]),
            draft,
        ]
    }

    #[test]
    fn test_empty_state_keeps_everything_in_order() {
        let entries = sample();
        let out = filter_entries(&entries, &FilterState::default());
        assert_eq!(ids(&out), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_filter_is_deterministic() {
        let entries = sample();
        let state = FilterState { query: "i".to_string(), ..Default::default() };
        assert_eq!(
            ids(&filter_entries(&entries, &state)),
            ids(&filter_entries(&entries, &state))
        );
    }

    #[test]
    fn test_query_matches_heading_or_topic_case_insensitively() {
        let entries = sample();
        let state = FilterState { query: "PRINTER".to_string(), ..Default::default() };
        assert_eq!(ids(&filter_entries(&entries, &state)), vec!["1"]);

        let state = FilterState { query: "hard".to_string(), ..Default::default() };
        assert_eq!(ids(&filter_entries(&entries, &state)), vec!["1", "3"]);
    }

    #[test]
    fn test_topic_selection_uses_or_semantics() {
        let entries = sample();
        let state = FilterState {
            topics: vec!["Hardware".to_string(), "Billing".to_string()],
            ..Default::default()
        };
        assert_eq!(ids(&filter_entries(&entries, &state)), vec!["1", "2", "3", "4"]);

        let state = FilterState {
            topics: vec!["Shipping".to_string(), "Nonexistent".to_string()],
            ..Default::default()
        };
        assert_eq!(ids(&filter_entries(&entries, &state)), vec!["3"]);
    }

    #[test]
    fn test_kind_filter() {
        let entries = sample();
        let state = FilterState { kind: Some(EntryKind::Process), ..Default::default() };
        assert_eq!(ids(&filter_entries(&entries, &state)), vec!["3", "4"]);
    }

    #[test]
    fn test_drafts_only_is_subset_of_toggle_off() {
        let entries = sample();
        let mut state = FilterState::default();
        let all: HashSet<String> = ids(&filter_entries(&entries, &state)).into_iter().collect();
        state.drafts_only = true;
        let drafts = ids(&filter_entries(&entries, &state));
        assert_eq!(drafts, vec!["4"]);
        assert!(drafts.iter().all(|id| all.contains(id)));
    }

    #[test]
    fn test_author_matches_author_or_last_modifier() {
        let entries = sample();
        let by_author = FilterState { author: Some("u2".to_string()), ..Default::default() };
        assert_eq!(ids(&filter_entries(&entries, &by_author)), vec!["4"]);

        let by_modifier = FilterState { author: Some("u3".to_string()), ..Default::default() };
        assert_eq!(ids(&filter_entries(&entries, &by_modifier)), vec!["4"]);

        let nobody = FilterState { author: Some("u9".to_string()), ..Default::default() };
        assert!(filter_entries(&entries, &nobody).is_empty());
    }

    #[test]
    fn test_predicates_combine_with_and() {
        let entries = sample();
        let state = FilterState {
            query: "refund".to_string(),
            topics: vec!["Billing".to_string()],
            kind: Some(EntryKind::Process),
            drafts_only: true,
            author: Some("u3".to_string()),
        };
        assert_eq!(ids(&filter_entries(&entries, &state)), vec!["4"]);

        let state = FilterState { kind: Some(EntryKind::SupportCase), ..state };
        assert!(filter_entries(&entries, &state).is_empty());
    }

    #[test]
    fn test_available_topics_follow_only_the_kind_filter() {
        let entries = sample();
        let catalogue = vec![topic("Shipping"), topic("Billing"), topic("Hardware"), topic("Unused")];

        let all: Vec<&str> = available_topics(&entries, &catalogue, None)
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(all, vec!["Billing", "Hardware", "Shipping"]);

        let support: Vec<&str> = available_topics(&entries, &catalogue, Some(EntryKind::SupportCase))
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(support, vec!["Hardware"]);
        assert!(!support.contains(&"Shipping"));
    }

    #[test]
    fn test_reset_clears_all_dimensions() {
        let mut state = FilterState {
            query: "x".to_string(),
            topics: vec!["Billing".to_string()],
            kind: Some(EntryKind::Process),
            drafts_only: true,
            author: Some("u1".to_string()),
        };
        state.reset();
        assert!(state.is_empty());
    }

    #[test]
    fn test_toggles() {
        let mut state = FilterState::default();
        state.toggle_topic("Billing");
        state.toggle_topic("Shipping");
        state.toggle_topic("Billing");
        assert_eq!(state.topics, vec!["Shipping"]);

        state.toggle_kind(EntryKind::Process);
        assert_eq!(state.kind, Some(EntryKind::Process));
        state.toggle_kind(EntryKind::Process);
        assert_eq!(state.kind, None);
    }

    #[test]
    fn test_stale_fetch_does_not_overwrite_newer_data() {
        let mut view = SearchView::new();
        let first = view.begin_fetch();
        let second = view.begin_fetch();

        assert!(view.apply_fetch(second, sample(), vec![topic("Billing")]));
        assert!(!view.apply_fetch(first, vec![], vec![]));
        assert_eq!(view.entries().len(), 4);

        view.filter.kind = Some(EntryKind::ProductKnowledge);
        assert_eq!(ids(&view.visible()), vec!["2"]);
        assert_eq!(view.available_topics().len(), 1);
    }
}
