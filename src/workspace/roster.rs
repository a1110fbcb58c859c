//! Client-held list views kept in step with store mutations.

use crate::novel::{CharacterId, CharacterSummary, DocumentId, DocumentSummary};
use std::fmt;

pub trait RosterEntry: Clone {
    type Id: Clone + PartialEq + Eq + fmt::Debug;

    fn id(&self) -> &Self::Id;
}

impl RosterEntry for DocumentSummary {
    type Id = DocumentId;

    fn id(&self) -> &DocumentId {
        &self.id
    }
}

impl RosterEntry for CharacterSummary {
    type Id = CharacterId;

    fn id(&self) -> &CharacterId {
        &self.id
    }
}

/// A resolved store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterChange<T: RosterEntry> {
    Created(T),
    Updated(T),
    Deleted(T::Id),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RosterState<T> {
    Loading,
    Failed(String),
    Loaded(Vec<T>),
}

/// Owned view of a roster for rendering. `Empty` and `Loading` are distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterView<T> {
    Loading,
    Failed(String),
    Empty,
    Entries(Vec<T>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster<T: RosterEntry> {
    state: RosterState<T>,
}

impl<T: RosterEntry> Default for Roster<T> {
    fn default() -> Self {
        Self {
            state: RosterState::Loading,
        }
    }
}

impl<T: RosterEntry> Roster<T> {
    pub fn begin_loading(&mut self) {
        self.state = RosterState::Loading;
    }

    /// Installs a full listing. Later duplicates of an id are dropped.
    pub fn replace(&mut self, entries: Vec<T>) {
        let mut unique: Vec<T> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !unique.iter().any(|seen| seen.id() == entry.id()) {
                unique.push(entry);
            }
        }
        self.state = RosterState::Loaded(unique);
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = RosterState::Failed(message.into());
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, RosterState::Loaded(_))
    }

    pub fn entries(&self) -> &[T] {
        match &self.state {
            RosterState::Loaded(entries) => entries.as_slice(),
            _ => &[],
        }
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.entries().iter().any(|entry| entry.id() == id)
    }

    /// Applies one mutation without touching other entries.
    ///
    /// Returns `false` when the roster holds no listing to patch, in which
    /// case the caller should refetch instead.
    pub fn apply(&mut self, change: RosterChange<T>) -> bool {
        let RosterState::Loaded(entries) = &mut self.state else {
            return false;
        };
        match change {
            RosterChange::Created(entry) | RosterChange::Updated(entry) => {
                match entries.iter().position(|existing| existing.id() == entry.id()) {
                    Some(index) => entries[index] = entry,
                    None => entries.push(entry),
                }
            }
            RosterChange::Deleted(id) => entries.retain(|entry| entry.id() != &id),
        }
        true
    }

    pub fn view(&self) -> RosterView<T> {
        match &self.state {
            RosterState::Loading => RosterView::Loading,
            RosterState::Failed(message) => RosterView::Failed(message.clone()),
            RosterState::Loaded(entries) if entries.is_empty() => RosterView::Empty,
            RosterState::Loaded(entries) => RosterView::Entries(entries.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, title: &str) -> DocumentSummary {
        DocumentSummary {
            id: DocumentId::new(id),
            title: title.to_string(),
        }
    }

    fn loaded(entries: &[(&str, &str)]) -> Roster<DocumentSummary> {
        let mut roster = Roster::default();
        roster.replace(entries.iter().map(|(id, title)| summary(id, title)).collect());
        roster
    }

    #[test]
    fn starts_loading_and_loading_is_not_empty() {
        let mut roster: Roster<DocumentSummary> = Roster::default();
        assert_eq!(roster.view(), RosterView::Loading);

        roster.replace(Vec::new());
        assert_eq!(roster.view(), RosterView::Empty);
    }

    #[test]
    fn created_entry_is_appended() {
        let mut roster = loaded(&[("a", "A"), ("b", "B")]);
        assert!(roster.apply(RosterChange::Created(summary("c", "T"))));
        assert_eq!(
            roster.entries(),
            &[summary("a", "A"), summary("b", "B"), summary("c", "T")]
        );
    }

    #[test]
    fn delete_keeps_remaining_order_and_empties_to_placeholder() {
        let mut roster = loaded(&[("a", "A"), ("b", "B"), ("c", "C")]);
        roster.apply(RosterChange::Deleted(DocumentId::new("b")));
        assert_eq!(roster.entries(), &[summary("a", "A"), summary("c", "C")]);

        roster.apply(RosterChange::Deleted(DocumentId::new("a")));
        roster.apply(RosterChange::Deleted(DocumentId::new("c")));
        assert_eq!(roster.view(), RosterView::Empty);
    }

    #[test]
    fn update_replaces_in_place() {
        let mut roster = loaded(&[("a", "A"), ("b", "B")]);
        roster.apply(RosterChange::Updated(summary("a", "Renamed")));
        assert_eq!(roster.entries(), &[summary("a", "Renamed"), summary("b", "B")]);
    }

    #[test]
    fn entries_stay_unique_by_id() {
        let mut roster = loaded(&[("a", "A"), ("a", "dup"), ("b", "B")]);
        assert_eq!(roster.entries().len(), 2);

        roster.apply(RosterChange::Created(summary("b", "B again")));
        assert_eq!(roster.entries(), &[summary("a", "A"), summary("b", "B again")]);
    }

    #[test]
    fn changes_are_not_applied_before_a_listing_arrives() {
        let mut roster: Roster<DocumentSummary> = Roster::default();
        assert!(!roster.apply(RosterChange::Created(summary("a", "A"))));
        assert_eq!(roster.view(), RosterView::Loading);

        roster.fail("offline");
        assert!(!roster.apply(RosterChange::Deleted(DocumentId::new("a"))));
        assert_eq!(roster.view(), RosterView::Failed("offline".to_string()));
    }
}
