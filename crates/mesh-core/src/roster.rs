//! The membership roster: member ID to point-to-point address.
//!
//! The coordinator owns the authoritative roster; every other node holds a
//! snapshot that may be stale. The roster is append-only, there is no
//! removal path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::node::{NodeId, PeerAddr};

/// Mapping from member ID to address, ordered by ID.
///
/// Serializes as a JSON object keyed by the decimal ID:
/// `{"1": ["localhost", 50010], "2": ["localhost", 50011]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster(BTreeMap<NodeId, PeerAddr>);

impl Roster {
    /// Creates an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the coordinator's initial roster containing only itself.
    pub fn seeded(coordinator: PeerAddr) -> Self {
        let mut members = BTreeMap::new();
        members.insert(NodeId::COORDINATOR, coordinator);
        Self(members)
    }

    /// The ID the next admitted member will receive.
    ///
    /// Maximum existing key plus one, or `1` for an empty roster.
    /// Returns `None` only if the ID space is exhausted.
    pub fn next_id(&self) -> Option<NodeId> {
        match self.0.keys().next_back() {
            Some(max) => max.next(),
            None => Some(NodeId::COORDINATOR),
        }
    }

    /// Admits a new member under the next free ID and returns that ID.
    pub fn admit(&mut self, addr: PeerAddr) -> Option<NodeId> {
        let id = self.next_id()?;
        self.0.insert(id, addr);
        Some(id)
    }

    /// Inserts or overwrites an entry.
    pub fn insert(&mut self, id: NodeId, addr: PeerAddr) -> Option<PeerAddr> {
        self.0.insert(id, addr)
    }

    pub fn get(&self, id: NodeId) -> Option<&PeerAddr> {
        self.0.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.0.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &PeerAddr)> {
        self.0.iter().map(|(id, addr)| (*id, addr))
    }

    /// True when `other` lists every ID in this roster and at least one more.
    ///
    /// Rosters only grow, so such a roster is strictly newer than this one.
    pub fn is_superseded_by(&self, other: &Roster) -> bool {
        self.0.len() < other.0.len() && self.0.keys().all(|id| other.0.contains_key(id))
    }

    /// Every entry whose ID is not in `excluded`, cloned for use as send targets.
    pub fn members_except(&self, excluded: &[NodeId]) -> Vec<(NodeId, PeerAddr)> {
        self.0
            .iter()
            .filter(|(id, _)| !excluded.contains(id))
            .map(|(id, addr)| (*id, addr.clone()))
            .collect()
    }
}

impl FromIterator<(NodeId, PeerAddr)> for Roster {
    fn from_iter<I: IntoIterator<Item = (NodeId, PeerAddr)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> PeerAddr {
        PeerAddr::new("localhost", port)
    }

    #[test]
    fn test_seeded_roster_holds_coordinator() {
        let roster = Roster::seeded(addr(50010));
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.get(NodeId::COORDINATOR), Some(&addr(50010)));
    }

    #[test]
    fn test_next_id_on_empty_roster() {
        assert_eq!(Roster::new().next_id(), Some(NodeId::new(1)));
    }

    #[test]
    fn test_sequential_admissions_are_dense() {
        let mut roster = Roster::seeded(addr(50010));
        let n = 25u16;

        let assigned: Vec<NodeId> = (0..n)
            .map(|i| roster.admit(addr(50011 + i)).unwrap())
            .collect();

        let expected: Vec<NodeId> = (2..=u32::from(n) + 1).map(NodeId::new).collect();
        assert_eq!(assigned, expected);
        assert_eq!(roster.len(), usize::from(n) + 1);
        assert!(roster.contains(NodeId::COORDINATOR));
    }

    #[test]
    fn test_next_id_follows_maximum_not_count() {
        let roster: Roster = [(NodeId::new(1), addr(1)), (NodeId::new(7), addr(7))]
            .into_iter()
            .collect();
        assert_eq!(roster.next_id(), Some(NodeId::new(8)));
    }

    #[test]
    fn test_admit_fails_when_ids_exhausted() {
        let mut roster: Roster = [(NodeId::new(u32::MAX), addr(1))].into_iter().collect();
        assert_eq!(roster.admit(addr(2)), None);
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_members_except() {
        let mut roster = Roster::seeded(addr(50010));
        let b = roster.admit(addr(50011)).unwrap();
        let c = roster.admit(addr(50012)).unwrap();

        let targets = roster.members_except(&[NodeId::COORDINATOR, c]);
        assert_eq!(targets, vec![(b, addr(50011))]);
    }

    #[test]
    fn test_superseded_by_larger_roster_only() {
        let older = Roster::seeded(addr(50010));
        let mut newer = older.clone();
        newer.admit(addr(50011));

        assert!(older.is_superseded_by(&newer));
        assert!(!newer.is_superseded_by(&older));
        assert!(!newer.is_superseded_by(&newer.clone()));

        // Larger but missing one of our IDs is not a newer snapshot
        let unrelated: Roster = [(NodeId::new(2), addr(1)), (NodeId::new(3), addr(2))]
            .into_iter()
            .collect();
        assert!(!older.is_superseded_by(&unrelated));
    }

    #[test]
    fn test_wire_shape_uses_string_keys() {
        let mut roster = Roster::seeded(addr(50010));
        roster.admit(addr(50011));

        let json = serde_json::to_string(&roster).unwrap();
        assert_eq!(
            json,
            r#"{"1":["localhost",50010],"2":["localhost",50011]}"#
        );

        let parsed: Roster = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, roster);
    }
}
