//! Room invariant checks
//!
//! `debug_assert!`-based sanity checks on roster shape and phase
//! transitions, called from the hot paths that mutate room state. Release
//! builds pay nothing for them.

use std::collections::HashSet;

use crate::models::Phase;
use crate::roster::Roster;

/// Validate that a roster's state is internally consistent.
pub fn assert_roster_invariants(roster: &Roster) {
    let admins = roster.iter().filter(|m| m.role.is_admin()).count();
    debug_assert!(admins <= 1, "roster has {} administrators", admins);

    let mut ids = HashSet::new();
    for m in roster.iter() {
        debug_assert!(ids.insert(m.id), "duplicate member id {}", m.id);
    }

    let mut names = HashSet::new();
    for m in roster.iter() {
        debug_assert!(
            names.insert(m.name.to_lowercase()),
            "duplicate member name {}",
            m.name
        );
    }
}

/// Validate a coordinator phase transition against the phase graph.
pub fn assert_phase_edge(from: Phase, to: Phase) {
    debug_assert!(
        from.can_transition_to(to),
        "illegal phase transition {} -> {}",
        from,
        to
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_valid_roster() {
        let mut roster = Roster::new();
        roster.add("Host", Role::Admin).unwrap();
        roster.add("Alice", Role::Player).unwrap();
        assert_roster_invariants(&roster);
    }

    #[test]
    fn test_valid_edge() {
        assert_phase_edge(Phase::Lobby, Phase::Countdown);
        assert_phase_edge(Phase::Question, Phase::Lobby);
    }

    #[test]
    #[should_panic(expected = "illegal phase transition")]
    fn test_illegal_edge_panics_in_debug() {
        assert_phase_edge(Phase::Lobby, Phase::Podium);
    }
}
