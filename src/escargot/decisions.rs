use std::collections::HashMap;

use crate::subscriber::Decision;

/// Lifecycle point a decision was made at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Phase {
    ShouldRequest,
    NeedsContent,
}

/// Memo of subscriber votes per (URI, subscriber, phase)
///
/// Entries live as long as the exchange of their URI.
#[derive(Debug, Default)]
pub(crate) struct DecisionMap {
    decisions: HashMap<String, HashMap<(usize, Phase), Decision>>,
}

impl DecisionMap {
    pub(crate) fn record(&mut self, uri: &str, subscriber: usize, phase: Phase, decision: Decision) {
        self.decisions
            .entry(uri.to_string())
            .or_default()
            .insert((subscriber, phase), decision);
    }

    /// Recorded vote, [`Decision::Abstain`] if the subscriber was never asked
    pub(crate) fn get(&self, uri: &str, subscriber: usize, phase: Phase) -> Decision {
        self.decisions
            .get(uri)
            .and_then(|votes| votes.get(&(subscriber, phase)))
            .copied()
            .unwrap_or_default()
    }

    /// Whether the subscriber opted out of the exchange in either phase
    pub(crate) fn opted_out(&self, uri: &str, subscriber: usize) -> bool {
        self.get(uri, subscriber, Phase::ShouldRequest).is_negative()
            || self.get(uri, subscriber, Phase::NeedsContent).is_negative()
    }

    pub(crate) fn forget(&mut self, uri: &str) {
        self.decisions.remove(uri);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.decisions.len()
    }
}
