//! crates/tutoring_core/src/pattern.rs
//!
//! Picks the applicable recurring weekly pattern for a given calendar week.
//! The pattern list is kept as an explicit index sorted by effective date,
//! rebuilt whole whenever the tutor's patterns change.

use chrono::NaiveDate;

use crate::domain::WeeklyAvailabilityPattern;

/// A tutor's patterns, ordered for resolution: latest `applied_from` first,
/// and within one `applied_from` date the later-created pattern first. The
/// index is rebuilt from scratch on every pattern mutation rather than
/// patched in place.
#[derive(Debug, Clone, Default)]
pub struct PatternIndex {
    ordered: Vec<WeeklyAvailabilityPattern>,
}

impl PatternIndex {
    pub fn new(mut patterns: Vec<WeeklyAvailabilityPattern>) -> Self {
        patterns.sort_by(|a, b| {
            (b.applied_from, b.created_seq).cmp(&(a.applied_from, a.created_seq))
        });
        Self { ordered: patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Resolves the pattern active for the week starting at
    /// `week_start_monday`: the latest pattern whose `applied_from` is on or
    /// before that Monday. Weeks before every pattern fall back to the
    /// earliest known pattern. Only an empty list resolves to `None`.
    ///
    /// Ties on `applied_from` go to the later-created pattern in both the
    /// normal and the fallback path.
    pub fn resolve(&self, week_start_monday: NaiveDate) -> Option<&WeeklyAvailabilityPattern> {
        self.ordered
            .iter()
            .find(|p| p.applied_from <= week_start_monday)
            .or_else(|| {
                let earliest = self.ordered.last()?.applied_from;
                self.ordered.iter().find(|p| p.applied_from == earliest)
            })
    }
}
