//! Conservation accounting for the letter ledger.
//!
//! Letters enter a ledger only through `eat` and leave it only through
//! `destroy`. Every other act moves letters between the gut and speech.
//! [`verify_conservation`] checks that the letters currently held add up to
//! what the lifetime counters say should be there. It passes by construction
//! for any ledger mutated solely through [`AntLedger::apply`]; it exists to
//! catch corruption introduced elsewhere.
//!
//! [`AntLedger::apply`]: crate::AntLedger::apply

use crate::LedgerError;
use crate::gut::Gut;
use crate::speech::Speech;

/// Lifetime letter counters for one ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerTotals {
    /// Letters ever eaten.
    pub eaten: u64,
    /// Tracked letters discarded by `destroy`.
    pub destroyed: u64,
}

impl LedgerTotals {
    /// Zeroed counters.
    pub const fn new() -> Self {
        Self {
            eaten: 0,
            destroyed: 0,
        }
    }

    /// Letters that should currently be held (gut plus tracked speech).
    pub const fn expected_held(&self) -> Option<u64> {
        self.eaten.checked_sub(self.destroyed)
    }

    /// Compute the eaten counter after one more letter, without storing it.
    pub(crate) fn record_eaten(&self) -> Result<u64, LedgerError> {
        self.eaten
            .checked_add(1)
            .ok_or(LedgerError::ArithmeticOverflow {
                context: "eaten counter",
            })
    }

    /// Compute the destroyed counter after `count` more, without storing it.
    pub(crate) fn record_destroyed(&self, count: u64) -> Result<u64, LedgerError> {
        self.destroyed
            .checked_add(count)
            .ok_or(LedgerError::ArithmeticOverflow {
                context: "destroyed counter",
            })
    }
}

/// Outcome of a conservation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConservationResult {
    /// Held letters match the lifetime counters.
    Balanced,
    /// Held letters disagree with the lifetime counters.
    Anomaly {
        /// Letters the counters say should be held.
        expected: Option<u64>,
        /// Letters actually held (gut plus tracked speech).
        held: Option<u64>,
    },
}

/// Verify `gut.total() + speech.tracked_letters() == eaten - destroyed`.
pub fn verify_conservation(gut: &Gut, speech: &Speech, totals: &LedgerTotals) -> ConservationResult {
    let held = gut
        .total()
        .and_then(|g| g.checked_add(speech.tracked_letters()));
    let expected = totals.expected_held();

    match (held, expected) {
        (Some(h), Some(e)) if h == e => ConservationResult::Balanced,
        _ => ConservationResult::Anomaly { expected, held },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::speech::Segment;

    #[test]
    fn empty_ledger_is_balanced() {
        assert_eq!(
            verify_conservation(&Gut::new(), &Speech::new(), &LedgerTotals::new()),
            ConservationResult::Balanced
        );
    }

    #[test]
    fn detects_letters_from_nowhere() {
        let gut: Gut = [('a', 2)].into_iter().collect();
        let speech: Speech = [Segment::Letter('b')].into_iter().collect();
        let totals = LedgerTotals {
            eaten: 2,
            destroyed: 0,
        };
        assert_eq!(
            verify_conservation(&gut, &speech, &totals),
            ConservationResult::Anomaly {
                expected: Some(2),
                held: Some(3),
            }
        );
    }

    #[test]
    fn destroyed_exceeding_eaten_is_an_anomaly() {
        let totals = LedgerTotals {
            eaten: 1,
            destroyed: 2,
        };
        assert!(matches!(
            verify_conservation(&Gut::new(), &Speech::new(), &totals),
            ConservationResult::Anomaly { expected: None, .. }
        ));
    }
}
