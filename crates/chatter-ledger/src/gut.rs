//! The gut: an ant's inventory of eaten letters.
//!
//! Counts are always strictly positive; a letter whose count reaches zero
//! is removed from the map entirely, so `{"a": 0}` is never observable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::LedgerError;

/// Letter inventory keyed by character.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gut {
    letters: BTreeMap<char, u32>,
}

impl Gut {
    /// Create an empty gut.
    pub const fn new() -> Self {
        Self {
            letters: BTreeMap::new(),
        }
    }

    /// How many of `letter` the gut holds.
    pub fn count(&self, letter: char) -> u32 {
        self.letters.get(&letter).copied().unwrap_or(0)
    }

    /// Sum of all counts. Returns `None` on overflow.
    pub fn total(&self) -> Option<u64> {
        let mut total: u64 = 0;
        for qty in self.letters.values() {
            total = total.checked_add(u64::from(*qty))?;
        }
        Some(total)
    }

    /// Whether the gut holds no letters at all.
    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }

    /// Iterate over `(letter, count)` pairs in letter order.
    pub fn iter(&self) -> impl Iterator<Item = (char, u32)> + '_ {
        self.letters.iter().map(|(c, n)| (*c, *n))
    }

    /// Add one `letter`.
    pub fn add(&mut self, letter: char) -> Result<(), LedgerError> {
        let next = self
            .count(letter)
            .checked_add(1)
            .ok_or(LedgerError::ArithmeticOverflow {
                context: "gut letter count",
            })?;
        self.letters.insert(letter, next);
        Ok(())
    }

    /// Remove one `letter`, deleting the key when it reaches zero.
    ///
    /// Fails without mutating if the gut does not hold the letter.
    pub fn take(&mut self, letter: char) -> Result<(), LedgerError> {
        let current = self.count(letter);
        let remaining = current
            .checked_sub(1)
            .ok_or(LedgerError::InsufficientLetter {
                letter,
                available: current,
            })?;

        if remaining == 0 {
            self.letters.remove(&letter);
        } else {
            self.letters.insert(letter, remaining);
        }
        Ok(())
    }
}

impl FromIterator<(char, u32)> for Gut {
    /// Build a gut from counts, dropping zero entries.
    fn from_iter<I: IntoIterator<Item = (char, u32)>>(iter: I) -> Self {
        Self {
            letters: iter.into_iter().filter(|(_, n)| *n > 0).collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn add_and_take() {
        let mut gut = Gut::new();
        gut.add('a').unwrap();
        gut.add('a').unwrap();
        gut.add('b').unwrap();
        assert_eq!(gut.count('a'), 2);
        assert_eq!(gut.total(), Some(3));

        gut.take('b').unwrap();
        assert_eq!(gut.count('b'), 0);
        assert!(gut.iter().all(|(c, _)| c != 'b'));
    }

    #[test]
    fn take_missing_letter_fails_without_mutation() {
        let mut gut: Gut = [('a', 1)].into_iter().collect();
        let err = gut.take('z').unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientLetter {
                letter: 'z',
                available: 0
            }
        );
        assert_eq!(gut.total(), Some(1));
    }

    #[test]
    fn zero_counts_never_stored() {
        let gut: Gut = [('a', 0), ('b', 2)].into_iter().collect();
        assert_eq!(gut.iter().count(), 1);
    }

    #[test]
    fn serializes_as_letter_map() {
        let gut: Gut = [('a', 2), ('q', 1)].into_iter().collect();
        let json = serde_json::to_string(&gut).unwrap();
        assert_eq!(json, r#"{"a":2,"q":1}"#);
        let back: Gut = serde_json::from_str(&json).unwrap();
        assert_eq!(back, gut);
    }
}
