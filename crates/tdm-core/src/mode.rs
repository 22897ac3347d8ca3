//! Travel mode identifiers shared by the network and the path search.
//!
//! A mode is a single character (`'c'` auto, `'b'` bus, `'w'` walk, …), the
//! convention used by network data sets this toolkit consumes.  A link
//! carries the [`ModeSet`] of modes allowed to traverse it.

use std::fmt;
use std::str::FromStr;

use crate::{CoreError, CoreResult};

/// A single-character travel mode.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mode(char);

impl Mode {
    /// Create a mode from its identifying character.
    ///
    /// Only ASCII alphanumeric characters are valid mode identifiers.
    pub fn new(c: char) -> CoreResult<Self> {
        if c.is_ascii_alphanumeric() {
            Ok(Self(c))
        } else {
            Err(CoreError::Parse(format!("invalid mode identifier {c:?}")))
        }
    }

    #[inline]
    pub fn as_char(self) -> char {
        self.0
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<char> for Mode {
    type Error = CoreError;
    fn try_from(c: char) -> CoreResult<Self> {
        Self::new(c)
    }
}

/// Sorted, de-duplicated set of modes.
///
/// Backed by a sorted `Vec`; links rarely carry more than a few modes.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModeSet {
    modes: Vec<Mode>,
}

impl ModeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `mode`; returns `false` if it was already present.
    pub fn insert(&mut self, mode: Mode) -> bool {
        match self.modes.binary_search(&mode) {
            Ok(_) => false,
            Err(pos) => {
                self.modes.insert(pos, mode);
                true
            }
        }
    }

    #[inline]
    pub fn contains(&self, mode: Mode) -> bool {
        self.modes.binary_search(&mode).is_ok()
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Mode> + '_ {
        self.modes.iter().copied()
    }
}

impl FromIterator<Mode> for ModeSet {
    fn from_iter<I: IntoIterator<Item = Mode>>(iter: I) -> Self {
        let mut modes: Vec<Mode> = iter.into_iter().collect();
        modes.sort_unstable();
        modes.dedup();
        Self { modes }
    }
}

impl FromStr for ModeSet {
    type Err = CoreError;

    /// Parse a mode string such as `"cbw"`.  Whitespace is ignored.
    fn from_str(s: &str) -> CoreResult<Self> {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .map(Mode::new)
            .collect()
    }
}

impl fmt::Display for ModeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.modes {
            write!(f, "{m}")?;
        }
        Ok(())
    }
}
