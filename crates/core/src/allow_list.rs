//! Allow-list gate: which job classes may be executed at all.

use std::collections::BTreeSet;

/// Fixed set of qualified class names permitted to run.
///
/// Membership is exact string equality: no wildcards, no prefixes, no case
/// folding. The set is built once at startup and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    classes: BTreeSet<String>,
}

impl AllowList {
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma separated list; blank entries are ignored.
    pub fn parse(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        )
    }

    pub fn is_permitted(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
