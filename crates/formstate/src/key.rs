//! Child addressing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Key of a child inside a container: a name for groups, a position for
/// arrays.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChildKey {
    Index(usize),
    Name(String),
}

impl ChildKey {
    /// Position this key addresses in an array. Numeric names count, so a
    /// path parsed from text still reaches array children.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            ChildKey::Index(i) => Some(*i),
            ChildKey::Name(name) => name.parse().ok(),
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            ChildKey::Name(name) => Some(name),
            ChildKey::Index(_) => None,
        }
    }
}

impl fmt::Display for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildKey::Index(i) => write!(f, "{i}"),
            ChildKey::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for ChildKey {
    fn from(name: &str) -> Self {
        ChildKey::Name(name.to_owned())
    }
}

impl From<String> for ChildKey {
    fn from(name: String) -> Self {
        ChildKey::Name(name)
    }
}

impl From<&String> for ChildKey {
    fn from(name: &String) -> Self {
        ChildKey::Name(name.clone())
    }
}

impl From<usize> for ChildKey {
    fn from(index: usize) -> Self {
        ChildKey::Index(index)
    }
}

/// Build a lookup path out of mixed names and indices.
///
/// ```ignore
/// let street = form.get(&path!["addresses", 0usize, "street"]);
/// ```
#[macro_export]
macro_rules! path {
    ($($segment:expr),* $(,)?) => {
        [$($crate::ChildKey::from($segment)),*]
    };
}
