use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::selection::{MealTiming, PillCount, PillType, TimeOfDay};

/// Closed vocabulary of the static clip library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipKey {
    Count(PillCount),
    Pill(PillType),
    Medicine,
    MealTiming(MealTiming),
    Meal,
    Time(TimeOfDay),
}

impl ClipKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipKey::Count(count) => count.as_str(),
            ClipKey::Pill(pill) => pill.as_str(),
            ClipKey::Medicine => "medicine",
            ClipKey::MealTiming(timing) => timing.as_str(),
            ClipKey::Meal => "meal",
            ClipKey::Time(time) => time.as_str(),
        }
    }
}

impl fmt::Display for ClipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A clip identifier together with the address it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipReference {
    key: String,
    address: String,
}

impl ClipReference {
    pub fn new(key: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            address: address.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Ordered, immutable list of clips. Cloning shares the underlying list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipSequence(Arc<[ClipReference]>);

impl ClipSequence {
    pub fn new(clips: Vec<ClipReference>) -> Self {
        Self(clips.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClipReference> {
        self.0.iter()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.0.iter().map(ClipReference::key).collect()
    }
}

impl From<Vec<ClipReference>> for ClipSequence {
    fn from(clips: Vec<ClipReference>) -> Self {
        Self::new(clips)
    }
}

impl<'a> IntoIterator for &'a ClipSequence {
    type Item = &'a ClipReference;
    type IntoIter = std::slice::Iter<'a, ClipReference>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Addressing scheme of the clip library: `<base_path><key><extension>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipLibrary {
    pub base_path: String,
    pub extension: String,
}

impl Default for ClipLibrary {
    fn default() -> Self {
        Self {
            base_path: "/assets/".into(),
            extension: ".mp4".into(),
        }
    }
}

impl ClipLibrary {
    pub fn new(base_path: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            extension: extension.into(),
        }
    }

    pub fn resolve(&self, key: ClipKey) -> ClipReference {
        ClipReference::new(
            key.as_str(),
            format!("{}{}{}", self.base_path, key.as_str(), self.extension),
        )
    }
}
