//! Class id to semantic label mapping

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Labels that count as a fire alarm
const FIRE_LABELS: &[&str] = &["fire", "smoke"];

/// One entry of the configured class table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLabel {
    pub id: u32,
    pub label: String,
}

impl ClassLabel {
    pub fn new(id: u32, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}

/// Explicit class table of the loaded detector.
///
/// An empty map means the model's classes are unknown, in which case every
/// detection is treated as fire-relevant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassMap {
    labels: HashMap<u32, String>,
}

impl ClassMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_labels(labels: &[ClassLabel]) -> Self {
        Self {
            labels: labels
                .iter()
                .map(|entry| (entry.id, entry.label.to_lowercase()))
                .collect(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, class_id: u32) -> Option<&str> {
        self.labels.get(&class_id).map(String::as_str)
    }

    /// Whether a detection of this class should raise `has_fire`
    pub fn is_fire_relevant(&self, class_id: u32) -> bool {
        if self.is_unknown() {
            return true;
        }
        self.label(class_id)
            .map(|label| FIRE_LABELS.contains(&label))
            .unwrap_or(false)
    }
}
