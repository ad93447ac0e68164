//! Shared types passed between callers, the dispatcher, and the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Unique, monotonically increasing identifier assigned at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Named output size. Each label maps to a bounding box in the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeLabel {
    Small,
    Medium,
    Large,
}

impl SizeLabel {
    pub const ALL: [SizeLabel; 3] = [SizeLabel::Small, SizeLabel::Medium, SizeLabel::Large];

    pub fn as_str(self) -> &'static str {
        match self {
            SizeLabel::Small => "small",
            SizeLabel::Medium => "medium",
            SizeLabel::Large => "large",
        }
    }
}

impl fmt::Display for SizeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(SizeLabel::Small),
            "medium" => Ok(SizeLabel::Medium),
            "large" => Ok(SizeLabel::Large),
            other => Err(format!(
                "unknown size '{other}' (expected small, medium or large)"
            )),
        }
    }
}

/// Priority tier. Decides queue position at submission, never preempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        })
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(format!(
                "unknown priority '{other}' (expected low, normal or high)"
            )),
        }
    }
}

/// Which sizes a job should produce.
///
/// `All` runs every size plus the placeholder. `Only` runs just the listed
/// sizes and skips the placeholder; it is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SizeSelection {
    #[default]
    All,
    Only(BTreeSet<SizeLabel>),
}

impl SizeSelection {
    /// Select specific sizes. An empty selection means all sizes.
    pub fn only(labels: impl IntoIterator<Item = SizeLabel>) -> Self {
        let labels: BTreeSet<SizeLabel> = labels.into_iter().collect();
        if labels.is_empty() {
            SizeSelection::All
        } else {
            SizeSelection::Only(labels)
        }
    }

    /// The labels this selection will encode, in size order.
    pub fn labels(&self) -> Vec<SizeLabel> {
        match self {
            SizeSelection::All => SizeLabel::ALL.to_vec(),
            SizeSelection::Only(labels) => labels.iter().copied().collect(),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, SizeSelection::All)
    }
}

/// Per-job options supplied by the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobOptions {
    pub sizes: SizeSelection,
    pub priority: Priority,
}

impl JobOptions {
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_sizes(mut self, labels: impl IntoIterator<Item = SizeLabel>) -> Self {
        self.sizes = SizeSelection::only(labels);
        self
    }
}

/// Optional facts about the upload, used for logging only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// One resized rendition in both encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub label: SizeLabel,
    pub avif: Vec<u8>,
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Outcome of a successful pipeline run.
///
/// In full mode `placeholder` is `Some` (empty if generation failed) and
/// `variants` holds every size that encoded. In partial mode `placeholder`
/// is `None` and `variants` holds the requested sizes that succeeded.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub job_id: JobId,
    pub variants: BTreeMap<SizeLabel, Variant>,
    pub placeholder: Option<String>,
    pub duration: Duration,
}

impl ProcessedImage {
    pub fn variant(&self, label: SizeLabel) -> Option<&Variant> {
        self.variants.get(&label)
    }

    /// Wall-clock processing time in whole milliseconds.
    pub fn processing_ms(&self) -> u128 {
        self.duration.as_millis()
    }
}
