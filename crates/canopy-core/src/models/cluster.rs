//! Cluster identities, scoping keys and per-cluster summaries.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::error::CanopyError;
use crate::models::record::AlertRecord;

/// Attribute scoping for cluster merging.
///
/// Points only merge when they share the scope value, even if their footprints
/// touch. Rendered in configuration as `none`, `owner` or `owner+observed_at`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScopeKey {
    #[default]
    None,
    Attribute(String),
    Composite(Vec<String>),
}

impl ScopeKey {
    /// Field names participating in the key, in order
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ScopeKey::None => Vec::new(),
            ScopeKey::Attribute(name) => vec![name.as_str()],
            ScopeKey::Composite(names) => names.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_scoped(&self) -> bool {
        !matches!(self, ScopeKey::None)
    }

    /// Scope components of a record, one per key field, or `None` when unscoped.
    ///
    /// Records merge only when every component is equal. A missing attribute
    /// contributes an empty component, so records lacking the attribute share
    /// one scope with each other.
    pub fn scope_of(&self, record: &AlertRecord) -> Option<Vec<String>> {
        if !self.is_scoped() {
            return None;
        }
        Some(self.fields().into_iter().map(|f| record.field(f).unwrap_or_default()).collect())
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::None => write!(f, "none"),
            ScopeKey::Attribute(name) => write!(f, "{}", name),
            ScopeKey::Composite(names) => write!(f, "{}", names.join("+")),
        }
    }
}

impl std::str::FromStr for ScopeKey {
    type Err = CanopyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(ScopeKey::None);
        }

        let names: Vec<String> = trimmed.split('+').map(|p| p.trim().to_string()).collect();
        if names.iter().any(|n| n.is_empty()) {
            return Err(CanopyError::ConfigInvalid {
                key: "scope_key".to_string(),
                reason: format!("Empty attribute name in scope key '{}'", s),
            });
        }

        if names.len() == 1 {
            Ok(ScopeKey::Attribute(names.into_iter().next().unwrap_or_default()))
        } else {
            Ok(ScopeKey::Composite(names))
        }
    }
}

impl TryFrom<String> for ScopeKey {
    type Error = CanopyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScopeKey> for String {
    fn from(key: ScopeKey) -> Self {
        key.to_string()
    }
}

/// Cluster identity, unique within one output batch.
///
/// Sequences start at 1 and follow the lowest input index of each cluster, so
/// identical input yields identical ids. Scoped ids render as the scope
/// components joined by `|`, then `#sequence`; `\`, `|` and `#` inside a
/// component are backslash-escaped so distinct scopes never render alike.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClusterId {
    Sequence(u32),
    Scoped { scope: Vec<String>, sequence: u32 },
}

impl ClusterId {
    pub fn sequence(&self) -> u32 {
        match self {
            ClusterId::Sequence(n) => *n,
            ClusterId::Scoped { sequence, .. } => *sequence,
        }
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterId::Sequence(n) => write!(f, "{}", n),
            ClusterId::Scoped { scope, sequence } => write!(f, "{}#{}", render_scope(scope), sequence),
        }
    }
}

/// Text form of scope components
pub fn render_scope(parts: &[String]) -> String {
    let escaped: Vec<String> = parts
        .iter()
        .map(|part| part.replace('\\', "\\\\").replace('|', "\\|").replace('#', "\\#"))
        .collect();
    escaped.join("|")
}

impl Serialize for ClusterId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Aggregated measurements for one cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub id: ClusterId,

    /// Input indices of the member points, ascending
    pub members: Vec<usize>,

    /// Area of the exact footprint union (m², rounded to 0.01)
    pub area_m2: f64,

    pub area_ha: f64,

    /// Sum of individual footprint areas, overlap counted twice
    pub naive_area_m2: f64,

    /// Union centroid in projected coordinates
    #[serde(skip)]
    pub planar_centroid: Option<[f64; 2]>,

    /// Union centroid as longitude/latitude
    pub centroid: Option<[f64; 2]>,
}

impl ClusterSummary {
    pub fn point_count(&self) -> usize {
        self.members.len()
    }

    /// Area double-counted by a naive per-footprint sum
    pub fn overlap_m2(&self) -> f64 {
        (self.naive_area_m2 - self.area_m2).max(0.0)
    }
}
