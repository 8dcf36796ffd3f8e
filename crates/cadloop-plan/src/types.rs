//! Plan types
//!
//! Defines the pre-graph form of a generation run:
//! - [`PlanItem`]: one proposed part
//! - [`Plan`]: ordered items plus rationale and global parameters
//! - [`PartOperation`]: closed set of solid-building operations
//! - [`Placement`]: base offset of a part

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Operation used to build a part's solid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PartOperation {
    /// Sketch extruded along Z
    #[default]
    Extrude,
    /// Sketch revolved around an axis
    Revolve,
    /// Lofted between several sketches
    Loft,
}

impl PartOperation {
    /// Lowercase name as it appears in plans
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extrude => "extrude",
            Self::Revolve => "revolve",
            Self::Loft => "loft",
        }
    }
}

impl fmt::Display for PartOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartOperation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "extrude" => Ok(Self::Extrude),
            "revolve" => Ok(Self::Revolve),
            "loft" => Ok(Self::Loft),
            _ => Err(UnknownOperation(s.to_string())),
        }
    }
}

impl TryFrom<String> for PartOperation {
    type Error = UnknownOperation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PartOperation> for String {
    fn from(op: PartOperation) -> Self {
        op.as_str().to_string()
    }
}

/// Operation name outside the supported set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown part operation: {0:?} (expected extrude, revolve or loft)")]
pub struct UnknownOperation(pub String);

/// Base offset of a part; `z` is the height above ground
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "[f64; 3]")]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Placement {
    /// Create a placement
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Height coordinate
    #[inline]
    #[must_use]
    pub const fn height(&self) -> f64 {
        self.z
    }

    /// Euclidean distance in the XY plane
    #[inline]
    #[must_use]
    pub fn xy_distance(&self, other: &Placement) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.hypot(dy)
    }
}

// Planner output is loose: short vectors pad with zeros, extra values drop.
impl From<Vec<f64>> for Placement {
    fn from(v: Vec<f64>) -> Self {
        let at = |i: usize| v.get(i).copied().unwrap_or(0.0);
        Self::new(at(0), at(1), at(2))
    }
}

impl From<[f64; 3]> for Placement {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<Placement> for [f64; 3] {
    fn from(p: Placement) -> Self {
        [p.x, p.y, p.z]
    }
}

fn default_part_name() -> String {
    "part".to_string()
}

/// One proposed part, before it becomes a graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    /// Unique part name
    #[serde(default = "default_part_name")]
    pub name: String,
    /// Free-text description (shape, dimensions)
    #[serde(default)]
    pub description: String,
    /// Base offset
    #[serde(default, rename = "location", alias = "placement")]
    pub placement: Placement,
    /// Names of parts this one rests on or attaches to
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Solid-building operation
    #[serde(default)]
    pub operation: PartOperation,
    /// Part-local numeric parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, f64>,
}

impl PlanItem {
    /// Create an item at the origin with no dependencies
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            placement: Placement::default(),
            dependencies: Vec::new(),
            operation: PartOperation::default(),
            parameters: BTreeMap::new(),
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With placement
    #[inline]
    #[must_use]
    pub fn at(mut self, x: f64, y: f64, z: f64) -> Self {
        self.placement = Placement::new(x, y, z);
        self
    }

    /// With dependency
    #[inline]
    #[must_use]
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// With operation
    #[inline]
    #[must_use]
    pub fn with_operation(mut self, operation: PartOperation) -> Self {
        self.operation = operation;
        self
    }

    /// With parameter
    #[inline]
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }
}

/// Ordered part plan produced by the planning service
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Plan {
    /// Items in plan order
    pub items: Vec<PlanItem>,
    /// Planner's explanation of the decomposition
    #[serde(default)]
    pub rationale: String,
    /// Global parameters shared by all parts
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, f64>,
}

impl Plan {
    /// Create a plan from items
    #[inline]
    #[must_use]
    pub fn new(items: Vec<PlanItem>) -> Self {
        Self {
            items,
            rationale: String::new(),
            parameters: BTreeMap::new(),
        }
    }

    /// With rationale
    #[inline]
    #[must_use]
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    /// With global parameter
    #[inline]
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Number of items
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the plan has no items
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Part names in plan order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.name.as_str())
    }

    /// Item by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PlanItem> {
        self.items.iter().find(|i| i.name == name)
    }

    /// Parameter names offered to the part-code service
    #[must_use]
    pub fn available_parameters(&self) -> Vec<String> {
        self.parameters.keys().cloned().collect()
    }
}
