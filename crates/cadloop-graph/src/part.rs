//! Graph nodes

use cadloop_plan::{PartOperation, Placement, PlanItem};
use std::collections::BTreeMap;

/// One part of the model and its generation state
///
/// `dependents` is derived by the owning graph and cannot be set directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    /// Unique name within a graph
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Base offset; `z` is height
    pub placement: Placement,
    /// Solid-building operation
    pub operation: PartOperation,
    /// Current code fragment
    pub code: String,
    /// Part-local numeric parameters
    pub parameters: BTreeMap<String, f64>,
    pub(crate) dependencies: Vec<String>,
    pub(crate) dependents: Vec<String>,
    pub(crate) dirty: bool,
    pub(crate) locked: bool,
}

impl Part {
    /// Create a clean, unlocked part at the origin
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            placement: Placement::default(),
            operation: PartOperation::default(),
            code: String::new(),
            parameters: BTreeMap::new(),
            dependencies: Vec::new(),
            dependents: Vec::new(),
            dirty: false,
            locked: false,
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

    /// With operation
    #[inline]
    #[must_use]
    pub fn with_operation(mut self, operation: PartOperation) -> Self {
        self.operation = operation;
        self
    }

    /// With a dependency; repeated names are kept once
    #[inline]
    #[must_use]
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.dependencies.contains(&name) {
            self.dependencies.push(name);
        }
        self
    }

    /// With code fragment
    #[inline]
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// With parameter
    #[inline]
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Declared dependency names, including ones missing from the graph
    #[inline]
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Registered parts that declare this one as a dependency
    #[inline]
    #[must_use]
    pub fn dependents(&self) -> &[String] {
        &self.dependents
    }

    /// Needs regeneration
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Protected from machine regeneration
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Name usable as a script identifier prefix
    #[must_use]
    pub fn safe_name(&self) -> String {
        safe_identifier(&self.name)
    }
}

impl From<&PlanItem> for Part {
    fn from(item: &PlanItem) -> Self {
        let mut part = Part::new(item.name.clone())
            .with_description(item.description.clone())
            .with_operation(item.operation);
        part.placement = item.placement;
        part.parameters = item.parameters.clone();
        for dep in &item.dependencies {
            part = part.depends_on(dep.clone());
        }
        part
    }
}

/// Python identifier derived from a part name
///
/// Anything outside `[A-Za-z0-9_]` becomes `_`. A leading digit or an empty
/// name gets a `_` prefix.
#[must_use]
pub fn safe_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}
