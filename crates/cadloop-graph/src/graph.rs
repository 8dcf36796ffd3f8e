//! Part dependency graph
//!
//! Edges point from a part to the parts it depends on. Edges to names that
//! are not registered are still recorded so that [`PartDependencyGraph::validate`]
//! can report them.
//!
//! # Invariants
//! - Part names are unique; iteration follows insertion order
//! - The reverse index holds every recorded edge, registered target or not
//! - A part's `dependents` lists only registered declaring parts

use crate::issue::GraphIssue;
use crate::part::Part;
use cadloop_plan::{PartOperation, Placement, PlanItem};
use indexmap::{IndexMap, IndexSet};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Dependency graph over the parts of one session
#[derive(Debug, Clone, Default)]
pub struct PartDependencyGraph {
    parts: IndexMap<String, Part>,
    /// dependency name -> parts declaring it
    reverse: IndexMap<String, IndexSet<String>>,
}

impl PartDependencyGraph {
    /// Create an empty graph
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from plan items
    #[must_use]
    pub fn from_plan(items: &[PlanItem]) -> Self {
        let mut graph = Self::new();
        graph.load_plan(items);
        graph
    }

    /// Replace all state with the parts of a plan
    ///
    /// Parts are inserted first and edges wired afterwards, so backlinks do
    /// not depend on plan order. A repeated name keeps the later item.
    pub fn load_plan(&mut self, items: &[PlanItem]) {
        self.parts.clear();
        self.reverse.clear();

        for item in items {
            let part = Part::from(item);
            self.parts.insert(part.name.clone(), part);
        }
        self.revalidate();

        tracing::debug!(parts = self.parts.len(), "graph loaded from plan");
    }

    /// Register a part
    ///
    /// Dependents backlinks are added only on dependencies that are already
    /// registered. Re-adding a name replaces its outgoing edges and keeps
    /// the edges of parts that depend on it.
    pub fn add_part(&mut self, mut part: Part) {
        let name = part.name.clone();
        part.dependents.clear();

        if let Some(previous) = self.parts.get(&name) {
            let old_dependencies = previous.dependencies.clone();
            part.dependents.clone_from(&previous.dependents);
            self.unlink(&name, &old_dependencies);
        }

        let dependencies = part.dependencies.clone();
        self.parts.insert(name.clone(), part);
        self.link(&name, &dependencies);
    }

    /// Remove a part and every edge touching it
    ///
    /// Returns the removed part, or `None` if it was not registered.
    pub fn remove_part(&mut self, name: &str) -> Option<Part> {
        let dependencies = self.parts.get(name)?.dependencies.clone();
        self.unlink(name, &dependencies);

        if let Some(declaring) = self.reverse.shift_remove(name) {
            for dependent in &declaring {
                if let Some(part) = self.parts.get_mut(dependent) {
                    part.dependencies.retain(|d| d != name);
                }
            }
        }

        self.parts.shift_remove(name)
    }

    /// Rebuild every dependents backlink from the recorded edges
    ///
    /// Repairs graphs loaded with `add_part` in an order where dependents
    /// came before their dependencies.
    pub fn revalidate(&mut self) {
        self.reverse.clear();
        for part in self.parts.values_mut() {
            part.dependents.clear();
        }

        let edges: Vec<(String, Vec<String>)> = self
            .parts
            .iter()
            .map(|(name, part)| (name.clone(), part.dependencies.clone()))
            .collect();
        for (name, dependencies) in edges {
            self.link(&name, &dependencies);
        }
    }

    fn link(&mut self, name: &str, dependencies: &[String]) {
        for dep in dependencies {
            self.reverse
                .entry(dep.clone())
                .or_default()
                .insert(name.to_string());

            if let Some(target) = self.parts.get_mut(dep) {
                if !target.dependents.iter().any(|d| d == name) {
                    target.dependents.push(name.to_string());
                }
            }
        }
    }

    fn unlink(&mut self, name: &str, dependencies: &[String]) {
        for dep in dependencies {
            if let Some(declaring) = self.reverse.get_mut(dep) {
                declaring.shift_remove(name);
                if declaring.is_empty() {
                    self.reverse.shift_remove(dep);
                }
            }
            if let Some(target) = self.parts.get_mut(dep) {
                target.dependents.retain(|d| d != name);
            }
        }
    }

    /// Part by name
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Part> {
        self.parts.get(name)
    }

    /// Mutable part by name; edges cannot be changed through it
    #[inline]
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Part> {
        self.parts.get_mut(name)
    }

    /// Whether a part is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    /// Number of parts
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether the graph has no parts
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Parts in insertion order
    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    /// Part names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Set the dirty flag; returns false if the part is unknown
    pub fn mark_dirty(&mut self, name: &str) -> bool {
        self.set_flag(name, |p| p.dirty = true)
    }

    /// Clear the dirty flag; returns false if the part is unknown
    pub fn mark_clean(&mut self, name: &str) -> bool {
        self.set_flag(name, |p| p.dirty = false)
    }

    /// Protect a part from regeneration; returns false if unknown
    pub fn lock(&mut self, name: &str) -> bool {
        self.set_flag(name, |p| p.locked = true)
    }

    /// Release a lock; returns false if unknown
    pub fn unlock(&mut self, name: &str) -> bool {
        self.set_flag(name, |p| p.locked = false)
    }

    fn set_flag(&mut self, name: &str, apply: impl FnOnce(&mut Part)) -> bool {
        match self.parts.get_mut(name) {
            Some(part) => {
                apply(part);
                true
            }
            None => false,
        }
    }

    /// Parts flagged dirty, in insertion order
    #[must_use]
    pub fn dirty_parts(&self) -> Vec<String> {
        self.names_where(Part::is_dirty)
    }

    /// Parts not locked, in insertion order
    #[must_use]
    pub fn unlocked_parts(&self) -> Vec<String> {
        self.names_where(|p| !p.is_locked())
    }

    /// Locked parts, in insertion order
    #[must_use]
    pub fn locked_parts(&self) -> Vec<String> {
        self.names_where(Part::is_locked)
    }

    fn names_where(&self, predicate: impl Fn(&Part) -> bool) -> Vec<String> {
        self.parts
            .values()
            .filter(|p| predicate(p))
            .map(|p| p.name.clone())
            .collect()
    }

    /// Every part transitively depending on `name`
    ///
    /// Depth-first preorder, each part once, `name` itself excluded.
    #[must_use]
    pub fn affected_by(&self, name: &str) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        self.walk_dependents(name, name, &mut visited, &mut out);
        out
    }

    fn walk_dependents<'a>(
        &'a self,
        node: &str,
        start: &str,
        visited: &mut HashSet<&'a str>,
        out: &mut Vec<String>,
    ) {
        let Some(declaring) = self.reverse.get(node) else {
            return;
        };
        for dependent in declaring {
            if dependent == start || !visited.insert(dependent.as_str()) {
                continue;
            }
            out.push(dependent.clone());
            self.walk_dependents(dependent, start, visited, out);
        }
    }

    /// Transitive dependencies of `name`, including unregistered targets
    #[must_use]
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        self.walk_dependencies(name, name, &mut visited, &mut out);
        out
    }

    fn walk_dependencies<'a>(
        &'a self,
        node: &str,
        start: &str,
        visited: &mut HashSet<&'a str>,
        out: &mut Vec<String>,
    ) {
        let Some(part) = self.parts.get(node) else {
            return;
        };
        for dep in &part.dependencies {
            if dep == start || !visited.insert(dep.as_str()) {
                continue;
            }
            out.push(dep.clone());
            self.walk_dependencies(dep, start, visited, out);
        }
    }

    /// Dependencies before dependents (Kahn's algorithm)
    ///
    /// Only edges to registered parts count. Ties resolve in insertion
    /// order. Parts on a cycle, and parts depending on one, are omitted.
    #[must_use]
    pub fn topological_order(&self) -> Vec<String> {
        let mut in_degree: IndexMap<&str, usize> = self
            .parts
            .iter()
            .map(|(name, part)| {
                let degree = part
                    .dependencies
                    .iter()
                    .filter(|d| self.parts.contains_key(d.as_str()))
                    .count();
                (name.as_str(), degree)
            })
            .collect();

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut order = Vec::with_capacity(self.parts.len());
        while let Some(node) = queue.pop_front() {
            order.push(node.to_string());

            let Some(declaring) = self.reverse.get(node) else {
                continue;
            };
            for dependent in declaring {
                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    if *degree > 0 {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent.as_str());
                        }
                    }
                }
            }
        }

        order
    }

    /// Report cycles and dangling references; never mutates
    ///
    /// Cycle issues come first, one per part on a cycle, then dangling
    /// references, both in insertion order.
    #[must_use]
    pub fn validate(&self) -> Vec<GraphIssue> {
        let mut g: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in self.parts.keys() {
            g.add_node(name.as_str());
        }
        for (name, part) in &self.parts {
            for dep in &part.dependencies {
                if self.parts.contains_key(dep) {
                    g.add_edge(name.as_str(), dep.as_str(), ());
                }
            }
        }

        let cyclic: HashSet<&str> = tarjan_scc(&g)
            .into_iter()
            .filter(|scc| scc.len() > 1 || scc.first().is_some_and(|n| g.contains_edge(*n, *n)))
            .flatten()
            .collect();

        let mut issues: Vec<GraphIssue> = self
            .parts
            .keys()
            .filter(|name| cyclic.contains(name.as_str()))
            .map(|name| GraphIssue::Cycle { part: name.clone() })
            .collect();

        for (name, part) in &self.parts {
            for dep in &part.dependencies {
                if !self.parts.contains_key(dep) {
                    issues.push(GraphIssue::Dangling {
                        part: name.clone(),
                        missing: dep.clone(),
                    });
                }
            }
        }

        issues
    }

    /// Serialisable view for history snapshots
    #[must_use]
    pub fn to_snapshot(&self) -> GraphSnapshot {
        let parts = self
            .parts
            .iter()
            .map(|(name, part)| {
                let snapshot = PartSnapshot {
                    name: part.name.clone(),
                    description: part.description.clone(),
                    placement: part.placement,
                    operation: part.operation,
                    dependencies: part.dependencies.clone(),
                    is_locked: part.locked,
                };
                (name.clone(), snapshot)
            })
            .collect();
        GraphSnapshot { parts }
    }
}

/// Serialisable view of one part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartSnapshot {
    pub name: String,
    pub description: String,
    #[serde(rename = "location")]
    pub placement: Placement,
    pub operation: PartOperation,
    pub dependencies: Vec<String>,
    pub is_locked: bool,
}

/// Serialisable view of a graph, keyed by part name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub parts: IndexMap<String, PartSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chain() -> PartDependencyGraph {
        // base <- leg <- top, base <- rail
        PartDependencyGraph::from_plan(&[
            PlanItem::new("base"),
            PlanItem::new("leg").depends_on("base"),
            PlanItem::new("top").depends_on("leg"),
            PlanItem::new("rail").depends_on("base"),
        ])
    }

    #[test]
    fn add_part_links_only_registered_dependencies() {
        let mut g = PartDependencyGraph::new();
        g.add_part(Part::new("lid").depends_on("box"));
        g.add_part(Part::new("box"));

        // out of order: backlink missing until revalidated
        assert!(g.get("box").unwrap().dependents().is_empty());
        assert_eq!(g.affected_by("box"), vec!["lid".to_string()]);

        g.revalidate();
        assert_eq!(g.get("box").unwrap().dependents(), &["lid".to_string()]);
    }

    #[test]
    fn from_plan_is_order_independent() {
        let g = PartDependencyGraph::from_plan(&[
            PlanItem::new("top").depends_on("leg"),
            PlanItem::new("leg").depends_on("base"),
            PlanItem::new("base"),
        ]);
        assert_eq!(g.get("base").unwrap().dependents(), &["leg".to_string()]);
        assert_eq!(g.get("leg").unwrap().dependents(), &["top".to_string()]);
        assert_eq!(g.topological_order(), vec!["base", "leg", "top"]);
    }

    #[test]
    fn affected_by_walks_dependents_transitively() {
        let g = chain();
        assert_eq!(g.affected_by("base"), vec!["leg", "top", "rail"]);
        assert_eq!(g.affected_by("top"), Vec::<String>::new());
        assert!(g.affected_by("missing").is_empty());
    }

    #[test]
    fn dependencies_of_includes_dangling_targets() {
        let mut g = chain();
        g.add_part(Part::new("lamp").depends_on("top").depends_on("socket"));
        assert_eq!(g.dependencies_of("lamp"), vec!["top", "leg", "base", "socket"]);
    }

    #[test]
    fn topological_order_puts_dependencies_first() {
        let g = chain();
        assert_eq!(g.topological_order(), vec!["base", "leg", "rail", "top"]);
    }

    #[test]
    fn cycles_are_reported_and_omitted_from_order() {
        let g = PartDependencyGraph::from_plan(&[
            PlanItem::new("a").depends_on("b"),
            PlanItem::new("b").depends_on("a"),
            PlanItem::new("c"),
            PlanItem::new("d").depends_on("d"),
        ]);

        let issues = g.validate();
        let cycles: Vec<_> = issues.iter().filter(|i| i.is_cycle()).map(GraphIssue::part).collect();
        assert_eq!(cycles, vec!["a", "b", "d"]);
        assert_eq!(g.topological_order(), vec!["c"]);
        assert_eq!(issues[0].to_string(), "Circular dependency detected for a");
    }

    #[test]
    fn dangling_reference_reported() {
        let g = PartDependencyGraph::from_plan(&[PlanItem::new("lid").depends_on("box")]);
        assert_eq!(
            g.validate(),
            vec![GraphIssue::Dangling {
                part: "lid".into(),
                missing: "box".into()
            }]
        );
        assert_eq!(g.validate()[0].to_string(), "lid depends on non-existent part box");
        assert_eq!(g.topological_order(), vec!["lid"]);
    }

    #[test]
    fn remove_part_repairs_neighbours() {
        let mut g = chain();
        let removed = g.remove_part("leg").unwrap();
        assert_eq!(removed.name, "leg");

        assert!(g.get("top").unwrap().dependencies().is_empty());
        assert_eq!(g.get("base").unwrap().dependents(), &["rail".to_string()]);
        assert_eq!(g.affected_by("base"), vec!["rail"]);
        assert!(g.validate().is_empty());
        assert!(g.remove_part("leg").is_none());
    }

    #[test]
    fn re_adding_replaces_outgoing_and_keeps_incoming() {
        let mut g = chain();
        g.add_part(Part::new("leg").depends_on("rail"));

        let leg = g.get("leg").unwrap();
        assert_eq!(leg.dependencies(), &["rail".to_string()]);
        assert_eq!(leg.dependents(), &["top".to_string()]);
        assert_eq!(g.get("base").unwrap().dependents(), &["rail".to_string()]);
        assert_eq!(g.affected_by("rail"), vec!["leg", "top"]);
    }

    #[test]
    fn flags_do_not_cascade() {
        let mut g = chain();
        assert!(g.mark_dirty("base"));
        assert!(!g.mark_dirty("ghost"));
        assert_eq!(g.dirty_parts(), vec!["base"]);

        g.mark_clean("base");
        assert!(g.dirty_parts().is_empty());

        g.lock("leg");
        assert_eq!(g.locked_parts(), vec!["leg"]);
        assert_eq!(g.unlocked_parts(), vec!["base", "top", "rail"]);
        g.unlock("leg");
        assert!(g.locked_parts().is_empty());
    }

    #[test]
    fn load_plan_replaces_state() {
        let mut g = chain();
        g.lock("base");
        g.load_plan(&[PlanItem::new("solo")]);
        assert_eq!(g.names().collect::<Vec<_>>(), vec!["solo"]);
        assert!(g.locked_parts().is_empty());
        assert!(g.affected_by("base").is_empty());
    }

    #[test]
    fn snapshot_serialises_location_and_lock() {
        let mut g = PartDependencyGraph::from_plan(&[PlanItem::new("seat").at(0.0, 0.0, 45.0)]);
        g.lock("seat");

        let json = serde_json::to_value(g.to_snapshot()).unwrap();
        assert_eq!(json["parts"]["seat"]["location"], serde_json::json!([0.0, 0.0, 45.0]));
        assert_eq!(json["parts"]["seat"]["is_locked"], true);
        assert_eq!(json["parts"]["seat"]["operation"], "extrude");
    }
}
