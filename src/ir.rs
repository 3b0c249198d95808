use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::classfile::MemberRef;

/// Per-class bookkeeping assigned during analysis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ClassFlags {
    pub(crate) kept: bool,
    pub(crate) renamed: bool,
    pub(crate) stubbed: bool,
    pub(crate) excluded: bool,
    pub(crate) derived_root: bool,
}

/// A class read from an input JAR.
#[derive(Clone, Debug)]
pub(crate) struct ClassEntry {
    /// Internal name, e.g. `android/view/View`.
    pub(crate) name: String,
    pub(crate) bytes: Vec<u8>,
    /// JAR that supplied the class.
    pub(crate) source: PathBuf,
    pub(crate) flags: ClassFlags,
}

/// Facts pulled out of a class file for dependency analysis.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ClassReferences {
    pub(crate) name: String,
    pub(crate) super_name: Option<String>,
    pub(crate) interfaces: Vec<String>,
    /// Every other class named by the class file, without array wrappers.
    pub(crate) classes: BTreeSet<String>,
    pub(crate) method_refs: BTreeSet<MemberRef>,
}

/// Outgoing references of every kept class.
#[derive(Clone, Debug, Default)]
pub(crate) struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub(crate) fn insert(&mut self, from: &str, to: BTreeSet<String>) {
        self.edges.entry(from.to_string()).or_default().extend(to);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.edges.iter()
    }

    /// Classes in the graph that reference `class`.
    pub(crate) fn referrers(&self, class: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|(_, targets)| targets.contains(class))
            .map(|(from, _)| from.as_str())
            .collect()
    }
}

/// How a referenced class name resolved against the input set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Resolution {
    Found,
    /// Present in the input but matched by an exclude rule.
    Excluded,
    /// Not defined by any input JAR.
    Missing,
}

/// Result of the analyzer, read-only for the generator.
#[derive(Debug, Default)]
pub(crate) struct AnalysisResult {
    /// Every scanned class keyed by internal name, with its flags.
    pub(crate) classes: BTreeMap<String, ClassEntry>,
    pub(crate) graph: DependencyGraph,
    pub(crate) missing: BTreeSet<String>,
    /// Excluded classes still referenced by kept classes.
    pub(crate) excluded_references: BTreeSet<String>,
    /// Derived-from roots not defined by any input JAR.
    pub(crate) unresolved_roots: BTreeSet<String>,
    /// Include globs that matched no input class.
    pub(crate) unmatched_globs: Vec<String>,
    /// Retained non-class entries keyed by JAR path.
    pub(crate) resources: BTreeMap<String, Vec<u8>>,
}

impl AnalysisResult {
    pub(crate) fn kept(&self) -> impl Iterator<Item = &ClassEntry> {
        self.classes.values().filter(|entry| entry.flags.kept)
    }

    pub(crate) fn is_kept(&self, name: &str) -> bool {
        self.classes
            .get(name)
            .map(|entry| entry.flags.kept)
            .unwrap_or(false)
    }

    pub(crate) fn kept_count(&self) -> usize {
        self.kept().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_reports_referrers() {
        let mut graph = DependencyGraph::default();
        graph.insert("a/A", BTreeSet::from(["a/B".to_string(), "a/C".to_string()]));
        graph.insert("a/B", BTreeSet::from(["a/C".to_string()]));

        assert_eq!(vec!["a/A", "a/B"], graph.referrers("a/C"));
        assert!(graph.referrers("a/A").is_empty());
        assert_eq!(2, graph.iter().count());
    }
}
