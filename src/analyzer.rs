use std::collections::{BTreeMap, BTreeSet, VecDeque};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::config::CreateInfo;
use crate::descriptor::{binary_name, internal_name};
use crate::glob::GlobSet;
use crate::ir::{AnalysisResult, ClassEntry, ClassReferences, DependencyGraph, Resolution};
use crate::references::collect_references;
use crate::scan::ScanOutput;

/// Computes the set of classes to keep from the configured roots.
pub(crate) struct Analyzer<'a> {
    info: &'a CreateInfo,
    include: GlobSet,
    exclude: GlobSet,
    exclude_files: GlobSet,
}

impl<'a> Analyzer<'a> {
    pub(crate) fn new(info: &'a CreateInfo) -> Result<Self> {
        Ok(Self {
            info,
            include: GlobSet::classes(&info.include).context("invalid include pattern")?,
            exclude: GlobSet::classes(&info.exclude).context("invalid exclude pattern")?,
            exclude_files: GlobSet::paths(&info.exclude_files)
                .context("invalid exclude-file pattern")?,
        })
    }

    pub(crate) fn analyze(&self, scan: ScanOutput) -> Result<AnalysisResult> {
        let mut references = BTreeMap::new();
        for (name, entry) in &scan.classes {
            let collected = collect_references(&entry.bytes).with_context(|| {
                format!("failed to parse {}:{}.class", entry.source.display(), name)
            })?;
            if collected.name != *name {
                warn!(
                    "{}.class in {} declares class {}",
                    name,
                    entry.source.display(),
                    collected.name
                );
            }
            references.insert(name.clone(), collected);
        }

        let mut result = AnalysisResult {
            classes: scan.classes,
            ..AnalysisResult::default()
        };
        for (name, entry) in result.classes.iter_mut() {
            entry.flags.excluded = self.is_excluded(name);
        }

        let seeds = self.seeds(&references, &mut result);
        let kept = self.closure(seeds, &references, &mut result);

        let renamed: BTreeSet<String> = self
            .info
            .rename_table()
            .into_iter()
            .map(|(from, _)| from)
            .collect();
        for name in &kept {
            if let Some(entry) = result.classes.get_mut(name) {
                entry.flags.kept = true;
                entry.flags.renamed = renamed.contains(name);
                entry.flags.stubbed = self.replaces_bodies_of(name);
            }
        }

        result.resources = scan
            .resources
            .into_iter()
            .filter(|(path, _)| self.keeps_resource(path))
            .collect();

        info!(
            "kept {} of {} classes, {} resources",
            kept.len(),
            result.classes.len(),
            result.resources.len()
        );
        let derived = result
            .classes
            .values()
            .filter(|entry| entry.flags.derived_root)
            .count();
        let edges: usize = result.graph.iter().map(|(_, targets)| targets.len()).sum();
        debug!("{derived} classes derive from the roots; {edges} outgoing references");
        if !result.missing.is_empty() {
            debug!(
                "{} referenced classes are not in the inputs",
                result.missing.len()
            );
            for name in &result.missing {
                debug!(
                    "missing dependency {} referenced by {}",
                    binary_name(name),
                    result.graph.referrers(name).join(", ")
                );
            }
        }
        for name in &result.excluded_references {
            debug!(
                "excluded class {} is still referenced; expecting it at runtime",
                binary_name(name)
            );
        }
        Ok(result)
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.exclude.is_match(&binary_name(name))
    }

    fn resolve(&self, name: &str, classes: &BTreeMap<String, ClassEntry>) -> Resolution {
        if self.is_excluded(name) {
            return Resolution::Excluded;
        }
        if classes.contains_key(name) {
            Resolution::Found
        } else {
            Resolution::Missing
        }
    }

    /// Derived-from matches, include-glob matches and rename sources.
    fn seeds(
        &self,
        references: &BTreeMap<String, ClassReferences>,
        result: &mut AnalysisResult,
    ) -> BTreeSet<String> {
        let mut seeds = BTreeSet::new();

        for root in &self.info.derived_from {
            let root = internal_name(root);
            if !result.classes.contains_key(&root) {
                result.unresolved_roots.insert(root.clone());
            }
            for name in derived_from(&root, references) {
                if let Some(entry) = result.classes.get_mut(&name) {
                    if entry.flags.excluded {
                        continue;
                    }
                    entry.flags.derived_root = true;
                    seeds.insert(name);
                }
            }
        }

        for pattern in self.include.patterns() {
            let mut matched = false;
            for (name, entry) in &result.classes {
                if pattern.is_match(&binary_name(name)) {
                    matched = true;
                    if !entry.flags.excluded {
                        seeds.insert(name.clone());
                    }
                }
            }
            if !matched {
                result.unmatched_globs.push(pattern.as_str().to_string());
            }
        }

        for (from, _) in self.info.rename_table() {
            if let Some(entry) = result.classes.get(&from) {
                if !entry.flags.excluded {
                    seeds.insert(from);
                }
            }
        }

        seeds
    }

    /// Follows references from the seeds until nothing new is found.
    fn closure(
        &self,
        seeds: BTreeSet<String>,
        references: &BTreeMap<String, ClassReferences>,
        result: &mut AnalysisResult,
    ) -> BTreeSet<String> {
        let mut kept = BTreeSet::new();
        let mut queue: VecDeque<String> = seeds.into_iter().collect();
        let mut graph = DependencyGraph::default();

        while let Some(name) = queue.pop_front() {
            if !kept.insert(name.clone()) {
                continue;
            }
            let Some(class) = references.get(&name) else {
                continue;
            };
            let targets = self.dependencies_of(class);
            for target in &targets {
                match self.resolve(target, &result.classes) {
                    Resolution::Found => {
                        if !kept.contains(target) {
                            queue.push_back(target.clone());
                        }
                    }
                    Resolution::Excluded => {
                        result.excluded_references.insert(target.clone());
                    }
                    Resolution::Missing => {
                        result.missing.insert(target.clone());
                    }
                }
            }
            graph.insert(&name, targets);
        }

        result.graph = graph;
        kept
    }

    fn dependencies_of(&self, class: &ClassReferences) -> BTreeSet<String> {
        let mut targets = class.classes.clone();
        for redirect in &self.info.redirect_call {
            let redirected = class
                .method_refs
                .iter()
                .any(|call| redirect.matches(&call.owner, &call.name, &call.descriptor));
            if redirected {
                targets.insert(redirect.target_internal());
            }
        }
        targets.remove(&class.name);
        targets
    }

    fn replaces_bodies_of(&self, name: &str) -> bool {
        self.info.delegates_natives(name)
            || self
                .info
                .replace_method
                .iter()
                .any(|replacer| internal_name(&replacer.class) == name)
    }

    fn keeps_resource(&self, path: &str) -> bool {
        if path == "META-INF/MANIFEST.MF" || is_signature_file(path) {
            return false;
        }
        if self.exclude_files.is_match(path) {
            debug!("dropping resource {}", path);
            return false;
        }
        true
    }
}

/// `root` plus every input class whose superclass or interfaces lead to it.
fn derived_from(root: &str, references: &BTreeMap<String, ClassReferences>) -> BTreeSet<String> {
    let mut derived = BTreeSet::from([root.to_string()]);
    loop {
        let mut changed = false;
        for (name, class) in references {
            if derived.contains(name) {
                continue;
            }
            let extends = class
                .super_name
                .iter()
                .chain(&class.interfaces)
                .any(|parent| derived.contains(parent));
            if extends {
                derived.insert(name.clone());
                changed = true;
            }
        }
        if !changed {
            return derived;
        }
    }
}

fn is_signature_file(path: &str) -> bool {
    let Some(file) = path.strip_prefix("META-INF/") else {
        return false;
    };
    !file.contains('/')
        && [".SF", ".RSA", ".DSA", ".EC"]
            .iter()
            .any(|suffix| file.ends_with(suffix))
}
