use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::descriptor::binary_name;
use crate::references::collect_references;
use crate::scan::ScanOutput;

/// Cross-JAR dependencies of every input, in input order.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub(crate) struct DependencyReport {
    pub(crate) jars: Vec<JarDependencies>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct JarDependencies {
    pub(crate) jar: String,
    /// Dependency to the classes of this JAR that reference it, all in
    /// binary form.
    pub(crate) dependencies: BTreeMap<String, BTreeSet<String>>,
}

/// Lists, per JAR, the classes it uses without defining them. With
/// `missing_only`, classes defined by another input are left out.
pub(crate) fn dependency_report(scan: &ScanOutput, missing_only: bool) -> Result<DependencyReport> {
    let mut report = DependencyReport::default();
    for listing in &scan.jars {
        let defined: BTreeSet<&str> = listing.classes.iter().map(String::as_str).collect();
        let mut dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for name in &listing.classes {
            let Some(entry) = scan
                .classes
                .get(name)
                .filter(|entry| entry.source == listing.path)
            else {
                continue;
            };
            let references = collect_references(&entry.bytes).with_context(|| {
                format!("failed to parse {}:{}.class", listing.path.display(), name)
            })?;
            for target in &references.classes {
                if defined.contains(target.as_str()) {
                    continue;
                }
                if missing_only && scan.classes.contains_key(target) {
                    continue;
                }
                dependencies
                    .entry(binary_name(target))
                    .or_default()
                    .insert(binary_name(name));
            }
        }

        report.jars.push(JarDependencies {
            jar: listing.path.display().to_string(),
            dependencies,
        });
    }
    Ok(report)
}

pub(crate) fn write_text(report: &DependencyReport, out: &mut dyn Write) -> Result<()> {
    for jar in &report.jars {
        writeln!(out, "+ {}", jar.jar).context("failed to write report")?;
        for (dependency, referrers) in &jar.dependencies {
            writeln!(out, "    {dependency}").context("failed to write report")?;
            for referrer in referrers {
                writeln!(out, "        <- {referrer}").context("failed to write report")?;
            }
        }
    }
    Ok(())
}

pub(crate) fn write_json(report: &DependencyReport, out: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, report).context("failed to serialize report")?;
    out.write_all(b"\n").context("failed to write report")?;
    Ok(())
}
