use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, trace};
use zip::ZipArchive;

use crate::ir::{ClassEntry, ClassFlags};

/// Classes and resources of all inputs, first JAR winning on duplicates.
#[derive(Debug, Default)]
pub(crate) struct ScanOutput {
    pub(crate) classes: BTreeMap<String, ClassEntry>,
    pub(crate) resources: BTreeMap<String, Vec<u8>>,
    /// Class names each JAR defines, in input order.
    pub(crate) jars: Vec<JarListing>,
    pub(crate) class_count: usize,
}

#[derive(Debug)]
pub(crate) struct JarListing {
    pub(crate) path: PathBuf,
    pub(crate) classes: Vec<String>,
}

pub(crate) fn scan_inputs(inputs: &[PathBuf]) -> Result<ScanOutput> {
    let mut output = ScanOutput::default();
    for input in inputs {
        let extension = input.extension().and_then(|ext| ext.to_str()).unwrap_or("");
        match extension {
            "jar" | "zip" => scan_jar_file(input, &mut output)?,
            _ => anyhow::bail!("unsupported input file: {}", input.display()),
        }
    }
    Ok(output)
}

fn scan_jar_file(path: &Path, output: &mut ScanOutput) -> Result<()> {
    let file = fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("failed to read {}", path.display()))?;

    let mut entry_names = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if entry.is_dir() {
            continue;
        }
        entry_names.push(entry.name().to_string());
    }

    entry_names.sort();

    let mut listing = JarListing {
        path: path.to_path_buf(),
        classes: Vec::new(),
    };
    for name in entry_names {
        let mut entry = archive
            .by_name(&name)
            .with_context(|| format!("failed to read {}:{}", path.display(), name))?;
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .with_context(|| format!("failed to read {}:{}", path.display(), name))?;

        match entry_kind(&name) {
            EntryKind::Class(class_name) => {
                output.class_count += 1;
                listing.classes.push(class_name.to_string());
                if output.classes.contains_key(class_name) {
                    debug!(
                        "{} from {} is shadowed by an earlier input",
                        class_name,
                        path.display()
                    );
                    continue;
                }
                trace!("found {} in {}", class_name, path.display());
                output.classes.insert(
                    class_name.to_string(),
                    ClassEntry {
                        name: class_name.to_string(),
                        bytes: data,
                        source: path.to_path_buf(),
                        flags: ClassFlags::default(),
                    },
                );
            }
            EntryKind::Resource => {
                output.resources.entry(name).or_insert(data);
            }
            EntryKind::Skipped => {
                debug!("skipping {} in {}", name, path.display());
            }
        }
    }

    debug!(
        "scanned {}: {} classes",
        path.display(),
        listing.classes.len()
    );
    output.jars.push(listing);
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum EntryKind<'a> {
    /// Internal class name.
    Class(&'a str),
    Resource,
    /// Module descriptors and multi-release class variants. They would bypass
    /// the analyzer and the renamer, so they are never copied.
    Skipped,
}

fn entry_kind(entry_name: &str) -> EntryKind<'_> {
    let Some(class_name) = entry_name.strip_suffix(".class") else {
        return EntryKind::Resource;
    };
    if entry_name.starts_with("META-INF/")
        || class_name == "module-info"
        || class_name.ends_with("/module-info")
    {
        return EntryKind::Skipped;
    }
    EntryKind::Class(class_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ClassBuilder, write_jar};

    #[test]
    fn first_jar_wins_on_duplicate_classes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let first = dir.path().join("first.jar");
        let second = dir.path().join("second.jar");
        let first_bytes = ClassBuilder::new("com/foo/A").build();
        let second_bytes = ClassBuilder::new("com/foo/A")
            .field(0, "extra", "I")
            .build();
        write_jar(&first, &[("com/foo/A.class", first_bytes.clone())]);
        write_jar(
            &second,
            &[
                ("com/foo/A.class", second_bytes),
                ("res/layout.xml", b"<x/>".to_vec()),
            ],
        );

        let output = scan_inputs(&[first.clone(), second.clone()]).expect("scan jars");

        let entry = output.classes.get("com/foo/A").expect("class entry");
        assert_eq!(first_bytes, entry.bytes);
        assert_eq!(first, entry.source);
        assert_eq!(2, output.class_count);
        assert_eq!(2, output.jars.len());
        assert_eq!(vec!["com/foo/A"], output.jars[1].classes);
        assert_eq!(b"<x/>".to_vec(), output.resources["res/layout.xml"]);
    }

    #[test]
    fn rejects_missing_and_unsupported_inputs() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(scan_inputs(&[dir.path().join("absent.jar")]).is_err());

        let text = dir.path().join("notes.txt");
        fs::write(&text, "nope").expect("write file");
        assert!(scan_inputs(&[text]).is_err());
    }

    #[test]
    fn classifies_entries() {
        assert_eq!(EntryKind::Class("a/B"), entry_kind("a/B.class"));
        assert_eq!(EntryKind::Skipped, entry_kind("module-info.class"));
        assert_eq!(EntryKind::Skipped, entry_kind("META-INF/versions/9/module-info.class"));
        assert_eq!(EntryKind::Skipped, entry_kind("META-INF/versions/9/a/B.class"));
        assert_eq!(EntryKind::Resource, entry_kind("META-INF/services/a.B"));
        assert_eq!(EntryKind::Resource, entry_kind("a/b.properties"));
    }

    #[test]
    fn multi_release_classes_are_dropped() {
        let dir = tempfile::tempdir().expect("temp dir");
        let jar = dir.path().join("framework.jar");
        let class = ClassBuilder::new("android/view/View").build();
        write_jar(
            &jar,
            &[
                ("android/view/View.class", class.clone()),
                ("META-INF/versions/11/android/view/View.class", class.clone()),
                ("module-info.class", class),
                ("META-INF/versions/11/res.txt", b"r".to_vec()),
            ],
        );

        let output = scan_inputs(&[jar]).expect("scan jar");

        assert_eq!(vec!["android/view/View"], output.classes.keys().collect::<Vec<_>>());
        assert_eq!(
            vec!["META-INF/versions/11/res.txt"],
            output.resources.keys().collect::<Vec<_>>()
        );
        assert_eq!(1, output.class_count);
    }
}
