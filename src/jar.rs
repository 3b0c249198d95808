use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";
const MANIFEST: &str = concat!(
    "Manifest-Version: 1.0\r\n",
    "Created-By: layoutlib-create ",
    env!("CARGO_PKG_VERSION"),
    "\r\n\r\n"
);

/// Writes a JAR holding a fresh manifest followed by `entries` in sorted
/// order. Timestamps are pinned so identical input gives identical bytes.
pub(crate) fn write_jar(path: &Path, entries: &BTreeMap<&str, &[u8]>) -> Result<()> {
    let bytes = jar_bytes(entries).with_context(|| format!("failed to build {}", path.display()))?;
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote {} ({} entries)", path.display(), entries.len());
    Ok(())
}

pub(crate) fn jar_bytes(entries: &BTreeMap<&str, &[u8]>) -> Result<Vec<u8>> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    writer
        .start_file(MANIFEST_PATH, options)
        .context("start manifest entry")?;
    writer
        .write_all(MANIFEST.as_bytes())
        .context("write manifest")?;

    for (name, data) in entries {
        if *name == MANIFEST_PATH {
            continue;
        }
        writer
            .start_file(*name, options)
            .with_context(|| format!("start entry {name}"))?;
        writer
            .write_all(data)
            .with_context(|| format!("write entry {name}"))?;
    }

    let cursor = writer.finish().context("finish jar")?;
    Ok(cursor.into_inner())
}
