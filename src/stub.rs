use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::bytecode::throw_stub;
use crate::classfile::{Attribute, ClassFile, Member, access};

/// Builds API-only copies of the generated classes whose entry path starts
/// with `prefix`.
pub(crate) fn stub_classes(
    classes: &BTreeMap<String, Vec<u8>>,
    prefix: &str,
) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut stubs = BTreeMap::new();
    for (path, bytes) in classes.range(prefix.to_string()..) {
        if !path.starts_with(prefix) {
            break;
        }
        let stub = stub_class(bytes).with_context(|| format!("failed to stub {path}"))?;
        stubs.insert(path.clone(), stub);
    }
    info!("stubbed {} classes under {}", stubs.len(), prefix);
    Ok(stubs)
}

/// Drops private, synthetic and static-initializer members and turns every
/// remaining method body into a `RuntimeException("Stub!")` throw.
pub(crate) fn stub_class(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut class = ClassFile::parse(bytes)?;
    let pool = &class.constant_pool;

    class.fields.retain(|field| is_api(field));
    let mut methods = Vec::with_capacity(class.methods.len());
    for method in class.methods.drain(..) {
        if is_api(&method) && method.name(pool)? != "<clinit>" {
            methods.push(method);
        }
    }

    let code_name = class.constant_pool.ensure_utf8("Code")?;
    for method in methods.iter_mut() {
        if method.is(access::ABSTRACT) {
            continue;
        }
        let descriptor = method.descriptor(&class.constant_pool)?.to_string();
        let body = throw_stub(
            &mut class.constant_pool,
            &descriptor,
            method.is(access::STATIC),
        )?
        .to_info();
        method.access_flags &= !access::NATIVE;
        method
            .attributes
            .retain(|attribute| !attribute.is_named(&class.constant_pool, "Code"));
        method.attributes.push(Attribute {
            name_index: code_name,
            info: body,
        });
    }
    class.methods = methods;

    debug!("stubbed {}", class.name()?);
    Ok(class.to_bytes())
}

fn is_api(member: &Member) -> bool {
    !member.is(access::PRIVATE) && !member.is(access::SYNTHETIC)
}

/// `<dir>/<name>-stubs.<ext>` next to the primary output.
pub(crate) fn stub_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match output.extension() {
        Some(extension) => format!("{stem}-stubs.{}", extension.to_string_lossy()),
        None => format!("{stem}-stubs"),
    };
    output.with_file_name(file_name)
}
