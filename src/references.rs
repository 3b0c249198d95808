use anyhow::{Context, Result};

use crate::classfile::{ClassFile, Constant};
use crate::ir::ClassReferences;
use crate::type_refs::type_roles;

/// Collects the supertypes, referenced classes and method references of a
/// class file. Malformed input is an error.
pub(crate) fn collect_references(data: &[u8]) -> Result<ClassReferences> {
    let class = ClassFile::parse(data).context("failed to parse class file bytes")?;
    class_references(&class)
}

/// Every class named anywhere in `class`: constant-pool class entries,
/// descriptors, generic signatures and annotation types.
fn class_references(class: &ClassFile) -> Result<ClassReferences> {
    let pool = &class.constant_pool;
    let mut references = ClassReferences {
        name: class.name().context("resolve class name")?.to_string(),
        super_name: class
            .super_name()
            .context("resolve super class name")?
            .map(str::to_string),
        interfaces: class
            .interface_names()
            .context("resolve interface names")?
            .into_iter()
            .map(str::to_string)
            .collect(),
        ..ClassReferences::default()
    };

    for (index, role) in type_roles(class)? {
        let value = pool.utf8(index)?;
        let classes = role
            .classes(value)
            .with_context(|| format!("invalid type name {value}"))?;
        references.classes.extend(classes);
    }
    for (index, entry) in pool.entries().iter().enumerate() {
        if matches!(
            entry,
            Constant::Methodref { .. } | Constant::InterfaceMethodref { .. }
        ) {
            references.method_refs.insert(pool.member_ref(index as u16)?);
        }
    }

    references.classes.remove(&references.name);
    Ok(references)
}
