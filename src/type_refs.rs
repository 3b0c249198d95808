//! Locates every UTF-8 constant of a class file that names a type: class
//! entries, descriptors, generic signatures and the types inside annotations.
//! The renamer rewrites these entries and the analyzer reads its references
//! from them, so both see the same set.

use std::collections::BTreeMap;

use anyhow::{Context, Result};

use crate::classfile::{
    Attribute, ByteReader, ClassFile, CodeAttribute, Constant, ConstantPool, parse_attributes,
};
use crate::descriptor::map_descriptor;
use crate::signature::map_signature;

/// How a UTF-8 entry names types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TypeRole {
    /// Internal name or array descriptor held by a `Class` entry.
    ClassName,
    /// Field or method descriptor.
    Descriptor,
    /// Generic signature.
    Signature,
}

impl TypeRole {
    /// Rewrites `value` through `map` according to its role.
    pub(crate) fn map<F>(self, value: &str, mut map: F) -> Result<Option<String>>
    where
        F: FnMut(&str) -> Option<String>,
    {
        match self {
            TypeRole::ClassName if value.starts_with('[') => map_descriptor(value, map),
            TypeRole::ClassName => Ok(map(value)),
            TypeRole::Descriptor => map_descriptor(value, map),
            TypeRole::Signature => map_signature(value, map),
        }
    }

    /// Internal names of the classes `value` mentions.
    pub(crate) fn classes(self, value: &str) -> Result<Vec<String>> {
        let mut classes = Vec::new();
        self.map(value, |name| {
            classes.push(name.to_string());
            None
        })?;
        Ok(classes)
    }
}

/// UTF-8 entries naming types, keyed by constant-pool index. An entry shared
/// by a `Class` constant and a descriptor keeps the class-name role.
pub(crate) fn type_roles(class: &ClassFile) -> Result<BTreeMap<u16, TypeRole>> {
    let pool = &class.constant_pool;
    let mut roles = BTreeMap::new();
    for entry in pool.entries() {
        if let Constant::Class { name_index } = entry {
            roles.insert(*name_index, TypeRole::ClassName);
        }
    }

    let mut found = Vec::new();
    for entry in pool.entries() {
        match entry {
            Constant::NameAndType {
                descriptor_index, ..
            }
            | Constant::MethodType { descriptor_index } => {
                found.push((*descriptor_index, TypeRole::Descriptor));
            }
            _ => {}
        }
    }
    walk_attributes(pool, &class.attributes, &mut found)?;
    for member in class.fields.iter().chain(&class.methods) {
        found.push((member.descriptor_index, TypeRole::Descriptor));
        walk_attributes(pool, &member.attributes, &mut found)?;
    }

    for (index, role) in found {
        roles.entry(index).or_insert(role);
    }
    Ok(roles)
}

fn walk_attributes(
    pool: &ConstantPool,
    attributes: &[Attribute],
    out: &mut Vec<(u16, TypeRole)>,
) -> Result<()> {
    for attribute in attributes {
        let name = pool.utf8(attribute.name_index)?;
        let mut reader = ByteReader::new(&attribute.info);
        match name {
            "Signature" => out.push((reader.u16()?, TypeRole::Signature)),
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                annotations(&mut reader, out).with_context(|| format!("malformed {name}"))?;
            }
            "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
                let parameters = reader.u8()?;
                for _ in 0..parameters {
                    annotations(&mut reader, out).with_context(|| format!("malformed {name}"))?;
                }
            }
            "AnnotationDefault" => {
                element_value(&mut reader, out).with_context(|| format!("malformed {name}"))?;
            }
            "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {
                let count = reader.u16()?;
                for _ in 0..count {
                    type_annotation(&mut reader, out)
                        .with_context(|| format!("malformed {name}"))?;
                }
            }
            "Code" => {
                let code = CodeAttribute::parse(&attribute.info)?;
                walk_attributes(pool, &code.attributes, out)?;
            }
            "LocalVariableTable" | "LocalVariableTypeTable" => {
                let role = if name == "LocalVariableTable" {
                    TypeRole::Descriptor
                } else {
                    TypeRole::Signature
                };
                let count = reader.u16()?;
                for _ in 0..count {
                    let _start_pc = reader.u16()?;
                    let _length = reader.u16()?;
                    let _name = reader.u16()?;
                    out.push((reader.u16()?, role));
                    let _slot = reader.u16()?;
                }
            }
            "Record" => {
                let components = reader.u16()?;
                for _ in 0..components {
                    let _name = reader.u16()?;
                    out.push((reader.u16()?, TypeRole::Descriptor));
                    let component_attributes = parse_attributes(&mut reader)?;
                    walk_attributes(pool, &component_attributes, out)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn annotations(reader: &mut ByteReader<'_>, out: &mut Vec<(u16, TypeRole)>) -> Result<()> {
    let count = reader.u16()?;
    for _ in 0..count {
        annotation(reader, out)?;
    }
    Ok(())
}

fn annotation(reader: &mut ByteReader<'_>, out: &mut Vec<(u16, TypeRole)>) -> Result<()> {
    out.push((reader.u16()?, TypeRole::Descriptor));
    let pairs = reader.u16()?;
    for _ in 0..pairs {
        let _element_name = reader.u16()?;
        element_value(reader, out)?;
    }
    Ok(())
}

fn element_value(reader: &mut ByteReader<'_>, out: &mut Vec<(u16, TypeRole)>) -> Result<()> {
    match reader.u8()? {
        b'e' => {
            out.push((reader.u16()?, TypeRole::Descriptor));
            let _const_name = reader.u16()?;
        }
        // Return descriptor of a class literal, `V` for `void.class`.
        b'c' => out.push((reader.u16()?, TypeRole::Descriptor)),
        b'@' => annotation(reader, out)?,
        b'[' => {
            let count = reader.u16()?;
            for _ in 0..count {
                element_value(reader, out)?;
            }
        }
        _ => {
            let _const_value = reader.u16()?;
        }
    }
    Ok(())
}

/// Skips `target_info` and `type_path`, then reads the annotation proper.
fn type_annotation(reader: &mut ByteReader<'_>, out: &mut Vec<(u16, TypeRole)>) -> Result<()> {
    let target_type = reader.u8()?;
    let target_len = match target_type {
        0x00 | 0x01 | 0x16 => 1,
        0x10 | 0x17 | 0x42 | 0x43..=0x46 => 2,
        0x11 | 0x12 => 2,
        0x13..=0x15 => 0,
        0x47..=0x4b => 3,
        0x40 | 0x41 => {
            let entries = reader.u16()? as usize;
            entries * 6
        }
        other => anyhow::bail!("unknown type annotation target 0x{other:02x}"),
    };
    reader.bytes(target_len)?;
    let path_len = reader.u8()? as usize;
    reader.bytes(path_len * 2)?;
    annotation(reader, out)
}
