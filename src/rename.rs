use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};

use crate::classfile::{ClassFile, Constant, ConstantPool};
use crate::type_refs::{TypeRole, type_roles};

/// Maps class names and every descriptor mentioning them through the rename
/// table.
#[derive(Clone, Debug, Default)]
pub(crate) struct Renamer {
    /// Internal name to internal name.
    classes: BTreeMap<String, String>,
}

impl Renamer {
    pub(crate) fn new(table: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            classes: table.into_iter().collect(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub(crate) fn sources(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// New name of an internal class name, `None` when untouched. Nested
    /// classes follow their outer class.
    pub(crate) fn map_class(&self, name: &str) -> Option<String> {
        if let Some(renamed) = self.classes.get(name) {
            return Some(renamed.clone());
        }
        self.classes.iter().find_map(|(from, to)| {
            name.strip_prefix(from.as_str())
                .filter(|rest| rest.starts_with('$'))
                .map(|rest| format!("{to}{rest}"))
        })
    }

    /// Rewrites a class name, descriptor or signature. `None` when nothing
    /// changed.
    pub(crate) fn map(&self, role: TypeRole, value: &str) -> Result<Option<String>> {
        role.map(value, |name| self.map_class(name))
    }

    /// Applies the table to every class reference in the constant pool.
    /// Returns whether anything changed. String literal values are never
    /// altered.
    pub(crate) fn apply(&self, class: &mut ClassFile) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }
        let roles = type_roles(class)?;
        let pool = &mut class.constant_pool;
        let literals: BTreeSet<u16> = pool
            .entries()
            .iter()
            .filter_map(|entry| match entry {
                Constant::String { string_index } => Some(*string_index),
                _ => None,
            })
            .collect();

        let mut changed = false;
        for (index, role) in roles {
            let value = pool.utf8(index)?;
            let Some(renamed) = self
                .map(role, value)
                .with_context(|| format!("invalid type name {value}"))?
            else {
                continue;
            };
            if literals.contains(&index) {
                let original = Constant::Utf8(value.as_bytes().to_vec());
                split_literal(pool, index, original)?;
            }
            pool.set(index, Constant::Utf8(renamed.into_bytes()))?;
            changed = true;
        }
        Ok(changed)
    }
}

/// Points every string constant backed by `index` at a fresh copy of it.
fn split_literal(pool: &mut ConstantPool, index: u16, original: Constant) -> Result<()> {
    let copy = pool.push(original)?;
    for slot in 1..pool.len() as u16 {
        if matches!(pool.get(slot)?, Constant::String { string_index } if *string_index == index) {
            pool.set(slot, Constant::String { string_index: copy })?;
        }
    }
    Ok(())
}
