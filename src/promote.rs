use std::collections::BTreeSet;

use anyhow::Result;
use log::debug;

use crate::classfile::{
    ClassFile, ConstantPool, Member, access, parse_inner_classes, write_inner_classes,
};
use crate::config::{CreateInfo, MemberSpec};

/// Classes and members made public in the output.
#[derive(Clone, Debug, Default)]
pub(crate) struct Promotions {
    classes: BTreeSet<String>,
    fields: Vec<MemberSpec>,
    methods: Vec<MemberSpec>,
}

impl Promotions {
    pub(crate) fn from_info(info: &CreateInfo) -> Result<Self> {
        Ok(Self {
            classes: info.promoted_classes(),
            fields: info.promoted_fields()?,
            methods: info.promoted_methods()?,
        })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.fields.is_empty() && self.methods.is_empty()
    }

    /// Promotes the class, its matching members and any `InnerClasses`
    /// record describing a promoted class. Returns whether anything changed.
    pub(crate) fn apply(&self, class: &mut ClassFile) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }
        let owner = class.name()?.to_string();
        let mut changed = false;

        if self.classes.contains(&owner) {
            changed |= promote(&mut class.access_flags);
            debug!("promoted class {owner}");
        }
        for field in class.fields.iter_mut() {
            if matches_any(&self.fields, &owner, field, &class.constant_pool)? {
                changed |= promote(&mut field.access_flags);
            }
        }
        for method in class.methods.iter_mut() {
            if matches_any(&self.methods, &owner, method, &class.constant_pool)? {
                changed |= promote(&mut method.access_flags);
            }
        }
        changed |= self.promote_inner_classes(class)?;
        Ok(changed)
    }

    fn promote_inner_classes(&self, class: &mut ClassFile) -> Result<bool> {
        let pool = &class.constant_pool;
        let mut changed = false;
        for attribute in class.attributes.iter_mut() {
            if !attribute.is_named(pool, "InnerClasses") {
                continue;
            }
            let mut records = parse_inner_classes(&attribute.info)?;
            let mut touched = false;
            for record in records.iter_mut() {
                let inner = pool.class_name(record.inner_class_info_index)?;
                if self.classes.contains(inner) {
                    touched |= promote(&mut record.access_flags);
                }
            }
            if touched {
                attribute.info = write_inner_classes(&records);
                changed = true;
            }
        }
        Ok(changed)
    }
}

fn matches_any(
    specs: &[MemberSpec],
    owner: &str,
    member: &Member,
    pool: &ConstantPool,
) -> Result<bool> {
    if specs.is_empty() {
        return Ok(false);
    }
    let name = member.name(pool)?;
    let descriptor = member.descriptor(pool)?;
    Ok(specs
        .iter()
        .any(|spec| spec.matches(owner, name, descriptor)))
}

fn promote(flags: &mut u16) -> bool {
    let promoted = access::promote(*flags);
    let changed = promoted != *flags;
    *flags = promoted;
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::InnerClass;
    use crate::opcodes;
    use crate::testing::ClassBuilder;

    fn promotions() -> Promotions {
        let info = CreateInfo {
            promote_classes: vec!["android.view.Choreographer$Receiver".to_string()],
            promote_fields: vec!["android.view.Choreographer#mLastFrame".to_string()],
            promote_methods: vec!["android.view.Choreographer#doFrame(J)V".to_string()],
            ..CreateInfo::default()
        };
        Promotions::from_info(&info).expect("promotions")
    }

    fn inner_records(class: &ClassFile) -> Vec<InnerClass> {
        let attribute = class
            .attributes
            .iter()
            .find(|attribute| attribute.is_named(&class.constant_pool, "InnerClasses"))
            .expect("InnerClasses");
        parse_inner_classes(&attribute.info).expect("records")
    }

    #[test]
    fn promotes_members_and_inner_class_records() {
        let mut class = ClassBuilder::new("android/view/Choreographer")
            .field(access::PRIVATE, "mLastFrame", "J")
            .field(access::PRIVATE, "mOther", "J")
            .method(access::PROTECTED, "doFrame", "(J)V", vec![opcodes::RETURN])
            .method(access::PRIVATE, "doFrame", "(I)V", vec![opcodes::RETURN])
            .inner_class(
                "android/view/Choreographer$Receiver",
                "android/view/Choreographer",
                "Receiver",
                access::PRIVATE | access::STATIC,
            )
            .file();

        assert!(promotions().apply(&mut class).expect("apply"));

        assert_eq!(access::PUBLIC, class.fields[0].access_flags);
        assert_eq!(access::PRIVATE, class.fields[1].access_flags);
        assert_eq!(access::PUBLIC, class.methods[0].access_flags);
        assert_eq!(access::PRIVATE, class.methods[1].access_flags);
        assert_eq!(
            access::PUBLIC | access::STATIC,
            inner_records(&class)[0].access_flags
        );
    }

    #[test]
    fn promotes_the_nested_class_itself() {
        let mut class = ClassBuilder::new("android/view/Choreographer$Receiver")
            .access(0x0020)
            .file();

        assert!(promotions().apply(&mut class).expect("apply"));
        assert_eq!(access::PUBLIC | 0x0020, class.access_flags);
        assert!(!promotions().apply(&mut class).expect("second apply"));
    }
}
