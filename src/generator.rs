use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::classfile::ClassFile;
use crate::config::CreateInfo;
use crate::descriptor::binary_name;
use crate::ir::{AnalysisResult, ClassEntry};
use crate::promote::Promotions;
use crate::rename::Renamer;
use crate::replace::{redirect_calls, replace_bodies};

/// Rewritten classes and retained resources, ready for the JAR writer.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct GeneratedJar {
    /// Final entry path, e.g. `android/view/_Original_View.class`, to bytes.
    pub(crate) classes: BTreeMap<String, Vec<u8>>,
    pub(crate) resources: BTreeMap<String, Vec<u8>>,
    /// Rename sources that never showed up among the kept classes.
    pub(crate) classes_not_renamed: BTreeSet<String>,
    /// Replacer rules that matched no method, as `Class#method(descriptor)`.
    pub(crate) unused_replacers: Vec<String>,
}

impl GeneratedJar {
    /// Every entry of the output JAR in sorted path order.
    pub(crate) fn entries(&self) -> BTreeMap<&str, &[u8]> {
        self.classes
            .iter()
            .chain(&self.resources)
            .map(|(path, bytes)| (path.as_str(), bytes.as_slice()))
            .collect()
    }
}

pub(crate) struct Generator<'a> {
    info: &'a CreateInfo,
    renamer: Renamer,
    promotions: Promotions,
}

impl<'a> Generator<'a> {
    pub(crate) fn new(info: &'a CreateInfo) -> Result<Self> {
        Ok(Self {
            info,
            renamer: Renamer::new(info.rename_table()),
            promotions: Promotions::from_info(info)?,
        })
    }

    pub(crate) fn generate(&self, analysis: &AnalysisResult) -> Result<GeneratedJar> {
        let mut output = GeneratedJar {
            resources: analysis.resources.clone(),
            ..GeneratedJar::default()
        };
        let mut used = BTreeSet::new();
        let mut rewritten = 0usize;

        for entry in analysis.kept() {
            let (name, bytes, changed) = self
                .transform(entry, &mut used)
                .with_context(|| format!("failed to rewrite {}", binary_name(&entry.name)))?;
            if changed {
                rewritten += 1;
            }
            let path = format!("{name}.class");
            if output.classes.insert(path, bytes).is_some() {
                anyhow::bail!("two classes map to {}", binary_name(&name));
            }
        }

        for source in self.renamer.sources() {
            if !analysis.is_kept(source) {
                output.classes_not_renamed.insert(source.to_string());
            }
        }
        for (index, replacer) in self.info.replace_method.iter().enumerate() {
            if used.contains(&index) {
                continue;
            }
            let rule = format!(
                "{}#{}{}",
                replacer.class,
                replacer.method,
                replacer.descriptor.as_deref().unwrap_or("")
            );
            warn!("method replacer {rule} matched no method");
            output.unused_replacers.push(rule);
        }

        info!(
            "generated {} classes ({} rewritten), {} resources",
            output.classes.len(),
            rewritten,
            output.resources.len()
        );
        Ok(output)
    }

    /// Final internal name, bytes, and whether the class was changed.
    fn transform(
        &self,
        entry: &ClassEntry,
        used: &mut BTreeSet<usize>,
    ) -> Result<(String, Vec<u8>, bool)> {
        let mut class = ClassFile::parse(&entry.bytes)?;
        let mut changed = false;

        let redirected = redirect_calls(&mut class, &self.info.redirect_call)?;
        changed |= redirected > 0;

        if entry.flags.stubbed {
            let matched = replace_bodies(
                &mut class,
                &self.info.replace_method,
                self.info.delegates_natives(&entry.name),
            )?;
            changed |= !matched.is_empty() || self.info.delegates_natives(&entry.name);
            used.extend(matched);
        }

        changed |= self.promotions.apply(&mut class)?;
        changed |= self.renamer.apply(&mut class)?;

        if !changed {
            return Ok((entry.name.clone(), entry.bytes.clone(), false));
        }
        let name = class.name()?.to_string();
        if entry.flags.renamed {
            debug!("renamed {} to {}", entry.name, name);
        }
        Ok((name, class.to_bytes(), true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::classfile::access;
    use crate::config::{MethodReplacer, RenameRule, ReplaceAction};
    use crate::opcodes;
    use crate::references::collect_references;
    use crate::testing::{ClassBuilder, scan_output};

    fn info() -> CreateInfo {
        CreateInfo {
            include: vec!["com.foo.*".to_string()],
            exclude: vec!["java.**".to_string()],
            rename: vec![
                RenameRule {
                    from: "com.foo.View".to_string(),
                    to: "com.foo._Original_View".to_string(),
                },
                RenameRule {
                    from: "com.foo.Absent".to_string(),
                    to: "com.foo._Original_Absent".to_string(),
                },
            ],
            replace_method: vec![
                MethodReplacer {
                    class: "com.foo.Clock".to_string(),
                    method: "now".to_string(),
                    descriptor: None,
                    action: ReplaceAction::Stub,
                },
                MethodReplacer {
                    class: "com.foo.Clock".to_string(),
                    method: "never".to_string(),
                    descriptor: Some("()V".to_string()),
                    action: ReplaceAction::Throw,
                },
            ],
            ..CreateInfo::default()
        }
    }

    fn analysis(info: &CreateInfo) -> AnalysisResult {
        let scan = scan_output(vec![
            ClassBuilder::new("com/foo/View")
                .field(access::PRIVATE, "parent", "Lcom/foo/View;")
                .build(),
            ClassBuilder::new("com/foo/User")
                .field(access::PRIVATE, "view", "Lcom/foo/View;")
                .call(opcodes::INVOKEVIRTUAL, "com/foo/View", "draw", "(ZLcom/foo/View;)V")
                .declare(access::PUBLIC | access::ABSTRACT, "attach", "(IJLcom/foo/View;)V")
                .build(),
            ClassBuilder::new("com/foo/Clock")
                .method(access::PUBLIC, "now", "()J", vec![opcodes::LCONST_0 + 1, opcodes::LRETURN])
                .build(),
            ClassBuilder::new("com/foo/Plain").build(),
        ]);
        Analyzer::new(info)
            .expect("analyzer")
            .analyze(scan)
            .expect("analysis")
    }

    #[test]
    fn renames_consistently_across_classes() {
        let info = info();
        let analysis = analysis(&info);
        let output = Generator::new(&info)
            .expect("generator")
            .generate(&analysis)
            .expect("generate");

        assert_eq!(
            vec![
                "com/foo/Clock.class",
                "com/foo/Plain.class",
                "com/foo/User.class",
                "com/foo/_Original_View.class",
            ],
            output.classes.keys().collect::<Vec<_>>()
        );
        for bytes in output.classes.values() {
            let references = collect_references(bytes).expect("references");
            assert!(!references.classes.contains("com/foo/View"));
            assert!(
                references
                    .method_refs
                    .iter()
                    .all(|call| !call.descriptor.contains("com/foo/View;"))
            );
        }
        let user = collect_references(&output.classes["com/foo/User.class"]).expect("user");
        assert!(user.classes.contains("com/foo/_Original_View"));
        let user = ClassFile::parse(&output.classes["com/foo/User.class"]).expect("user class");
        let descriptors: Vec<&str> = user
            .methods
            .iter()
            .map(|method| method.descriptor(&user.constant_pool).expect("descriptor"))
            .collect();
        assert!(descriptors.contains(&"(IJLcom/foo/_Original_View;)V"));
        assert!(descriptors.iter().all(|descriptor| !descriptor.contains("com/foo/View;")));
        assert_eq!(
            BTreeSet::from(["com/foo/Absent".to_string()]),
            output.classes_not_renamed
        );
    }

    #[test]
    fn untouched_classes_keep_their_bytes() {
        let info = info();
        let analysis = analysis(&info);
        let output = Generator::new(&info)
            .expect("generator")
            .generate(&analysis)
            .expect("generate");

        assert_eq!(
            analysis.classes["com/foo/Plain"].bytes,
            output.classes["com/foo/Plain.class"]
        );
    }

    #[test]
    fn replaces_bodies_and_reports_unused_replacers() {
        let info = info();
        let analysis = analysis(&info);
        let output = Generator::new(&info)
            .expect("generator")
            .generate(&analysis)
            .expect("generate");

        let clock = ClassFile::parse(&output.classes["com/foo/Clock.class"]).expect("clock");
        let method = &clock.methods[0];
        let index = method.code_index(&clock.constant_pool).expect("code");
        let code = crate::classfile::CodeAttribute::parse(&method.attributes[index].info)
            .expect("code attribute");
        assert_eq!(vec![opcodes::LCONST_0, opcodes::LRETURN], code.code);
        assert_eq!(vec!["com.foo.Clock#never()V"], output.unused_replacers);
    }

    #[test]
    fn generation_is_idempotent() {
        let info = info();
        let analysis = analysis(&info);
        let generator = Generator::new(&info).expect("generator");

        let first = generator.generate(&analysis).expect("first run");
        let second = generator.generate(&analysis).expect("second run");

        assert_eq!(first, second);
    }
}
