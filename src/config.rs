use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::descriptor::internal_name;
use crate::glob;

/// Everything that decides what the analyzer keeps and how the generator
/// rewrites it. Built once at startup and passed by reference.
///
/// Class names are written in binary form (`android.view.View`,
/// `android.view.View$OnClickListener`).
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct CreateInfo {
    /// Roots whose subclasses and implementors are kept.
    pub(crate) derived_from: Vec<String>,
    pub(crate) include: Vec<String>,
    /// Class globs that are never kept, even when included or referenced.
    pub(crate) exclude: Vec<String>,
    /// Resource path globs dropped from the output.
    pub(crate) exclude_files: Vec<String>,
    pub(crate) rename: Vec<RenameRule>,
    pub(crate) replace_method: Vec<MethodReplacer>,
    /// Classes whose native methods all delegate to `<Class>_Delegate`.
    pub(crate) delegate_natives: Vec<String>,
    pub(crate) redirect_call: Vec<CallRedirect>,
    pub(crate) promote_classes: Vec<String>,
    /// `Class#field`
    pub(crate) promote_fields: Vec<String>,
    /// `Class#method` or `Class#method(descriptor)`
    pub(crate) promote_methods: Vec<String>,
    /// Internal-name prefix of the classes copied into the stub JAR.
    pub(crate) stub_prefix: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RenameRule {
    pub(crate) from: String,
    pub(crate) to: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ReplaceAction {
    /// Return the zero value of the return type.
    Stub,
    /// Throw `RuntimeException("Stub!")`.
    Throw,
    /// Forward to the static method of the same name on `<Class>_Delegate`.
    Delegate,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct MethodReplacer {
    pub(crate) class: String,
    pub(crate) method: String,
    /// Restricts the rule to one overload.
    pub(crate) descriptor: Option<String>,
    pub(crate) action: ReplaceAction,
}

impl MethodReplacer {
    pub(crate) fn matches(&self, owner: &str, name: &str, descriptor: &str) -> bool {
        internal_name(&self.class) == owner
            && self.method == name
            && self.descriptor.as_deref().is_none_or(|wanted| wanted == descriptor)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct CallRedirect {
    pub(crate) class: String,
    pub(crate) method: String,
    pub(crate) descriptor: Option<String>,
    /// Class providing the static replacement.
    pub(crate) target: String,
}

impl CallRedirect {
    pub(crate) fn matches(&self, owner: &str, name: &str, descriptor: &str) -> bool {
        internal_name(&self.class) == owner
            && self.method == name
            && self.descriptor.as_deref().is_none_or(|wanted| wanted == descriptor)
    }

    pub(crate) fn target_internal(&self) -> String {
        internal_name(&self.target)
    }
}

/// A parsed `Class#member(descriptor)` reference.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct MemberSpec {
    /// Internal name of the owner.
    pub(crate) owner: String,
    pub(crate) name: String,
    pub(crate) descriptor: Option<String>,
}

impl MemberSpec {
    pub(crate) fn parse(spec: &str) -> Result<Self> {
        let (class, member) = spec
            .split_once('#')
            .with_context(|| format!("member reference {spec} must look like Class#member"))?;
        let (name, descriptor) = match member.find('(') {
            Some(index) => (&member[..index], Some(member[index..].to_string())),
            None => (member, None),
        };
        if class.is_empty() || name.is_empty() {
            anyhow::bail!("member reference {spec} must look like Class#member");
        }
        Ok(Self {
            owner: internal_name(class),
            name: name.to_string(),
            descriptor,
        })
    }

    pub(crate) fn matches(&self, owner: &str, name: &str, descriptor: &str) -> bool {
        self.owner == owner
            && self.name == name
            && self.descriptor.as_deref().is_none_or(|wanted| wanted == descriptor)
    }
}

const DEFAULT_STUB_PREFIX: &str = "android/";

impl CreateInfo {
    /// Reads a TOML configuration, or returns the built-in layoutlib set when
    /// no path is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let info = match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Self::from_toml(&text).with_context(|| format!("invalid {}", path.display()))?
            }
            None => Self::layoutlib(),
        };
        info.validate()?;
        Ok(info)
    }

    pub(crate) fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("failed to parse configuration")
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let mut sources = BTreeSet::new();
        for rule in &self.rename {
            if rule.from.is_empty() || rule.to.is_empty() {
                anyhow::bail!("rename rules need both `from` and `to`");
            }
            if rule.from == rule.to {
                anyhow::bail!("rename rule for {} maps the class onto itself", rule.from);
            }
            if !sources.insert(rule.from.as_str()) {
                anyhow::bail!("class {} is renamed more than once", rule.from);
            }
            for pattern in &self.exclude {
                if glob::matches(pattern, &rule.from) {
                    warn!(
                        "renamed class {} is excluded by {}; it will never be renamed",
                        rule.from, pattern
                    );
                }
            }
        }
        for rule in &self.rename {
            if sources.contains(rule.to.as_str()) {
                anyhow::bail!(
                    "class {} is both a rename target and a rename source",
                    rule.to
                );
            }
        }
        for replacer in &self.replace_method {
            if replacer.class.is_empty() || replacer.method.is_empty() {
                anyhow::bail!("replace_method rules need `class` and `method`");
            }
        }
        for redirect in &self.redirect_call {
            if redirect.class.is_empty() || redirect.method.is_empty() || redirect.target.is_empty()
            {
                anyhow::bail!("redirect_call rules need `class`, `method` and `target`");
            }
        }
        self.promoted_fields()?;
        self.promoted_methods()?;
        Ok(())
    }

    /// Rename table in internal form, in declaration order.
    pub(crate) fn rename_table(&self) -> Vec<(String, String)> {
        self.rename
            .iter()
            .map(|rule| (internal_name(&rule.from), internal_name(&rule.to)))
            .collect()
    }

    pub(crate) fn promoted_classes(&self) -> BTreeSet<String> {
        self.promote_classes
            .iter()
            .map(|class| internal_name(class))
            .collect()
    }

    pub(crate) fn promoted_fields(&self) -> Result<Vec<MemberSpec>> {
        self.promote_fields
            .iter()
            .map(|spec| MemberSpec::parse(spec))
            .collect()
    }

    pub(crate) fn promoted_methods(&self) -> Result<Vec<MemberSpec>> {
        self.promote_methods
            .iter()
            .map(|spec| MemberSpec::parse(spec))
            .collect()
    }

    pub(crate) fn delegates_natives(&self, owner: &str) -> bool {
        self.delegate_natives
            .iter()
            .any(|class| internal_name(class) == owner)
    }

    pub(crate) fn stub_prefix(&self) -> &str {
        self.stub_prefix.as_deref().unwrap_or(DEFAULT_STUB_PREFIX)
    }

    /// Built-in configuration for the Android framework layoutlib.
    pub(crate) fn layoutlib() -> Self {
        fn strings(values: &[&str]) -> Vec<String> {
            values.iter().map(|value| value.to_string()).collect()
        }
        fn rename(from: &str, to: &str) -> RenameRule {
            RenameRule {
                from: from.to_string(),
                to: to.to_string(),
            }
        }
        fn delegate(class: &str, method: &str) -> MethodReplacer {
            MethodReplacer {
                class: class.to_string(),
                method: method.to_string(),
                descriptor: None,
                action: ReplaceAction::Delegate,
            }
        }

        Self {
            derived_from: strings(&["android.view.View", "android.app.Fragment"]),
            include: strings(&[
                "android.animation.*",
                "android.content.res.*",
                "android.graphics.*",
                "android.graphics.drawable.**",
                "android.os.*",
                "android.text.**",
                "android.util.*",
                "android.view.*",
                "android.widget.*",
                "com.android.internal.R**",
                "com.android.internal.util.*",
            ]),
            exclude: strings(&["android.test.**", "org.kxml2.io.KXmlParser"]),
            exclude_files: strings(&["META-INF/*.SF", "META-INF/*.RSA", "META-INF/*.DSA"]),
            rename: vec![
                rename("android.view.SurfaceView", "android.view._Original_SurfaceView"),
                rename(
                    "android.view.WindowManagerImpl",
                    "android.view._Original_WindowManagerImpl",
                ),
                rename("android.webkit.WebView", "android.webkit._Original_WebView"),
                rename(
                    "android.view.textservice.TextServicesManager",
                    "android.view.textservice._Original_TextServicesManager",
                ),
            ],
            replace_method: vec![
                delegate("android.view.View", "isInEditMode"),
                delegate("android.os.Handler", "sendMessageAtTime"),
                delegate("android.os.SystemClock", "uptimeMillis"),
                delegate("android.os.SystemClock", "elapsedRealtime"),
                delegate("android.view.Choreographer", "getRefreshRate"),
            ],
            delegate_natives: strings(&[
                "android.graphics.Bitmap",
                "android.graphics.Canvas",
                "android.graphics.Matrix",
                "android.graphics.Paint",
                "android.graphics.Path",
                "android.os.SystemClock",
            ]),
            redirect_call: vec![CallRedirect {
                class: "java.lang.System".to_string(),
                method: "arraycopy".to_string(),
                descriptor: Some("([CI[CII)V".to_string()),
                target: "com.android.tools.layoutlib.java.System_Delegate".to_string(),
            }],
            promote_classes: strings(&["android.view.Choreographer$FrameDisplayEventReceiver"]),
            promote_fields: strings(&["android.view.Choreographer#mLastFrameTimeNanos"]),
            promote_methods: Vec::new(),
            stub_prefix: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_configuration_is_valid() {
        let info = CreateInfo::load(None).expect("builtin config");
        assert!(!info.derived_from.is_empty());
        assert_eq!("android/", info.stub_prefix());
        assert!(info.delegates_natives("android/graphics/Paint"));
        assert_eq!(
            ("android/view/SurfaceView".to_string(), "android/view/_Original_SurfaceView".to_string()),
            info.rename_table()[0]
        );
    }

    #[test]
    fn printed_configuration_reads_back() {
        let info = CreateInfo::layoutlib();
        let text = toml::to_string_pretty(&info).expect("serialize");
        assert_eq!(info, CreateInfo::from_toml(&text).expect("parse printed config"));
    }

    #[test]
    fn parses_toml_configuration() {
        let info = CreateInfo::from_toml(
            r#"
            derived_from = ["com.foo.Base"]
            include = ["com.foo.*"]
            exclude = ["com.foo.Skip*"]
            promote_fields = ["com.foo.A#secret"]
            stub_prefix = "com/foo/"

            [[rename]]
            from = "com.foo.A"
            to = "com.foo._Original_A"

            [[replace_method]]
            class = "com.foo.A"
            method = "run"
            descriptor = "()V"
            action = "throw"

            [[redirect_call]]
            class = "java.lang.System"
            method = "nanoTime"
            target = "com.foo.Clock"
            "#,
        )
        .expect("parse toml");
        info.validate().expect("valid config");

        assert_eq!(vec!["com.foo.Base"], info.derived_from);
        assert_eq!("com/foo/", info.stub_prefix());
        assert_eq!(ReplaceAction::Throw, info.replace_method[0].action);
        assert!(info.replace_method[0].matches("com/foo/A", "run", "()V"));
        assert!(!info.replace_method[0].matches("com/foo/A", "run", "(I)V"));
        assert!(info.redirect_call[0].matches("java/lang/System", "nanoTime", "()J"));
        assert_eq!("com/foo/Clock", info.redirect_call[0].target_internal());
        assert!(info.promote_methods.is_empty());
    }

    #[test]
    fn rejects_unknown_keys_and_conflicting_renames() {
        assert!(CreateInfo::from_toml("includes = []").is_err());

        let twice = CreateInfo::from_toml(
            r#"
            [[rename]]
            from = "a.B"
            to = "a.C"
            [[rename]]
            from = "a.B"
            to = "a.D"
            "#,
        )
        .expect("parse toml");
        assert!(twice.validate().is_err());

        let chained = CreateInfo::from_toml(
            r#"
            [[rename]]
            from = "a.B"
            to = "a.C"
            [[rename]]
            from = "a.C"
            to = "a.D"
            "#,
        )
        .expect("parse toml");
        assert!(chained.validate().is_err());
    }

    #[test]
    fn member_specs_parse_optional_descriptor() {
        let field = MemberSpec::parse("android.graphics.Paint#mNativePaint").expect("field");
        assert_eq!("android/graphics/Paint", field.owner);
        assert_eq!("mNativePaint", field.name);
        assert_eq!(None, field.descriptor);
        assert!(field.matches("android/graphics/Paint", "mNativePaint", "J"));

        let method = MemberSpec::parse("a.B#run(I)V").expect("method");
        assert_eq!(Some("(I)V".to_string()), method.descriptor);
        assert!(!method.matches("a/B", "run", "()V"));

        assert!(MemberSpec::parse("a.B").is_err());
        assert!(MemberSpec::parse("#run").is_err());
    }
}
