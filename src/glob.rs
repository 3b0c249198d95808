use anyhow::{Context, Result};
use regex::Regex;

/// Glob over a separator-delimited name.
///
/// `**` matches any run of characters, `*` matches any run that does not
/// cross the separator, and every other character is literal. Class globs use
/// `.` as separator (so `android.view.*` also matches `android.view.View$Inner`),
/// resource globs use `/`.
#[derive(Clone, Debug)]
pub(crate) struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    pub(crate) fn class(pattern: &str) -> Result<Self> {
        Self::compile(pattern, '.')
    }

    pub(crate) fn path(pattern: &str) -> Result<Self> {
        Self::compile(pattern, '/')
    }

    fn compile(pattern: &str, separator: char) -> Result<Self> {
        let regex = Regex::new(&glob_to_regex(pattern, separator))
            .with_context(|| format!("invalid glob pattern {pattern}"))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.source
    }

    pub(crate) fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// Pure matcher for a class glob against a dotted class name.
pub(crate) fn matches(pattern: &str, fqcn: &str) -> bool {
    GlobPattern::class(pattern)
        .map(|glob| glob.is_match(fqcn))
        .unwrap_or(false)
}

/// Set of compiled globs; a name matches the set when any member matches.
#[derive(Clone, Debug, Default)]
pub(crate) struct GlobSet {
    patterns: Vec<GlobPattern>,
}

impl GlobSet {
    pub(crate) fn classes(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| GlobPattern::class(pattern))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub(crate) fn paths(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| GlobPattern::path(pattern))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub(crate) fn is_match(&self, name: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(name))
    }

    pub(crate) fn patterns(&self) -> &[GlobPattern] {
        &self.patterns
    }
}

fn glob_to_regex(pattern: &str, separator: char) -> String {
    let mut regex = String::with_capacity(pattern.len() * 2 + 2);
    regex.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                regex.push_str(".*");
            } else {
                regex.push_str("[^");
                regex.push_str(&regex::escape(&separator.to_string()));
                regex.push_str("]*");
            }
        } else {
            regex.push_str(&regex::escape(&c.to_string()));
        }
    }
    regex.push('$');
    regex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_star_stays_within_package() {
        assert!(matches("android.view.*", "android.view.View"));
        assert!(matches("android.view.*", "android.view.View$OnClickListener"));
        assert!(!matches("android.view.*", "android.view.animation.Animation"));
        assert!(!matches("android.view.*", "android.viewx.View"));
    }

    #[test]
    fn double_star_crosses_packages() {
        assert!(matches("android.view.**", "android.view.animation.Animation"));
        assert!(matches("android.**", "android.view.View"));
        assert!(!matches("android.**", "androidx.core.View"));
    }

    #[test]
    fn literal_characters_are_escaped() {
        assert!(matches("com.foo.B", "com.foo.B"));
        assert!(!matches("com.foo.B", "comXfooXB"));
        assert!(!matches("com.foo.B", "com.foo.Bar"));
        assert!(matches("android.view.View$*", "android.view.View$1"));
    }

    #[test]
    fn path_globs_use_slash_separator() {
        let glob = GlobPattern::path("META-INF/*.SF").expect("compile glob");
        assert!(glob.is_match("META-INF/CERT.SF"));
        assert!(!glob.is_match("META-INF/sub/CERT.SF"));

        let deep = GlobPattern::path("res/**").expect("compile glob");
        assert!(deep.is_match("res/values/strings.xml"));
        assert_eq!("res/**", deep.as_str());
    }

    #[test]
    fn glob_set_matches_any_member() {
        let set = GlobSet::classes(&["a.*".to_string(), "b.**".to_string()]).expect("compile set");
        assert!(set.is_match("a.X"));
        assert!(set.is_match("b.c.Y"));
        assert!(!set.is_match("c.Z"));
        assert!(!GlobSet::default().is_match("a.X"));
    }
}
