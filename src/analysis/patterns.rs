//! Heuristic name patterns.
//!
//! Two independent tables live here:
//!
//! - **Usage patterns**: for one dependency name, a fixed family of
//!   regular expressions matching the ways configuration tends to spell
//!   it (`eslint-config-x`, `@types/x`, `x/preset`, `x-cli`, ...). Used
//!   when deep-scanning parsed configuration values.
//! - **Pattern families**: base tokens of tools that are configured by
//!   convention (a `jest.config.js` never imports `jest`). A dependency
//!   that belongs to a family may be evidenced by its bare name appearing
//!   as a word in any file.
//!
//! Both are recall-oriented. A false "used" only retains a dependency.

use regex::{Regex, RegexSet};
use serde_json::Value;

/// Organizational scopes that commonly wrap a bare package name.
pub const SCOPE_PREFIXES: &[&str] = &["@types/", "@storybook/", "@testing-library/"];

/// Suffixes for config/plugin/preset companions, joined by `-`, `.` or `/`.
pub const CONFIG_SUFFIXES: &[&str] = &[
    "config", "configs", "plugin", "plugins", "preset", "presets", "loader", "loaders", "rc",
    "setup",
];

/// Tool-role words combined with the name in either order (`x-cli`, `cli-x`).
pub const TOOL_AFFIXES: &[&str] = &["cli", "core", "runtime", "register", "utils", "types"];

/// Framework integrations named `<name>-<framework>`.
const FRAMEWORK_SUFFIX: &str = r"-(?:react|vue|angular|svelte|preact|solid|next|nuxt)";

/// Tool roles named `<name>-<role>`.
const TOOL_ROLE_SUFFIX: &str =
    r"-(?:loader|plugin|transformer|adapter|webpack-plugin|rollup-plugin|vite-plugin)";

/// Start boundary: not preceded by a character that could continue a name.
const START: &str = r"(?:^|[^A-Za-z0-9_@.\-])";

/// End boundary: sub-paths (`/`) may follow, name characters may not.
const END: &str = r"(?:$|[^A-Za-z0-9_\-])";

/// Rest of a compound name after a suffix (`-plugin` + `-tailwind`).
const TAIL: &str = r"[A-Za-z0-9_.\-]*";

/// Compiled usage patterns for one dependency.
#[derive(Debug, Clone)]
pub struct UsagePatterns {
    sources: Vec<String>,
    set: RegexSet,
}

impl UsagePatterns {
    /// Generates the pattern family for `dependency`.
    ///
    /// ```
    /// use depsweep::analysis::UsagePatterns;
    ///
    /// let patterns = UsagePatterns::for_dependency("prettier");
    /// assert!(patterns.is_match("prettier"));
    /// assert!(patterns.is_match("prettier-plugin-tailwind"));
    /// assert!(patterns.is_match("@types/prettier"));
    /// assert!(!patterns.is_match("my-prettier-fork"));
    /// ```
    pub fn for_dependency(dependency: &str) -> Self {
        let sources: Vec<String> = variants(dependency)
            .into_iter()
            .map(|variant| format!("{START}(?:{variant}){END}"))
            .collect();

        // Every fragment is built from escaped input and fixed tables.
        let set = RegexSet::new(&sources).expect("generated usage patterns are valid");
        Self { sources, set }
    }

    /// The generated expressions, for auditing and tests.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// True if any pattern matches `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.set.is_match(text)
    }

    /// Recursively scans every string value in `value`.
    ///
    /// Object keys are not scanned: in manifests they are the dependency
    /// declarations themselves.
    pub fn matches_value(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => self.is_match(s),
            Value::Array(items) => items.iter().any(|v| self.matches_value(v)),
            Value::Object(map) => map.values().any(|v| self.matches_value(v)),
            Value::Null | Value::Bool(_) | Value::Number(_) => false,
        }
    }
}

/// Regex fragments (without boundaries) for every spelling of `dependency`.
fn variants(dependency: &str) -> Vec<String> {
    let name = regex::escape(dependency);
    let scoped = dependency.starts_with('@');
    let mut out = vec![name.clone()];

    if !scoped {
        out.push(format!(r"@{name}(?:/[A-Za-z0-9_.\-]+)?"));
        for prefix in SCOPE_PREFIXES {
            out.push(format!("{}{name}", regex::escape(prefix)));
        }
    }

    out.push(format!(r"{name}[\-./](?:{}){TAIL}", CONFIG_SUFFIXES.join("|")));

    let affixes = TOOL_AFFIXES.join("|");
    out.push(format!(r"{name}-(?:{affixes}){TAIL}"));
    if !scoped {
        out.push(format!(r"(?:{affixes})-{name}"));
    }

    out.push(format!("{name}{FRAMEWORK_SUFFIX}{TAIL}"));
    out.push(format!("{name}{TOOL_ROLE_SUFFIX}{TAIL}"));
    out
}

/// A tool configured by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternFamily {
    /// Leading token a member's name starts with (scope `@` ignored).
    pub base: &'static str,
    /// Glob-like member patterns; `*` matches any run of characters.
    pub members: &'static [&'static str],
}

/// Known tool families.
pub const PATTERN_FAMILIES: &[PatternFamily] = &[
    PatternFamily { base: "babel", members: &["babel-*", "@babel/*"] },
    PatternFamily { base: "eslint", members: &["eslint", "eslint-plugin-*", "eslint-config-*", "@eslint/*"] },
    PatternFamily { base: "prettier", members: &["prettier", "prettier-plugin-*", "@prettier/*"] },
    PatternFamily { base: "stylelint", members: &["stylelint", "stylelint-*"] },
    PatternFamily { base: "jest", members: &["jest", "jest-*", "@jest/*"] },
    PatternFamily { base: "vitest", members: &["vitest", "@vitest/*"] },
    PatternFamily { base: "mocha", members: &["mocha", "mocha-*"] },
    PatternFamily { base: "karma", members: &["karma", "karma-*"] },
    PatternFamily { base: "webpack", members: &["webpack", "webpack-*", "@webpack-cli/*"] },
    PatternFamily { base: "rollup", members: &["rollup", "rollup-plugin-*", "@rollup/*"] },
    PatternFamily { base: "vite", members: &["vite", "vite-plugin-*", "@vitejs/*"] },
    PatternFamily { base: "esbuild", members: &["esbuild", "esbuild-*"] },
    PatternFamily { base: "postcss", members: &["postcss", "postcss-*"] },
    PatternFamily { base: "tailwind", members: &["tailwindcss", "@tailwindcss/*"] },
    PatternFamily { base: "commitlint", members: &["@commitlint/*"] },
    PatternFamily { base: "storybook", members: &["storybook", "@storybook/*"] },
];

impl PatternFamily {
    /// True if `dependency` starts with this family's base token and
    /// matches one of its member patterns.
    pub fn contains(&self, dependency: &str) -> bool {
        dependency.trim_start_matches('@').starts_with(self.base)
            && self.members.iter().any(|glob| glob_match(glob, dependency))
    }
}

/// The first family `dependency` belongs to, if any.
///
/// ```
/// use depsweep::analysis::patterns::family_for;
///
/// assert_eq!(family_for("@babel/core").map(|f| f.base), Some("babel"));
/// assert_eq!(family_for("jest").map(|f| f.base), Some("jest"));
/// assert!(family_for("lodash").is_none());
/// ```
pub fn family_for(dependency: &str) -> Option<&'static PatternFamily> {
    PATTERN_FAMILIES.iter().find(|family| family.contains(dependency))
}

/// Whole-word matcher for `dependency` in raw text.
pub fn word_regex(dependency: &str) -> Regex {
    let pattern = format!(r"(?:^|\W){}(?:\W|$)", regex::escape(dependency));
    Regex::new(&pattern).expect("escaped word pattern is valid")
}

/// Matches `name` against a glob where `*` stands for any run of characters.
fn glob_match(glob: &str, name: &str) -> bool {
    let mut parts = glob.split('*');
    let Some(first) = parts.next() else {
        return false;
    };
    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };

    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}
