//! Import extraction using tree-sitter for JavaScript/TypeScript.
//!
//! Files are parsed permissively: tree-sitter recovers from syntax errors,
//! so a partially broken file still yields the imports it can see.

use std::path::Path;

use thiserror::Error;
use tree_sitter::{Language, Node, Parser, Tree};

/// Errors that can occur during import extraction.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Tree-sitter language initialization failed")]
    LanguageInit,

    #[error("Parser produced no tree")]
    NoTree,
}

/// How a module was referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import x from 'm'`, `import 'm'`
    Static,
    /// `import type { T } from 'm'`
    TypeOnly,
    /// `export { x } from 'm'`, `export * from 'm'`
    ReExport,
    /// `require('m')`
    Require,
    /// `import('m')`
    Dynamic,
    /// TypeScript `import x = require('m')`
    ExternalModuleReference,
}

/// One module reference found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSite {
    /// The module specifier as written (e.g. "react", "./utils", "@scope/pkg/sub").
    pub source: String,
    pub kind: ImportKind,
    /// Line number in the source file (1-indexed).
    pub line: usize,
}

/// Returns the package portion of a bare module specifier.
///
/// ```
/// use depsweep::analysis::imports::package_name;
///
/// assert_eq!(package_name("lodash/debounce"), Some("lodash"));
/// assert_eq!(package_name("@tanstack/react-query/devtools"), Some("@tanstack/react-query"));
/// assert_eq!(package_name("./utils"), None);
/// ```
pub fn package_name(source: &str) -> Option<&str> {
    if source.is_empty() || source.starts_with('.') || source.starts_with('/') {
        return None;
    }

    if source.starts_with('@') {
        let mut parts = source.splitn(3, '/');
        let scope = parts.next()?;
        let name = parts.next()?;
        return Some(&source[..scope.len() + 1 + name.len()]);
    }

    source.split('/').next()
}

/// Grammar used for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    /// JavaScript, JSX included.
    JavaScript,
    TypeScript,
    Tsx,
}

impl SourceLanguage {
    /// Determine language from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "js" | "jsx" | "mjs" | "cjs" => Some(SourceLanguage::JavaScript),
            "ts" | "mts" | "cts" => Some(SourceLanguage::TypeScript),
            "tsx" => Some(SourceLanguage::Tsx),
            _ => None,
        }
    }

    /// Determine language from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Get tree-sitter language for this source language.
    pub fn tree_sitter_language(&self) -> Language {
        match self {
            SourceLanguage::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            SourceLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SourceLanguage::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// The closed set of syntax nodes that can carry a module reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportNode {
    ImportDeclaration,
    ExportDeclaration,
    CallExpression,
    ExternalModuleReference,
}

impl ImportNode {
    fn classify(kind: &str) -> Option<Self> {
        match kind {
            "import_statement" => Some(Self::ImportDeclaration),
            "export_statement" => Some(Self::ExportDeclaration),
            "call_expression" => Some(Self::CallExpression),
            "import_require_clause" => Some(Self::ExternalModuleReference),
            _ => None,
        }
    }
}

/// Parses `source` and returns every module reference in it.
pub fn extract_imports(source: &str, language: SourceLanguage) -> Result<Vec<ImportSite>, ImportError> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.tree_sitter_language())
        .map_err(|_| ImportError::LanguageInit)?;

    let tree = parser.parse(source, None).ok_or(ImportError::NoTree)?;
    Ok(collect_imports(&tree, source))
}

/// Walks the tree iteratively; deeply nested bundles do not grow the stack.
fn collect_imports(tree: &Tree, source: &str) -> Vec<ImportSite> {
    let mut imports = Vec::new();
    let mut cursor = tree.walk();

    loop {
        let node = cursor.node();
        if let Some(kind) = ImportNode::classify(node.kind()) {
            if let Some(site) = visit(kind, &node, source) {
                imports.push(site);
            }
        }

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return imports;
            }
        }
    }
}

fn visit(kind: ImportNode, node: &Node, source: &str) -> Option<ImportSite> {
    let line = node.start_position().row + 1;
    let site = |specifier: String, kind: ImportKind| ImportSite {
        source: specifier,
        kind,
        line,
    };

    match kind {
        ImportNode::ImportDeclaration => {
            // `import x = require(...)` has no source field; its clause is
            // visited on its own.
            let source_node = node.child_by_field_name("source")?;
            let specifier = string_value(&source_node, source)?;
            let kind = if has_type_keyword(node) {
                ImportKind::TypeOnly
            } else {
                ImportKind::Static
            };
            Some(site(specifier, kind))
        }
        ImportNode::ExportDeclaration => {
            let source_node = node.child_by_field_name("source")?;
            Some(site(string_value(&source_node, source)?, ImportKind::ReExport))
        }
        ImportNode::ExternalModuleReference => {
            let source_node = node
                .child_by_field_name("source")
                .or_else(|| first_string_child(node))?;
            Some(site(
                string_value(&source_node, source)?,
                ImportKind::ExternalModuleReference,
            ))
        }
        ImportNode::CallExpression => {
            let function = node.child_by_field_name("function")?;
            let kind = match function.kind() {
                "import" => ImportKind::Dynamic,
                "identifier" if node_text(&function, source) == Some("require") => {
                    ImportKind::Require
                }
                _ => return None,
            };
            let args = node.child_by_field_name("arguments")?;
            let arg = first_string_child(&args)?;
            Some(site(string_value(&arg, source)?, kind))
        }
    }
}

fn has_type_keyword(node: &Node) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| matches!(child.kind(), "type" | "typeof"));
    found
}

fn first_string_child<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .find(|child| matches!(child.kind(), "string" | "template_string"));
    found
}

/// Extract the text content of a node.
fn node_text<'a>(node: &Node, source: &'a str) -> Option<&'a str> {
    source.get(node.start_byte()..node.end_byte())
}

/// Extract string value (removes quotes). Templates with substitutions
/// are not static specifiers and yield nothing.
fn string_value(node: &Node, source: &str) -> Option<String> {
    if node.kind() == "template_string" && node.named_child_count() > 0 {
        let mut cursor = node.walk();
        let dynamic = node
            .named_children(&mut cursor)
            .any(|child| child.kind() == "template_substitution");
        if dynamic {
            return None;
        }
    }

    let text = node_text(node, source)?;
    let trimmed = text
        .trim_start_matches(['"', '\'', '`'])
        .trim_end_matches(['"', '\'', '`']);
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn js(source: &str) -> Vec<ImportSite> {
        extract_imports(source, SourceLanguage::JavaScript).unwrap()
    }

    fn ts(source: &str) -> Vec<ImportSite> {
        extract_imports(source, SourceLanguage::TypeScript).unwrap()
    }

    fn sources(imports: &[ImportSite]) -> Vec<&str> {
        imports.iter().map(|i| i.source.as_str()).collect()
    }

    #[test]
    fn test_static_imports() {
        let imports = js(r#"
import React from 'react';
import { useQuery } from '@tanstack/react-query';
import './styles.css';
"#);
        assert_eq!(sources(&imports), vec!["react", "@tanstack/react-query", "./styles.css"]);
        assert!(imports.iter().all(|i| i.kind == ImportKind::Static));
        assert_eq!(imports[0].line, 2);
    }

    #[test]
    fn test_require_and_dynamic_import() {
        let imports = js(r#"
const _ = require("lodash/fp");
const mod = await import('chalk');
"#);
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].kind, ImportKind::Require);
        assert_eq!(imports[0].source, "lodash/fp");
        assert_eq!(imports[1].kind, ImportKind::Dynamic);
        assert_eq!(imports[1].source, "chalk");
    }

    #[test]
    fn test_require_with_template_literal() {
        let imports = js("const a = require(`dotenv`); const b = require(`./${name}`);");
        assert_eq!(sources(&imports), vec!["dotenv"]);
    }

    #[test]
    fn test_other_calls_ignored() {
        let imports = js("foo('react'); obj.require('lodash');");
        assert!(imports.is_empty());
    }

    #[test]
    fn test_re_exports() {
        let imports = js("export * from 'date-fns'; export { a } from './local';");
        assert_eq!(sources(&imports), vec!["date-fns", "./local"]);
        assert!(imports.iter().all(|i| i.kind == ImportKind::ReExport));
    }

    #[test]
    fn test_jsx_in_javascript() {
        let imports = js("import x from 'preact'; const el = <div className=\"a\">{x}</div>;");
        assert_eq!(sources(&imports), vec!["preact"]);
    }

    #[test]
    fn test_typescript_type_import() {
        let imports = ts("import type { FC } from 'react';");
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].kind, ImportKind::TypeOnly);
    }

    #[test]
    fn test_typescript_external_module_reference() {
        let imports = ts("import fs = require('fs-extra');");
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].source, "fs-extra");
        assert_eq!(imports[0].kind, ImportKind::ExternalModuleReference);
    }

    #[test]
    fn test_typescript_decorators_and_class_properties() {
        let imports = ts(r#"
import { Component } from '@angular/core';
@Component({ selector: 'app' })
export class App { title = 'x'; }
"#);
        assert_eq!(sources(&imports), vec!["@angular/core"]);
    }

    #[test]
    fn test_tsx() {
        let imports = extract_imports(
            "import React from 'react'; export const A = () => <div />;",
            SourceLanguage::Tsx,
        )
        .unwrap();
        assert_eq!(sources(&imports), vec!["react"]);
    }

    #[test]
    fn test_broken_source_still_yields_imports() {
        let imports = js("import a from 'axios';\nconst = = ;\n");
        assert!(sources(&imports).contains(&"axios"));
    }

    #[test]
    fn test_package_name() {
        assert_eq!(package_name("react"), Some("react"));
        assert_eq!(package_name("@scope/pkg"), Some("@scope/pkg"));
        assert_eq!(package_name("@scope"), None);
        assert_eq!(package_name("/abs/path"), None);
        assert_eq!(package_name(""), None);
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(SourceLanguage::from_path(Path::new("a.mjs")), Some(SourceLanguage::JavaScript));
        assert_eq!(SourceLanguage::from_path(Path::new("a.cts")), Some(SourceLanguage::TypeScript));
        assert_eq!(SourceLanguage::from_path(Path::new("a.TSX")), Some(SourceLanguage::Tsx));
        assert_eq!(SourceLanguage::from_path(Path::new("a.json")), None);
    }
}
