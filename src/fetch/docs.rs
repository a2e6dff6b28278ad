//! Package documentation synthesis.
//!
//! Parses Go files with tree-sitter and extracts what the documentation
//! model needs: the package clause, imports, the package comment, and
//! exported top-level declarations with their doc comments.
//!
//! Go visibility is based on name casing: capitalized = exported.

use tree_sitter::{Node, Parser};

use crate::types::{DeclKind, DocItem, Documentation, FetchError, Result};

use super::buildctx::BuildContext;

/// Ceiling on the rendered (serialized) size of one package's
/// documentation.
pub const MAX_DOCUMENTATION_SIZE: usize = 20 << 20;

/// One parsed Go source file.
#[derive(Debug, Clone)]
pub struct ParsedGoFile {
    pub package_name: String,
    pub package_doc: Option<String>,
    pub imports: Vec<String>,
    pub items: Vec<DocItem>,
}

/// Parse one Go file. Syntax errors and missing package clauses are
/// BadPackage; the caller records them per-directory.
pub fn parse_go_file(file_name: &str, source: &str) -> Result<ParsedGoFile> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_go::LANGUAGE.into())
        .map_err(|e| FetchError::BadPackage(format!("loading Go grammar: {e}")))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| FetchError::BadPackage(format!("{file_name}: failed to parse")))?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(FetchError::BadPackage(format!("{file_name}: syntax error")));
    }

    let mut package_name = None;
    let mut package_doc = None;
    let mut imports = Vec::new();
    let mut items = Vec::new();

    let mut cursor = root.walk();
    for node in root.children(&mut cursor) {
        match node.kind() {
            "package_clause" => {
                package_name = node
                    .child_by_field_name("name")
                    .or_else(|| find_child(node, "package_identifier"))
                    .and_then(|n| text(n, source));
                package_doc = doc_comment(node, source);
            }
            "import_declaration" => collect_imports(node, source, &mut imports),
            "function_declaration" => {
                push_item(DeclKind::Func, node, node, source, &mut items);
            }
            "method_declaration" => {
                push_item(DeclKind::Method, node, node, source, &mut items);
            }
            "type_declaration" => {
                for spec in named_children(node, "type_spec") {
                    push_item(DeclKind::Type, spec, node, source, &mut items);
                }
            }
            "const_declaration" => {
                for spec in named_children(node, "const_spec") {
                    push_item(DeclKind::Const, spec, node, source, &mut items);
                }
            }
            "var_declaration" => {
                for spec in named_children(node, "var_spec") {
                    push_item(DeclKind::Var, spec, node, source, &mut items);
                }
            }
            _ => {}
        }
    }

    let package_name = package_name
        .ok_or_else(|| FetchError::BadPackage(format!("{file_name}: no package clause")))?;

    Ok(ParsedGoFile {
        package_name,
        package_doc,
        imports,
        items,
    })
}

/// Synthesise documentation for one build context from its matched files,
/// in file-name order.
pub fn synthesize(context: BuildContext, files: &[(&str, &ParsedGoFile)]) -> Documentation {
    let package_doc = files.iter().find_map(|(_, f)| f.package_doc.clone());

    let mut imports: Vec<String> = files
        .iter()
        .flat_map(|(_, f)| f.imports.iter().cloned())
        .collect();
    imports.sort();
    imports.dedup();

    let mut api: Vec<DocItem> = files.iter().flat_map(|(_, f)| f.items.clone()).collect();
    api.sort_by_key(|item| (kind_rank(item.kind), item.name.clone()));
    api.dedup_by(|a, b| a.kind == b.kind && a.name == b.name);

    Documentation {
        goos: context.goos.to_string(),
        goarch: context.goarch.to_string(),
        synopsis: package_doc.as_deref().map(synopsis).unwrap_or_default(),
        imports,
        api,
    }
}

/// Rendered size, checked against MAX_DOCUMENTATION_SIZE.
pub fn rendered_size(docs: &[Documentation]) -> usize {
    serde_json::to_vec(docs).map_or(0, |v| v.len())
}

/// First sentence of a package comment.
pub fn synopsis(doc: &str) -> String {
    let text = doc.trim().replace('\n', " ");
    match text.find(". ") {
        Some(i) => text[..=i].to_string(),
        None => text,
    }
}

fn kind_rank(kind: DeclKind) -> u8 {
    match kind {
        DeclKind::Const => 0,
        DeclKind::Var => 1,
        DeclKind::Func => 2,
        DeclKind::Method => 3,
        DeclKind::Type => 4,
    }
}

fn push_item(
    kind: DeclKind,
    spec: Node,
    decl: Node,
    source: &str,
    items: &mut Vec<DocItem>,
) {
    let Some(name) = name_of(spec, source) else {
        return;
    };
    if !is_exported(&name) {
        return;
    }
    // Doc comments attach to the spec node inside a grouped declaration,
    // else to the declaration itself.
    let doc = doc_comment(spec, source)
        .or_else(|| doc_comment(decl, source))
        .unwrap_or_default();
    let code = text(decl, source).unwrap_or_default();
    items.push(DocItem {
        kind,
        name,
        signature: code.lines().next().unwrap_or("").to_string(),
        doc,
    });
}

fn name_of(node: Node, source: &str) -> Option<String> {
    node.child_by_field_name("name").and_then(|n| text(n, source))
}

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

fn collect_imports(node: Node, source: &str, imports: &mut Vec<String>) {
    let mut cursor = node.walk();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        for child in current.children(&mut cursor) {
            match child.kind() {
                "import_spec" => {
                    if let Some(path) = child
                        .child_by_field_name("path")
                        .and_then(|n| text(n, source))
                    {
                        imports.push(path.trim_matches('"').to_string());
                    }
                }
                "import_spec_list" => stack.push(child),
                _ => {}
            }
        }
    }
}

/// Comment lines immediately preceding `node`, joined. Go doc comments
/// are the contiguous comment block directly above a declaration.
fn doc_comment(node: Node, source: &str) -> Option<String> {
    let mut comments = Vec::new();
    let mut prev = node.prev_sibling();
    while let Some(sibling) = prev {
        if sibling.kind() != "comment" {
            break;
        }
        let raw = text(sibling, source)?;
        let line = raw
            .strip_prefix("//")
            .map(str::trim)
            .unwrap_or_else(|| raw.trim_start_matches("/*").trim_end_matches("*/").trim());
        comments.push(line.to_string());
        prev = sibling.prev_sibling();
    }
    if comments.is_empty() {
        return None;
    }
    comments.reverse();
    // Constraint comments are not documentation.
    let doc: Vec<String> = comments
        .into_iter()
        .filter(|c| !c.starts_with("go:build") && !c.starts_with("+build"))
        .collect();
    if doc.is_empty() {
        None
    } else {
        Some(doc.join("\n"))
    }
}

fn named_children<'a>(node: Node<'a>, kind: &'static str) -> Vec<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|c| c.kind() == kind)
        .collect()
}

fn find_child<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

fn text(node: Node, source: &str) -> Option<String> {
    node.utf8_text(source.as_bytes()).ok().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::buildctx::ALL;

    #[test]
    fn test_parse_package_and_imports() {
        let source = r#"
// Package basic does basic things.
package basic

import (
    "fmt"
    "strings"
)

import "os"
"#;
        let file = parse_go_file("basic.go", source).unwrap();
        assert_eq!(file.package_name, "basic");
        assert_eq!(
            file.package_doc.as_deref(),
            Some("Package basic does basic things.")
        );
        assert_eq!(file.imports, vec!["fmt", "strings", "os"]);
    }

    #[test]
    fn test_exported_declarations() {
        let source = r#"
package p

// Exported does a thing.
func Exported(a int) int { return a }

func internal() {}

// Thing is a thing.
type Thing struct{}

type hidden struct{}

// MaxSize is the largest size.
const MaxSize = 10

var Default = Thing{}

// String renders the thing.
func (t Thing) String() string { return "" }
"#;
        let file = parse_go_file("p.go", source).unwrap();
        let names: Vec<&str> = file.items.iter().map(|i| i.name.as_str()).collect();
        // Source order; synthesis sorts later.
        assert_eq!(names, vec!["Exported", "Thing", "MaxSize", "Default", "String"]);

        let exported = &file.items[0];
        assert_eq!(exported.kind, DeclKind::Func);
        assert_eq!(exported.doc, "Exported does a thing.");
        assert_eq!(exported.signature, "func Exported(a int) int { return a }");

        let method = file.items.iter().find(|i| i.name == "String").unwrap();
        assert_eq!(method.kind, DeclKind::Method);
        assert_eq!(method.doc, "String renders the thing.");
    }

    #[test]
    fn test_syntax_error_is_bad_package() {
        let err = parse_go_file("broken.go", "package p\nfunc {{{\n").unwrap_err();
        assert_eq!(err.kind(), crate::types::ErrorKind::BadPackage);
    }

    #[test]
    fn test_missing_package_clause() {
        let err = parse_go_file("empty.go", "// just a comment\n").unwrap_err();
        assert_eq!(err.kind(), crate::types::ErrorKind::BadPackage);
    }

    #[test]
    fn test_synopsis() {
        assert_eq!(
            synopsis("Package basic does basic things. It also does more."),
            "Package basic does basic things."
        );
        assert_eq!(synopsis("One line only"), "One line only");
        assert_eq!(
            synopsis("Package p spans\nmultiple lines. More."),
            "Package p spans multiple lines."
        );
    }

    #[test]
    fn test_synthesize_unions_and_sorts() {
        let a = parse_go_file(
            "a.go",
            "// Package p is p.\npackage p\nimport \"fmt\"\nfunc B() {}\n",
        )
        .unwrap();
        let b = parse_go_file(
            "b.go",
            "package p\nimport \"os\"\nimport \"fmt\"\nfunc A() {}\nconst C = 1\n",
        )
        .unwrap();

        let doc = synthesize(ALL, &[("a.go", &a), ("b.go", &b)]);
        assert_eq!(doc.goos, "all");
        assert_eq!(doc.synopsis, "Package p is p.");
        assert_eq!(doc.imports, vec!["fmt", "os"]);
        let names: Vec<&str> = doc.api.iter().map(|i| i.name.as_str()).collect();
        // consts before funcs, then by name.
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_documentation_serialization_round_trip() {
        let file = parse_go_file(
            "p.go",
            "// Package p is p.\npackage p\nimport \"fmt\"\n\n// F does f.\nfunc F() {}\n",
        )
        .unwrap();
        let doc = synthesize(ALL, &[("p.go", &file)]);

        let encoded = serde_json::to_vec(&doc).unwrap();
        let decoded: crate::types::Documentation = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(decoded, doc);
        // Re-encoding is byte-identical; the model is cycle-free owned
        // data, so nothing is lost or reordered.
        assert_eq!(serde_json::to_vec(&decoded).unwrap(), encoded);
    }

    #[test]
    fn test_constraint_comment_is_not_doc() {
        let source = "//go:build linux\n\n// Package p is constrained.\npackage p\n";
        let file = parse_go_file("p.go", source).unwrap();
        assert_eq!(
            file.package_doc.as_deref(),
            Some("Package p is constrained.")
        );
    }
}
