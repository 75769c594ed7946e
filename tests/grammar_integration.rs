//! Integration tests for grammars and the parse pipeline
//!
//! These tests run recursive grammars end to end: lexing, trivia
//! attachment, fixpoint rewriting and semantic annotation.

use codeseam::engine::{
    python, CodedBuffer, Language, LanguageRegistry, Parser, Position, Selector, SyntaxTree,
    TextEncoding, TreePrinter, ROOT_KEY,
};
use std::path::Path;
use std::sync::Arc;

const CALC: &str = r#"{
    "name": "calc",
    "extensions": ["calc"],
    "matchers": [
        {"type": "regex", "pattern": "\\s+", "kind": "T_SPACE"},
        {"type": "regex", "pattern": "[0-9]+", "kind": "T_NUMBER"},
        {"type": "literal", "texts": ["+", "(", ")"]}
    ],
    "trivia": ["T_SPACE"],
    "patterns": [
        {"type": "sequence", "key": "group", "elements": ["(", "@sum", ")"]},
        {"type": "alternation", "key": "term", "alternatives": ["T_NUMBER", "@group"]},
        {"type": "sequence", "key": "plus", "elements": ["+", "@term"]},
        {"type": "repetition", "key": "tail", "inner": "@plus", "optional": true},
        {"type": "sequence", "key": "sum", "elements": ["@term", "@tail"]}
    ],
    "rules": ["sum"]
}"#;

fn parse(language: Language, path: &str, text: &str) -> SyntaxTree {
    let parser = Parser::new(Arc::new(language));
    let buffer = CodedBuffer::decode(text.as_bytes(), TextEncoding::utf8());
    parser.parse(Path::new(path), &buffer, Position::start())
}

fn top_keys(tree: &SyntaxTree) -> Vec<String> {
    let root = tree.root().unwrap();
    tree.children(root)
        .iter()
        .map(|&n| tree.node(n).key().to_string())
        .collect()
}

// ============================================================================
// Recursive Grammar Tests
// ============================================================================

#[test]
fn test_recursive_sum() {
    let text = "1 + (2 + 3)";
    let tree = parse(Language::from_json(CALC).unwrap(), "a.calc", text);
    let root = tree.root().unwrap();

    assert_eq!(tree.node(root).key(), ROOT_KEY);
    assert_eq!(tree.reconstruct_code(root), text);
    assert_eq!(top_keys(&tree), vec!["sum"]);

    let groups = Selector::parse("group").select(&tree, root);
    assert_eq!(groups.len(), 1);
    assert_eq!(tree.reconstruct_code(groups[0]).trim(), "(2 + 3)");
    assert_eq!(Selector::parse("group/sum").select(&tree, root).len(), 1);
}

#[test]
fn test_deep_nesting_terminates() {
    let text = format!("{}7{}", "(".repeat(12), ")".repeat(12));
    let tree = parse(Language::from_json(CALC).unwrap(), "a.calc", &text);
    let root = tree.root().unwrap();

    assert_eq!(tree.reconstruct_code(root), text);
    assert_eq!(top_keys(&tree), vec!["sum"]);
    assert_eq!(Selector::parse("group").select(&tree, root).len(), 12);
}

#[test]
fn test_unbalanced_input_is_kept() {
    let text = "1 + (2 +";
    let tree = parse(Language::from_json(CALC).unwrap(), "a.calc", text);
    let root = tree.root().unwrap();

    // nothing is lost even where no rule applies
    assert_eq!(tree.reconstruct_code(root), text);
    assert!(Selector::parse("group").select(&tree, root).is_empty());
}

// ============================================================================
// Python Tests
// ============================================================================

#[test]
fn test_python_call_chain() {
    let text = "os.path.join(a, b)";
    let tree = parse(python(), "m.py", text);
    let root = tree.root().unwrap();

    assert_eq!(top_keys(&tree), vec!["expression"]);
    assert_eq!(Selector::parse("call").select(&tree, root).len(), 1);
    assert_eq!(Selector::parse("attribute").select(&tree, root).len(), 2);
}

#[test]
fn test_python_semantics() {
    let text = "class Shape:\n    def area(self):\n        return 0\n";
    let tree = parse(python(), "m.py", text);
    let root = tree.root().unwrap();

    let class = Selector::parse("/class").select_first(&tree, root).unwrap();
    assert_eq!(tree.semantic(class, "class").unwrap().name, "Shape");
    let function = Selector::parse("/function").select_first(&tree, root).unwrap();
    assert_eq!(tree.semantic(function, "function").unwrap().name, "area");
}

#[test]
fn test_tree_printer_shows_structure() {
    let tree = parse(python(), "m.py", "import os\n");
    let printed = TreePrinter::new().print_tree(&tree);
    assert!(printed.starts_with("   1 root"));
    assert!(printed.contains("import  \"import os\""));
}

// ============================================================================
// Language Selection Tests
// ============================================================================

#[test]
fn test_registry_drives_parsing() {
    let mut registry = LanguageRegistry::with_builtin();
    registry.register(Language::from_json(CALC).unwrap());

    let language = registry.select(Path::new("sum.calc"), b"");
    let parser = Parser::new(language);
    let buffer = CodedBuffer::decode(b"4 + 5", TextEncoding::utf8());
    let tree = parser.parse(Path::new("sum.calc"), &buffer, Position::start());
    assert_eq!(top_keys(&tree), vec!["sum"]);

    let fallback = registry.select(Path::new("README"), b"just words");
    assert_eq!(fallback.name(), "plain");
}
