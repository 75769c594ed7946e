//! Integration tests for token chains
//!
//! These tests cover chains as seen through syntax trees: lexed order,
//! token replacement and tree absorption.

use codeseam::engine::{
    java, CodedBuffer, Lexer, NodeId, Position, SyntaxTree, TextEncoding, TokenChain,
};

fn utf8(text: &str) -> CodedBuffer {
    CodedBuffer::decode(text.as_bytes(), TextEncoding::utf8())
}

fn lexed_tree(text: &str) -> (SyntaxTree, Vec<NodeId>) {
    let lexer = Lexer::new(java().matchers().to_vec());
    let tokens = lexer.lex(&utf8(text), Position::start());
    let mut tree = SyntaxTree::new("t.java");
    let ids = tree.add_lexed(&tokens);
    (tree, ids)
}

fn codes(tree: &SyntaxTree, ids: &[NodeId]) -> Vec<String> {
    ids.iter()
        .map(|&t| tree.token(t).unwrap().code.as_str().to_string())
        .collect()
}

// ============================================================================
// Tree Chain Tests
// ============================================================================

#[test]
fn test_lexed_tokens_form_one_chain() {
    let (tree, ids) = lexed_tree("a = b;");
    let chain = tree.chain();

    assert_eq!(chain.collect(ids[2]), ids);
    assert_eq!(chain.first(ids[4]), ids[0]);
    assert_eq!(chain.last(ids[0]), *ids.last().unwrap());
    assert_eq!(tree.next_token(ids[0]), Some(ids[1]));
    assert_eq!(tree.previous_token(ids[0]), None);
}

#[test]
fn test_replace_token_keeps_order() {
    let (mut tree, ids) = lexed_tree("a = b;");
    let root = tree.add_branch("root", ids.clone());
    tree.set_root(root);

    let new = tree.replace_token(ids[0], utf8("alpha")).unwrap();
    let order = tree.chain().collect(new);
    assert_eq!(codes(&tree, &order), vec!["alpha", " ", "=", " ", "b", ";"]);
    assert_eq!(tree.chain().first(ids[5]), new);
    assert!(!tree.chain().same_chain(ids[0], new));
    assert_eq!(tree.reconstruct_code(root), "alpha = b;");
    assert!(tree.is_modified());
}

#[test]
fn test_absorb_keeps_chains_apart() {
    let (mut left, left_ids) = lexed_tree("x;");
    let (right, _) = lexed_tree("y;");
    let shift = left.absorb(right);

    assert_eq!(shift, 2);
    assert_eq!(left.len(), 4);
    let order = left.chain().collect(left_ids[0]);
    assert_eq!(codes(&left, &order), vec!["x", ";"]);
    assert_eq!(left.chain().last(left_ids[0]), left_ids[1]);
}

// ============================================================================
// Splice Tests
// ============================================================================

#[test]
fn test_splices_across_many_chains() {
    let (_, ids) = lexed_tree("a b c d e f g h");
    let mut chain = TokenChain::new();
    for &id in &ids {
        chain.register(id);
    }

    // build the reverse order by prepending each token in turn
    for pair in ids.windows(2) {
        chain.insert_before(pair[0], pair[1]);
    }
    let reversed: Vec<NodeId> = ids.iter().rev().copied().collect();
    assert_eq!(chain.collect(ids[0]), reversed);
    for &id in &ids {
        assert_eq!(chain.first(id), *ids.last().unwrap());
        assert_eq!(chain.last(id), ids[0]);
    }

    // take the middle token out and put it back at the end
    let middle = ids[7];
    chain.remove(middle);
    chain.append(ids[0], middle);
    assert_eq!(chain.last(ids[3]), middle);
    assert_eq!(chain.collect(middle).len(), ids.len());
}
