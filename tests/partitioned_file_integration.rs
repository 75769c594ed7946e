//! Integration tests for partitioned files
//!
//! These tests cover lazy partitioning, boundary merges, commit, rollback,
//! charset detection and handle lifetime against real files.

use codeseam::engine::{
    plain_text, Area, CharsetDetector, CodedBuffer, FileConfig, LanguageRegistry, Parser,
    ParserConfig, Partition, PartitionAtArea, PartitionParser, PartitionedFile, TextEncoding,
};
use encoding_rs::{Encoding, UTF_8};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn plain_file(path: &Path) -> PartitionedFile<PartitionParser> {
    let parser = Arc::new(Parser::new(Arc::new(plain_text())));
    PartitionedFile::open(path, PartitionParser::new(parser, path)).unwrap()
}

fn write(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn areas(file: &PartitionedFile<PartitionParser>) -> Vec<Area> {
    file.partitions().map(|(area, _)| area).collect()
}

// ============================================================================
// Partitioning Tests
// ============================================================================

#[test]
fn test_adjacent_requests_merge() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "f.txt", b"first half|secondhlf");
    let mut file = plain_file(&path);

    let PartitionAtArea { area, partition } = file.partition_for(0, 10).unwrap();
    assert_eq!(area, Area::new(0, 10));
    assert_eq!(partition.code(), "first half");

    // a request touching an existing partition absorbs it
    let PartitionAtArea { area, partition } = file.partition_for(10, 10).unwrap();
    assert_eq!(area, Area::new(0, 20));
    assert_eq!(partition.code(), "first half|secondhlf");

    let PartitionAtArea { area, .. } = file.partition_for(0, 20).unwrap();
    assert_eq!(area, Area::new(0, 20));
    assert_eq!(file.partition_count(), 1);
}

#[test]
fn test_boundary_token_is_relexed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "f.txt", b"alpha beta gamma");
    let mut file = plain_file(&path);

    file.partition_for(0, 8).unwrap();
    file.partition_for(9, 7).unwrap();
    assert_eq!(areas(&file), vec![Area::new(0, 8), Area::new(9, 7)]);

    let PartitionAtArea { partition, .. } = file.partition_for(0, 16).unwrap();
    let tree = partition.tree();
    let root = tree.root().unwrap();
    let words: Vec<String> = tree
        .collect_tokens(root)
        .into_iter()
        .filter_map(|t| tree.token(t))
        .filter(|t| t.kind == "T_CONTEXT")
        .map(|t| t.code.as_str().to_string())
        .collect();
    assert_eq!(words, vec!["alpha", "beta", "gamma"]);

    let beta = tree.find_at_offset(7).unwrap();
    assert_eq!(tree.token(beta).unwrap().position.offset, 6);
}

#[test]
fn test_missing_file_reads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("new.txt");
    let mut file = plain_file(&path);

    assert_eq!(file.len().unwrap(), 0);
    let PartitionAtArea { area, partition } = file.partition_for(0, 10).unwrap();
    assert_eq!(area, Area::new(0, 0));
    assert_eq!(partition.code(), "");
}

// ============================================================================
// Commit and Rollback Tests
// ============================================================================

fn edit_word(file: &mut PartitionedFile<PartitionParser>, offset: u64, length: u64, text: &str) {
    let PartitionAtArea { partition, .. } = file.partition_for(offset, length).unwrap();
    let tree = partition.tree_mut();
    let token = tree.find_at_offset(offset).unwrap();
    tree.replace_token(token, CodedBuffer::decode(text.as_bytes(), TextEncoding::utf8()))
        .unwrap();
}

#[test]
fn test_commit_shifts_later_partitions() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "f.txt", b"abc def ghi");
    let mut file = plain_file(&path);

    file.partition_for(8, 3).unwrap();
    edit_word(&mut file, 0, 3, "abcdef");
    assert!(file.is_modified());

    file.commit().unwrap();
    assert!(!file.is_modified());
    assert_eq!(fs::read(&path).unwrap(), b"abcdef def ghi");
    assert_eq!(areas(&file), vec![Area::new(0, 6), Area::new(11, 3)]);

    let (_, last) = file.partitions().last().unwrap();
    assert_eq!(last.code(), "ghi");
    let tree = last.tree();
    let ghi = tree.first_token(tree.root().unwrap()).unwrap();
    assert_eq!(tree.token(ghi).unwrap().position.offset, 11);
}

#[test]
fn test_commit_shrinks_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "f.txt", b"longword x");
    let mut file = plain_file(&path);

    edit_word(&mut file, 0, 8, "w");
    file.commit().unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"w x");
    assert_eq!(file.len().unwrap(), 3);
}

#[test]
fn test_rollback_discards_edits() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "f.txt", b"keep this");
    let mut file = plain_file(&path);

    edit_word(&mut file, 0, 4, "lose");
    assert!(file.is_modified());

    file.rollback().unwrap();
    assert!(!file.is_modified());
    let (_, partition) = file.partitions().next().unwrap();
    assert_eq!(partition.code(), "keep");
    assert_eq!(fs::read(&path).unwrap(), b"keep this");
}

// ============================================================================
// Charset Tests
// ============================================================================

struct Counting {
    calls: Arc<AtomicUsize>,
}

impl CharsetDetector for Counting {
    fn detect(&mut self, _sample: &[u8]) -> Option<&'static Encoding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(UTF_8)
    }
}

#[test]
fn test_detection_runs_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "f.txt", b"one two three four");
    let calls = Arc::new(AtomicUsize::new(0));
    let mut file = plain_file(&path).with_detector(Counting {
        calls: Arc::clone(&calls),
    });

    file.partition_for(0, 3).unwrap();
    file.partition_for(8, 5).unwrap();
    file.partition_for(0, 18).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(file.charset(), Some(TextEncoding::utf8()));
}

#[test]
fn test_legacy_charset_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    // "café crème" in windows-1252
    let bytes = b"caf\xe9 cr\xe8me".to_vec();
    let path = write(&dir, "f.txt", &bytes);
    let mut file = plain_file(&path);

    let PartitionAtArea { partition, .. } = file.partition_for(0, bytes.len() as u64).unwrap();
    assert_eq!(partition.current_content(), bytes);
    let charset = file.charset().unwrap();
    assert_ne!(charset, TextEncoding::utf8());
    assert!(!charset.is_binary());

    // only the edited token changes, the rest keeps its original bytes
    edit_word(&mut file, 0, 5, "cafe");
    file.commit().unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"cafe cr\xe8me");
}

#[test]
fn test_nul_bytes_pin_binary() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = b"\x7fELF\x02\x01\x01\0\0\0\0\0code".to_vec();
    let path = write(&dir, "blob", &bytes);
    let mut file = plain_file(&path);

    let PartitionAtArea { partition, .. } = file.partition_for(0, bytes.len() as u64).unwrap();
    assert_eq!(partition.current_content(), bytes);
    assert_eq!(file.charset(), Some(TextEncoding::Binary));
}

// ============================================================================
// Handle and Language Tests
// ============================================================================

#[test]
fn test_idle_handle_closes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "f.txt", b"idle");
    let parser = Arc::new(Parser::new(Arc::new(plain_text())));
    let config = FileConfig::new().with_idle_close(Duration::from_millis(20));
    let mut file =
        PartitionedFile::open_with(&path, PartitionParser::new(parser, &path), config).unwrap();

    file.partition_for(0, 4).unwrap();
    thread::sleep(Duration::from_millis(300));
    assert!(!file.is_handle_open());

    // reopened on demand
    assert_eq!(file.partition_for(0, 4).unwrap().partition.code(), "idle");
}

#[test]
fn test_open_source_picks_language() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "tool", b"#!/usr/bin/env python3\nimport os\n");
    let mut file = PartitionedFile::open_source(
        &path,
        &LanguageRegistry::with_builtin(),
        ParserConfig::default(),
        FileConfig::default(),
    )
    .unwrap();

    assert_eq!(file.factory().parser().language().name(), "python");
    let PartitionAtArea { partition, .. } = file.partition_for(0, 100).unwrap();
    let tree = partition.tree();
    let root = tree.root().unwrap();
    let keys: Vec<&str> = tree.children(root).iter().map(|&n| tree.node(n).key()).collect();
    assert!(keys.contains(&"import"));
}
