// Tests for checkpoint persistence

use bibcrawl_core::checkpoint::CHECKPOINT_FORMAT_VERSION;
use bibcrawl_core::state::Pending;
use bibcrawl_core::{Checkpoint, CheckpointError, CheckpointStore, TraversalState, Variant};
use bibcrawl_source::NodeId;
use tempfile::TempDir;

fn id(s: &str) -> NodeId {
    NodeId::parse(s).unwrap()
}

fn create_store() -> (TempDir, CheckpointStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(temp_dir.path().join("checkpoint.json"));
    (temp_dir, store)
}

fn sample_state() -> TraversalState {
    let mut state = TraversalState::new();
    state.frontier.extend([id("W9"), id("W3"), id("W7"), id("W3")]);
    state.visited.extend([id("W1"), id("W2")]);
    state.processed.insert(id("A1"));
    state.records.extend([id("W1"), id("W2")]);
    state.institutions.insert(id("I5"));
    state.retry.push_back(Pending {
        id: id("W4"),
        attempts: 2,
    });
    state.dropped.push(id("W8"));
    state.counters.works = 2;
    state.counters.citations = 11;
    state.counters.nodes = 3;
    state.counters.dropped = 1;
    state
}

// ============================================================================
// Round Trip Tests
// ============================================================================

#[test]
fn test_round_trip_preserves_state() {
    let (_temp_dir, store) = create_store();
    let checkpoint = Checkpoint::new(Variant::Citation, id("W1"), sample_state());

    store.save(&checkpoint).unwrap();
    let loaded = store.load().unwrap().unwrap();

    assert_eq!(loaded, checkpoint);
    let frontier: Vec<&str> = loaded.state.frontier.iter().map(NodeId::as_str).collect();
    assert_eq!(frontier, vec!["W9", "W3", "W7", "W3"]);
    assert_eq!(loaded.state.retry[0].attempts, 2);
}

#[test]
fn test_save_overwrites_previous() {
    let (_temp_dir, store) = create_store();
    let mut state = sample_state();
    store
        .save(&Checkpoint::new(Variant::Author, id("A1"), state.clone()))
        .unwrap();

    state.frontier.clear();
    state.counters.works = 40;
    store
        .save(&Checkpoint::new(Variant::Author, id("A1"), state))
        .unwrap();

    let loaded = store.load().unwrap().unwrap();
    assert!(loaded.state.frontier.is_empty());
    assert_eq!(loaded.state.counters.works, 40);
}

#[test]
fn test_save_leaves_no_temp_file() {
    let (temp_dir, store) = create_store();
    store
        .save(&Checkpoint::new(Variant::Citation, id("W1"), sample_state()))
        .unwrap();

    let names: Vec<String> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["checkpoint.json"]);
}

#[test]
fn test_save_creates_parent_directory() {
    let temp_dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(temp_dir.path().join("W1_citations").join("checkpoint.json"));
    store
        .save(&Checkpoint::new(Variant::Citation, id("W1"), TraversalState::new()))
        .unwrap();
    assert!(store.exists());
}

// ============================================================================
// Load Failure Tests
// ============================================================================

#[test]
fn test_absent_checkpoint_is_none() {
    let (_temp_dir, store) = create_store();
    assert!(!store.exists());
    assert!(store.load().unwrap().is_none());
}

#[test]
fn test_corrupt_checkpoint_is_error() {
    let (_temp_dir, store) = create_store();
    std::fs::write(store.path(), b"{\"format_version\": 1, \"state\": [").unwrap();

    let err = store.load().unwrap_err();
    assert!(matches!(err, CheckpointError::Corrupt { .. }));
}

#[test]
fn test_missing_fields_are_corrupt() {
    let (_temp_dir, store) = create_store();
    std::fs::write(store.path(), b"{\"format_version\": 1}").unwrap();

    assert!(matches!(
        store.load().unwrap_err(),
        CheckpointError::Corrupt { .. }
    ));
}

#[test]
fn test_unknown_version_is_error() {
    let (_temp_dir, store) = create_store();
    std::fs::write(
        store.path(),
        format!(
            "{{\"format_version\": {}, \"whatever\": true}}",
            CHECKPOINT_FORMAT_VERSION + 1
        ),
    )
    .unwrap();

    match store.load().unwrap_err() {
        CheckpointError::UnsupportedVersion { found, expected } => {
            assert_eq!(found, CHECKPOINT_FORMAT_VERSION + 1);
            assert_eq!(expected, CHECKPOINT_FORMAT_VERSION);
        }
        other => panic!("unexpected error: {}", other),
    }
}

// ============================================================================
// Identity Tests
// ============================================================================

#[test]
fn test_ensure_matches() {
    let checkpoint = Checkpoint::new(Variant::AuthorGraph, id("A1"), TraversalState::new());

    assert!(checkpoint.ensure_matches(Variant::AuthorGraph, &id("A1")).is_ok());
    assert!(matches!(
        checkpoint.ensure_matches(Variant::Author, &id("A1")),
        Err(CheckpointError::VariantMismatch { .. })
    ));
    assert!(matches!(
        checkpoint.ensure_matches(Variant::AuthorGraph, &id("A2")),
        Err(CheckpointError::SeedMismatch { .. })
    ));
}

#[test]
fn test_remove() {
    let (_temp_dir, store) = create_store();
    store
        .save(&Checkpoint::new(Variant::Citation, id("W1"), TraversalState::new()))
        .unwrap();
    store.remove().unwrap();
    assert!(!store.exists());
    store.remove().unwrap();
}

// ============================================================================
// Error Message Tests
// ============================================================================

#[test]
fn test_encode_error_is_not_reported_as_corruption() {
    let source = serde_json::from_str::<u32>("not a number").unwrap_err();
    let err = CheckpointError::Encode {
        path: "run/checkpoint.json".into(),
        source,
    };

    let message = err.to_string();
    assert!(message.starts_with("Failed to encode checkpoint for run/checkpoint.json"));
    assert!(!message.contains("corrupt"));
}
