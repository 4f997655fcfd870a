// Tests for database functionality

use bibcrawl_core::data::Database;
use bibcrawl_core::expand::{RecordRows, project};
use bibcrawl_core::sink::{ProgressReport, RecordSink, RunStatus};
use bibcrawl_core::{Counters, Variant};
use bibcrawl_source::record::{AuthorRef, Authorship, Concept, Topic};
use bibcrawl_source::{Institution, NodeId, Work};
use tempfile::TempDir;

fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();
    (temp_dir, db)
}

fn rows(id: &str, references: &[&str], authors: &[&str]) -> RecordRows {
    let work = Work {
        id: format!("https://openalex.org/{}", id),
        title: Some(format!("Work {}", id)),
        referenced_works: references.iter().map(|r| r.to_string()).collect(),
        related_works: vec!["W900".to_string()],
        authorships: authors
            .iter()
            .map(|a| Authorship {
                author: AuthorRef {
                    id: Some(a.to_string()),
                    display_name: Some(format!("Name {}", a)),
                    orcid: None,
                },
                countries: vec!["PT".to_string()],
                ..Authorship::default()
            })
            .collect(),
        concepts: vec![Concept {
            id: Some("C1".to_string()),
            display_name: Some("Graphs".to_string()),
            level: 1,
            score: 0.5,
            ..Concept::default()
        }],
        topics: vec![Topic {
            id: Some("T1".to_string()),
            display_name: Some("Networks".to_string()),
            score: 0.7,
        }],
        ..Work::default()
    };
    project(&NodeId::parse(id).unwrap(), &work)
}

// ============================================================================
// Database Creation Tests
// ============================================================================

#[test]
fn test_database_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let db = Database::new(&db_path);
    assert!(db.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_database_exists() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    assert!(!Database::exists(&db_path));

    let _db = Database::new(&db_path).unwrap();
    assert!(Database::exists(&db_path));
}

#[test]
fn test_reopen_keeps_data() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    {
        let mut db = Database::new(&db_path).unwrap();
        db.insert_records(&[rows("W1", &[], &[])]).unwrap();
    }

    let db = Database::new(&db_path).unwrap();
    assert_eq!(db.get_work_ids().unwrap(), vec!["W1"]);
}

// ============================================================================
// Run Tests
// ============================================================================

#[test]
fn test_create_run() {
    let (_temp_dir, db) = create_test_db();

    let run_id = db.create_run(Variant::Citation, "W1", false).unwrap();
    assert!(!run_id.is_empty());

    let runs = db.get_runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, "running");
    assert_eq!(runs[0].variant, "citation");
    assert!(runs[0].ended_at.is_none());
}

#[test]
fn test_finish_run_sets_end_time() {
    let (_temp_dir, mut db) = create_test_db();

    let run_id = db
        .begin_run(Variant::AuthorGraph, &NodeId::parse("A1").unwrap(), true)
        .unwrap();
    db.finish_run(&run_id, RunStatus::Interrupted).unwrap();

    let run = &db.get_runs().unwrap()[0];
    assert_eq!(run.status, "interrupted");
    assert!(run.ended_at.is_some());
    assert!(run.resumed);
}

// ============================================================================
// Record Tests
// ============================================================================

#[test]
fn test_insert_records_fills_every_table() {
    let (_temp_dir, mut db) = create_test_db();

    db.insert_records(&[rows("W1", &["W2", "W3"], &["A1", "A2"])])
        .unwrap();

    assert_eq!(db.count_rows("works").unwrap(), 1);
    assert_eq!(db.count_rows("authorships").unwrap(), 2);
    assert_eq!(db.count_rows("citations").unwrap(), 2);
    assert_eq!(db.count_rows("related_works").unwrap(), 1);
    assert_eq!(db.count_rows("concepts").unwrap(), 1);
    assert_eq!(db.count_rows("topics").unwrap(), 1);
    assert_eq!(db.count_rows("keywords").unwrap(), 0);
    assert_eq!(db.get_work_title("W1").unwrap().as_deref(), Some("Work W1"));
}

#[test]
fn test_insert_records_is_idempotent() {
    let (_temp_dir, mut db) = create_test_db();
    let batch = vec![
        rows("W1", &["W2"], &["A1"]),
        rows("W2", &["W3"], &["A1", "A2"]),
    ];

    db.insert_records(&batch).unwrap();
    db.insert_records(&batch).unwrap();
    db.write_records(&batch[..1]).unwrap();

    assert_eq!(db.count_rows("works").unwrap(), 2);
    assert_eq!(db.count_rows("authorships").unwrap(), 3);
    assert_eq!(
        db.get_citations().unwrap(),
        vec![
            ("W1".to_string(), "W2".to_string()),
            ("W2".to_string(), "W3".to_string())
        ]
    );
}

#[test]
fn test_get_authorships_skips_unknown_authors() {
    let (_temp_dir, mut db) = create_test_db();
    let mut record = rows("W1", &[], &["A1", "A2"]);
    record.authorships[1].author_id = None;
    db.insert_records(&[record]).unwrap();

    let entries = db.get_authorships().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].author_id, "A1");
    assert_eq!(entries[0].author_name.as_deref(), Some("Name A1"));
}

#[test]
fn test_missing_work_title() {
    let (_temp_dir, db) = create_test_db();
    assert_eq!(db.get_work_title("W404").unwrap(), None);
}

#[test]
fn test_count_rows_rejects_unknown_table() {
    let (_temp_dir, db) = create_test_db();
    assert!(db.count_rows("works; DROP TABLE works").is_err());
}

// ============================================================================
// Institution Tests
// ============================================================================

#[test]
fn test_insert_institutions() {
    let (_temp_dir, mut db) = create_test_db();
    let institutions = vec![
        Institution {
            id: "https://openalex.org/I2".to_string(),
            display_name: Some("Second".to_string()),
            ..Institution::default()
        },
        Institution {
            id: "https://openalex.org/I1".to_string(),
            country_code: Some("BR".to_string()),
            ..Institution::default()
        },
        Institution {
            id: String::new(),
            ..Institution::default()
        },
    ];

    db.insert_institutions(&institutions).unwrap();
    db.write_institutions(&institutions).unwrap();

    assert_eq!(db.get_institution_ids().unwrap(), vec!["I1", "I2"]);
}

// ============================================================================
// Progress Report Tests
// ============================================================================

#[test]
fn test_progress_reports() {
    let (_temp_dir, mut db) = create_test_db();
    let run_id = db.create_run(Variant::Citation, "W1", false).unwrap();

    assert!(db.get_last_progress().unwrap().is_none());

    for works in [10, 20] {
        db.append_progress(&ProgressReport {
            run_id: run_id.clone(),
            timestamp: chrono::Utc::now(),
            elapsed_secs: 1.5,
            counters: Counters {
                works,
                nodes: works / 2,
                ..Counters::default()
            },
        })
        .unwrap();
    }

    assert_eq!(db.count_rows("progress_reports").unwrap(), 2);
    let (_, works, nodes) = db.get_last_progress().unwrap().unwrap();
    assert_eq!(works, 20);
    assert_eq!(nodes, 10);
}

#[test]
fn test_progress_requires_known_run() {
    let (_temp_dir, db) = create_test_db();
    let report = ProgressReport {
        run_id: "no-such-run".to_string(),
        timestamp: chrono::Utc::now(),
        elapsed_secs: 0.0,
        counters: Counters::default(),
    };
    assert!(db.insert_progress(&report).is_err());
}

#[test]
fn test_in_memory_database() {
    let mut db = Database::open_in_memory().unwrap();
    db.insert_records(&[rows("W5", &[], &["A9"])]).unwrap();
    assert_eq!(db.get_work_ids().unwrap(), vec!["W5"]);
}
