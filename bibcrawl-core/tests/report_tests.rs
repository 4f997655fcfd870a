// Tests for co-authorship report generation

use bibcrawl_core::data::Database;
use bibcrawl_core::expand::project;
use bibcrawl_core::report::{
    ReportFormat, gather_coauthor_report, generate_json_report, generate_text_report, save_report,
};
use bibcrawl_source::record::{AuthorRef, Authorship};
use bibcrawl_source::{NodeId, Work};
use tempfile::TempDir;

fn add_work(db: &mut Database, id: &str, authors: &[(&str, &str)]) {
    let work = Work {
        id: id.to_string(),
        authorships: authors
            .iter()
            .map(|(author_id, name)| Authorship {
                author: AuthorRef {
                    id: Some(author_id.to_string()),
                    display_name: Some(name.to_string()),
                    orcid: None,
                },
                ..Authorship::default()
            })
            .collect(),
        ..Work::default()
    };
    db.insert_records(&[project(&NodeId::parse(id).unwrap(), &work)])
        .unwrap();
}

/// A1 works with A2 twice and with A3 once; A4 and A5 publish alone.
fn sample_db() -> Database {
    let mut db = Database::open_in_memory().unwrap();
    add_work(&mut db, "W1", &[("A1", "Ada"), ("A2", "Grace")]);
    add_work(&mut db, "W2", &[("A1", "Ada"), ("A2", "Grace"), ("A3", "Edsger")]);
    add_work(&mut db, "W3", &[("A4", "zed")]);
    add_work(&mut db, "W4", &[("A5", "Barbara")]);
    db
}

// ============================================================================
// Report Format Tests
// ============================================================================

#[test]
fn test_report_format_from_str() {
    assert_eq!(ReportFormat::from_str("text"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("TXT"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("json"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::from_str("html"), None);
}

// ============================================================================
// Gather Tests
// ============================================================================

#[test]
fn test_ranking_counts_distinct_coauthors() {
    let db = sample_db();
    let report = gather_coauthor_report(&db, None).unwrap();

    assert_eq!(report.total_works, 4);
    assert_eq!(report.total_authors, 5);

    let ranking: Vec<(&str, usize)> = report
        .ranking
        .iter()
        .map(|r| (r.author_id.as_str(), r.coauthors))
        .collect();
    assert_eq!(ranking, vec![("A1", 2), ("A2", 2), ("A3", 2)]);
    assert_eq!(report.ranking[0].rank, 1);
    assert_eq!(report.ranking[0].name, "Ada");
}

#[test]
fn test_solo_authors_sorted_by_name() {
    let db = sample_db();
    let report = gather_coauthor_report(&db, None).unwrap();

    let solo: Vec<&str> = report.solo_authors.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(solo, vec!["Barbara", "zed"]);
}

#[test]
fn test_top_limits_ranking() {
    let db = sample_db();
    let report = gather_coauthor_report(&db, Some(1)).unwrap();
    assert_eq!(report.ranking.len(), 1);
    assert_eq!(report.solo_authors.len(), 2);
}

#[test]
fn test_empty_database() {
    let db = Database::open_in_memory().unwrap();
    let report = gather_coauthor_report(&db, None).unwrap();
    assert_eq!(report.total_works, 0);
    assert!(report.ranking.is_empty());
    assert!(report.solo_authors.is_empty());
}

// ============================================================================
// Output Tests
// ============================================================================

#[test]
fn test_text_report_layout() {
    let db = sample_db();
    let text = generate_text_report(&gather_coauthor_report(&db, None).unwrap());

    assert!(text.contains("CO-AUTHORSHIP REPORT"));
    assert!(text.contains("Works:        4"));
    assert!(text.contains("AUTHORS WITHOUT CO-AUTHORS (2)"));
    assert!(text.contains("| A1"));
}

#[test]
fn test_text_report_truncates_long_names() {
    let mut db = Database::open_in_memory().unwrap();
    let long = "A".repeat(60);
    add_work(&mut db, "W1", &[("A1", long.as_str()), ("A2", "Short")]);

    let text = generate_text_report(&gather_coauthor_report(&db, None).unwrap());
    assert!(!text.contains(&long));
    assert!(text.contains(".."));
}

#[test]
fn test_json_report_structure() {
    let db = sample_db();
    let json = generate_json_report(&gather_coauthor_report(&db, None).unwrap()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["report"]["metadata"]["generator"], "bibcrawl");
    assert_eq!(value["report"]["summary"]["total_authors"], 5);
    assert_eq!(value["report"]["summary"]["solo_authors"], 2);
    assert_eq!(value["report"]["ranking"][0]["author_id"], "A1");
}

#[test]
fn test_save_report() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("coauthors.txt");
    save_report("hello", &path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
}
