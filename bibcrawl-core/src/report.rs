// Co-authorship report generation from a crawl database

use crate::data::Database;
use rusqlite::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAuthor {
    pub rank: usize,
    pub author_id: String,
    pub name: String,
    pub coauthors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoloAuthor {
    pub author_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoauthorReport {
    pub total_works: i64,
    pub total_authors: usize,
    /// Authors with at least one co-author, most connected first.
    pub ranking: Vec<RankedAuthor>,
    /// Authors who never shared a work, sorted by name.
    pub solo_authors: Vec<SoloAuthor>,
}

const UNKNOWN_NAME: &str = "Unknown";

/// Count distinct co-authors per author. Collaborating on several works counts once.
pub fn gather_coauthor_report(db: &Database, top: Option<usize>) -> Result<CoauthorReport> {
    let entries = db.get_authorships()?;
    let total_works = db.count_rows("works")?;

    let mut works: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut names: BTreeMap<&str, &str> = BTreeMap::new();
    for entry in &entries {
        works
            .entry(entry.work_id.as_str())
            .or_default()
            .insert(entry.author_id.as_str());
        if let Some(name) = entry.author_name.as_deref() {
            names.entry(entry.author_id.as_str()).or_insert(name);
        }
    }

    let mut coauthors: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut all_authors: BTreeSet<&str> = BTreeSet::new();
    for authors in works.values() {
        all_authors.extend(authors.iter().copied());
        if authors.len() < 2 {
            continue;
        }
        for a in authors {
            let set = coauthors.entry(*a).or_default();
            set.extend(authors.iter().copied().filter(|b| b != a));
        }
    }

    let name_of = |id: &str| names.get(id).copied().unwrap_or(UNKNOWN_NAME).to_string();

    let mut ranked: Vec<(&str, usize)> = coauthors.iter().map(|(id, set)| (*id, set.len())).collect();
    // Ties keep id order, which BTreeMap iteration already provides
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    if let Some(top) = top {
        ranked.truncate(top);
    }

    let ranking = ranked
        .into_iter()
        .enumerate()
        .map(|(idx, (id, count))| RankedAuthor {
            rank: idx + 1,
            author_id: id.to_string(),
            name: name_of(id),
            coauthors: count,
        })
        .collect();

    let mut solo_authors: Vec<SoloAuthor> = all_authors
        .iter()
        .filter(|id| !coauthors.contains_key(*id))
        .map(|id| SoloAuthor {
            author_id: id.to_string(),
            name: name_of(*id),
        })
        .collect();
    solo_authors.sort_by_key(|a| a.name.to_lowercase());

    Ok(CoauthorReport {
        total_works,
        total_authors: all_authors.len(),
        ranking,
        solo_authors,
    })
}

fn truncate_name(name: &str, width: usize) -> String {
    if name.chars().count() > width {
        let cut: String = name.chars().take(width.saturating_sub(2)).collect();
        format!("{}..", cut)
    } else {
        name.to_string()
    }
}

pub fn generate_text_report(data: &CoauthorReport) -> String {
    let rule = "━".repeat(80);
    let mut report = String::new();

    report.push_str(&format!("{}\n", rule));
    report.push_str("                         BIBCRAWL CO-AUTHORSHIP REPORT\n");
    report.push_str(&format!("{}\n\n", rule));

    report.push_str(&format!("Works:        {}\n", data.total_works));
    report.push_str(&format!("Authors:      {}\n", data.total_authors));
    report.push_str(&format!("Connected:    {}\n", data.ranking.len()));
    report.push_str(&format!("Solo:         {}\n\n", data.solo_authors.len()));

    if !data.ranking.is_empty() {
        report.push_str(&format!("{}\n", rule));
        report.push_str(&format!(
            "{:<5} | {:<10} | {:<40} | {}\n",
            "RANK", "COAUTHORS", "AUTHOR", "OPENALEX ID"
        ));
        report.push_str(&format!("{}\n", rule));
        for author in &data.ranking {
            report.push_str(&format!(
                "{:<5} | {:<10} | {:<40} | {}\n",
                author.rank,
                author.coauthors,
                truncate_name(&author.name, 39),
                author.author_id
            ));
        }
        report.push('\n');
    }

    if !data.solo_authors.is_empty() {
        report.push_str(&format!("{}\n", rule));
        report.push_str(&format!(
            "AUTHORS WITHOUT CO-AUTHORS ({})\n",
            data.solo_authors.len()
        ));
        report.push_str(&format!("{}\n", rule));
        for author in &data.solo_authors {
            report.push_str(&format!(
                "{:<50} | {}\n",
                truncate_name(&author.name, 49),
                author.author_id
            ));
        }
        report.push('\n');
    }

    report
}

pub fn generate_json_report(data: &CoauthorReport) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "bibcrawl",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
            },
            "summary": {
                "total_works": data.total_works,
                "total_authors": data.total_authors,
                "connected_authors": data.ranking.len(),
                "solo_authors": data.solo_authors.len(),
            },
            "ranking": data.ranking,
            "solo_authors": data.solo_authors,
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
