// Graph expansion: project a fetched work into storage rows and neighbor IDs

use bibcrawl_source::{NodeId, Work};
use serde::{Deserialize, Serialize};

/// Flat projection of a work, one row in `works`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkRow {
    pub id: NodeId,
    pub title: Option<String>,
    pub abstract_text: String,
    pub doi: Option<String>,
    pub publication_date: Option<String>,
    pub publication_year: Option<i32>,
    pub cited_by_count: u64,
    pub language: Option<String>,
    pub work_type: Option<String>,
    pub fwci: f64,
    pub is_open_access: bool,
    pub has_fulltext: bool,
    pub is_retracted: bool,
    pub is_paratext: bool,
    pub locations_count: u64,
    pub countries_distinct_count: u64,
    pub institutions_distinct_count: u64,
    pub referenced_works_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorshipRow {
    pub work_id: NodeId,
    /// Index in the work's authorship list.
    pub position: u32,
    pub author_id: Option<NodeId>,
    pub author_name: Option<String>,
    pub author_position: Option<String>,
    pub is_corresponding: bool,
    pub countries: Vec<String>,
    pub institution_ids: Vec<NodeId>,
}

/// A directed work-to-work edge (citation or related work).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub work_id: NodeId,
    pub target_id: NodeId,
}

/// Concept, topic or keyword attached to a work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRow {
    pub work_id: NodeId,
    pub tag_id: String,
    pub name: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptRow {
    pub tag: TagRow,
    pub wikidata: Option<String>,
    pub level: u32,
}

/// Everything the persistence writer receives for one newly seen work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRows {
    pub work: WorkRow,
    pub authorships: Vec<AuthorshipRow>,
    pub citations: Vec<EdgeRow>,
    pub related_works: Vec<EdgeRow>,
    pub concepts: Vec<ConceptRow>,
    pub topics: Vec<TagRow>,
    pub keywords: Vec<TagRow>,
}

/// Result of expanding one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub rows: RecordRows,
    /// Candidate frontier entries, in discovery order. The engine decides which get enqueued.
    pub neighbors: Vec<NodeId>,
    /// Institution IDs gathered for the post-traversal backfill.
    pub institutions: Vec<NodeId>,
}

/// Per-variant rule mapping a record to rows and neighbor IDs.
///
/// Pure projection: no I/O, and missing optional fields yield empty rows rather than errors.
pub trait Expander: Send + Sync {
    fn expand(&self, id: &NodeId, work: &Work) -> Expansion;
}

/// Citation graph: neighbors are the works this work references.
#[derive(Debug, Clone, Copy, Default)]
pub struct CitationExpander;

impl Expander for CitationExpander {
    fn expand(&self, id: &NodeId, work: &Work) -> Expansion {
        let rows = project(id, work);
        let neighbors = rows.citations.iter().map(|e| e.target_id.clone()).collect();
        Expansion {
            rows,
            neighbors,
            institutions: Vec::new(),
        }
    }
}

/// Co-author discovery: neighbors are the authors of every authorship.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoauthorExpander {
    pub collect_institutions: bool,
}

impl Expander for CoauthorExpander {
    fn expand(&self, id: &NodeId, work: &Work) -> Expansion {
        let rows = project(id, work);

        let mut neighbors = Vec::new();
        let mut institutions = Vec::new();
        for authorship in &rows.authorships {
            if let Some(author_id) = &authorship.author_id
                && !neighbors.contains(author_id)
            {
                neighbors.push(author_id.clone());
            }
            if self.collect_institutions {
                for institution in &authorship.institution_ids {
                    if !institutions.contains(institution) {
                        institutions.push(institution.clone());
                    }
                }
            }
        }

        Expansion {
            rows,
            neighbors,
            institutions,
        }
    }
}

fn edges(work_id: &NodeId, raw: &[String]) -> Vec<EdgeRow> {
    bibcrawl_source::id::normalize_all(raw.iter().map(String::as_str))
        .into_iter()
        .map(|target_id| EdgeRow {
            work_id: work_id.clone(),
            target_id,
        })
        .collect()
}

/// Concepts and topics carry entity IDs (`C41008148`, `T10064`).
fn entity_tag_id(raw: &Option<String>) -> Option<String> {
    NodeId::parse(raw.as_deref()?).map(|id| id.to_string())
}

/// Keyword IDs are lower-case slugs (`keywords/graph-theory`), kept as written.
fn keyword_slug(raw: &Option<String>) -> Option<String> {
    let slug = raw.as_deref()?.trim().trim_end_matches('/').rsplit('/').next()?.trim();
    (!slug.is_empty()).then(|| slug.to_string())
}

fn tag(work_id: &NodeId, tag_id: Option<String>, name: &Option<String>, score: f64) -> Option<TagRow> {
    Some(TagRow {
        work_id: work_id.clone(),
        tag_id: tag_id?,
        name: name.clone(),
        score,
    })
}

/// Project every sub-entity of `work`. Tags without an ID are skipped since they cannot
/// be keyed in storage.
pub fn project(id: &NodeId, work: &Work) -> RecordRows {
    let row = WorkRow {
        id: id.clone(),
        title: work.title().map(str::to_string),
        abstract_text: work.abstract_text(),
        doi: work.doi.clone(),
        publication_date: work.publication_date.clone(),
        publication_year: work.publication_year,
        cited_by_count: work.cited_by_count,
        language: work.language.clone(),
        work_type: work.work_type.clone(),
        fwci: work.fwci.unwrap_or(0.0),
        is_open_access: work.open_access.is_oa,
        has_fulltext: work.has_fulltext,
        is_retracted: work.is_retracted,
        is_paratext: work.is_paratext,
        locations_count: work.locations_count,
        countries_distinct_count: work.countries_distinct_count,
        institutions_distinct_count: work.institutions_distinct_count,
        referenced_works_count: work.referenced_works_count,
    };

    let authorships = work
        .authorships
        .iter()
        .enumerate()
        .map(|(position, authorship)| AuthorshipRow {
            work_id: id.clone(),
            position: position as u32,
            author_id: authorship.author.id.as_deref().and_then(NodeId::parse),
            author_name: authorship.author.display_name.clone(),
            author_position: authorship.author_position.clone(),
            is_corresponding: authorship.is_corresponding,
            countries: authorship.countries.clone(),
            institution_ids: bibcrawl_source::id::normalize_all(
                authorship
                    .institutions
                    .iter()
                    .filter_map(|i| i.id.as_deref()),
            ),
        })
        .collect();

    let concepts = work
        .concepts
        .iter()
        .filter_map(|c| {
            Some(ConceptRow {
                tag: tag(id, entity_tag_id(&c.id), &c.display_name, c.score)?,
                wikidata: c.wikidata.clone(),
                level: c.level,
            })
        })
        .collect();

    let topics = work
        .topics
        .iter()
        .filter_map(|t| tag(id, entity_tag_id(&t.id), &t.display_name, t.score))
        .collect();

    let keywords = work
        .keywords
        .iter()
        .filter_map(|k| tag(id, keyword_slug(&k.id), &k.display_name, k.score))
        .collect();

    RecordRows {
        work: row,
        authorships,
        citations: edges(id, &work.referenced_works),
        related_works: edges(id, &work.related_works),
        concepts,
        topics,
        keywords,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibcrawl_source::record::{AuthorRef, Authorship, Concept, InstitutionRef, Keyword, Topic};

    fn author(id: Option<&str>, institutions: &[&str]) -> Authorship {
        Authorship {
            author: AuthorRef {
                id: id.map(str::to_string),
                display_name: id.map(|s| format!("Name {}", s)),
                orcid: None,
            },
            author_position: Some("middle".to_string()),
            is_corresponding: false,
            countries: vec!["BR".to_string()],
            institutions: institutions
                .iter()
                .map(|i| InstitutionRef {
                    id: Some(i.to_string()),
                    ..InstitutionRef::default()
                })
                .collect(),
        }
    }

    fn sample_work() -> Work {
        Work {
            id: "https://openalex.org/W1".to_string(),
            title: Some("Graphs".to_string()),
            referenced_works: vec![
                "https://openalex.org/W2".to_string(),
                "https://openalex.org/W3".to_string(),
                "https://openalex.org/W2".to_string(),
            ],
            related_works: vec!["https://openalex.org/W9".to_string()],
            authorships: vec![
                author(Some("https://openalex.org/A1"), &["https://openalex.org/I1"]),
                author(Some("https://openalex.org/A2"), &["https://openalex.org/I1", "https://openalex.org/I2"]),
                author(None, &[]),
                author(Some("https://openalex.org/A1"), &[]),
            ],
            concepts: vec![
                Concept {
                    id: Some("https://openalex.org/C41008148".to_string()),
                    display_name: Some("Computer science".to_string()),
                    wikidata: Some("https://www.wikidata.org/wiki/Q21198".to_string()),
                    level: 0,
                    score: 0.8,
                },
                Concept::default(),
            ],
            topics: vec![Topic {
                id: Some("https://openalex.org/T10".to_string()),
                display_name: Some("Networks".to_string()),
                score: 0.9,
            }],
            keywords: vec![Keyword {
                id: Some("https://openalex.org/keywords/graph-theory".to_string()),
                display_name: Some("Graph theory".to_string()),
                score: 0.5,
            }],
            ..Work::default()
        }
    }

    fn w1() -> NodeId {
        NodeId::parse("W1").unwrap()
    }

    #[test]
    fn test_citation_neighbors_are_references() {
        let expansion = CitationExpander.expand(&w1(), &sample_work());
        let neighbors: Vec<&str> = expansion.neighbors.iter().map(NodeId::as_str).collect();
        assert_eq!(neighbors, vec!["W2", "W3"]);
        assert!(expansion.institutions.is_empty());
    }

    #[test]
    fn test_coauthor_neighbors_are_unique_authors() {
        let expansion = CoauthorExpander::default().expand(&w1(), &sample_work());
        let neighbors: Vec<&str> = expansion.neighbors.iter().map(NodeId::as_str).collect();
        assert_eq!(neighbors, vec!["A1", "A2"]);
        assert!(expansion.institutions.is_empty());
    }

    #[test]
    fn test_author_graph_collects_institutions() {
        let expander = CoauthorExpander {
            collect_institutions: true,
        };
        let expansion = expander.expand(&w1(), &sample_work());
        let institutions: Vec<&str> = expansion.institutions.iter().map(NodeId::as_str).collect();
        assert_eq!(institutions, vec!["I1", "I2"]);
    }

    #[test]
    fn test_projection_counts() {
        let rows = project(&w1(), &sample_work());
        assert_eq!(rows.authorships.len(), 4);
        assert_eq!(rows.authorships[2].author_id, None);
        assert_eq!(rows.authorships[3].position, 3);
        assert_eq!(rows.citations.len(), 2);
        assert_eq!(rows.related_works.len(), 1);
        assert_eq!(rows.concepts.len(), 1, "concept without id is skipped");
        assert_eq!(rows.concepts[0].tag.tag_id, "C41008148");
        assert_eq!(rows.topics.len(), 1);
        assert_eq!(rows.keywords[0].tag_id, "graph-theory");
    }

    #[test]
    fn test_keyword_slugs_keep_their_case() {
        let work = Work {
            id: "W1".to_string(),
            keywords: vec![
                Keyword {
                    id: Some("https://openalex.org/keywords/small-world".to_string()),
                    ..Keyword::default()
                },
                Keyword {
                    id: Some("keywords/bibliometrics/".to_string()),
                    ..Keyword::default()
                },
                Keyword {
                    id: Some("  ".to_string()),
                    ..Keyword::default()
                },
            ],
            topics: vec![Topic {
                id: Some("https://openalex.org/t10064".to_string()),
                display_name: None,
                score: 0.1,
            }],
            ..Work::default()
        };
        let rows = project(&w1(), &work);

        let slugs: Vec<&str> = rows.keywords.iter().map(|k| k.tag_id.as_str()).collect();
        assert_eq!(slugs, vec!["small-world", "bibliometrics"]);
        assert_eq!(rows.topics[0].tag_id, "T10064");
    }

    #[test]
    fn test_empty_work_projects_to_empty_rows() {
        let work = Work {
            id: "W5".to_string(),
            ..Work::default()
        };
        let id = NodeId::parse("W5").unwrap();
        let expansion = CitationExpander.expand(&id, &work);
        assert!(expansion.neighbors.is_empty());
        assert!(expansion.rows.authorships.is_empty());
        assert_eq!(expansion.rows.work.fwci, 0.0);
        assert_eq!(expansion.rows.work.title, None);
    }
}
