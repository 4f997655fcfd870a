use crate::id::NodeId;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Treat an explicit JSON `null` the same as a missing field.
///
/// OpenAlex returns `null` for many list and flag fields; `#[serde(default)]` alone
/// only covers the absent case.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One page of an OpenAlex list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default, deserialize_with = "nullable")]
    pub results: Vec<T>,
    #[serde(default)]
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    #[serde(default, deserialize_with = "nullable")]
    pub count: u64,
    #[serde(default)]
    pub per_page: Option<u64>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// A scholarly work as returned by `/works`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Work {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub publication_year: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub cited_by_count: u64,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, rename = "type")]
    pub work_type: Option<String>,
    #[serde(default)]
    pub fwci: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub open_access: OpenAccess,
    #[serde(default, deserialize_with = "nullable")]
    pub has_fulltext: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub is_retracted: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub is_paratext: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub locations_count: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub countries_distinct_count: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub institutions_distinct_count: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub referenced_works_count: u64,
    #[serde(default)]
    pub abstract_inverted_index: Option<BTreeMap<String, Vec<usize>>>,
    #[serde(default, deserialize_with = "nullable")]
    pub authorships: Vec<Authorship>,
    #[serde(default, deserialize_with = "nullable")]
    pub referenced_works: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub related_works: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub concepts: Vec<Concept>,
    #[serde(default, deserialize_with = "nullable")]
    pub topics: Vec<Topic>,
    #[serde(default, deserialize_with = "nullable")]
    pub keywords: Vec<Keyword>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenAccess {
    #[serde(default, deserialize_with = "nullable")]
    pub is_oa: bool,
    #[serde(default)]
    pub oa_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Authorship {
    #[serde(default, deserialize_with = "nullable")]
    pub author: AuthorRef,
    #[serde(default)]
    pub author_position: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub is_corresponding: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub countries: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub institutions: Vec<InstitutionRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub orcid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstitutionRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub wikidata: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub level: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub score: f64,
}

/// Author entity from `/authors`, only used to validate author seeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub orcid: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub works_count: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub cited_by_count: u64,
}

/// Institution entity from `/institutions`, resolved after an author-graph traversal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub ror: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default, rename = "type")]
    pub institution_type: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub works_count: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub cited_by_count: u64,
    #[serde(default)]
    pub homepage_url: Option<String>,
}

/// Records that carry an OpenAlex identifier.
pub trait Identified {
    fn raw_id(&self) -> &str;

    fn node_id(&self) -> Option<NodeId> {
        NodeId::parse(self.raw_id())
    }
}

impl Identified for Work {
    fn raw_id(&self) -> &str {
        &self.id
    }
}

impl Identified for Author {
    fn raw_id(&self) -> &str {
        &self.id
    }
}

impl Identified for Institution {
    fn raw_id(&self) -> &str {
        &self.id
    }
}

impl Work {
    /// Title, falling back to the display name.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().or(self.display_name.as_deref())
    }

    /// Rebuild the plain-text abstract from OpenAlex's inverted index.
    pub fn abstract_text(&self) -> String {
        let Some(index) = &self.abstract_inverted_index else {
            return String::new();
        };

        let mut words: Vec<(usize, &str)> = index
            .iter()
            .flat_map(|(word, positions)| positions.iter().map(move |pos| (*pos, word.as_str())))
            .collect();
        words.sort();

        words
            .into_iter()
            .map(|(_, word)| word)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nulls_default_to_empty() {
        let json = r#"{
            "id": "https://openalex.org/W1",
            "title": null,
            "authorships": null,
            "referenced_works": null,
            "concepts": null,
            "open_access": null,
            "cited_by_count": null,
            "is_retracted": null
        }"#;
        let work: Work = serde_json::from_str(json).unwrap();
        assert!(work.authorships.is_empty());
        assert!(work.referenced_works.is_empty());
        assert!(work.concepts.is_empty());
        assert!(!work.open_access.is_oa);
        assert_eq!(work.cited_by_count, 0);
        assert!(!work.is_retracted);
        assert!(work.title().is_none());
    }

    #[test]
    fn test_missing_fields_default() {
        let work: Work = serde_json::from_str(r#"{"id": "W2"}"#).unwrap();
        assert!(work.topics.is_empty());
        assert!(work.keywords.is_empty());
        assert_eq!(work.abstract_text(), "");
    }

    #[test]
    fn test_abstract_reconstruction() {
        let json = r#"{
            "id": "W3",
            "abstract_inverted_index": {"graphs": [2], "Citation": [0], "are": [1, 4], "big": [3]}
        }"#;
        let work: Work = serde_json::from_str(json).unwrap();
        assert_eq!(work.abstract_text(), "Citation are graphs big are");
    }

    #[test]
    fn test_title_falls_back_to_display_name() {
        let work: Work =
            serde_json::from_str(r#"{"id": "W4", "display_name": "Shown"}"#).unwrap();
        assert_eq!(work.title(), Some("Shown"));
    }

    #[test]
    fn test_page_with_cursor() {
        let json = r#"{"meta": {"count": 450, "per_page": 200, "next_cursor": "abc"}, "results": [{"id": "W1"}]}"#;
        let page: Page<Work> = serde_json::from_str(json).unwrap();
        assert_eq!(page.meta.count, 450);
        assert_eq!(page.meta.next_cursor.as_deref(), Some("abc"));
        assert_eq!(page.results.len(), 1);
    }
}
