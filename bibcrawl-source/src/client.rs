use crate::config::{FetchConfig, PagingMode};
use crate::error::{Result, SourceError};
use crate::id::NodeId;
use crate::pacer::Pacer;
use crate::record::{Author, Identified, Institution, Page, Work};
use crate::source::GraphSource;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Sequential, paced client for the OpenAlex REST API.
///
/// Every HTTP call goes through one [`Pacer`], so page calls inside a single
/// relation-filtered fetch are spaced exactly like calls from separate batches.
pub struct OpenAlexClient {
    client: Client,
    base_url: Url,
    config: FetchConfig,
    pacer: Pacer,
}

impl OpenAlexClient {
    pub fn new(config: FetchConfig) -> Result<Self> {
        config.validate()?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| SourceError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::InvalidUrl(config.base_url.clone()));
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.div_ceil(2)))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .gzip(true)
            .build()?;

        let pacer = Pacer::new(config.request_delay());

        Ok(Self {
            client,
            base_url,
            config,
            pacer,
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn endpoint(&self, entity: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .push(entity);
        Ok(url)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        entity: &str,
        params: &[(&str, String)],
    ) -> Result<Page<T>> {
        let mut url = self.endpoint(entity)?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            if let Some(mailto) = &self.config.mailto {
                query.append_pair("mailto", mailto);
            }
        }

        self.pacer.wait().await;
        debug!("GET {}", url);

        let start = Instant::now();
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::StatusError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        debug!("{} answered in {:?}", entity, start.elapsed());

        serde_json::from_str(&body).map_err(|source| SourceError::DecodeError {
            url: url.to_string(),
            source,
        })
    }

    /// ID-filtered fetch: one call per chunk of `ids_per_filter` IDs.
    async fn fetch_listed<T>(&self, entity: &str, ids: &[NodeId]) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Identified,
    {
        let ids = unique_ids(ids);
        let mut records = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(self.config.ids_per_filter) {
            let filter = format!("openalex:{}", join_ids(chunk));
            let page: Page<T> = self
                .get_page(
                    entity,
                    &[("filter", filter), ("per-page", chunk.len().to_string())],
                )
                .await?;
            records.extend(page.results);
        }

        Ok(unique_records(records))
    }

    /// Relation-filtered fetch: walk every result page for each chunk of IDs.
    async fn fetch_related(&self, relation: &str, ids: &[NodeId]) -> Result<Vec<Work>> {
        let ids = unique_ids(ids);
        let per_page = self.config.per_page as u64;
        let mut works = Vec::new();

        for chunk in ids.chunks(self.config.ids_per_filter) {
            let filter = format!("{}:{}", relation, join_ids(chunk));
            let mut calls = 0usize;

            match self.config.paging {
                PagingMode::Cursor => {
                    let mut cursor = "*".to_string();
                    loop {
                        let page: Page<Work> = self
                            .get_page(
                                "works",
                                &[
                                    ("filter", filter.clone()),
                                    ("per-page", per_page.to_string()),
                                    ("cursor", cursor.clone()),
                                ],
                            )
                            .await?;
                        calls += 1;
                        let fetched = page.results.len();
                        works.extend(page.results);

                        match page.meta.next_cursor {
                            Some(next) if !next.is_empty() && fetched > 0 => cursor = next,
                            _ => break,
                        }
                    }
                }
                PagingMode::Offset => {
                    let mut page_number = 1u64;
                    loop {
                        let page: Page<Work> = self
                            .get_page(
                                "works",
                                &[
                                    ("filter", filter.clone()),
                                    ("per-page", per_page.to_string()),
                                    ("page", page_number.to_string()),
                                ],
                            )
                            .await?;
                        calls += 1;
                        let fetched = page.results.len();
                        let total = page.meta.count;
                        works.extend(page.results);

                        if fetched == 0 || page_number * per_page >= total {
                            break;
                        }
                        page_number += 1;
                    }
                }
            }

            debug!("{} resolved in {} page call(s)", filter, calls);
        }

        Ok(unique_records(works))
    }
}

impl GraphSource for OpenAlexClient {
    async fn works_by_ids(&self, ids: &[NodeId]) -> Result<Vec<Work>> {
        self.fetch_listed("works", ids).await
    }

    async fn works_by_authors(&self, authors: &[NodeId]) -> Result<Vec<Work>> {
        let works = self.fetch_related("author.id", authors).await?;
        info!("Fetched {} works for {} author(s)", works.len(), authors.len());
        Ok(works)
    }

    async fn authors_by_ids(&self, ids: &[NodeId]) -> Result<Vec<Author>> {
        self.fetch_listed("authors", ids).await
    }

    async fn institutions_by_ids(&self, ids: &[NodeId]) -> Result<Vec<Institution>> {
        self.fetch_listed("institutions", ids).await
    }
}

fn unique_ids(ids: &[NodeId]) -> Vec<NodeId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().filter(|id| seen.insert(*id)).cloned().collect()
}

fn join_ids(ids: &[NodeId]) -> String {
    ids.iter().map(NodeId::as_str).collect::<Vec<_>>().join("|")
}

/// Keep the first occurrence of each record ID.
fn unique_records<T: Identified>(records: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| match record.node_id() {
            Some(id) => seen.insert(id),
            None => {
                warn!("Skipping record with unusable id {:?}", record.raw_id());
                false
            }
        })
        .collect()
}
