use crate::expand::RecordRows;
use crate::sink::{ProgressReport, RecordSink, RunStatus};
use crate::variant::Variant;
use bibcrawl_source::{Identified, Institution, NodeId};
use rusqlite::{Connection, OptionalExtension, Result, params};
use std::path::Path;

pub struct Database {
    conn: Connection,
}

/// Bookkeeping row for one invocation of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    pub id: String,
    pub variant: String,
    pub seed: String,
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub status: String,
    pub resumed: bool,
}

/// Co-authorship as stored: one author on one work.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorshipEntry {
    pub work_id: String,
    pub author_id: String,
    pub author_name: Option<String>,
}

fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Database {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            -- One row per engine invocation; resumed runs get a fresh row
            CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    variant TEXT NOT NULL CHECK(variant IN ('citation', 'author', 'author_limit', 'author_graph')),
    seed TEXT NOT NULL,
    started_at INTEGER NOT NULL,
    ended_at INTEGER,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'interrupted', 'failed')),
    resumed BOOLEAN NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS works (
    id TEXT PRIMARY KEY,
    title TEXT,
    abstract TEXT NOT NULL DEFAULT '',
    doi TEXT,
    publication_date TEXT,
    publication_year INTEGER,
    cited_by_count INTEGER NOT NULL DEFAULT 0,
    language TEXT,
    work_type TEXT,
    fwci REAL NOT NULL DEFAULT 0,
    is_open_access BOOLEAN NOT NULL DEFAULT 0,
    has_fulltext BOOLEAN NOT NULL DEFAULT 0,
    is_retracted BOOLEAN NOT NULL DEFAULT 0,
    is_paratext BOOLEAN NOT NULL DEFAULT 0,
    locations_count INTEGER NOT NULL DEFAULT 0,
    countries_distinct_count INTEGER NOT NULL DEFAULT 0,
    institutions_distinct_count INTEGER NOT NULL DEFAULT 0,
    referenced_works_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS authorships (
    work_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    author_id TEXT,
    author_name TEXT,
    author_position TEXT,
    is_corresponding BOOLEAN NOT NULL DEFAULT 0,
    countries TEXT NOT NULL DEFAULT '[]',        -- JSON array
    institution_ids TEXT NOT NULL DEFAULT '[]',  -- JSON array
    PRIMARY KEY(work_id, position)
);

CREATE INDEX IF NOT EXISTS idx_authorships_author ON authorships(author_id);

CREATE TABLE IF NOT EXISTS citations (
    work_id TEXT NOT NULL,
    referenced_work_id TEXT NOT NULL,
    PRIMARY KEY(work_id, referenced_work_id)
);

CREATE INDEX IF NOT EXISTS idx_citations_target ON citations(referenced_work_id);

CREATE TABLE IF NOT EXISTS related_works (
    work_id TEXT NOT NULL,
    related_work_id TEXT NOT NULL,
    PRIMARY KEY(work_id, related_work_id)
);

CREATE TABLE IF NOT EXISTS concepts (
    work_id TEXT NOT NULL,
    concept_id TEXT NOT NULL,
    name TEXT,
    wikidata TEXT,
    level INTEGER NOT NULL DEFAULT 0,
    score REAL NOT NULL DEFAULT 0,
    PRIMARY KEY(work_id, concept_id)
);

CREATE TABLE IF NOT EXISTS topics (
    work_id TEXT NOT NULL,
    topic_id TEXT NOT NULL,
    name TEXT,
    score REAL NOT NULL DEFAULT 0,
    PRIMARY KEY(work_id, topic_id)
);

CREATE TABLE IF NOT EXISTS keywords (
    work_id TEXT NOT NULL,
    keyword_id TEXT NOT NULL,
    name TEXT,
    score REAL NOT NULL DEFAULT 0,
    PRIMARY KEY(work_id, keyword_id)
);

CREATE TABLE IF NOT EXISTS institutions (
    id TEXT PRIMARY KEY,
    name TEXT,
    ror TEXT,
    country_code TEXT,
    institution_type TEXT,
    works_count INTEGER NOT NULL DEFAULT 0,
    cited_by_count INTEGER NOT NULL DEFAULT 0,
    homepage_url TEXT
);

CREATE TABLE IF NOT EXISTS progress_reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    elapsed_secs REAL NOT NULL,
    works INTEGER NOT NULL,
    authors INTEGER NOT NULL,
    citations INTEGER NOT NULL,
    related_works INTEGER NOT NULL,
    concepts INTEGER NOT NULL,
    topics INTEGER NOT NULL,
    keywords INTEGER NOT NULL,
    nodes INTEGER NOT NULL,
    collected INTEGER NOT NULL,
    institutions INTEGER NOT NULL,
    dropped INTEGER NOT NULL,
    FOREIGN KEY(run_id) REFERENCES runs(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_progress_run ON progress_reports(run_id);
            ",
        )?;
        Ok(())
    }

    // Run management
    pub fn create_run(&self, variant: Variant, seed: &str, resumed: bool) -> Result<String> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let timestamp = current_timestamp();

        self.conn.execute(
            "INSERT INTO runs (id, variant, seed, started_at, status, resumed) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![&run_id, variant.as_str(), seed, timestamp, "running", resumed],
        )?;

        Ok(run_id)
    }

    pub fn set_run_status(&self, run_id: &str, status: RunStatus) -> Result<()> {
        let ended_at = (status != RunStatus::Running).then(current_timestamp);
        self.conn.execute(
            "UPDATE runs SET status = ?1, ended_at = ?2 WHERE id = ?3",
            params![status.as_str(), ended_at, run_id],
        )?;
        Ok(())
    }

    pub fn get_runs(&self) -> Result<Vec<RunRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, variant, seed, started_at, ended_at, status, resumed FROM runs ORDER BY started_at, rowid",
        )?;

        let runs = stmt
            .query_map([], |row| {
                Ok(RunRow {
                    id: row.get(0)?,
                    variant: row.get(1)?,
                    seed: row.get(2)?,
                    started_at: row.get(3)?,
                    ended_at: row.get(4)?,
                    status: row.get(5)?,
                    resumed: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(runs)
    }

    // Record writes, one transaction per batch
    pub fn insert_records(&mut self, records: &[RecordRows]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut work_stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO works (
                    id, title, abstract, doi, publication_date, publication_year, cited_by_count,
                    language, work_type, fwci, is_open_access, has_fulltext, is_retracted,
                    is_paratext, locations_count, countries_distinct_count,
                    institutions_distinct_count, referenced_works_count
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            )?;
            let mut authorship_stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO authorships (
                    work_id, position, author_id, author_name, author_position,
                    is_corresponding, countries, institution_ids
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            let mut citation_stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO citations (work_id, referenced_work_id) VALUES (?1, ?2)",
            )?;
            let mut related_stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO related_works (work_id, related_work_id) VALUES (?1, ?2)",
            )?;
            let mut concept_stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO concepts (work_id, concept_id, name, wikidata, level, score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            let mut topic_stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO topics (work_id, topic_id, name, score) VALUES (?1, ?2, ?3, ?4)",
            )?;
            let mut keyword_stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO keywords (work_id, keyword_id, name, score) VALUES (?1, ?2, ?3, ?4)",
            )?;

            for record in records {
                let work = &record.work;
                work_stmt.execute(params![
                    work.id.as_str(),
                    &work.title,
                    &work.abstract_text,
                    &work.doi,
                    &work.publication_date,
                    work.publication_year,
                    work.cited_by_count as i64,
                    &work.language,
                    &work.work_type,
                    work.fwci,
                    work.is_open_access,
                    work.has_fulltext,
                    work.is_retracted,
                    work.is_paratext,
                    work.locations_count as i64,
                    work.countries_distinct_count as i64,
                    work.institutions_distinct_count as i64,
                    work.referenced_works_count as i64,
                ])?;

                for a in &record.authorships {
                    let countries = serde_json::to_string(&a.countries).unwrap_or_default();
                    let institutions =
                        serde_json::to_string(&a.institution_ids).unwrap_or_default();
                    authorship_stmt.execute(params![
                        a.work_id.as_str(),
                        a.position,
                        a.author_id.as_ref().map(NodeId::as_str),
                        &a.author_name,
                        &a.author_position,
                        a.is_corresponding,
                        countries,
                        institutions,
                    ])?;
                }

                for edge in &record.citations {
                    citation_stmt.execute(params![edge.work_id.as_str(), edge.target_id.as_str()])?;
                }
                for edge in &record.related_works {
                    related_stmt.execute(params![edge.work_id.as_str(), edge.target_id.as_str()])?;
                }
                for c in &record.concepts {
                    concept_stmt.execute(params![
                        c.tag.work_id.as_str(),
                        &c.tag.tag_id,
                        &c.tag.name,
                        &c.wikidata,
                        c.level,
                        c.tag.score,
                    ])?;
                }
                for t in &record.topics {
                    topic_stmt.execute(params![t.work_id.as_str(), &t.tag_id, &t.name, t.score])?;
                }
                for k in &record.keywords {
                    keyword_stmt.execute(params![k.work_id.as_str(), &k.tag_id, &k.name, k.score])?;
                }
            }
        }
        tx.commit()
    }

    pub fn insert_institutions(&mut self, institutions: &[Institution]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO institutions (
                    id, name, ror, country_code, institution_type, works_count, cited_by_count, homepage_url
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for institution in institutions {
                let Some(id) = institution.node_id() else {
                    continue;
                };
                stmt.execute(params![
                    id.as_str(),
                    &institution.display_name,
                    &institution.ror,
                    &institution.country_code,
                    &institution.institution_type,
                    institution.works_count as i64,
                    institution.cited_by_count as i64,
                    &institution.homepage_url,
                ])?;
            }
        }
        tx.commit()
    }

    pub fn insert_progress(&self, report: &ProgressReport) -> Result<i64> {
        let c = &report.counters;
        self.conn.execute(
            "INSERT INTO progress_reports (
                run_id, timestamp, elapsed_secs, works, authors, citations, related_works,
                concepts, topics, keywords, nodes, collected, institutions, dropped
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                &report.run_id,
                report.timestamp.to_rfc3339(),
                report.elapsed_secs,
                c.works as i64,
                c.authors as i64,
                c.citations as i64,
                c.related_works as i64,
                c.concepts as i64,
                c.topics as i64,
                c.keywords as i64,
                c.nodes as i64,
                c.collected as i64,
                c.institutions as i64,
                c.dropped as i64,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    // Query methods
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        // Table names cannot be bound as parameters
        const TABLES: [&str; 11] = [
            "runs",
            "works",
            "authorships",
            "citations",
            "related_works",
            "concepts",
            "topics",
            "keywords",
            "institutions",
            "progress_reports",
            "sqlite_master",
        ];
        if !TABLES.contains(&table) {
            return Err(rusqlite::Error::InvalidParameterName(table.to_string()));
        }
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
    }

    pub fn get_work_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM works ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>>>()?;
        Ok(ids)
    }

    pub fn get_work_title(&self, work_id: &str) -> Result<Option<String>> {
        let title: Option<Option<String>> = self
            .conn
            .query_row("SELECT title FROM works WHERE id = ?1", params![work_id], |row| row.get(0))
            .optional()?;
        Ok(title.flatten())
    }

    pub fn get_citations(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT work_id, referenced_work_id FROM citations ORDER BY work_id, referenced_work_id")?;
        let edges = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>>>()?;
        Ok(edges)
    }

    /// Authorships with a known author id, ordered by work.
    pub fn get_authorships(&self) -> Result<Vec<AuthorshipEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT work_id, author_id, author_name FROM authorships
             WHERE author_id IS NOT NULL ORDER BY work_id, position",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(AuthorshipEntry {
                    work_id: row.get(0)?,
                    author_id: row.get(1)?,
                    author_name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn get_institution_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM institutions ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Most recent progress row as (timestamp, works, nodes).
    pub fn get_last_progress(&self) -> Result<Option<(String, i64, i64)>> {
        self.conn
            .query_row(
                "SELECT timestamp, works, nodes FROM progress_reports ORDER BY id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}

impl RecordSink for Database {
    fn begin_run(&mut self, variant: Variant, seed: &NodeId, resumed: bool) -> crate::error::Result<String> {
        Ok(self.create_run(variant, seed.as_str(), resumed)?)
    }

    fn write_records(&mut self, records: &[RecordRows]) -> crate::error::Result<()> {
        Ok(self.insert_records(records)?)
    }

    fn write_institutions(&mut self, institutions: &[Institution]) -> crate::error::Result<()> {
        Ok(self.insert_institutions(institutions)?)
    }

    fn append_progress(&mut self, report: &ProgressReport) -> crate::error::Result<()> {
        self.insert_progress(report)?;
        Ok(())
    }

    fn finish_run(&mut self, run_id: &str, status: RunStatus) -> crate::error::Result<()> {
        Ok(self.set_run_status(run_id, status)?)
    }
}
