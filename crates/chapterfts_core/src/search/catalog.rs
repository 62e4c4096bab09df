//! Labelled sample queries over the chapters database.
//!
//! Covers full-table `LIKE` scans, the FTS5 expression syntax (phrases,
//! prefixes, boolean operators, column filters, exclusions), highlighting over
//! markup and non-Latin text, and spell correction.

use super::fts::{search_chapters, ChapterSearch, MatchOperator, SearchOrder};
use super::spellfix::{suggest_words, SpellQuery};
use super::SearchError;
use crate::model::chapter::Chapter;
use crate::model::projection::{ChapterHit, SpellSuggestion};
use crate::repo::chapter_repo::{ChapterRepository, RepoError, ScanMode, SqliteChapterRepository};
use log::{info, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// What a catalog entry runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    Scan { mode: ScanMode, needle: &'static str },
    FullText(ChapterSearch),
    Spell(SpellQuery),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub label: &'static str,
    pub query: CatalogQuery,
}

impl CatalogEntry {
    fn new(label: &'static str, query: CatalogQuery) -> Self {
        Self { label, query }
    }

    /// SQL-level rendering of the query, for display.
    pub fn describe(&self) -> String {
        match &self.query {
            CatalogQuery::Scan { mode, needle } => {
                let pattern = match mode {
                    ScanMode::Contains => format!("%{needle}%"),
                    ScanMode::StartsWith => format!("{needle}%"),
                    ScanMode::EndsWith => format!("%{needle}"),
                };
                format!("SELECT * FROM chapters WHERE text LIKE '{pattern}'")
            }
            CatalogQuery::FullText(search) => {
                let columns = if search.highlight.is_some() {
                    "rowid, highlight(chapters_fts, 1, ...) AS title, snippet(chapters_fts, 0, ...) AS text, rank"
                } else {
                    "rowid, title, text, rank"
                };
                let operator = match search.operator {
                    MatchOperator::Match => "MATCH",
                    MatchOperator::Equals => "=",
                };
                let order = match search.order {
                    SearchOrder::Natural => "",
                    SearchOrder::Rank => " ORDER BY rank",
                    SearchOrder::Bm25 => " ORDER BY bm25(chapters_fts)",
                };
                format!(
                    "SELECT {columns} FROM chapters_fts WHERE chapters_fts {operator} '{}'{order}",
                    search.expression.replace('\'', "''")
                )
            }
            CatalogQuery::Spell(query) => format!(
                "SELECT word, rank, distance, score, matchlen FROM chapters_fts_spellfix WHERE word MATCH '{}' AND top={}",
                query.word.replace('\'', "''"),
                query.top
            ),
        }
    }
}

/// Rows produced by one catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogRows {
    Chapters(Vec<Chapter>),
    Hits(Vec<ChapterHit>),
    Suggestions(Vec<SpellSuggestion>),
}

impl CatalogRows {
    pub fn len(&self) -> usize {
        match self {
            Self::Chapters(rows) => rows.len(),
            Self::Hits(rows) => rows.len(),
            Self::Suggestions(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub enum CatalogError {
    Repo(RepoError),
    Search(SearchError),
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Search(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Search(err) => Some(err),
        }
    }
}

#[derive(Debug)]
pub struct CatalogOutcome {
    pub label: &'static str,
    pub description: String,
    pub result: Result<CatalogRows, CatalogError>,
}

/// Returns the fixed list of sample queries, in presentation order.
pub fn query_catalog() -> Vec<CatalogEntry> {
    let scan = |mode, needle| CatalogQuery::Scan { mode, needle };
    let fts = |expression: &str| CatalogQuery::FullText(ChapterSearch::new(expression));
    let highlighted =
        |expression: &str| CatalogQuery::FullText(ChapterSearch::new(expression).highlighted());

    vec![
        CatalogEntry::new("full scan: contains", scan(ScanMode::Contains, "cat")),
        CatalogEntry::new("full scan: starts with", scan(ScanMode::StartsWith, "cat")),
        CatalogEntry::new("full scan: ends with", scan(ScanMode::EndsWith, "cat")),
        CatalogEntry::new("term in any column", fts("fts5")),
        CatalogEntry::new(
            "term in any column, equals operator",
            CatalogQuery::FullText(ChapterSearch::new("fts5").with_operator(MatchOperator::Equals)),
        ),
        CatalogEntry::new(
            "most relevant first",
            CatalogQuery::FullText(ChapterSearch::new("text").ordered_by(SearchOrder::Rank)),
        ),
        CatalogEntry::new("all terms", fts("learn SQLite")),
        CatalogEntry::new("prefix", fts("search*")),
        CatalogEntry::new("exclusion", fts("learn NOT text")),
        CatalogEntry::new("exclusion by column filter", fts("learn -title:text")),
        CatalogEntry::new("quoted token with dash", fts("\"2018-2019\"")),
        CatalogEntry::new("both words anywhere", fts("2018 2019")),
        CatalogEntry::new("adjacent phrase", fts("\"2018 2019\"")),
        CatalogEntry::new("short prefix", fts("some*")),
        CatalogEntry::new("either term", fts("learn OR text")),
        CatalogEntry::new("both terms", fts("sqlite AND searching")),
        CatalogEntry::new("operator precedence", fts("search AND sqlite OR help")),
        CatalogEntry::new("grouping", fts("search AND (sqlite OR help)")),
        CatalogEntry::new("column filters with AND", fts("text:some AND title:sqlite")),
        CatalogEntry::new("column filters with OR", fts("text:some OR title:sqlite")),
        CatalogEntry::new("highlight and snippet", highlighted("SQLite")),
        CatalogEntry::new(
            "markup is not indexed: inner text (markers may be offset)",
            highlighted("funny"),
        ),
        CatalogEntry::new("markup is not indexed: tag name", highlighted("font")),
        CatalogEntry::new("unicode", highlighted("آزمايش")),
        CatalogEntry::new("unicode, excluding title", highlighted("-title:آزمايش")),
        CatalogEntry::new(
            "spell correction",
            CatalogQuery::Spell(SpellQuery::new("فارشي").with_top(6)),
        ),
    ]
}

/// Runs a single catalog entry.
pub fn run_entry(conn: &Connection, entry: &CatalogEntry) -> CatalogOutcome {
    let result = match &entry.query {
        CatalogQuery::Scan { mode, needle } => SqliteChapterRepository::new(conn)
            .scan_chapters(*mode, needle)
            .map(CatalogRows::Chapters)
            .map_err(CatalogError::Repo),
        CatalogQuery::FullText(search) => search_chapters(conn, search)
            .map(CatalogRows::Hits)
            .map_err(CatalogError::Search),
        CatalogQuery::Spell(query) => suggest_words(conn, query)
            .map(CatalogRows::Suggestions)
            .map_err(CatalogError::Search),
    };

    match &result {
        Ok(rows) => info!(
            "event=catalog_query module=search status=ok label=\"{}\" rows={}",
            entry.label,
            rows.len()
        ),
        Err(err) => warn!(
            "event=catalog_query module=search status=error label=\"{}\" error={err}",
            entry.label
        ),
    }

    CatalogOutcome {
        label: entry.label,
        description: entry.describe(),
        result,
    }
}

/// Runs every catalog entry; a failing entry does not stop the rest.
pub fn run_catalog(conn: &Connection) -> Vec<CatalogOutcome> {
    query_catalog()
        .iter()
        .map(|entry| run_entry(conn, entry))
        .collect()
}
