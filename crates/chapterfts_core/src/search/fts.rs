//! SQLite FTS5 queries over `chapters_fts`.
//!
//! # Responsibility
//! - Run raw FTS5 expressions (phrases, prefixes, boolean operators, column
//!   filters) and shape rows into [`ChapterHit`].
//! - Optionally decorate results with `highlight()`/`snippet()` markup.
//!
//! # Invariants
//! - Result ordering is deterministic: the requested order, then `rowid`.
//! - FTS5 syntax errors surface as [`SearchError::InvalidQuery`].

use super::{SearchError, SearchResult};
use crate::db::DbError;
use crate::model::projection::ChapterHit;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};

/// Column positions inside `chapters_fts`.
const FTS_TEXT_COLUMN: u8 = 0;
const FTS_TITLE_COLUMN: u8 = 1;
/// FTS5 rejects snippet lengths above this.
const MAX_SNIPPET_TOKENS: u32 = 64;

/// How the expression is applied to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchOperator {
    /// `chapters_fts MATCH ?`
    #[default]
    Match,
    /// `chapters_fts = ?`, equivalent to `MATCH`.
    Equals,
}

impl MatchOperator {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Match => "MATCH",
            Self::Equals => "=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchOrder {
    /// Index order (ascending rowid).
    #[default]
    Natural,
    /// `ORDER BY rank`, most relevant first.
    Rank,
    /// `ORDER BY bm25(chapters_fts)`.
    Bm25,
}

/// Markers used by `highlight()` and `snippet()`.
///
/// Both functions re-tokenize the stored column values, which still carry
/// markup, while the index holds the stripped text. For chapters with markup
/// the markers can land on a neighbouring token instead of the matched one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    pub open: String,
    pub close: String,
    pub ellipsis: String,
    /// Maximum tokens per snippet, clamped to `1..=64`.
    pub snippet_tokens: u32,
}

impl Default for Highlight {
    fn default() -> Self {
        Self {
            open: "<b>".to_string(),
            close: "</b>".to_string(),
            ellipsis: "...".to_string(),
            snippet_tokens: MAX_SNIPPET_TOKENS,
        }
    }
}

/// Full-text query options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSearch {
    /// Raw FTS5 expression, passed to SQLite unchanged.
    pub expression: String,
    pub operator: MatchOperator,
    pub order: SearchOrder,
    /// When set, `title` is highlighted and `text` is reduced to a snippet.
    pub highlight: Option<Highlight>,
    pub limit: Option<u32>,
}

impl ChapterSearch {
    /// Creates a `MATCH` query in index order with no limit.
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            operator: MatchOperator::Match,
            order: SearchOrder::Natural,
            highlight: None,
            limit: None,
        }
    }

    pub fn with_operator(mut self, operator: MatchOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn ordered_by(mut self, order: SearchOrder) -> Self {
        self.order = order;
        self
    }

    /// Enables default `<b>`/`</b>` highlighting, ordered by `bm25`.
    pub fn highlighted(mut self) -> Self {
        self.highlight = Some(Highlight::default());
        self.order = SearchOrder::Bm25;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Runs a full-text query against `chapters_fts`.
///
/// Returns an empty list for blank expressions or `limit == Some(0)`.
pub fn search_chapters(conn: &Connection, search: &ChapterSearch) -> SearchResult<Vec<ChapterHit>> {
    let expression = search.expression.trim();
    if expression.is_empty() || search.limit == Some(0) {
        return Ok(Vec::new());
    }

    let mut bind_values: Vec<Value> = Vec::new();
    let mut sql = String::from("SELECT rowid, ");

    match &search.highlight {
        Some(highlight) => {
            sql.push_str(&format!(
                "highlight(chapters_fts, {FTS_TITLE_COLUMN}, ?, ?) AS title, \
                 snippet(chapters_fts, {FTS_TEXT_COLUMN}, ?, ?, ?, ?) AS text, "
            ));
            bind_values.push(Value::Text(highlight.open.clone()));
            bind_values.push(Value::Text(highlight.close.clone()));
            bind_values.push(Value::Text(highlight.open.clone()));
            bind_values.push(Value::Text(highlight.close.clone()));
            bind_values.push(Value::Text(highlight.ellipsis.clone()));
            bind_values.push(Value::Integer(i64::from(
                highlight.snippet_tokens.clamp(1, MAX_SNIPPET_TOKENS),
            )));
        }
        None => sql.push_str("title, \"text\" AS text, "),
    }

    sql.push_str("rank FROM chapters_fts WHERE chapters_fts ");
    sql.push_str(search.operator.as_sql());
    sql.push_str(" ?");
    bind_values.push(Value::Text(expression.to_string()));

    sql.push_str(match search.order {
        SearchOrder::Natural => " ORDER BY rowid",
        SearchOrder::Rank => " ORDER BY rank, rowid",
        SearchOrder::Bm25 => " ORDER BY bm25(chapters_fts), rowid",
    });

    if let Some(limit) = search.limit {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
    }

    debug!(
        "event=fts_query module=search status=start operator={} order={:?} highlight={}",
        search.operator.as_sql(),
        search.order,
        search.highlight.is_some()
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query(params_from_iter(bind_values))
        .map_err(|err| map_query_error(err, expression))?;
    let mut hits = Vec::new();

    while let Some(row) = rows.next().map_err(|err| map_query_error(err, expression))? {
        hits.push(parse_chapter_hit(row)?);
    }

    debug!(
        "event=fts_query module=search status=ok hits={}",
        hits.len()
    );
    Ok(hits)
}

/// Builds an AND-of-phrases expression from free text.
///
/// Every whitespace-separated term is quoted so FTS5 operators and column
/// filters in user typing are matched literally. Returns `None` for blank input.
pub fn quote_terms(text: &str) -> Option<String> {
    let terms = text
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>();

    if terms.is_empty() {
        return None;
    }
    Some(terms.join(" AND "))
}

fn parse_chapter_hit(row: &Row<'_>) -> SearchResult<ChapterHit> {
    let rowid: i64 = row.get("rowid")?;
    if rowid <= 0 {
        return Err(SearchError::InvalidData(format!("invalid rowid `{rowid}`")));
    }

    Ok(ChapterHit {
        rowid,
        title: row.get::<_, Option<String>>("title")?.unwrap_or_default(),
        text: row.get::<_, Option<String>>("text")?.unwrap_or_default(),
        rank: row.get("rank")?,
    })
}

pub(crate) fn map_query_error(err: rusqlite::Error, query: &str) -> SearchError {
    if is_match_syntax_error(&err) {
        return SearchError::InvalidQuery {
            query: query.to_string(),
            message: err.to_string(),
        };
    }

    SearchError::Db(DbError::Sqlite(err))
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
                || msg.contains("no such column")
        }
        _ => false,
    }
}
