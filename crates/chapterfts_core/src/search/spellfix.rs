//! Spell correction over the full-text index vocabulary.
//!
//! # Responsibility
//! - Mirror `chapters_fts_vocab` terms (with document counts) into
//!   `chapters_fts_spellfix`.
//! - Rank vocabulary words against a possibly misspelled query word by
//!   weighted edit distance, honouring `chapters_fts_spellfix_editcost`.
//!
//! # Invariants
//! - After [`refresh_vocabulary`], language `0` holds exactly the index terms.
//! - Distances are computed on lowercased Unicode scalar values.

use super::SearchResult;
use crate::model::projection::SpellSuggestion;
use log::{debug, info};
use rusqlite::{params, Connection};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Default number of suggestions, as with spellfix1's `top`.
pub const DEFAULT_TOP: u32 = 20;

const DEFAULT_INSERT_COST: u32 = 100;
const DEFAULT_DELETE_COST: u32 = 100;
const DEFAULT_SUBSTITUTE_COST: u32 = 150;
/// Language id used for words harvested from the index.
const INDEX_LANGID: i64 = 0;

/// Row counts touched by [`refresh_vocabulary`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VocabularyRefresh {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Synchronizes the spell-correction table with the index vocabulary.
pub fn refresh_vocabulary(conn: &Connection) -> SearchResult<VocabularyRefresh> {
    let removed = conn.execute(
        "DELETE FROM chapters_fts_spellfix
         WHERE langid = ?1
           AND word NOT IN (SELECT term FROM chapters_fts_vocab);",
        [INDEX_LANGID],
    )?;

    let updated = conn.execute(
        "UPDATE chapters_fts_spellfix
         SET rank = (
            SELECT vocab.cnt FROM chapters_fts_vocab AS vocab
            WHERE vocab.term = chapters_fts_spellfix.word
         )
         WHERE langid = ?1
           AND rank <> (
            SELECT vocab.cnt FROM chapters_fts_vocab AS vocab
            WHERE vocab.term = chapters_fts_spellfix.word
           );",
        [INDEX_LANGID],
    )?;

    let inserted = conn.execute(
        "INSERT INTO chapters_fts_spellfix (word, rank, langid)
         SELECT term, cnt, ?1 FROM chapters_fts_vocab
         WHERE term NOT IN (
            SELECT word FROM chapters_fts_spellfix WHERE langid = ?1
         );",
        [INDEX_LANGID],
    )?;

    let refresh = VocabularyRefresh {
        inserted,
        updated,
        removed,
    };
    info!(
        "event=spellfix_refresh module=search status=ok inserted={} updated={} removed={}",
        refresh.inserted, refresh.updated, refresh.removed
    );
    Ok(refresh)
}

/// Per-character edit costs.
///
/// Starts from insert/delete 100 and substitute 150; individual characters
/// can be overridden through `chapters_fts_spellfix_editcost` rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditCosts {
    insert: u32,
    delete: u32,
    substitute: u32,
    inserts: HashMap<char, u32>,
    deletes: HashMap<char, u32>,
    substitutions: HashMap<(char, char), u32>,
}

impl Default for EditCosts {
    fn default() -> Self {
        Self {
            insert: DEFAULT_INSERT_COST,
            delete: DEFAULT_DELETE_COST,
            substitute: DEFAULT_SUBSTITUTE_COST,
            inserts: HashMap::new(),
            deletes: HashMap::new(),
            substitutions: HashMap::new(),
        }
    }
}

impl EditCosts {
    /// Loads cost overrides for `langid` on top of the defaults.
    pub fn load(conn: &Connection, langid: i64) -> SearchResult<Self> {
        let mut costs = Self::default();
        let mut stmt = conn.prepare(
            "SELECT cfrom, cto, icost
             FROM chapters_fts_spellfix_editcost
             WHERE ilang = ?1
             ORDER BY rowid;",
        )?;
        let mut rows = stmt.query([langid])?;

        while let Some(row) = rows.next()? {
            let from: String = row.get(0)?;
            let to: String = row.get(1)?;
            let cost: i64 = row.get(2)?;
            let cost = u32::try_from(cost.max(0)).unwrap_or(u32::MAX);
            if !costs.apply_rule(&from, &to, cost) {
                debug!(
                    "event=spellfix_editcost module=search status=skip langid={langid} cfrom_len={} cto_len={}",
                    from.chars().count(),
                    to.chars().count()
                );
            }
        }

        Ok(costs)
    }

    /// Applies one `(cfrom, cto, cost)` rule. Returns `false` when the rule
    /// shape is not supported (multi-character sequences).
    ///
    /// `'?'` on the character side sets the default for that edit class.
    pub fn apply_rule(&mut self, from: &str, to: &str, cost: u32) -> bool {
        match (single_char(from), single_char(to)) {
            (None, Some('?')) if from.is_empty() => self.insert = cost,
            (Some('?'), None) if to.is_empty() => self.delete = cost,
            (Some('?'), Some('?')) => self.substitute = cost,
            (None, Some(to)) if from.is_empty() => {
                self.inserts.insert(to, cost);
            }
            (Some(from), None) if to.is_empty() => {
                self.deletes.insert(from, cost);
            }
            (Some(from), Some(to)) => {
                self.substitutions.insert((from, to), cost);
            }
            _ => return false,
        }
        true
    }

    fn insert_cost(&self, ch: char) -> u32 {
        self.inserts.get(&ch).copied().unwrap_or(self.insert)
    }

    fn delete_cost(&self, ch: char) -> u32 {
        self.deletes.get(&ch).copied().unwrap_or(self.delete)
    }

    fn substitute_cost(&self, from: char, to: char) -> u32 {
        if from == to {
            return 0;
        }
        self.substitutions
            .get(&(from, to))
            .copied()
            .unwrap_or(self.substitute)
    }
}

/// Weighted Levenshtein distance turning `source` into `target`.
pub fn edit_distance(source: &str, target: &str, costs: &EditCosts) -> u32 {
    let source = fold(source);
    let target = fold(target);
    weighted_levenshtein(&source, &target, costs)
}

/// Spell-correction query options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellQuery {
    /// Word to correct; a trailing `*` requests prefix matching.
    pub word: String,
    pub top: u32,
    pub langid: i64,
    /// Candidates farther than this are dropped.
    pub max_distance: Option<u32>,
}

impl SpellQuery {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            top: DEFAULT_TOP,
            langid: INDEX_LANGID,
            max_distance: None,
        }
    }

    pub fn with_top(mut self, top: u32) -> Self {
        self.top = top;
        self
    }
}

/// Returns the best vocabulary matches for `query.word`.
///
/// Ordered by score, then distance, then word.
pub fn suggest_words(conn: &Connection, query: &SpellQuery) -> SearchResult<Vec<SpellSuggestion>> {
    let raw = query.word.trim();
    let (word, prefix) = match raw.strip_suffix('*') {
        Some(stem) => (stem.trim_end(), true),
        None => (raw, false),
    };
    if word.is_empty() || query.top == 0 {
        return Ok(Vec::new());
    }

    let costs = EditCosts::load(conn, query.langid)?;
    let target = fold(word);

    let mut stmt = conn.prepare(
        "SELECT word, rank FROM chapters_fts_spellfix WHERE langid = ?1;",
    )?;
    let mut rows = stmt.query(params![query.langid])?;
    let mut suggestions = Vec::new();

    while let Some(row) = rows.next()? {
        let candidate: String = row.get(0)?;
        let rank: i64 = row.get(1)?;

        let folded = fold(&candidate);
        let compared = if prefix {
            &folded[..folded.len().min(target.len())]
        } else {
            &folded[..]
        };
        let distance = weighted_levenshtein(compared, &target, &costs);
        if query.max_distance.is_some_and(|max| distance > max) {
            continue;
        }

        suggestions.push(SpellSuggestion {
            word: candidate,
            rank,
            distance,
            score: score(distance, rank),
            matchlen: u32::try_from(compared.len()).unwrap_or(u32::MAX),
        });
    }

    suggestions.sort_by(compare_suggestions);
    suggestions.truncate(usize::try_from(query.top).unwrap_or(usize::MAX));

    debug!(
        "event=spellfix_query module=search status=ok prefix={prefix} suggestions={}",
        suggestions.len()
    );
    Ok(suggestions)
}

fn compare_suggestions(a: &SpellSuggestion, b: &SpellSuggestion) -> Ordering {
    a.score
        .cmp(&b.score)
        .then(a.distance.cmp(&b.distance))
        .then_with(|| a.word.cmp(&b.word))
}

/// Distance nudged down by the bit length of `rank`, so frequent words win ties.
fn score(distance: u32, rank: i64) -> i64 {
    let rank_bits = if rank > 0 {
        i64::from(64 - rank.leading_zeros())
    } else {
        0
    };
    i64::from(distance) + 32 - rank_bits
}

fn fold(value: &str) -> Vec<char> {
    value.to_lowercase().chars().collect()
}

fn single_char(value: &str) -> Option<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}

fn weighted_levenshtein(source: &[char], target: &[char], costs: &EditCosts) -> u32 {
    let mut previous: Vec<u32> = Vec::with_capacity(target.len() + 1);
    previous.push(0);
    for &ch in target {
        let last = previous[previous.len() - 1];
        previous.push(last.saturating_add(costs.insert_cost(ch)));
    }

    let mut current = vec![0_u32; target.len() + 1];
    for &from in source {
        current[0] = previous[0].saturating_add(costs.delete_cost(from));
        for (j, &to) in target.iter().enumerate() {
            let deletion = previous[j + 1].saturating_add(costs.delete_cost(from));
            let insertion = current[j].saturating_add(costs.insert_cost(to));
            let substitution = previous[j].saturating_add(costs.substitute_cost(from, to));
            current[j + 1] = deletion.min(insertion).min(substitution);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[target.len()]
}
