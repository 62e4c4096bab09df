use std::path::PathBuf;

use chapterfts_core::{quote_terms, ChapterSearch, ScanMode, SearchOrder};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "chapterfts")]
#[command(about = "Chapters with a synchronized SQLite full-text index")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to appsettings.toml under the content root)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Database file, overriding [database] connection
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply migrations and seed sample chapters into an empty database
    Init,
    /// Run the sample query catalog
    Demo,
    /// Run a raw FTS5 expression
    Search(SearchArgs),
    /// Suggest index words close to a misspelled word
    Suggest {
        word: String,
        #[arg(long, default_value_t = chapterfts_core::search::spellfix::DEFAULT_TOP)]
        top: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Full-table LIKE scan over chapter text, bypassing the index
    Scan {
        needle: String,
        #[arg(long, value_enum, default_value_t = ScanArg::Contains)]
        mode: ScanArg,
    },
    /// Add a chapter
    Add {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        text: String,
    },
    /// Edit a chapter's title and/or text
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        text: Option<String>,
    },
    /// Delete a chapter
    Delete { id: i64 },
    /// Drop and rebuild the full-text index from stored chapters
    Rebuild,
    /// Append ", Modified" to the first chapter's title
    TouchFirst,
    /// Delete the first chapter
    RemoveFirst,
}

#[derive(Args)]
pub struct SearchArgs {
    pub expression: String,
    /// Treat every word as a quoted phrase instead of FTS5 syntax
    #[arg(long)]
    pub literal: bool,
    /// Order by rank
    #[arg(long, conflicts_with = "bm25")]
    pub rank: bool,
    /// Order by bm25()
    #[arg(long)]
    pub bm25: bool,
    /// Highlight titles and return text snippets
    #[arg(long)]
    pub highlight: bool,
    #[arg(short, long)]
    pub limit: Option<u32>,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    pub fn to_search(&self) -> ChapterSearch {
        // Blank literal input becomes an empty expression, which matches nothing.
        let expression = if self.literal {
            quote_terms(&self.expression).unwrap_or_default()
        } else {
            self.expression.clone()
        };

        let mut search = ChapterSearch::new(expression);
        if self.highlight {
            search = search.highlighted();
        }
        if self.rank {
            search = search.ordered_by(SearchOrder::Rank);
        } else if self.bm25 {
            search = search.ordered_by(SearchOrder::Bm25);
        }
        search.limit = self.limit;
        search
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ScanArg {
    Contains,
    StartsWith,
    EndsWith,
}

impl From<ScanArg> for ScanMode {
    fn from(value: ScanArg) -> Self {
        match value {
            ScanArg::Contains => Self::Contains,
            ScanArg::StartsWith => Self::StartsWith,
            ScanArg::EndsWith => Self::EndsWith,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use chapterfts_core::SearchOrder;
    use clap::Parser;

    fn parse_search(args: &[&str]) -> chapterfts_core::ChapterSearch {
        let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
        match cli.command {
            Commands::Search(search) => search.to_search(),
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn literal_flag_quotes_each_word() {
        let search = parse_search(&["chapterfts", "search", "--literal", "learn NOT"]);
        assert_eq!(search.expression, "\"learn\" AND \"NOT\"");

        let raw = parse_search(&["chapterfts", "search", "learn NOT"]);
        assert_eq!(raw.expression, "learn NOT");

        let blank = parse_search(&["chapterfts", "search", "--literal", "   "]);
        assert!(blank.expression.is_empty());
    }

    #[test]
    fn ordering_and_limit_flags_apply() {
        let search = parse_search(&["chapterfts", "search", "sqlite", "--bm25", "-l", "2"]);
        assert_eq!(search.order, SearchOrder::Bm25);
        assert_eq!(search.limit, Some(2));
        assert!(search.highlight.is_none());

        let highlighted =
            parse_search(&["chapterfts", "search", "sqlite", "--highlight", "--rank"]);
        assert_eq!(highlighted.order, SearchOrder::Rank);
        assert!(highlighted.highlight.is_some());

        assert!(Cli::try_parse_from(["chapterfts", "search", "x", "--rank", "--bm25"]).is_err());
    }
}
