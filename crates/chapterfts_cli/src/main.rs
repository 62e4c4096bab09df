//! `chapterfts` command-line entry point.
//!
//! Resolves settings, opens the chapters database and dispatches one
//! subcommand against it.

mod cli;

use std::fmt::{Display, Formatter};
use std::process::ExitCode;

use chapterfts_core::config::SETTINGS_FILE_NAME;
use chapterfts_core::service::seed::{init_db, remove_first_chapter, touch_first_chapter};
use chapterfts_core::{
    default_content_root, init_logging, rebuild_chapter_fts, run_catalog, search_chapters,
    suggest_words, AppContext, AppSettings, CatalogRows, Chapter, ChapterHit, ChapterRepository,
    ConfigError, RepoError, SaveReport, SearchError, ServiceError, SpellQuery, SpellSuggestion,
    SqliteChapterRepository,
};
use clap::Parser;
use log::debug;

use crate::cli::{Cli, Commands};

#[derive(Debug)]
enum CliError {
    Service(ServiceError),
    Logging(String),
    Json(serde_json::Error),
    ChapterNotFound(i64),
    NothingToEdit,
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Service(err) => write!(f, "{err}"),
            Self::Logging(message) => write!(f, "logging setup failed: {message}"),
            Self::Json(err) => write!(f, "failed to encode JSON: {err}"),
            Self::ChapterNotFound(id) => write!(f, "chapter {id} not found"),
            Self::NothingToEdit => write!(f, "nothing to edit; pass --title and/or --text"),
        }
    }
}

impl From<ServiceError> for CliError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Service(value.into())
    }
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::Service(value.into())
    }
}

impl From<SearchError> for CliError {
    fn from(value: SearchError) -> Self {
        Self::Service(value.into())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let content_root = default_content_root();
    let mut settings = load_settings(&cli, &content_root)?;
    if let Some(db_path) = &cli.db_path {
        settings.database.connection = db_path.to_string_lossy().into_owned();
    }

    init_logging(&settings.logging.level, settings.logging.target()).map_err(CliError::Logging)?;
    debug!(
        "event=cli_start module=cli status=ok content_root={}",
        content_root.display()
    );

    let mut ctx = AppContext::open(&settings, &content_root)?;

    match cli.command {
        Commands::Init => match init_db(&mut ctx)? {
            Some(report) => print_save_report("seeded", &report),
            None => println!("database already contains chapters; nothing seeded"),
        },
        Commands::Demo => {
            init_db(&mut ctx)?;
            print_catalog(&ctx);
        }
        Commands::Search(args) => {
            let hits = search_chapters(ctx.connection(), &args.to_search())?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&hits).map_err(CliError::Json)?);
            } else {
                print_hits(&hits);
            }
        }
        Commands::Suggest { word, top, json } => {
            let suggestions = suggest_words(ctx.connection(), &SpellQuery::new(word).with_top(top))?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&suggestions).map_err(CliError::Json)?
                );
            } else {
                print_suggestions(&suggestions);
            }
        }
        Commands::Scan { needle, mode } => {
            let chapters =
                SqliteChapterRepository::new(ctx.connection()).scan_chapters(mode.into(), &needle)?;
            print_chapters(&chapters);
        }
        Commands::Add { user, title, text } => {
            let mut session = ctx.session();
            let key = session.add(Chapter::new(user, title, text));
            let report = session.save_changes()?;
            if let Some(chapter) = session.get(key) {
                println!("added chapter {}", chapter.id);
            }
            print_save_report("saved", &report);
        }
        Commands::Edit { id, title, text } => {
            if title.is_none() && text.is_none() {
                return Err(CliError::NothingToEdit);
            }
            let mut session = ctx.session();
            let key = session.find(id)?.ok_or(CliError::ChapterNotFound(id))?;
            if let Some(chapter) = session.get_mut(key) {
                if let Some(title) = title {
                    chapter.title = title;
                }
                if let Some(text) = text {
                    chapter.text = text;
                }
            }
            let report = session.save_changes()?;
            print_save_report("saved", &report);
        }
        Commands::Delete { id } => {
            let mut session = ctx.session();
            let key = session.find(id)?.ok_or(CliError::ChapterNotFound(id))?;
            session.remove(key)?;
            let report = session.save_changes()?;
            print_save_report("deleted", &report);
        }
        Commands::Rebuild => {
            let report = rebuild_chapter_fts(ctx.connection_mut())?;
            println!("re-indexed {} chapters", report.indexed);
        }
        Commands::TouchFirst => {
            let chapter = touch_first_chapter(&mut ctx)?;
            println!("chapter {} is now titled `{}`", chapter.id, chapter.title);
        }
        Commands::RemoveFirst => {
            let chapter = remove_first_chapter(&mut ctx)?;
            println!("removed chapter {} `{}`", chapter.id, chapter.title);
        }
    }

    Ok(())
}

fn load_settings(cli: &Cli, content_root: &std::path::Path) -> Result<AppSettings, ConfigError> {
    match &cli.config {
        Some(path) => AppSettings::load(path),
        None => AppSettings::load_or_default(content_root.join(SETTINGS_FILE_NAME)),
    }
}

fn print_catalog(ctx: &AppContext) {
    for outcome in run_catalog(ctx.connection()) {
        println!("# {}", outcome.label);
        println!("{}", outcome.description);
        match outcome.result {
            Ok(CatalogRows::Chapters(chapters)) => print_chapters(&chapters),
            Ok(CatalogRows::Hits(hits)) => print_hits(&hits),
            Ok(CatalogRows::Suggestions(suggestions)) => print_suggestions(&suggestions),
            Err(err) => println!("  error: {err}"),
        }
        println!();
    }
}

fn print_hits(hits: &[ChapterHit]) {
    if hits.is_empty() {
        println!("  (no matches)");
    }
    for hit in hits {
        let rank = hit
            .rank
            .map_or_else(|| "-".to_string(), |rank| format!("{rank:.4}"));
        println!("  [{}] rank={rank}", hit.rowid);
        println!("    Title: {}", hit.title);
        println!("    Text: {}", hit.text);
    }
}

fn print_suggestions(suggestions: &[SpellSuggestion]) {
    if suggestions.is_empty() {
        println!("  (no suggestions)");
    }
    for suggestion in suggestions {
        println!(
            "  Word: {} distance={} score={} rank={}",
            suggestion.word, suggestion.distance, suggestion.score, suggestion.rank
        );
    }
}

fn print_chapters(chapters: &[Chapter]) {
    if chapters.is_empty() {
        println!("  (no rows)");
    }
    for chapter in chapters {
        println!("  [{}] {}", chapter.id, chapter.title);
        println!("    {}", chapter.text);
    }
}

fn print_save_report(verb: &str, report: &SaveReport) {
    println!(
        "{verb}: rows={} indexed={} removed={} skipped={}",
        report.rows_written, report.fts.indexed, report.fts.removed, report.fts.skipped
    );
}
