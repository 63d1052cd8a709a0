use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use context_indexer::{
    build_index, verify_index, DocsLayout, IndexerError, SectionIndex, SectionType,
};
use context_protocol::{serialize_json_pretty, DefaultBudgets, ErrorCode, ErrorEnvelope};
use context_search::{render_markdown, retrieve, RetrievalRequest, SearchError};
use report::{CheckSummary, IndexSummary};
use std::io;
use std::path::{Path, PathBuf};

mod report;

/// Exit code for `check` when indexed sections no longer match their sources.
pub const DRIFT_EXIT_CODE: i32 = 2;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "context-docs")]
#[command(about = "Index and retrieve generated project documentation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root (defaults to current directory)
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for output)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the section index from the docs directory and manifest
    Index,

    /// Retrieve budget-bounded context for a query
    Query(QueryArgs),

    /// Report indexed sections whose source text changed since the build
    Check,
}

#[derive(Args)]
struct QueryArgs {
    /// Free-text query
    query: String,

    /// Only sections of this type
    #[arg(long = "type", value_parser = parse_section_type)]
    section_type: Option<SectionType>,

    /// Only sections carrying this tag (repeatable; all must match)
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Explicit route (repeatable; replaces derived routes)
    #[arg(long = "route")]
    routes: Vec<String>,

    /// Escalation level override (clamped to 1..=3)
    #[arg(long)]
    level: Option<u8>,

    /// Include recent state-log entries
    #[arg(long)]
    include_state: bool,

    /// Maximum number of ranked sections
    #[arg(long, short = 'n', default_value_t = DefaultBudgets::default().limit)]
    limit: usize,

    /// Shared word budget
    #[arg(long, default_value_t = DefaultBudgets::default().max_words)]
    max_words: usize,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

fn parse_section_type(raw: &str) -> std::result::Result<SectionType, String> {
    SectionType::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = SectionType::ALL.iter().map(|kind| kind.as_str()).collect();
        format!("unknown section type `{raw}` (expected one of: {})", known.join(", "))
    })
}

pub async fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON consumers
    let json_output = match &cli.command {
        Commands::Index | Commands::Check => true,
        Commands::Query(args) => args.json,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let outcome = match cli.command {
        Commands::Index => run_index(&cli.root).await,
        Commands::Query(args) => run_query(&cli.root, args).await,
        Commands::Check => run_check(&cli.root).await,
    };

    match outcome {
        Ok(code) if code != 0 => std::process::exit(code),
        Ok(_) => Ok(()),
        Err(err) if json_output => {
            print_stdout(&serialize_json_pretty(&envelope_for(&err))?)?;
            std::process::exit(1);
        }
        Err(err) => Err(err),
    }
}

async fn resolve_layout(root: &Path) -> Result<DocsLayout> {
    let root = root.canonicalize().context("Invalid project path")?;
    Ok(DocsLayout::resolve(root).await)
}

async fn run_index(root: &Path) -> Result<i32> {
    let layout = resolve_layout(root).await?;
    let report = build_index(&layout)
        .await
        .context("Failed to build the section index")?;
    print_stdout(&serialize_json_pretty(&IndexSummary::from_report(report))?)?;
    Ok(0)
}

async fn run_query(root: &Path, args: QueryArgs) -> Result<i32> {
    let layout = resolve_layout(root).await?;
    let request = RetrievalRequest {
        query: args.query,
        type_filter: args.section_type,
        tags: args.tags,
        routes: (!args.routes.is_empty()).then_some(args.routes),
        escalation: args.level,
        include_state: args.include_state,
        limit: args.limit,
        max_words: args.max_words,
    };
    let response = retrieve(&layout, &request).await?;
    if args.json {
        print_stdout(&serialize_json_pretty(&response)?)?;
    } else {
        print_stdout(render_markdown(&response).trim_end())?;
    }
    Ok(0)
}

async fn run_check(root: &Path) -> Result<i32> {
    let layout = resolve_layout(root).await?;
    let index = SectionIndex::load(&layout.index_path()).await?;
    let drift = verify_index(&layout.root, &index).await;
    let summary = CheckSummary::new(index.len(), drift);
    print_stdout(&serialize_json_pretty(&summary)?)?;
    Ok(if summary.has_drift() { DRIFT_EXIT_CODE } else { 0 })
}

fn envelope_for(err: &anyhow::Error) -> ErrorEnvelope {
    if let Some(search) = err.downcast_ref::<SearchError>() {
        return search.to_envelope();
    }
    if let Some(indexer) = err.downcast_ref::<IndexerError>() {
        return match indexer {
            IndexerError::IndexMissing(path) => {
                ErrorEnvelope::new(ErrorCode::IndexMissing, indexer.to_string())
                    .with_details(serde_json::json!({ "path": path.display().to_string() }))
                    .with_hint("run `context-docs index` first")
            }
            IndexerError::Structural(structural) => {
                ErrorEnvelope::new(ErrorCode::Structural, structural.to_string())
                    .with_hint("regenerate the docs so markers and manifest agree")
            }
            _ => ErrorEnvelope::new(ErrorCode::Internal, format!("{err:#}")),
        };
    }
    ErrorEnvelope::new(ErrorCode::Internal, format!("{err:#}"))
}
