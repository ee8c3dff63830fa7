use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::Value as Json;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tagsieve::config::SieveConfig;
use tagsieve::dsl::{Compiler, Predicate};
use tagsieve::pipeline::{FilterOptions, FilterStats, run_filter};
use tagsieve::records::TagSource;
use tagsieve::sinks::{DataSink, JsonlSink};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Query to apply, e.g. `fan, -"drama", .rating >= 4`
    #[arg(short, long, env = "TAGSIEVE_QUERY")]
    pub query: Option<String>,

    /// Configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Input JSON Lines file, or - for stdin
    #[arg(short, long, default_value = "-")]
    pub input: PathBuf,

    /// Output JSON Lines file, or - for stdout
    #[arg(short, long, default_value = "-")]
    pub output: PathBuf,

    /// Record field holding the tags (dotted for nested objects)
    #[arg(long)]
    pub tags_field: Option<String>,

    /// Separator used when the tags field is a single string
    #[arg(long)]
    pub separator: Option<String>,

    /// Maximum parenthesis nesting accepted in the query
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Records evaluated together on the thread pool
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Number of threads (default: all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Only parse and compile the query, printing its canonical form
    #[arg(long)]
    pub check: bool,

    /// Print the number of matching records instead of the records
    #[arg(long)]
    pub count: bool,

    /// Log and drop records that fail to evaluate instead of aborting
    #[arg(long)]
    pub skip_errors: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Merge the config file (if any) with command-line overrides.
pub fn resolve_config(cli: &Cli) -> Result<SieveConfig> {
    let mut config = match &cli.config {
        Some(path) => SieveConfig::load(path)
            .with_context(|| format!("Config: Failed to load {:?}", path))?,
        None => SieveConfig::default(),
    };

    if let Some(query) = &cli.query {
        config.query = Some(query.clone());
    }
    if let Some(field) = &cli.tags_field {
        config.tags.field = field.clone();
    }
    if let Some(separator) = &cli.separator {
        config.tags.separator = separator.clone();
    }
    if let Some(max_depth) = cli.max_depth {
        config.max_depth = max_depth;
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }

    Ok(config)
}

/// Build the record compiler: field paths over JSON, tags from `source`.
pub fn record_compiler(source: TagSource, max_depth: usize) -> Compiler<Json> {
    Compiler::new()
        .with_tags(move |record: &Json| source.extract(record))
        .with_max_depth(max_depth)
}

pub fn compile_query(config: &SieveConfig) -> Result<Predicate<Json>> {
    let Some(query) = config.query.as_deref() else {
        bail!("CLI: No query given; use --query or set `query` in the config file");
    };

    let compiler = record_compiler(config.tags.clone(), config.max_depth);
    let predicate = compiler.compile(query).context("CLI: Invalid query")?;
    if !predicate.is_boolean() {
        bail!(
            "CLI: Query `{}` produces a value, not a match; add a comparison",
            predicate.source()
        );
    }
    Ok(predicate)
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    if path == Path::new("-") {
        tracing::info!("Input: stdin");
        return Ok(Box::new(BufReader::new(std::io::stdin())));
    }
    tracing::info!("Input: {:?}", path);
    let file = File::open(path).with_context(|| format!("Input: Failed to open {:?}", path))?;
    Ok(Box::new(BufReader::new(file)))
}

fn init_sink(cli: &Cli) -> Result<Box<dyn DataSink>> {
    if cli.count {
        return Ok(Box::new(JsonlSink::from_writer(Box::new(std::io::sink()))));
    }
    if cli.output == Path::new("-") {
        tracing::info!("Sink: jsonl -> stdout");
        return Ok(Box::new(JsonlSink::stdout()));
    }
    tracing::info!("Sink: jsonl -> {:?}", cli.output);
    let sink = JsonlSink::new(&cli.output)
        .with_context(|| format!("Sink: Failed to create {:?}", cli.output))?;
    Ok(Box::new(sink))
}

/// Run the filter described by `cli`.
pub fn run(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let predicate = compile_query(&config)?;

    if cli.check {
        println!("{}", predicate.source());
        return Ok(());
    }

    tracing::info!(
        "Query: {} (tags from `{}` split on {:?})",
        predicate.source(),
        config.tags.field,
        config.tags.separator
    );

    let options = FilterOptions {
        batch_size: config.batch_size,
        skip_errors: cli.skip_errors,
        progress: cli.verbose,
    };

    let input = open_input(&cli.input)?;
    let sink = init_sink(cli)?;
    let start = std::time::Instant::now();
    let FilterStats {
        read,
        kept,
        skipped,
    } = run_filter(input, &predicate, sink, &options)?;

    if cli.count {
        println!("{}", kept);
    }

    let elapsed = start.elapsed();
    tracing::info!(
        "Done! Kept {} of {} records ({} skipped) in {:.2}s",
        kept,
        read,
        skipped,
        elapsed.as_secs_f64()
    );

    Ok(())
}
