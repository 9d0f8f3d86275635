use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use bookscanner::notion::{NotionClient, UpsertOutcome};
use bookscanner::pipeline::{Resolution, Resolver};
use bookscanner::record::Field;
use bookscanner::{config, isbn, providers, server};

#[derive(Parser, Debug)]
#[command(
    name = "bookscanner",
    version,
    about = "Look up book metadata by ISBN from OpenBD, Google Books, and Rakuten Books"
)]
struct Cli {
    /// ISBN-10 or ISBN-13 codes (hyphens allowed)
    #[arg(value_name = "ISBN")]
    isbns: Vec<String>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// File each resolved book into the configured Notion database
    #[arg(long)]
    add: bool,

    /// Keep provider cover URLs as-is instead of screening and re-hosting them
    #[arg(long = "no-cover")]
    no_cover: bool,

    /// Run the HTTP API instead of looking up ISBNs
    #[arg(long)]
    serve: bool,

    /// Address for --serve (default: server.bind from config)
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    let mut config = config::Config::load(cli.config.as_deref())?;
    config.apply_env();
    if cli.no_cover {
        config.cover.enabled = false;
    }

    // Handle --serve
    if cli.serve {
        let bind = cli.bind.clone().unwrap_or_else(|| config.server.bind.clone());
        return server::serve(&config, &bind).await;
    }

    if cli.isbns.is_empty() {
        anyhow::bail!("No ISBN specified. Use --help for usage.");
    }

    if cli.add && !config.notion.is_configured() {
        anyhow::bail!(
            "--add needs a Notion token and database ID. Set notion.token and notion.database_id in config.json, or NOTION_TOKEN and NOTION_DATABASE_ID."
        );
    }

    let resolver = Resolver::from_config(&config)?;
    if resolver.provider_names().is_empty() {
        anyhow::bail!(
            "No metadata providers enabled. Run `bookscanner-cli --init` to create a config file."
        );
    }
    log::info!("Provider chain: {}", resolver.provider_names().join(" → "));

    let notion = if cli.add {
        let client = providers::http_client(&config.http)?;
        Some(NotionClient::new(client, &config.notion))
    } else {
        None
    };

    let total = cli.isbns.len();
    let mut results = Vec::new();
    let mut resolved = 0;

    for (i, raw) in cli.isbns.iter().enumerate() {
        log::info!("[{}/{}] Looking up: {raw}", i + 1, total);

        let key = match isbn::canonical(raw) {
            Ok(key) => key,
            Err(e) => {
                log::error!("  {raw}: {e}");
                results.push(serde_json::json!({ "input": raw, "error": e.to_string() }));
                continue;
            }
        };

        let resolution = match resolver.resolve_detailed(&key).await {
            Ok(r) => r,
            Err(e) => {
                log::error!("  {e}");
                results.push(serde_json::json!({ "input": raw, "isbn": key, "error": e.to_string() }));
                continue;
            }
        };

        resolved += 1;

        let mut outcome = None;
        if let Some(ref notion) = notion {
            match notion.upsert(&resolution.record, None).await {
                Ok(o) => {
                    match &o {
                        UpsertOutcome::Created(id) => log::info!("  Notion: created page {id}"),
                        UpsertOutcome::Updated(id) => log::info!("  Notion: updated page {id}"),
                    }
                    outcome = Some(o);
                }
                Err(e) => {
                    log::error!("  Notion upsert failed: {e:#}");
                }
            }
        }

        if !cli.json {
            print_record(&resolution);
        }

        results.push(serde_json::json!({
            "input": raw,
            "isbn": key,
            "record": resolution.record,
            "sources": resolution
                .contributions
                .iter()
                .map(|c| serde_json::json!({
                    "provider": c.provider,
                    "fields": c.fields.iter().map(|f| f.name()).collect::<Vec<_>>(),
                }))
                .collect::<Vec<_>>(),
            "original_cover": resolution.original_cover,
            "notion": outcome,
        }));
    }

    // JSON output
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    log::info!("Done: {resolved} resolved, {} not found out of {total}", total - resolved);

    Ok(())
}

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (tag column width + " : " = 25 chars + 2 leading spaces).
const INDENT: &str = "                           ";

/// Print the merged record with the provider that supplied each field.
fn print_record(resolution: &Resolution) {
    let record = &resolution.record;

    println!();
    println!("{BOLD}ISBN:{RESET} {}", record.isbn);
    println!("  {DIM}{}{RESET}", "─".repeat(72));

    for field in Field::ALL {
        let value = record.get(field);
        if value.is_empty() {
            print_missing(field.name());
            continue;
        }
        let source = resolution
            .contributions
            .iter()
            .find(|c| c.fields.contains(&field))
            .map(|c| c.provider.as_str());
        print_row(field.name(), value);
        if let Some(source) = source {
            println!("  {DIM}{INDENT}({source}){RESET}");
        }
    }

    if let Some(ref original) = resolution.original_cover {
        if original != &record.cover {
            println!("  {DIM}{}{RESET}", "─".repeat(72));
            print_row("original cover", original);
            println!("  {GREEN}{:<22} : {}{RESET}", "cover", record.cover);
        }
    }

    println!("  {DIM}{}{RESET}", "─".repeat(72));
    println!();
}

/// Print a blank field row (dimmed).
fn print_missing(tag: &str) {
    let tag_col = format!("{:<22}", tag);
    println!("  {DIM}{tag_col} : (none){RESET}");
}

/// Print a single row in the record table.
fn print_row(tag: &str, val: &str) {
    let tag_col = format!("{:<22}", tag);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {tag_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width.
///
/// Text without spaces (Japanese titles, summaries) is split by character count.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        for chunk in split_long(word, max_width) {
            if current_line.is_empty() {
                current_line = chunk;
            } else if current_line.chars().count() + 1 + chunk.chars().count() <= max_width {
                current_line.push(' ');
                current_line.push_str(&chunk);
            } else {
                lines.push(current_line);
                current_line = chunk;
            }
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}

fn split_long(word: &str, max_width: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(max_width.max(1))
        .map(|c| c.iter().collect())
        .collect()
}
