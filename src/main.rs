use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use opti_query::compile::compile;
use opti_query::config::{load_from_path, QueryConfig};
use opti_query::dom::Document;
use opti_query::query::Matcher;
use scraper::ElementRef;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "opti-query")]
#[command(about = "Extended CSS selector queries over HTML documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the native selector and predicate table for a selector
    Compile {
        selector: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run a selector against an HTML file or every .html/.htm file in a directory
    Select {
        path: PathBuf,

        selector: String,

        /// Only report the first match per document
        #[arg(long)]
        first: bool,

        /// Query config (user style sheet, event bindings)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List the custom pseudo-classes
    Pseudo,
}

const PSEUDO_HELP: &[(&str, &str)] = &[
    ("::before", "marker, never filters (sets the before flag)"),
    ("::after", "marker, never filters (also sets the before flag)"),
    (":parent", "has a child element or non-blank text"),
    (":this-first-child", "first sibling matching the same compound"),
    (":this-last-child", "last sibling matching the same compound"),
    (":this-nth-child(n)", "n-th sibling matching the same compound"),
    (":inline-style(p=v;...)", "style attribute contains p:v"),
    (":external-style(p=v;...)", "author or user sheets declare p: v"),
    (":style(p=v;...)", "effective value of p is v"),
    (":hasText(a, b, ...)", "text content contains any of the strings"),
    (":has(s, ...)", "rewritten to :is(compound > s, ...)"),
    (":hidden", "display none, visibility hidden or opacity 0"),
    (":visible", "not :hidden"),
    (":event(a, b, ...)", "tagged with every listed event"),
];

#[derive(Serialize)]
struct MatchReport {
    file: String,
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    text: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Compile { selector, json } => cmd_compile(&selector, json),

        Commands::Select {
            path,
            selector,
            first,
            config,
            json,
        } => cmd_select(&path, &selector, first, config.as_deref(), json),

        Commands::Pseudo => cmd_pseudo(),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_compile(selector: &str, json: bool) -> Result<()> {
    let compiled = compile(selector)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&compiled)?);
        return Ok(());
    }

    println!("{} {}", "base:".bold(), compiled.base());
    if compiled.predicates().is_empty() {
        println!("{}", "no predicates".dimmed());
        return Ok(());
    }

    println!("{}", "predicates:".bold());
    for entry in compiled.predicates().entries() {
        let anchor: Vec<String> = entry.anchor.iter().map(usize::to_string).collect();
        println!(
            "  [{}] {} {}",
            anchor.join("."),
            entry.fragment.cyan(),
            serde_json::to_string(&entry.bag)?
        );
    }

    Ok(())
}

fn cmd_select(
    path: &Path,
    selector: &str,
    first: bool,
    config: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = match config {
        Some(path) => load_from_path(path)?,
        None => QueryConfig::default(),
    };

    let compiled = compile(selector)?;
    let matcher = Matcher::new(&compiled)?;

    let files = discover_documents(path)?;
    let mut reports = Vec::new();

    for file in &files {
        let markup = fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let mut document = Document::with_options(&markup, config.document_options());
        config.apply(&mut document)?;

        let found = if first {
            matcher.first(&document).into_iter().collect()
        } else {
            matcher.all(&document)
        };

        let file_label = file.display().to_string();
        if !json {
            print_matches(&file_label, &found);
        }
        reports.extend(found.iter().map(|element| report(&file_label, *element)));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!();
        println!(
            "{} {} match(es) in {} document(s)",
            if reports.is_empty() {
                "⊘".yellow()
            } else {
                "✓".green()
            },
            reports.len(),
            files.len()
        );
    }

    Ok(())
}

fn cmd_pseudo() -> Result<()> {
    println!("{}", "Custom pseudo-classes".bold());
    for (name, description) in PSEUDO_HELP {
        println!("  {:<28} {}", name.cyan(), description);
    }
    Ok(())
}

/// A single file, or every `.html`/`.htm` file under a directory (sorted).
fn discover_documents(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        anyhow::bail!("{} is neither a file nor a directory", path.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path) {
        let entry = entry?;
        let is_html = matches!(
            entry.path().extension().and_then(|s| s.to_str()),
            Some("html" | "htm")
        );
        if entry.file_type().is_file() && is_html {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();

    Ok(files)
}

fn print_matches(file: &str, found: &[ElementRef<'_>]) {
    if found.is_empty() {
        println!("{} {}", file.bold(), "(no matches)".dimmed());
        return;
    }

    println!("{}", file.bold());
    for element in found {
        let value = element.value();
        let mut label = value.name().to_string();
        if let Some(id) = value.id() {
            label.push('#');
            label.push_str(id);
        }
        for class in value.classes() {
            label.push('.');
            label.push_str(class);
        }
        println!("  {} {}", label.green(), excerpt(*element).dimmed());
    }
}

fn report(file: &str, element: ElementRef<'_>) -> MatchReport {
    let value = element.value();
    MatchReport {
        file: file.to_string(),
        tag: value.name().to_string(),
        id: value.id().map(str::to_string),
        classes: value.classes().map(str::to_string).collect(),
        text: excerpt(element),
    }
}

fn excerpt(element: ElementRef<'_>) -> String {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.chars().count() > 60 {
        format!("{}...", text.chars().take(57).collect::<String>())
    } else {
        text
    }
}
