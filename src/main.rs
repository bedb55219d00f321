use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use quote_engine::{
    get_events_for_quote, insert_quote, list_quotes, load_sources, open_ledger, EngineConfig,
    KnowledgeStore, QuoteEngine, QuoteRequest, SourceSpec,
};

const USAGE: &str = "\
Usage:
  quote-engine quote <request.json> [--source SPEC]... [--db PATH] [--config PATH] [--json]
  quote-engine lookup <SKU> [--source SPEC]... [--config PATH]
  quote-engine conflicts [--source SPEC]... [--config PATH]
  quote-engine history [--db PATH]

SPEC is `catalog.json` or `price_list.csv@id:priority`.";

const DEFAULT_LEDGER: &str = "quotes.db";

/// Flags shared by every command
#[derive(Debug, Default, PartialEq)]
struct CliOptions {
    positional: Vec<String>,
    sources: Vec<SourceSpec>,
    db: Option<PathBuf>,
    config: Option<PathBuf>,
    json: bool,
}

fn parse_options(args: &[String]) -> Result<CliOptions> {
    let mut options = CliOptions::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--source" => {
                let spec = iter.next().context("--source needs a value")?;
                options.sources.push(SourceSpec::parse(spec)?);
            }
            "--db" => {
                let path = iter.next().context("--db needs a value")?;
                options.db = Some(PathBuf::from(path));
            }
            "--config" => {
                let path = iter.next().context("--config needs a value")?;
                options.config = Some(PathBuf::from(path));
            }
            "--json" => options.json = true,
            flag if flag.starts_with("--") => bail!("unknown flag {}\n\n{}", flag, USAGE),
            value => options.positional.push(value.to_string()),
        }
    }

    Ok(options)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(command) = args.get(1) else {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    };
    let options = parse_options(&args[2..])?;

    match command.as_str() {
        "quote" => run_quote(&options),
        "lookup" => run_lookup(&options),
        "conflicts" => run_conflicts(&options),
        "history" => run_history(&options),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("unknown command `{}`\n\n{}", other, USAGE),
    }
}

/// Config, then sources; price invariants are checked on load
fn build_engine(options: &CliOptions) -> Result<QuoteEngine> {
    if options.sources.is_empty() {
        bail!("at least one --source is required\n\n{}", USAGE);
    }

    let config = EngineConfig::load_from(options.config.as_deref())
        .context("Failed to load configuration")?;
    let sources = load_sources(&options.sources).context("Failed to load knowledge sources")?;

    let engine = QuoteEngine::new(config, KnowledgeStore::new());
    let snapshot = engine.reload(sources)?;

    println!("📚 Loaded {} knowledge sources (generation {})", snapshot.sources().len(), snapshot.generation);
    for source in snapshot.sources() {
        println!(
            "   • {} (priority {}, {} products{})",
            source.id,
            source.priority,
            source.product_count(),
            source
                .version
                .as_deref()
                .map(|v| format!(", version {}", v))
                .unwrap_or_default()
        );
    }

    Ok(engine)
}

fn run_quote(options: &CliOptions) -> Result<()> {
    let request_path = options
        .positional
        .first()
        .context("quote needs a request file")?;

    let content = std::fs::read_to_string(request_path)
        .with_context(|| format!("Failed to read request {}", request_path))?;
    let request: QuoteRequest = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse request {}", request_path))?;

    let engine = build_engine(options)?;

    println!("\n🧮 Computing quote...");
    let quote = engine.quote(&request)?;

    if !quote.conflicts.is_empty() {
        println!("\n⚠️  {} knowledge conflicts (canonical values used):", quote.conflicts.len());
        for c in &quote.conflicts {
            println!(
                "   {} {}: {} ({}) vs {} ({})",
                c.entity, c.field, c.canonical_value, c.canonical_source, c.value, c.source_id
            );
        }
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&quote)?);
    } else {
        println!("\n{}", quote.render_text()?);
    }

    let db_path = options
        .db
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER));
    let conn = open_ledger(&db_path)?;
    let stored = insert_quote(&conn, &quote, "cli")?;

    println!("✅ Quote verified and stored as {}", stored.id);
    println!("   Ledger: {}", db_path.display());

    Ok(())
}

fn run_lookup(options: &CliOptions) -> Result<()> {
    let sku = options.positional.first().context("lookup needs a SKU")?;
    let engine = build_engine(options)?;

    let resolved = engine.lookup_product(sku)?;
    let product = &resolved.value;

    println!("\n🔎 {} - {}", product.sku, product.name);
    println!("   Category:      {}", product.category.as_str());
    println!("   Family:        {} ({} mm)", product.family, product.thickness_mm);
    println!("   Unit basis:    {}", product.unit_basis.as_str());
    println!("   Price excl:    {}", product.price_excl_tax);
    println!("   Price incl:    {}", product.price_incl_tax);
    println!(
        "   Source:        {} (priority {}, generation {})",
        resolved.provenance.source_id, resolved.provenance.priority, resolved.provenance.generation
    );

    if !resolved.conflicts.is_empty() {
        println!("\n⚠️  Conflicting values in lower-priority sources:");
        for c in &resolved.conflicts {
            println!("   {}: {} in {}", c.field, c.value, c.source_id);
        }
    }

    Ok(())
}

fn run_conflicts(options: &CliOptions) -> Result<()> {
    let engine = build_engine(options)?;
    let conflicts = engine.conflict_report();

    if conflicts.is_empty() {
        println!("\n✅ No conflicts between sources");
        return Ok(());
    }

    println!("\n⚠️  {} conflicts:", conflicts.len());
    for c in &conflicts {
        println!(
            "   {:<16} {:<16} {} = {:<10} | {} = {}",
            c.entity, c.field, c.canonical_source, c.canonical_value, c.source_id, c.value
        );
    }

    Ok(())
}

fn run_history(options: &CliOptions) -> Result<()> {
    let db_path = options
        .db
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER));
    let conn = open_ledger(&db_path)?;

    let quotes = list_quotes(&conn, 50)?;
    println!("🗄️  {} stored quotes in {}", quotes.len(), db_path.display());

    for q in &quotes {
        let events = get_events_for_quote(&conn, &q.id)?;
        println!(
            "   {} {} {:>12} gen {} {} ({} events)",
            q.issued_at.format("%Y-%m-%d %H:%M"),
            q.id,
            q.grand_total,
            q.generation,
            q.reference.as_deref().unwrap_or("-"),
            events.len()
        );
    }

    Ok(())
}
