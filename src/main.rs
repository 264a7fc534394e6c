//! CLI entry point for `mailsense`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailsense::ai::{enrich, events, ChatClient};
use mailsense::cache::EmailCache;
use mailsense::config::{self, Config};
use mailsense::export;
use mailsense::fetch::Fetcher;
use mailsense::gmail::{auth::TokenManager, GmailClient};
use mailsense::identity::{resolve, IdentityStore, ResolveOutcome};
use mailsense::model::EmailRecord;

#[derive(Parser)]
#[command(name = "mailsense", version, about = "AI-assisted Gmail CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new emails and merge them into the local cache
    Fetch {
        /// Maximum number of messages to retrieve
        #[arg(long)]
        max: Option<u32>,
    },
    /// List cached emails (newest first)
    List {
        /// Show at most N emails
        #[arg(long)]
        limit: Option<usize>,
    },
    /// View one email by index, unique ID, or ID prefix
    View {
        /// Index or identifier (e.g. `3` or `abcd1234`)
        identifier: Option<String>,
        /// Unique ID (equivalent to passing it positionally)
        #[arg(long)]
        id: Option<String>,
    },
    /// AI-enrich recent cached emails (classification, summary, sentiment)
    Analyze {
        /// Analyze at most N unanalyzed emails
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Print an AI-drafted reply for one email
    Reply {
        /// Index or identifier
        identifier: String,
    },
    /// Extract calendar events from one email
    Events {
        /// Index or identifier
        identifier: String,
        /// Write an .ics file instead of printing
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Export the cached snapshot
    Export {
        /// Output format
        #[arg(short, long, default_value = "json")]
        format: String,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        /// Export at most N emails
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// Network calls are I/O-bound and the core is sequential; one cooperative
// thread is all this tool needs.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Fetch { max } => cmd_fetch(&config, max).await,
        Commands::List { limit } => cmd_list(&config, limit),
        Commands::View { identifier, id } => {
            let token = identifier
                .or(id)
                .context("Provide an index, a unique ID, or --id <uniqueId>")?;
            cmd_view(&config, &token)
        }
        Commands::Analyze { limit } => cmd_analyze(&config, limit).await,
        Commands::Reply { identifier } => cmd_reply(&config, &identifier).await,
        Commands::Events { identifier, output } => {
            cmd_events(&config, &identifier, output.as_deref()).await
        }
        Commands::Export {
            format,
            output,
            limit,
        } => cmd_export(&config, &format, &output, limit),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::state_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailsense.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailsense", &mut std::io::stdout());
    Ok(())
}

/// Fetch new emails, merge, and show the resulting cache.
async fn cmd_fetch(config: &Config, max: Option<u32>) -> anyhow::Result<()> {
    let state_dir = config::state_dir(config);
    let identity = IdentityStore::new(&state_dir);
    let cache = EmailCache::new(&state_dir);
    let provider = GmailClient::new(TokenManager::from_config(config));
    let fetcher = Fetcher::new(&provider, &identity, &cache, &config.fetch.query);

    let max_results = max.unwrap_or(config.fetch.max_results);

    let pb = spinner("Fetching new messages");
    let outcome = fetcher.fetch_new(max_results).await?;
    pb.finish_and_clear();

    println!();
    println!(
        "  {} new message(s), {} cached total",
        outcome.new_count,
        outcome.emails.len()
    );
    print_email_table(config, &outcome.emails, Some(outcome.new_count.max(10)));
    Ok(())
}

/// List the cached set, newest first.
fn cmd_list(config: &Config, limit: Option<usize>) -> anyhow::Result<()> {
    let state_dir = config::state_dir(config);
    let cache = EmailCache::new(&state_dir);

    let mut emails = cache.load()?;
    if emails.is_empty() {
        println!("  No cached emails. Run `mailsense fetch` first.");
        return Ok(());
    }
    emails.sort_by(|a, b| b.date.cmp(&a.date));

    print_email_table(config, &emails, limit);
    Ok(())
}

/// View a single email.
fn cmd_view(config: &Config, token: &str) -> anyhow::Result<()> {
    let state_dir = config::state_dir(config);
    let cache = EmailCache::new(&state_dir);
    let identity = IdentityStore::new(&state_dir);

    let emails = cache.load()?;
    let mapping = identity.load()?;

    match resolve(token, &emails, &mapping) {
        ResolveOutcome::Found(email) => {
            print_email_detail(email);
            Ok(())
        }
        ResolveOutcome::NotFound => {
            anyhow::bail!("No email matches '{token}'. Try `mailsense list`.")
        }
        ResolveOutcome::Ambiguous(candidates) => {
            anyhow::bail!(
                "'{token}' matches several IDs:\n  {}",
                candidates.join("\n  ")
            )
        }
    }
}

/// AI-enrich the most recent unanalyzed emails and persist the cache.
async fn cmd_analyze(config: &Config, limit: usize) -> anyhow::Result<()> {
    let state_dir = config::state_dir(config);
    let cache = EmailCache::new(&state_dir);
    let generator = ChatClient::from_config(&config.ai)?;

    let mut emails = cache.load()?;
    if emails.is_empty() {
        println!("  No cached emails. Run `mailsense fetch` first.");
        return Ok(());
    }
    emails.sort_by(|a, b| b.date.cmp(&a.date));

    // Work on the newest unanalyzed records, in config-sized batches.
    let mut pending: Vec<EmailRecord> = emails
        .iter()
        .filter(|e| e.enrichment.is_empty())
        .take(limit)
        .cloned()
        .collect();
    if pending.is_empty() {
        println!("  Nothing to analyze; all recent emails are enriched.");
        return Ok(());
    }

    let pb = spinner("Analyzing emails");
    let mut filled = 0usize;
    for chunk in pending.chunks_mut(config.ai.batch_size.max(1)) {
        filled += enrich::enrich_batch(&generator, chunk, &config.ai).await?;
    }
    pb.finish_and_clear();

    // Fold enriched records back into the full snapshot.
    for enriched in &pending {
        if let Some(slot) = emails.iter_mut().find(|e| e.id == enriched.id) {
            slot.enrichment = enriched.enrichment.clone();
        }
    }
    cache.save(&emails)?;

    println!(
        "  Analyzed {} email(s) ({} from the model, {} defaulted)",
        pending.len(),
        filled,
        pending.len() - filled
    );
    Ok(())
}

/// Print an AI-drafted reply for one email, caching the draft.
async fn cmd_reply(config: &Config, token: &str) -> anyhow::Result<()> {
    let state_dir = config::state_dir(config);
    let cache = EmailCache::new(&state_dir);
    let identity = IdentityStore::new(&state_dir);

    let mut emails = cache.load()?;
    let mapping = identity.load()?;

    let target_id = match resolve(token, &emails, &mapping) {
        ResolveOutcome::Found(email) => email.id.clone(),
        ResolveOutcome::NotFound => anyhow::bail!("No email matches '{token}'."),
        ResolveOutcome::Ambiguous(candidates) => {
            anyhow::bail!(
                "'{token}' matches several IDs:\n  {}",
                candidates.join("\n  ")
            )
        }
    };

    let email = emails
        .iter()
        .find(|e| e.id == target_id)
        .expect("resolved email present")
        .clone();

    let draft = match email.enrichment.suggested_response.as_deref() {
        Some(cached) if !cached.is_empty() => cached.to_string(),
        _ => {
            let generator = ChatClient::from_config(&config.ai)?;
            let pb = spinner("Drafting reply");
            let draft = enrich::draft_reply(&generator, &email).await?;
            pb.finish_and_clear();

            if let Some(slot) = emails.iter_mut().find(|e| e.id == target_id) {
                slot.enrichment.suggested_response = Some(draft.clone());
            }
            cache.save(&emails)?;
            draft
        }
    };

    println!();
    println!("  Reply to: {} — {}", email.from, email.subject);
    println!();
    println!("{draft}");
    Ok(())
}

/// Extract calendar events from one email; print or write an ICS file.
async fn cmd_events(
    config: &Config,
    token: &str,
    output: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    let state_dir = config::state_dir(config);
    let cache = EmailCache::new(&state_dir);
    let identity = IdentityStore::new(&state_dir);

    let emails = cache.load()?;
    let mapping = identity.load()?;

    let email = match resolve(token, &emails, &mapping) {
        ResolveOutcome::Found(email) => email,
        ResolveOutcome::NotFound => anyhow::bail!("No email matches '{token}'."),
        ResolveOutcome::Ambiguous(candidates) => {
            anyhow::bail!(
                "'{token}' matches several IDs:\n  {}",
                candidates.join("\n  ")
            )
        }
    };

    let generator = ChatClient::from_config(&config.ai)?;
    let pb = spinner("Extracting events");
    let found = events::extract_events(&generator, email).await?;
    pb.finish_and_clear();

    if found.is_empty() {
        println!("  No events found in '{}'.", email.subject);
        return Ok(());
    }

    match output {
        Some(path) => {
            export::ics::export_ics(&found, path)?;
            println!("  Wrote {} event(s) to {}", found.len(), path.display());
        }
        None => {
            println!();
            for event in &found {
                let time = event.time.as_deref().unwrap_or("--:--");
                let location = event.location.as_deref().unwrap_or("-");
                println!("  {:<12} {:<6} {:<25} {}", event.date, time, event.title, location);
            }
            println!();
        }
    }
    Ok(())
}

/// Export the cached snapshot.
fn cmd_export(
    config: &Config,
    format: &str,
    output: &std::path::Path,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let state_dir = config::state_dir(config);
    let cache = EmailCache::new(&state_dir);

    let mut emails = cache.load()?;
    emails.sort_by(|a, b| b.date.cmp(&a.date));
    if let Some(n) = limit {
        emails.truncate(n);
    }

    match format {
        "json" => export::json::export_json(&emails, output)?,
        "markdown" | "md" => export::markdown::export_markdown(&emails, output)?,
        _ => anyhow::bail!("Unknown export format '{format}'. Supported: json, markdown"),
    }

    println!("  Exported {} email(s) to {}", emails.len(), output.display());
    Ok(())
}

/// Print emails as a human-readable table.
fn print_email_table(config: &Config, emails: &[EmailRecord], limit: Option<usize>) {
    let shown = limit.unwrap_or(emails.len()).min(emails.len());

    println!();
    println!(
        "  {:<5} {:<13} {:<17} {:<25} {:<35} {:<12}",
        "#", "ID", "Date", "From", "Subject", "Category"
    );
    println!("  {}", "-".repeat(110));

    for email in emails.iter().take(shown) {
        let index = email
            .assigned_index
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".into());
        let date = email.date.format(&config.general.date_format).to_string();
        let from: String = email.from.chars().take(24).collect();
        let subject: String = email.subject.chars().take(34).collect();

        println!(
            "  {:<5} {:<13} {:<17} {:<25} {:<35} {:<12}",
            index,
            email.short_unique_id(),
            date,
            from,
            subject,
            email.classification_or_default()
        );
    }
    if shown < emails.len() {
        println!("  ... and {} more (use --limit)", emails.len() - shown);
    }
    println!();
}

/// Print one email in full.
fn print_email_detail(email: &EmailRecord) {
    println!();
    println!("  {:<12} {}", "Index", email.assigned_index.map(|i| i.to_string()).unwrap_or_else(|| "-".into()));
    println!("  {:<12} {}", "ID", email.unique_id);
    println!("  {:<12} {}", "From", email.from);
    println!("  {:<12} {}", "To", email.to);
    println!("  {:<12} {}", "Date", email.date.format("%Y-%m-%d %H:%M"));
    println!("  {:<12} {}", "Subject", email.subject);

    if !email.enrichment.is_empty() {
        println!("  {:<12} {}", "Category", email.classification_or_default());
        if let Some(sentiment) = email.enrichment.sentiment.as_deref() {
            println!("  {:<12} {}", "Sentiment", sentiment);
        }
        if let Some(summary) = email.enrichment.summary.as_deref() {
            if !summary.is_empty() {
                println!("  {:<12} {}", "Summary", summary);
            }
        }
    }

    println!();
    println!("{}", email.body.trim());
    println!();
}
