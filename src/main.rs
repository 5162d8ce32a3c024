//! CLI entry point for `mailsift`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use mailsift::archive::{parse_archive, ParseOptions, ParseResult, ProgressUpdate};
use mailsift::reader::ArchiveSource;

#[derive(Parser)]
#[command(name = "mailsift", version)]
#[command(about = "Parse MBOX/OLM email archives and classify their contents")]
struct Cli {
    /// Archive file to parse (.mbox or .olm)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Detect service account sign-ups
    #[arg(long)]
    accounts: bool,

    /// Detect purchases
    #[arg(long)]
    purchases: bool,

    /// Detect subscriptions
    #[arg(long)]
    subscriptions: bool,

    /// Detect newsletters
    #[arg(long)]
    newsletters: bool,

    /// Run every detector
    #[arg(short, long)]
    all: bool,

    /// Skip contact extraction
    #[arg(long)]
    no_contacts: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = mailsift::config::load_config();
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    if !cli.file.exists() {
        anyhow::bail!("File not found: {}", cli.file.display());
    }
    let file_size = std::fs::metadata(&cli.file)?.len();

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}%")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let on_progress = |update: ProgressUpdate| {
        pb.set_message(update.message.clone());
        pb.set_position(update.progress as u64);
    };

    let options = ParseOptions {
        on_progress: Some(&on_progress),
        detect_accounts: cli.accounts || cli.all,
        detect_purchases: cli.purchases || cli.all,
        detect_subscriptions: cli.subscriptions || cli.all,
        detect_newsletters: cli.newsletters || cli.all,
        extract_contacts: !cli.no_contacts,
        config: config.parser.clone(),
        ..ParseOptions::new()
    };

    let start = Instant::now();
    let result = parse_archive(ArchiveSource::Path(cli.file.clone()), &options);
    pb.finish_and_clear();

    if let Some(ref error) = result.error {
        // Partial results may still be worth printing; surface the error last.
        eprintln!("warning: parse ended early: {error}");
    }

    if cli.json {
        print_result_json(&cli.file, file_size, &result)?;
    } else {
        print_result_table(&cli.file, file_size, &result, start.elapsed());
    }

    if result.error.is_some() && result.emails.is_empty() {
        anyhow::bail!("No records could be extracted from {}", cli.file.display());
    }
    Ok(())
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &mailsift::config::Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mailsift::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailsift.log");
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

/// Print a human-readable summary.
fn print_result_table(
    path: &Path,
    file_size: u64,
    result: &ParseResult,
    elapsed: std::time::Duration,
) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "File", path.display());
    println!("  {:<20} {}", "Size", format_size(file_size, BINARY));
    if let Some(format) = result.format {
        println!("  {:<20} {:?}", "Format", format);
    }
    println!("  {:<20} {}", "Emails", result.stats.email_count);
    println!("  {:<20} {}", "Dropped records", result.stats.dropped_records);
    println!("  {:<20} {}", "Contacts", result.stats.contact_count);
    if !result.calendar_events.is_empty() {
        println!("  {:<20} {}", "Calendar events", result.calendar_events.len());
    }
    println!("  {:<20} {:.2?}", "Elapsed", elapsed);

    if !result.accounts.is_empty() {
        println!();
        println!("  Account sign-ups:");
        for account in &result.accounts {
            println!(
                "    {:<30} {:<14} {} ({} emails)",
                account.service_name,
                account.service_type.as_str(),
                account.signup_date.format("%Y-%m-%d"),
                account.email_count
            );
        }
    }

    if !result.purchases.is_empty() {
        println!();
        println!("  Purchases:");
        for purchase in &result.purchases {
            println!(
                "    {:<30} {:>10.2} {} {} {}",
                purchase.merchant,
                purchase.amount,
                purchase.currency,
                purchase.purchase_date.format("%Y-%m-%d"),
                purchase.order_number.as_deref().unwrap_or("-")
            );
        }
    }

    if !result.subscriptions.is_empty() {
        println!();
        println!("  Subscriptions:");
        for sub in &result.subscriptions {
            println!(
                "    {:<30} {:>8.2} {} / {:<8} {}",
                sub.service_name,
                sub.monthly_amount,
                sub.currency,
                sub.frequency.as_str(),
                if sub.is_active { "active" } else { "lapsed" }
            );
        }
    }

    if !result.newsletters.is_empty() {
        println!();
        println!("  Newsletters:");
        for nl in &result.newsletters {
            println!(
                "    {:<30} {:<10} {} emails, last {}{}",
                nl.sender_name,
                nl.frequency.as_str(),
                nl.email_count,
                nl.last_email_date.format("%Y-%m-%d"),
                if nl.is_promotional { " (promotional)" } else { "" }
            );
        }
    }
    println!();
}

/// Print the full result as JSON.
fn print_result_json(path: &Path, file_size: u64, result: &ParseResult) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "file": path.to_string_lossy(),
        "file_size": file_size,
        "format": result.format,
        "stats": result.stats,
        "emails": result.emails,
        "contacts": result.contacts,
        "calendar_events": result.calendar_events,
        "accounts": result.accounts,
        "purchases": result.purchases,
        "subscriptions": result.subscriptions,
        "newsletters": result.newsletters,
        "error": result.error.as_ref().map(|e| e.to_string()),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
