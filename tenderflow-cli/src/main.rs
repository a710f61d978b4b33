//! Command-line front end for the tenderflow scraping pipeline.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tenderflow::cancellation::ShutdownToken;
use tenderflow::config::ScraperConfig;
use tenderflow::models::{TenderStatus, TenderType};
use tenderflow::pipeline::{RunOptions, RunReport, RunStatus, ScrapePipeline};
use tenderflow::search::SearchFilters;
use tenderflow::storage::OutputFormat;

#[derive(Parser)]
#[command(name = "tenderflow")]
#[command(version, about = "Scrape procurement tenders into structured records")]
struct Cli {
    /// Maximum number of tenders to scrape (all available when omitted)
    #[arg(short, long)]
    limit: Option<usize>,

    /// Output filename, overriding the timestamped default
    #[arg(long, value_name = "FILE")]
    save_file: Option<String>,

    /// File output format
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    /// Concurrent browser surfaces (default: from config)
    #[arg(short, long)]
    concurrency: Option<u32>,

    /// Delay between requests in seconds (default: from config)
    #[arg(short, long)]
    rate_limit: Option<f64>,

    /// Run the browser with a visible window
    #[arg(long)]
    no_headless: bool,

    /// Run without saving data (for testing)
    #[arg(long)]
    dry_run: bool,

    /// Logging filter, e.g. `info` or `tenderflow=debug`
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Keep listing data only, skipping the detail pages
    #[arg(long)]
    no_details: bool,

    /// Search keyword to filter tenders
    #[arg(short, long)]
    search: Option<String>,

    /// Filter by tender status
    #[arg(long, value_enum)]
    status: Option<StatusArg>,

    /// Filter by tender type
    #[arg(long, value_enum)]
    tender_type: Option<TypeArg>,

    /// Filter by organization name
    #[arg(long)]
    organization: Option<String>,

    /// Minimum estimated value
    #[arg(long)]
    min_value: Option<f64>,

    /// Maximum estimated value
    #[arg(long)]
    max_value: Option<f64>,
}

/// Tender status filter accepted on the command line.
#[derive(ValueEnum, Clone, Copy, Debug)]
#[value(rename_all = "snake_case")]
enum StatusArg {
    InProgress,
    Closed,
    Awarded,
    Cancelled,
}

impl From<StatusArg> for TenderStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::InProgress => Self::InProgress,
            StatusArg::Closed => Self::Closed,
            StatusArg::Awarded => Self::Awarded,
            StatusArg::Cancelled => Self::Cancelled,
        }
    }
}

/// Tender type filter accepted on the command line.
#[derive(ValueEnum, Clone, Copy, Debug)]
#[value(rename_all = "snake_case")]
enum TypeArg {
    Goods,
    Works,
    Services,
}

impl From<TypeArg> for TenderType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Goods => Self::Goods,
            TypeArg::Works => Self::Works,
            TypeArg::Services => Self::Services,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = build_config(&cli);
    let options = build_options(&cli);
    log_filter_plan(&options.filters);

    let shutdown = Arc::new(ShutdownToken::new());
    let signal_token = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing the current tender");
            signal_token.trigger("User cancelled the operation");
        }
    });

    let pipeline = ScrapePipeline::new(config, shutdown);
    let report = pipeline.run(&options).await;

    if report.status == RunStatus::Completed {
        print_summary(&report);
    }
    std::process::exit(report.status.exit_code());
}

fn build_config(cli: &Cli) -> ScraperConfig {
    let mut config = ScraperConfig::default();
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(rate_limit) = cli.rate_limit {
        config.rate_limit_secs = rate_limit;
    }
    config.headless = !cli.no_headless;
    config
}

fn build_options(cli: &Cli) -> RunOptions {
    RunOptions {
        limit: cli.limit,
        scrape_details: !cli.no_details,
        dry_run: cli.dry_run,
        format: cli.format,
        save_file: cli.save_file.clone(),
        filters: build_filters(cli),
    }
}

fn build_filters(cli: &Cli) -> SearchFilters {
    SearchFilters {
        keyword: cli.search.clone(),
        organization: cli.organization.clone(),
        tender_type: cli.tender_type.map(TenderType::from),
        tender_status: cli.status.map(TenderStatus::from),
        min_value: cli.min_value,
        max_value: cli.max_value,
        ..SearchFilters::default()
    }
}

fn log_filter_plan(filters: &SearchFilters) {
    if let Some(keyword) = &filters.keyword {
        info!(keyword, "filtering by search keyword");
    }
    if let Some(status) = filters.tender_status {
        info!(status = %status, "filtering by tender status");
    }
    if let Some(tender_type) = filters.tender_type {
        info!(tender_type = %tender_type, "filtering by tender type");
    }
    if let Some(organization) = &filters.organization {
        info!(organization, "filtering by organization");
    }
    if filters.min_value.is_some() || filters.max_value.is_some() {
        let min = filters.min_value.unwrap_or(0.0);
        let max = filters
            .max_value
            .map_or_else(|| "unlimited".to_string(), |v| v.to_string());
        info!(min, max, "filtering by value range");
    }
}

fn print_summary(report: &RunReport) {
    let metadata = &report.metadata;
    let line = "=".repeat(70);

    println!("\n{line}");
    println!("SCRAPING SUMMARY");
    println!("{line}");
    println!("Run ID:              {}", metadata.run_id);
    println!(
        "Duration:            {:.2} seconds",
        metadata.duration_seconds.unwrap_or(0.0)
    );
    println!("Pages Visited:       {}", metadata.pages_visited);
    println!("Tenders Parsed:      {}", metadata.tenders_parsed);
    println!("Tenders Saved:       {}", metadata.tenders_saved);
    println!("Duplicates Removed:  {}", metadata.deduped_count);
    println!("Failures:            {}", metadata.failures);
    println!();
    println!("Tender Types:");
    for (tender_type, count) in &metadata.tender_types_processed {
        println!("  - {tender_type:<12} {count:>5} tenders");
    }
    println!();
    if let Some(output_file) = &metadata.output_file {
        println!("Output File:         {output_file}");
    }
    println!("{line}");

    if report.records.is_empty() {
        return;
    }
    let divider = "-".repeat(70);
    println!("\nSample Tenders (first 3):");
    println!("{divider}");
    for (idx, tender) in report.records.iter().take(3).enumerate() {
        println!("\n{}. Tender ID: {}", idx + 1, tender.tender_id);
        println!("   Title: {}...", truncate(&tender.title, 70));
        println!("   Organization: {}", tender.organization);
        println!("   Type: {}", tender.tender_type);
        println!(
            "   Closing Date: {}",
            tender.closing_date.as_deref().unwrap_or("N/A")
        );
        match tender.estimated_value {
            Some(value) => println!("   Value: Rs.{}", format_amount(value)),
            None => println!("   Value: N/A"),
        }
    }
    println!("{divider}");
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Renders an amount with thousands separators and two decimals.
fn format_amount(value: f64) -> String {
    let text = format!("{value:.2}");
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let (sign, digits) = int_part
        .strip_prefix('-')
        .map_or(("", int_part), |rest| ("-", rest));

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_scrape_everything_with_details() {
        let cli = Cli::try_parse_from(["tenderflow"]).expect("parse defaults");
        let options = build_options(&cli);

        assert_eq!(options.limit, None);
        assert!(options.scrape_details);
        assert!(!options.dry_run);
        assert_eq!(options.format, OutputFormat::Json);
        assert!(!options.filters.has_filters());
    }

    #[test]
    fn filter_flags_build_search_filters() {
        let cli = Cli::try_parse_from([
            "tenderflow",
            "--search",
            "road",
            "--status",
            "in_progress",
            "--tender-type",
            "works",
            "--min-value",
            "100000",
        ])
        .expect("parse filters");
        let filters = build_filters(&cli);

        assert_eq!(filters.keyword.as_deref(), Some("road"));
        assert_eq!(filters.tender_status, Some(TenderStatus::InProgress));
        assert_eq!(filters.tender_type, Some(TenderType::Works));
        assert_eq!(filters.min_value, Some(100_000.0));
        assert!(filters.has_filters());
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(Cli::try_parse_from(["tenderflow", "--status", "open"]).is_err());
    }

    #[test]
    fn unsupported_format_is_rejected() {
        assert!(Cli::try_parse_from(["tenderflow", "--format", "csv"]).is_err());
        assert!(Cli::try_parse_from(["tenderflow", "--format", "JSON"]).is_ok());
    }

    #[test]
    fn overrides_reach_the_config() {
        let cli = Cli::try_parse_from([
            "tenderflow",
            "-c",
            "5",
            "-r",
            "2.5",
            "--no-headless",
        ])
        .expect("parse overrides");
        let config = build_config(&cli);

        assert_eq!(config.concurrency, 5);
        assert_eq!(config.rate_limit_secs, 2.5);
        assert!(!config.headless);
    }

    #[test]
    fn amounts_group_thousands() {
        assert_eq!(format_amount(1_250_000.0), "1,250,000.00");
        assert_eq!(format_amount(950.5), "950.50");
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(-12_345.678), "-12,345.68");
    }

    #[test]
    fn titles_truncate_by_characters() {
        let long = "x".repeat(100);
        assert_eq!(truncate(&long, 70).len(), 70);
        assert_eq!(truncate("short", 70), "short");
    }
}
