mod crawler;
mod db;
mod error;
mod fetcher;
mod parser;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crawler::{CrawlSummary, Crawler};
use db::{ListFilter, Store};
use fetcher::HttpSource;
use parser::PageCeiling;
use settings::{CrawlSettings, Overrides};

#[derive(Parser)]
#[command(name = "vessel_crawler", about = "Crawl a vessel listing site into SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every (type, flag) combination and store new vessels
    Crawl {
        /// Vessel type code; repeat for several (default: from config)
        #[arg(short, long = "category")]
        categories: Vec<u32>,
        /// Two-letter flag code; repeat for several (default: from config)
        #[arg(short, long = "region")]
        regions: Vec<String>,
        /// Safety ceiling on pages per combination
        #[arg(long)]
        max_pages: Option<u32>,
        /// Only vessels built in or after this year
        #[arg(long)]
        min_year: Option<u32>,
        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show stored vessel counts
    Stats {
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// List stored vessels
    List {
        /// Filter by flag code (e.g. "ID")
        #[arg(short, long)]
        flag: Option<String>,
        /// Filter by vessel type code
        #[arg(short = 't', long = "type")]
        type_code: Option<u32>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
        /// One JSON object per line instead of a table
        #[arg(long)]
        json: bool,
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = CrawlSettings::load().context("Failed to load settings")?;

    let result = match cli.command {
        Commands::Crawl {
            categories,
            regions,
            max_pages,
            min_year,
            db,
        } => {
            let settings = settings.apply(Overrides {
                categories,
                regions,
                max_pages,
                min_year,
                db_path: db,
            })?;
            info!(settings = ?settings, "starting crawl");
            crawl(&settings).await
        }
        Commands::Stats { db } => {
            let store = open_store(db.unwrap_or(settings.db_path))?;
            let s = store.stats()?;
            println!("Total:    {}", s.total);
            println!("Latest:   {}", s.latest.as_deref().unwrap_or("-"));
            println!("\nBy type:");
            for (code, n) in &s.by_type {
                println!("  {:>5}  {}", code, n);
            }
            println!("\nBy flag:");
            for (code, n) in &s.by_flag {
                println!("  {:>5}  {}", code, n);
            }
            store.close()?;
            Ok(())
        }
        Commands::List {
            flag,
            type_code,
            limit,
            json,
            db,
        } => {
            let store = open_store(db.unwrap_or(settings.db_path))?;
            let filter = ListFilter {
                flag_code: flag,
                type_code,
            };
            let rows = store.list(&filter, limit)?;
            if rows.is_empty() {
                println!("No vessels found.");
            } else if json {
                for r in &rows {
                    println!("{}", serde_json::to_string(r)?);
                }
            } else {
                print_vessels(&rows);
            }
            store.close()?;
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn open_store(path: PathBuf) -> anyhow::Result<Store> {
    let store = Store::open(&path).with_context(|| format!("Failed to open {:?}", path))?;
    store.ensure_schema()?;
    Ok(store)
}

/// open → ensure schema → crawl → close. The store is closed even when the crawl fails.
async fn crawl(settings: &CrawlSettings) -> anyhow::Result<()> {
    let store = open_store(settings.db_path.clone())?;

    let outcome = run_crawl(settings, &store).await;
    let closed = store.close();

    let summary = outcome?;
    closed.context("Failed to close database")?;
    print_summary(&summary);
    Ok(())
}

async fn run_crawl(settings: &CrawlSettings, store: &Store) -> anyhow::Result<CrawlSummary> {
    let source = HttpSource::new(settings)?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let crawler = Crawler::new(source, store, settings)?.with_progress(pb);
    Ok(crawler.run().await?)
}

fn print_summary(summary: &CrawlSummary) {
    println!(
        "{:<6} | {:<4} | {:>11} | {:>5} | {:>8} | {:>5} | {:>9} | {:>6}",
        "Type", "Flag", "Ceiling", "Pages", "Inserted", "Dupes", "Malformed", "Failed"
    );
    println!("{}", "-".repeat(78));

    for r in &summary.reports {
        let ceiling = match r.ceiling {
            None => "no results".to_string(),
            Some(PageCeiling::Discovered(n)) => n.to_string(),
            Some(PageCeiling::Clamped { reported, limit }) => format!("{} of {}", limit, reported),
            Some(PageCeiling::Fallback(n)) => format!("{} (max)", n),
        };
        println!(
            "{:<6} | {:<4} | {:>11} | {:>5} | {:>8} | {:>5} | {:>9} | {:>6}",
            r.combo.category,
            r.combo.region,
            ceiling,
            r.pages_fetched,
            r.inserted,
            r.duplicates,
            r.malformed,
            r.persist_failed
        );
    }

    println!(
        "\n{} combinations, {} pages: {} new vessels ({} already known, {} malformed rows, {} failed writes).",
        summary.combinations,
        summary.pages,
        summary.inserted,
        summary.duplicates,
        summary.malformed,
        summary.persist_failed
    );
}

fn print_vessels(rows: &[db::StoredVessel]) {
    println!(
        "{:>3} | {:<9} | {:<24} | {:<18} | {:>5} | {:>7} | {:>7} | {:<9} | {:<4}",
        "#", "IMO", "Name", "Type", "Built", "GT", "DWT", "Size", "Flag"
    );
    println!("{}", "-".repeat(108));

    let num = |v: Option<i64>| v.map(|n| n.to_string()).unwrap_or_else(|| "-".into());
    for (i, row) in rows.iter().enumerate() {
        let r = &row.record;
        let size = format!("{} / {}", num(r.length), num(r.beam));
        println!(
            "{:>3} | {:<9} | {:<24} | {:<18} | {:>5} | {:>7} | {:>7} | {:<9} | {:<4}",
            i + 1,
            r.imo,
            truncate(&r.name, 24),
            truncate(r.vessel_type.as_deref().unwrap_or("-"), 18),
            num(r.build_year),
            num(r.gross_tonnage),
            num(r.deadweight),
            size,
            r.flag_code
        );
    }

    println!("\n{} vessels", rows.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn durations_are_human_readable() {
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn truncate_marks_cut_names() {
        assert_eq!(truncate("TUG", 5), "TUG");
        assert_eq!(truncate("KARYA PERMAI", 5), "KARYA...");
    }

    #[test]
    fn cli_accepts_repeated_filters() {
        let cli = Cli::try_parse_from([
            "vessel_crawler", "crawl", "-c", "401", "-c", "402", "-r", "ID", "--max-pages", "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Crawl {
                categories,
                regions,
                max_pages,
                ..
            } => {
                assert_eq!(categories, vec![401, 402]);
                assert_eq!(regions, vec!["ID"]);
                assert_eq!(max_pages, Some(3));
            }
            _ => panic!("expected crawl"),
        }
    }
}
