use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{anyhow, Result};
use bookclone::{BookCloner, CloneSummary, Config};
use clap::Parser;
use colored::*;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "bookclone")]
#[command(about = "CLI utility to clone a paginated online book into local images and a single PDF")]
#[command(version = "0.1.0")]
struct Args {
    /// URL of the book (prompted for when omitted)
    url: Option<String>,

    /// Directory holding one sub-directory of page images per book
    #[arg(short = 'i', long = "images-dir", default_value = "images")]
    images_dir: PathBuf,

    /// Directory the PDF is written to
    #[arg(short = 'o', long = "out-dir", default_value = ".")]
    out_dir: PathBuf,

    /// Maximum number of concurrent page downloads
    #[arg(short = 'c', long = "concurrency", default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..=100))]
    concurrency: u16,

    /// Fail when any page could not be downloaded
    #[arg(long = "strict")]
    strict: bool,

    /// Timeout for page existence checks in seconds
    #[arg(long = "probe-timeout", default_value = "5.0", value_parser = parse_timeout)]
    probe_timeout: f64,

    /// Timeout for page downloads in seconds
    #[arg(short = 't', long = "fetch-timeout", default_value = "30.0", value_parser = parse_timeout)]
    fetch_timeout: f64,

    /// Give up page detection beyond this many pages
    #[arg(long = "max-pages", default_value_t = 10_000)]
    max_pages: u32,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            image_root: self.images_dir.clone(),
            output_dir: self.out_dir.clone(),
            concurrency: usize::from(self.concurrency),
            probe_timeout: Duration::from_secs_f64(self.probe_timeout),
            fetch_timeout: Duration::from_secs_f64(self.fetch_timeout),
            max_pages: self.max_pages,
            strict: self.strict,
        }
    }
}

fn parse_timeout(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|_| "Not a number.")?;
    if value < 0.0 || !value.is_finite() {
        return Err("Must be zero or positive number.".to_string());
    }
    Ok(value)
}

fn prompt_url() -> Result<String> {
    print!("Enter book URL: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn run(args: Args) -> Result<()> {
    let url = match &args.url {
        Some(url) => url.trim().to_string(),
        None => prompt_url()?,
    };
    if url.is_empty() {
        return Err(anyhow!("No URL provided"));
    }

    let cloner = BookCloner::new(args.config())?;
    let summary = cloner.run(&url).await?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &CloneSummary) {
    let rule = "=".repeat(60);
    let book = &summary.book;

    println!();
    println!("{rule}");
    println!("{}", "PROCESS COMPLETE!".green().bold());
    println!("{rule}");
    println!("Book Name: {}", book.book_id().green());
    println!("PDF file created: {}", summary.composition.output_path.display().to_string().blue());
    println!("Images stored in: {}/", summary.image_dir.display().to_string().blue());
    println!("Total pages: {}", book.range().page_count());
    println!("Pages in PDF: {}", summary.composition.page_count());
    if summary.fetch.failed() > 0 {
        println!("{}", format!("Failed downloads: {}", summary.fetch.failed()).yellow());
    }
    if summary.composition.skipped_count() > 0 {
        println!("{}", format!("Skipped pages: {}", summary.composition.skipped_count()).yellow());
    }
    println!("{rule}");
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::from_default_env()
        .add_directive("bookclone=info".parse().expect("static directive"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{}", format!("Error: {}", e).red());
        process::exit(1);
    }
}
