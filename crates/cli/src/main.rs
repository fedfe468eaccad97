//! CLI tool for converting a ZIP of PowerPoint files into a ZIP of PDFs.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use ppt_pdf_core::{
    BatchOptions, ConvertOptions, Pipeline, PipelineConfig, PipelineEvent, RunReport,
    PACKAGE_NAME,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Convert every PowerPoint file in a ZIP archive to PDF.
#[derive(Parser, Debug)]
#[command(name = "ppt2pdf")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// ZIP archive containing .ppt, .pptx or .pptm files (searched recursively)
    input: PathBuf,

    /// Where to write the PDF package (default: PDFs.zip next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to the LibreOffice soffice executable (default: search the system)
    #[arg(long, env = "PPT2PDF_SOFFICE")]
    soffice: Option<PathBuf>,

    /// Seconds allowed for each file before its conversion is abandoned
    #[arg(short, long, env = "PPT2PDF_TIMEOUT", default_value = "240")]
    timeout: u64,

    /// Number of files converted at the same time
    #[arg(short, long, env = "PPT2PDF_JOBS", default_value = "1")]
    jobs: usize,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Keep the scratch directory instead of deleting it
    #[arg(long)]
    keep_scratch: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let pipeline = Pipeline::new(build_config(&args));
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
        .progress_chars("#>-");

    let mut progress: Option<ProgressBar> = None;
    let report = pipeline
        .run_with_events(&args.input, |event| match event {
            PipelineEvent::Classified(classification) => {
                if !args.json {
                    println!("{}", "Files to convert:".bold());
                    if classification.accepted.is_empty() {
                        println!("  {}", "(none)".red());
                    }
                    for doc in &classification.accepted {
                        println!("  - {}", doc.name);
                    }
                    if !classification.rejected.is_empty() {
                        println!("{}", "Excluded (not PPT/PPTX/PPTM):".dimmed());
                        for path in &classification.rejected {
                            println!("  - {}", path.display().to_string().dimmed());
                        }
                    }
                }

                if classification.is_empty() {
                    return;
                }
                let pb = ProgressBar::new(classification.accepted.len() as u64);
                pb.set_style(style.clone());
                pb.set_message("Converting...");
                progress = Some(pb);
            }
            PipelineEvent::Progress(p) => {
                if let Some(pb) = &progress {
                    pb.set_position(p.completed as u64);
                    pb.set_message(p.document.clone());
                }
            }
        })
        .with_context(|| format!("Failed to convert {}", args.input.display()));

    if let Some(pb) = progress.take() {
        pb.finish_and_clear();
    }
    let report = report?;

    let output_path = get_output_path(&args.input, args.output.as_deref());
    log::debug!(
        "Writing {} PDFs to {}",
        report.batch.succeeded,
        output_path.display()
    );
    report
        .write_package(&output_path)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, &output_path);
    }

    Ok(())
}

/// Translate command-line flags into pipeline configuration.
fn build_config(args: &Args) -> PipelineConfig {
    let mut config = PipelineConfig::new()
        .with_convert_options(
            ConvertOptions::new().with_timeout(Duration::from_secs(args.timeout)),
        )
        .with_batch_options(BatchOptions::new().with_workers(args.jobs))
        .with_keep_scratch(args.keep_scratch);

    if let Some(soffice) = &args.soffice {
        config = config.with_engine_path(soffice);
    }

    config
}

/// Determine where the PDF package is written.
fn get_output_path(input: &Path, output: Option<&Path>) -> PathBuf {
    match output {
        Some(path) => path.to_path_buf(),
        None => match input.parent() {
            Some(parent) => parent.join(PACKAGE_NAME),
            None => PathBuf::from(PACKAGE_NAME),
        },
    }
}

fn print_summary(report: &RunReport, output_path: &Path) {
    let batch = &report.batch;
    let tally = format!("{} converted", batch.tally());

    if batch.has_failures() {
        println!("\n{} {}", "Finished with errors:".yellow().bold(), tally);
        println!("{}", "Some files failed to convert:".red().bold());
        for message in batch.failure_messages() {
            println!("\n{}", message);
        }
        println!();
    } else {
        println!("\n{} {}", "Done!".green().bold(), tally);
    }

    println!("{} {}", "Saved to".green(), output_path.display());

    if let Some(scratch) = &report.scratch_dir {
        println!("{} {}", "Scratch kept at".dimmed(), scratch.display());
    }
}
