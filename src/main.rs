// Entry point and high-level CLI flow.
//
// - `normalize` reads the defect workbook, exports the five-column table
//   and previews it.
// - `stats` writes the per-sheet statistics text and a JSON summary.
// - `report` runs the whole pipeline into a .docx template.
// - `photos` only embeds photos into an existing document.
use anyhow::{Context, Result};
use bridge_report::{
    config::ReportConfig,
    loader,
    output,
    pipeline,
    placeholders::PlaceholderValues,
    reports,
    util,
};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bridge-report", version, about = "Bridge bearing inspection report generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize the defect workbook and export it as CSV
    Normalize {
        /// Raw defect workbook (.xlsx/.xls/.ods)
        #[arg(long, env = "RAW_REPORT_PATH")]
        source: PathBuf,
        #[arg(short, long, default_value = "缺陷汇总_格式化.csv")]
        output: PathBuf,
        /// Rows shown in the console preview
        #[arg(long, default_value_t = 10)]
        preview: usize,
    },
    /// Write per-sheet defect statistics and a JSON summary
    Stats {
        #[arg(long, env = "RAW_REPORT_PATH")]
        source: PathBuf,
        #[arg(long, default_value = "缺陷统计报告.txt")]
        text: PathBuf,
        #[arg(long, default_value = "summary.json")]
        json: PathBuf,
    },
    /// Generate the inspection report from a template
    Report(ReportArgs),
    /// Embed photos into an existing report
    Photos {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, env = "STATIC_DIR")]
        assets: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ReportArgs {
    #[arg(long, env = "RAW_REPORT_PATH")]
    source: Option<PathBuf>,
    /// Pre-filtered five-column workbook used for table bodies
    #[arg(long, env = "REFER_FILE_OUT_PATH")]
    filtered: Option<PathBuf>,
    #[arg(long, env = "TEMPLATE_REPORT_PATH")]
    template: Option<PathBuf>,
    /// Defaults to `<project_name>_<timestamp>.docx`
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Directory searched for defect photos
    #[arg(long, env = "STATIC_DIR")]
    assets: Option<PathBuf>,
    /// JSON object with placeholder values
    #[arg(long)]
    values: Option<PathBuf>,
    /// One table row per observation instead of per workbook row
    #[arg(long)]
    dedup: bool,
}

fn handle_normalize(source: PathBuf, out: PathBuf, preview: usize) -> Result<()> {
    let (records, load) = loader::load_and_normalize(&source)
        .with_context(|| format!("loading {}", source.display()))?;
    println!(
        "Processing workbook... ({} sheets, {} rows, {} records)",
        load.sheets,
        util::format_int(load.total_rows as i64),
        util::format_int(records.len() as i64)
    );
    if load.blank_rows > 0 {
        println!("Note: {} blank rows skipped.", util::format_int(load.blank_rows as i64));
    }
    if load.unknown_components > 0 {
        println!(
            "Note: {} records could not be assigned a component.",
            util::format_int(load.unknown_components as i64)
        );
    }
    output::write_csv(&out, &records).with_context(|| format!("writing {}", out.display()))?;
    output::preview_table("Normalized defects", Some(&out.display().to_string()), &records, preview);
    Ok(())
}

fn handle_stats(source: PathBuf, text: PathBuf, json: PathBuf) -> Result<()> {
    let (records, _) = loader::load_and_normalize(&source)
        .with_context(|| format!("loading {}", source.display()))?;
    let summary = reports::generate_summary(&records);
    output::write_text(&text, &reports::sheet_statistics(&records))
        .with_context(|| format!("writing {}", text.display()))?;
    output::write_json(&json, &summary).with_context(|| format!("writing {}", json.display()))?;
    output::preview_table("Defects by category", None, &summary.categories, usize::MAX);
    println!(
        "Outputs saved: {} and {} ({} records, {} distinct).",
        text.display(),
        json.display(),
        util::format_int(summary.total_records as i64),
        util::format_int(summary.deduplicated_entries as i64)
    );
    Ok(())
}

fn handle_report(args: ReportArgs) -> Result<()> {
    let values = match &args.values {
        Some(path) => PlaceholderValues::from_json_file(path)
            .with_context(|| format!("reading placeholder values {}", path.display()))?,
        None => PlaceholderValues::default(),
    };
    let output = args.output.unwrap_or_else(|| {
        let project = values
            .text("project_name")
            .unwrap_or_else(|| "桥梁支座检查报告".to_string());
        PathBuf::from(format!("{}_{}.docx", project.trim(), util::timestamp(Local::now())))
    });
    let config = ReportConfig {
        source: args.source,
        filtered_source: args.filtered,
        template: args.template,
        output,
        asset_root: args.assets,
        dedup: args.dedup,
        ..ReportConfig::default()
    };

    let outcome = pipeline::generate_report(&config, &values).context("report generation failed")?;
    println!(
        "Report written to {} ({} records, {} placeholders replaced).",
        outcome.output.display(),
        util::format_int(outcome.summary.total_records as i64),
        outcome.placeholders_replaced
    );
    println!("Table {}: {:?}", config.structural_caption, outcome.structural_fill);
    println!("Table {}: {:?}", config.bearing_caption, outcome.bearing_fill);
    if let Some(photos) = outcome.photos {
        println!(
            "Photos: {} embedded, {} missing, {} failed.",
            photos.embedded,
            photos.missing.len(),
            photos.failed.len()
        );
    }
    Ok(())
}

fn handle_photos(input: PathBuf, assets: PathBuf, out: Option<PathBuf>) -> Result<()> {
    let out = out.unwrap_or_else(|| input.clone());
    let (written, report) = pipeline::overlay_document(&input, &assets, &out)
        .with_context(|| format!("embedding photos into {}", input.display()))?;
    println!(
        "Photos: {} of {} embedded into {}.",
        report.embedded,
        report.candidates,
        written.display()
    );
    for name in &report.missing {
        println!("  missing: {}", name);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Normalize {
            source,
            output,
            preview,
        } => handle_normalize(source, output, preview),
        Commands::Stats { source, text, json } => handle_stats(source, text, json),
        Commands::Report(args) => handle_report(args),
        Commands::Photos {
            input,
            assets,
            output,
        } => handle_photos(input, assets, output),
    }
}
