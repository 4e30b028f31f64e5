mod config;
mod docs;
mod parser;
mod source;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{PartPolicy, Settings};
use crate::docs::Document;
use crate::parser::extract::person::Gender;

#[derive(Parser)]
#[command(name = "roster_indexer", about = "Turn a physician scheduling workbook into search documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a workbook and write department, part and physician documents
    Convert {
        #[command(flatten)]
        input: InputArgs,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
        /// Output file name without extension (default: input file stem)
        #[arg(long)]
        stem: Option<String>,
        #[arg(long, value_enum, default_value = "both")]
        format: Format,
        /// Stamp every document with the ingestion time
        #[arg(long)]
        stamp: bool,
    },
    /// Physician overview table
    Overview {
        #[command(flatten)]
        input: InputArgs,
        /// Only departments whose name contains this text
        #[arg(short, long)]
        department: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show scan statistics without writing anything
    Stats {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Workbook (.xlsx, .xlsm, .xlsb, .xls, .ods) or .csv file
    input: PathBuf,
    /// Worksheet to read (default: the first one)
    #[arg(long)]
    sheet: Option<String>,
    /// How column 0 text opens a part
    #[arg(long, value_enum)]
    part_policy: Option<PartPolicy>,
    /// Settings file (default: ./roster.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Jsonl,
    Both,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            input,
            out_dir,
            stem,
            format,
            stamp,
        } => {
            let mut settings = input.settings()?;
            settings.stamp_ingested_at |= stamp;
            let docs = load_docs(&input.input, &settings)?.docs;
            if docs.is_empty() {
                println!("No documents found. Check --sheet and --part-policy.");
                return Ok(());
            }

            let stem = match stem {
                Some(s) => s,
                None => file_stem(&input.input)?,
            };
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("creating {}", out_dir.display()))?;
            let written = write_docs(&docs, &out_dir, &stem, format)?;
            ScopeCounts::of(&docs).print();
            for path in written {
                println!("Wrote {}", path.display());
            }
            Ok(())
        }
        Commands::Overview {
            input,
            department,
            limit,
        } => {
            let settings = input.settings()?;
            let docs = load_docs(&input.input, &settings)?.docs;
            let rows: Vec<_> = docs
                .iter()
                .filter_map(|d| match d {
                    Document::Physician(p) => Some(p),
                    _ => None,
                })
                .filter(|p| {
                    department
                        .as_deref()
                        .map_or(true, |q| p.department_name.contains(q))
                })
                .take(limit)
                .collect();
            if rows.is_empty() {
                println!("No physicians found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<24} | {:<16} | {:<16} | {:<6} | {:>4} | {:<5}",
                "#", "Physician", "Department", "Part", "Gender", "Year", "Emerg"
            );
            println!("{}", "-".repeat(92));

            for (i, p) in rows.iter().enumerate() {
                let gender = match p.gender {
                    Some(Gender::Male) => "M",
                    Some(Gender::Female) => "F",
                    None => "-",
                };
                let year = p
                    .graduation_year
                    .or(p.birth_year)
                    .map(|y| y.to_string())
                    .unwrap_or_else(|| "-".into());
                let emergency = match p.has_emergency_slots {
                    Some(true) => "yes",
                    Some(false) => "no",
                    None => "-",
                };
                println!(
                    "{:>3} | {:<24} | {:<16} | {:<16} | {:<6} | {:>4} | {:<5}",
                    i + 1,
                    truncate(&p.physician_name, 24),
                    truncate(&p.department_name, 16),
                    truncate(&p.part_name, 16),
                    gender,
                    year,
                    emergency
                );
            }

            println!("\n{} physicians", rows.len());
            Ok(())
        }
        Commands::Stats { input } => {
            let settings = input.settings()?;
            let processed = load_docs(&input.input, &settings)?;
            let s = &processed.stats;
            println!("Rows:        {}", s.rows);
            println!("Discarded:   {}", s.discarded);
            println!("Departments: {}", s.departments);
            println!("Parts:       {}", s.parts);
            println!("Records:     {}", s.records);
            ScopeCounts::of(&processed.docs).print();
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

impl InputArgs {
    /// Layered settings with this command's flags applied last.
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref()).context("loading settings")?;
        if let Some(sheet) = &self.sheet {
            settings.sheet = Some(sheet.clone());
        }
        if let Some(policy) = self.part_policy {
            settings.part_policy = policy;
        }
        Ok(settings)
    }
}

fn load_docs(input: &Path, settings: &Settings) -> anyhow::Result<parser::Processed> {
    use indicatif::ProgressBar;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("reading {}", input.display()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));

    let rows = source::load_rows(input, settings.sheet.as_deref())
        .with_context(|| format!("reading {}", input.display()));
    spinner.finish_and_clear();

    let source_file = input.to_string_lossy();
    Ok(parser::process_rows(&rows?, settings, Some(source_file.as_ref())))
}

fn write_docs(
    docs: &[Document],
    out_dir: &Path,
    stem: &str,
    format: Format,
) -> anyhow::Result<Vec<PathBuf>> {
    use indicatif::{ProgressBar, ProgressStyle};

    let mut written = Vec::new();
    if format != Format::Jsonl {
        let path = out_dir.join(format!("{}.json", stem));
        docs::write_json(&path, docs)?;
        written.push(path);
    }
    if format != Format::Json {
        let path = out_dir.join(format!("{}.jsonl", stem));
        let pb = ProgressBar::new(docs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
                .progress_chars("#>-"),
        );
        docs::write_jsonl_file(&path, docs, || pb.inc(1))?;
        pb.finish_and_clear();
        written.push(path);
    }
    Ok(written)
}

/// Documents per scope.
struct ScopeCounts(BTreeMap<&'static str, usize>);

impl ScopeCounts {
    fn of(docs: &[Document]) -> Self {
        let mut counts = BTreeMap::new();
        for doc in docs {
            *counts.entry(doc.scope()).or_insert(0) += 1;
        }
        ScopeCounts(counts)
    }

    fn print(&self) {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(scope, n)| format!("{} {}", n, scope))
            .collect();
        println!("Built {} documents ({}).", self.0.values().sum::<usize>(), parts.join(", "));
    }
}

fn file_stem(path: &Path) -> anyhow::Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .with_context(|| format!("no file name in {}", path.display()))
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
