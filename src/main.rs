use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

mod db;
mod engine;
mod models;
mod sampler;
mod writer;

use models::{DaySchedule, GeneratorConfig, TimeWindow};

#[derive(Parser)]
#[command(name = "attendance-mockgen")]
#[command(about = "Mock attendance dataset generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the attendances table if it does not exist
    InitDb,
    /// Generate an attendance CSV for every student over a date range
    Generate {
        #[arg(long, default_value = "attendances.csv")]
        out: PathBuf,
        #[arg(long, default_value = "2020-01-01")]
        start_date: NaiveDate,
        #[arg(long, default_value = "2024-12-31")]
        end_date: NaiveDate,
        #[arg(long, default_value = "05:00:00")]
        morning_start: NaiveTime,
        #[arg(long, default_value = "07:00:00")]
        morning_end: NaiveTime,
        #[arg(long, default_value = "12:00:00")]
        afternoon_start: NaiveTime,
        #[arg(long, default_value = "18:00:00")]
        afternoon_end: NaiveTime,
        /// Arrivals after this time count as LATE
        #[arg(long, default_value = "06:00:00")]
        cutoff: NaiveTime,
        /// Fix the run seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
        /// Worker threads; defaults to the available hardware parallelism
        #[arg(long)]
        workers: Option<usize>,
        /// Scales chunk size relative to students / workers
        #[arg(long, default_value_t = 1.0)]
        chunk_multiplier: f64,
        /// Records written between flushes of the output file
        #[arg(long, default_value_t = 1000)]
        flush_batch: usize,
        /// Students between progress reports
        #[arg(long, default_value_t = 10)]
        progress_interval: usize,
    },
    /// Bulk-load a generated CSV into the attendances table
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Generate {
            out,
            start_date,
            end_date,
            morning_start,
            morning_end,
            afternoon_start,
            afternoon_end,
            cutoff,
            seed,
            workers,
            chunk_multiplier,
            flush_batch,
            progress_interval,
        } => {
            let workers = workers.unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(std::num::NonZeroUsize::get)
                    .unwrap_or(1)
            });
            let config = GeneratorConfig {
                start_date,
                end_date,
                schedule: DaySchedule {
                    morning: TimeWindow {
                        start: morning_start,
                        end: morning_end,
                    },
                    afternoon: TimeWindow {
                        start: afternoon_start,
                        end: afternoon_end,
                    },
                    cutoff,
                },
                workers,
                chunk_multiplier,
                flush_batch,
                progress_interval,
                seed,
            };
            config.validate()?;

            let students = db::fetch_student_ids(&pool).await?;
            generate(&config, &students, &out)?;
        }
        Commands::Import { csv } => {
            let started = Instant::now();
            let rows = db::import_csv(&pool, &csv).await?;
            println!(
                "Imported {rows} rows from {} in {:.2?}.",
                csv.display(),
                started.elapsed()
            );
        }
    }

    Ok(())
}

fn generate(config: &GeneratorConfig, students: &[i64], out: &Path) -> anyhow::Result<()> {
    let dates = engine::date_range(config.start_date, config.end_date);
    let chunks = engine::partition(students, config.workers, config.chunk_multiplier);
    let total_students = students.len();
    let total_records = total_students * dates.len();

    println!(
        "Generating {total_records} records ({total_students} students x {} days) across {} workers...",
        dates.len(),
        config.workers
    );
    let started = Instant::now();

    let file = File::create(out).with_context(|| format!("failed to create {}", out.display()))?;
    let mut csv_writer = writer::RecordWriter::new(BufWriter::new(file), config.flush_batch)?;

    let mut processed = 0usize;
    let mut next_report = config.progress_interval;
    engine::run_chunks(
        chunks,
        &dates,
        &config.schedule,
        config.seed,
        config.workers,
        |output| {
            csv_writer.write_chunk(&output.records)?;
            processed += output.student_count;
            if processed >= next_report {
                println!("Processed {processed}/{total_students} students");
                while next_report <= processed {
                    next_report += config.progress_interval;
                }
            }
            Ok(())
        },
    )?;
    csv_writer.finish()?;

    println!(
        "Wrote {total_records} records to {} in {:.2?}.",
        out.display(),
        started.elapsed()
    );
    Ok(())
}
