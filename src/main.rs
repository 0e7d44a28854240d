//! CLI entry point for the congestion series tool.
//!
//! Provides subcommands for reconstructing the congestion series from a raw crawl
//! export, inspecting observation density, building route segment matrices, and
//! running descriptive and inferential statistics over the cleaned series.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc, Weekday};
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use traffic_series::analysis::{hypothesis, segments, tendency};
use traffic_series::config::PipelineConfig;
use traffic_series::ingest::load_raw_records;
use traffic_series::normalize::RoadId;
use traffic_series::output::{
    append_record, print_json, print_pretty, read_roads, read_series, write_csv, write_json,
    write_matrix,
};
use traffic_series::pipeline;
use traffic_series::series::TimeWindow;

#[derive(Parser)]
#[command(name = "traffic_series")]
#[command(about = "Reconstruct and analyze road congestion from crowd-sourced traffic reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by every subcommand. Flags override the config file.
#[derive(Args)]
struct Settings {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Days treated as the weekend, e.g. "Fri,Sat"
    #[arg(long, value_delimiter = ',')]
    weekend_days: Option<Vec<Weekday>>,

    /// Local time offset from UTC in minutes, used for hour-of-day and weekday
    #[arg(long, allow_hyphen_values = true)]
    utc_offset_minutes: Option<i32>,

    /// Width of aggregation buckets in minutes
    #[arg(long)]
    bucket_minutes: Option<i64>,

    /// Minimum observations on each side of a two-sample test
    #[arg(long)]
    min_sample_size: Option<usize>,

    /// Significance level for hypothesis tests
    #[arg(long)]
    alpha: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the congestion series from a raw crawl CSV
    Clean {
        /// Raw crawl export (CSV, optionally .gz)
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the congestion series
        #[arg(short, long, default_value = "series.csv")]
        output: PathBuf,

        /// Where to write the road identity table
        #[arg(long, default_value = "roads.csv")]
        roads: PathBuf,

        /// Optional JSON file for the run summary
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Run-history CSV; the summary is appended as one row
        #[arg(long)]
        history: Option<PathBuf>,

        /// Start of the reliable window (RFC 3339)
        #[arg(long)]
        from: Option<DateTime<Utc>>,

        /// End of the reliable window, exclusive (RFC 3339)
        #[arg(long)]
        to: Option<DateTime<Utc>>,

        #[command(flatten)]
        settings: Settings,
    },
    /// Count reports per bucket over the whole series
    Density {
        #[arg(short, long, default_value = "series.csv")]
        series: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        settings: Settings,
    },
    /// Build a time × segment matrix of mean congestion along a route
    Segments {
        #[arg(short, long, default_value = "series.csv")]
        series: PathBuf,

        #[arg(long, default_value = "roads.csv")]
        roads: PathBuf,

        /// Road ids in route order, e.g. "12,7,31"
        #[arg(long, value_delimiter = ',', required = true)]
        segments: Vec<RoadId>,

        #[arg(long)]
        from: DateTime<Utc>,

        #[arg(long)]
        to: DateTime<Utc>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Optional CSV for per-segment distributions
        #[arg(long)]
        distribution: Option<PathBuf>,

        #[command(flatten)]
        settings: Settings,
    },
    /// Central tendency and confidence intervals per road, day type and hour
    Stats {
        #[arg(short, long, default_value = "series.csv")]
        series: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Optional CSV for confidence intervals
        #[arg(long)]
        intervals: Option<PathBuf>,

        #[command(flatten)]
        settings: Settings,
    },
    /// Weekday against weekend congestion per road and hour
    TestWeekend {
        #[arg(short, long, default_value = "series.csv")]
        series: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        settings: Settings,
    },
    /// One direction against the other for paired segments
    TestDirection {
        #[arg(short, long, default_value = "series.csv")]
        series: PathBuf,

        /// Segment ids of the first direction
        #[arg(long, value_delimiter = ',', required = true)]
        forward: Vec<RoadId>,

        /// Segment ids of the opposite direction, paired by position
        #[arg(long, value_delimiter = ',', required = true)]
        backward: Vec<RoadId>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        settings: Settings,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/traffic_series.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("traffic_series.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Clean {
            input,
            output,
            roads,
            summary,
            history,
            from,
            to,
            settings,
        } => {
            let mut config = load_config(&settings)?;
            if from.is_some() {
                config.window.start = from;
            }
            if to.is_some() {
                config.window.end = to;
            }
            config.validate()?;

            let records = load_raw_records(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let out = pipeline::run(records, &config)?;

            write_csv(&output, out.series.reports())?;
            write_csv(&roads, &out.roads.rows())?;
            out.summary.log();
            print_pretty(&out.summary);
            if let Some(path) = summary {
                write_json(&path, &out.summary)?;
            }
            if let Some(path) = history {
                append_record(&path, &out.summary)?;
            }
            info!(
                series = %output.display(),
                roads = %roads.display(),
                rows = out.series.len(),
                "Series written"
            );
        }
        Commands::Density {
            series,
            output,
            settings,
        } => {
            let config = load_config(&settings)?;
            let series = read_series(&series)?;
            let rows = series.density(config.aggregation.bucket_width()?)?;
            emit(output.as_deref(), &rows)?;
        }
        Commands::Segments {
            series,
            roads,
            segments: segment_ids,
            from,
            to,
            output,
            distribution,
            settings,
        } => {
            let config = load_config(&settings)?;
            let series = read_series(&series)?;
            let roads = read_roads(&roads)?;
            let window = TimeWindow::new(from, to)?;

            let matrix = segments::aggregate(
                &series,
                &segment_ids,
                &window,
                config.aggregation.bucket_width()?,
            )?;
            let labels = roads.minor_labels(&segment_ids);
            match output {
                Some(path) => write_matrix(&path, &matrix, &labels)?,
                None => print_json(&matrix)?,
            }

            if let Some(path) = distribution {
                write_csv(&path, &segments::distribution(&series, &segment_ids, &window))?;
            }
        }
        Commands::Stats {
            series,
            output,
            intervals,
            settings,
        } => {
            let config = load_config(&settings)?;
            let series = read_series(&series)?;
            let rows = tendency::central_tendency(&series, &config.calendar);
            emit(output.as_deref(), &rows)?;

            if let Some(path) = intervals {
                let rows = tendency::confidence_intervals(
                    &series,
                    &config.calendar,
                    config.inference.confidence_level,
                );
                write_csv(&path, &rows)?;
            }
        }
        Commands::TestWeekend {
            series,
            output,
            settings,
        } => {
            let config = load_config(&settings)?;
            let series = read_series(&series)?;
            let results =
                hypothesis::weekday_vs_weekend(&series, &config.calendar, &config.inference);
            log_rejections(&results);
            emit(output.as_deref(), &results)?;
        }
        Commands::TestDirection {
            series,
            forward,
            backward,
            output,
            settings,
        } => {
            let config = load_config(&settings)?;
            let series = read_series(&series)?;
            let results = hypothesis::direction_vs_direction(
                &series,
                &forward,
                &backward,
                &config.calendar,
                &config.inference,
            )?;
            log_rejections(&results);
            emit(output.as_deref(), &results)?;
        }
    }

    Ok(())
}

/// Loads the config file (or defaults) and applies command-line overrides.
fn load_config(settings: &Settings) -> Result<PipelineConfig> {
    let mut config = match &settings.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(days) = &settings.weekend_days {
        config.calendar.weekend_days = days.clone();
    }
    if let Some(offset) = settings.utc_offset_minutes {
        config.calendar.utc_offset_minutes = offset;
    }
    if let Some(minutes) = settings.bucket_minutes {
        config.aggregation.bucket_minutes = minutes;
    }
    if let Some(n) = settings.min_sample_size {
        config.inference.min_sample_size = n;
    }
    if let Some(alpha) = settings.alpha {
        config.inference.alpha = alpha;
    }

    config.validate()?;
    Ok(config)
}

/// Writes rows to CSV when a path is given, otherwise logs them as JSON.
fn emit<T: serde::Serialize>(path: Option<&Path>, rows: &[T]) -> Result<()> {
    match path {
        Some(path) => {
            write_csv(path, rows)?;
            info!(path = %path.display(), rows = rows.len(), "Table written");
        }
        None => print_json(&rows)?,
    }
    Ok(())
}

fn log_rejections(results: &[traffic_series::analysis::types::HypothesisResult]) {
    let rejected = results.iter().filter(|r| r.reject_null).count();
    info!(tests = results.len(), rejected, "Hypothesis tests evaluated");
}
