use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use netex_calendar_core::{
    calendar_summary, CalendarConfig, CalendarManager, CalendarSummary, CalendarValidator,
    GeneratorConfig, GtfsCalendarGenerator, GtfsCalendarOutput, NetexCalendarElement,
    NetexCalendarProcessor, ValidationLevel,
};
use netex_calendar_model::{Holiday, OperatingPeriod, SeasonalPattern, ServicePattern};

#[derive(Debug, Parser)]
#[command(name = "netex-calendar")]
#[command(about = "Resolve NeTEx service calendars into GTFS calendar files")]
struct Args {
    /// JSON document with NeTEx calendar elements and/or service patterns
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// JSON file with calendar configuration; flags below override its fields
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    #[arg(long = "country-code", alias = "country_code")]
    country_code: Option<String>,

    #[arg(long = "timezone")]
    timezone: Option<String>,

    /// Reference year for holiday folding
    #[arg(short = 'y', long = "year")]
    year: Option<i32>,

    #[arg(
        short = 'l',
        long = "validation-level",
        alias = "validation_level",
        default_value = "standard"
    )]
    validation_level: ValidationLevel,

    /// Use the optimizing generator (date expansion for short services, calendar merging)
    #[arg(long = "optimize")]
    optimize: bool,

    #[arg(short = 'p', long = "pretty")]
    pretty: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InputDocument {
    elements: Vec<NetexCalendarElement>,
    patterns: Vec<ServicePattern>,
    operating_periods: Vec<OperatingPeriod>,
    seasonal_patterns: Vec<SeasonalPattern>,
    custom_holidays: Vec<Holiday>,
}

#[derive(Debug, Serialize)]
struct CalendarReport<'a> {
    validator_version: &'static str,
    validation_level: ValidationLevel,
    generation_time_seconds: f64,
    config_issues: &'a [String],
    issues: &'a [String],
    summary: &'a CalendarSummary,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let config = load_config(&args)?;
    let config_issues = config.validate();
    for issue in &config_issues {
        warn!("{}", issue);
    }

    let document = load_input(&args.input)?;
    info!(
        elements = document.elements.len(),
        patterns = document.patterns.len(),
        operating_periods = document.operating_periods.len(),
        "input {} loaded",
        args.input.display()
    );

    let started_at = Instant::now();
    let manager = build_manager(config, document);
    let output = if args.optimize {
        GtfsCalendarGenerator::new(GeneratorConfig::from(manager.config()))
            .generate_from_manager(&manager)
    } else {
        manager.generate_gtfs_calendar()
    }
    .context("generate GTFS calendar")?;
    let issues = validate(&manager, args.validation_level);
    let elapsed = started_at.elapsed();

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("create output dir {}", args.output.display()))?;
    write_calendar_files(&args.output, &output)?;

    let summary = calendar_summary(&output.calendars, &output.calendar_dates);
    let report = CalendarReport {
        validator_version: env!("CARGO_PKG_VERSION"),
        validation_level: args.validation_level,
        generation_time_seconds: elapsed.as_secs_f64(),
        config_issues: &config_issues,
        issues: &issues,
        summary: &summary,
    };
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .context("serialize report")?;
    let report_path = args.output.join("report.json");
    std::fs::write(&report_path, format!("{}\n", json))
        .with_context(|| format!("write {}", report_path.display()))?;

    info!(
        calendars = summary.total_calendars,
        calendar_dates = summary.total_calendar_dates,
        issues = issues.len(),
        "finished in {:.3}s, output written to {}",
        elapsed.as_secs_f64(),
        args.output.display()
    );
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<CalendarConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parse config {}", path.display()))?
        }
        None => CalendarConfig::default(),
    };

    if let Some(country_code) = args.country_code.as_deref() {
        let country_code = country_code.trim();
        if country_code.is_empty() {
            bail!("--country-code cannot be empty");
        }
        config.holiday_country_code = country_code.to_ascii_uppercase();
    }
    if let Some(timezone) = args.timezone.as_deref() {
        config.timezone_name = timezone.trim().to_string();
    }
    if let Some(year) = args.year {
        config.reference_year = Some(year);
    }
    if args.optimize {
        config.optimize_calendar_dates = true;
        config.consolidate_similar_patterns = true;
    }
    Ok(config)
}

fn load_input(path: &Path) -> anyhow::Result<InputDocument> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("read input {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse input {}", path.display()))
}

fn build_manager(config: CalendarConfig, document: InputDocument) -> CalendarManager {
    let mut manager = CalendarManager::new(config);
    for holiday in document.custom_holidays {
        manager.add_custom_holiday(holiday);
    }

    let mut processor = NetexCalendarProcessor::new();
    processor.ingest_all(document.elements);
    let netex = processor.populate(&mut manager);
    if !netex.is_empty() {
        info!(
            patterns = netex.patterns.len(),
            operating_periods = netex.operating_periods.len(),
            "registered NeTEx calendar entities"
        );
    }

    for pattern in document.patterns {
        manager.add_service_pattern(pattern);
    }
    for period in document.operating_periods {
        manager.add_operating_period(period);
    }
    for pattern in document.seasonal_patterns {
        manager.add_seasonal_pattern(pattern);
    }
    manager
}

fn validate(manager: &CalendarManager, level: ValidationLevel) -> Vec<String> {
    let validator = CalendarValidator::new(level);
    let patterns = manager.service_patterns();
    let periods = manager.operating_periods();

    let mut issues = Vec::new();
    for pattern in &patterns {
        issues.extend(validator.validate_service_pattern(pattern));
    }
    for period in &periods {
        issues.extend(validator.validate_operating_period(period));
    }
    for pattern in manager.seasonal_patterns() {
        issues.extend(validator.validate_seasonal_pattern(pattern));
    }
    issues.extend(validator.validate_calendar_consistency(&patterns, &periods));
    issues.extend(validator.validate_against_gtfs_rules(&patterns));
    issues
}

const CALENDAR_HEADERS: [&str; 10] = [
    "service_id",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
    "start_date",
    "end_date",
];
const CALENDAR_DATES_HEADERS: [&str; 3] = ["service_id", "date", "exception_type"];

fn write_calendar_files(output_dir: &Path, output: &GtfsCalendarOutput) -> anyhow::Result<()> {
    write_csv(
        &output_dir.join("calendar.txt"),
        &CALENDAR_HEADERS,
        &output.calendars,
    )?;
    write_csv(
        &output_dir.join("calendar_dates.txt"),
        &CALENDAR_DATES_HEADERS,
        &output.calendar_dates,
    )?;
    Ok(())
}

/// Headers are written explicitly so empty tables still carry them.
fn write_csv<T: Serialize>(path: &Path, headers: &[&str], rows: &[T]) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    writer
        .write_record(headers)
        .with_context(|| format!("write {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("write {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
