//! CLI definition and dispatch.

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{column_index, CsvAdapter, FredCsvAdapter};
use crate::adapters::csv_report::{render_markdown, CsvReportAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::rule_store::{self, RuleFormat};
#[cfg(feature = "sqlite")]
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::adapters::state_store::{FileStateStore, StateCodec};
use crate::domain::config_validation::{
    choice, validate_run_config, DATA_BACKENDS, DEFAULT_DATA_BACKEND,
    DEFAULT_LOG_FORMAT, DEFAULT_RATE_BACKEND, DEFAULT_RULE_FORMAT, DEFAULT_STATE_BACKEND,
    LOG_FORMATS, RATE_BACKENDS, RULE_FORMATS, STATE_BACKENDS,
};
use crate::domain::engine::{self, RunSettings};
use crate::domain::error::RegimeError;
use crate::domain::indicator::resample::validate_months;
use crate::domain::indicator::{MacdParams, DEFAULT_MOMENTUM_LENGTH};
use crate::domain::macro_gate::DEFAULT_INDEX_SYMBOL;
use crate::domain::rule::{RuleSide, TickerRule};
use crate::domain::rule_eval::EvalSettings;
use crate::domain::rule_parser;
use crate::logging::{init_logging, LogFormat};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::macro_port::MacroPort;
use crate::ports::report_port::ReportPort;
use crate::ports::state_port::StatePort;

#[derive(Parser, Debug)]
#[command(name = "regime", about = "MACD regime rules and position tracking")]
pub struct Cli {
    /// Log output format (pretty or json); overrides [logging] format
    #[arg(long, global = true)]
    pub log_format: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile an annotated watchlist CSV into a rule document
    BuildRules {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long)]
        format: Option<String>,
    },
    /// Evaluate every rule, update stored positions and write the report
    RunReport {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        rules: Option<PathBuf>,
        #[arg(long)]
        state: Option<PathBuf>,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Load a rule document and print each rule
    Validate {
        #[arg(short, long)]
        rules: PathBuf,
        #[arg(long)]
        format: Option<String>,
    },
    /// Parse a single annotation and print the rule as JSON
    Parse {
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        text: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateBackend {
    File(StateCodec),
    Sqlite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceBackend {
    Csv,
    Sqlite,
}

/// Everything `run-report` needs, resolved from the INI file.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub rules_path: Option<PathBuf>,
    pub rule_format: RuleFormat,
    pub state_backend: StateBackend,
    pub state_path: Option<PathBuf>,
    pub data_backend: SourceBackend,
    pub data_dir: Option<PathBuf>,
    pub rates_backend: SourceBackend,
    pub rates_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub settings: RunSettings,
    pub log_format: LogFormat,
}

pub fn run(cli: Cli) -> ExitCode {
    let log_override = match cli.log_format.as_deref().map(parse_log_format).transpose() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    match cli.command {
        Command::BuildRules { input, out, format } => {
            init_logging(log_override.unwrap_or_default());
            run_build_rules(&input, &out, format.as_deref())
        }
        Command::RunReport {
            config,
            rules,
            state,
            out,
        } => run_report(
            &config,
            rules.as_ref(),
            state.as_ref(),
            out.as_ref(),
            log_override,
        ),
        Command::Validate { rules, format } => {
            init_logging(log_override.unwrap_or_default());
            run_validate(&rules, format.as_deref())
        }
        Command::Parse { ticker, text } => {
            init_logging(log_override.unwrap_or_default());
            run_parse(&ticker, &text)
        }
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn parse_log_format(name: &str) -> Result<LogFormat, RegimeError> {
    LogFormat::from_name(name).ok_or_else(|| RegimeError::ConfigInvalid {
        section: "logging".to_string(),
        key: "format".to_string(),
        reason: format!("unknown value '{}', expected one of {}", name, LOG_FORMATS.join(", ")),
    })
}

fn optional_path(config: &dyn ConfigPort, section: &str, key: &str) -> Option<PathBuf> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn source_backend(name: &str) -> SourceBackend {
    if name == "sqlite" {
        SourceBackend::Sqlite
    } else {
        SourceBackend::Csv
    }
}

fn indicator_period(config: &dyn ConfigPort, key: &str, default: usize) -> usize {
    usize::try_from(config.get_int("indicators", key, default as i64)).unwrap_or(default)
}

/// Validate the INI and resolve it into a [`RunConfig`].
pub fn build_run_config(config: &dyn ConfigPort) -> Result<RunConfig, RegimeError> {
    validate_run_config(config)?;

    let rule_format = RuleFormat::from_name(&choice(
        config,
        "rules",
        "format",
        RULE_FORMATS,
        DEFAULT_RULE_FORMAT,
    )?)?;

    let state_backend = match choice(
        config,
        "state",
        "backend",
        STATE_BACKENDS,
        DEFAULT_STATE_BACKEND,
    )?
    .as_str()
    {
        "sqlite" => StateBackend::Sqlite,
        "csv" => StateBackend::File(StateCodec::Csv),
        _ => StateBackend::File(StateCodec::Json),
    };

    let data_backend = source_backend(&choice(
        config,
        "data",
        "backend",
        DATA_BACKENDS,
        DEFAULT_DATA_BACKEND,
    )?);
    let rates_backend = source_backend(&choice(
        config,
        "macro",
        "rates_backend",
        RATE_BACKENDS,
        DEFAULT_RATE_BACKEND,
    )?);

    let log_format = parse_log_format(&choice(
        config,
        "logging",
        "format",
        LOG_FORMATS,
        DEFAULT_LOG_FORMAT,
    )?)?;

    let macd = MacdParams {
        fast: indicator_period(config, "macd_fast", MacdParams::default().fast),
        slow: indicator_period(config, "macd_slow", MacdParams::default().slow),
        signal: indicator_period(config, "macd_signal", MacdParams::default().signal),
    };
    let momentum_length = indicator_period(config, "momentum_length", DEFAULT_MOMENTUM_LENGTH);

    let index_symbol = config
        .get_string("macro", "index_symbol")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_INDEX_SYMBOL.to_string());

    Ok(RunConfig {
        rules_path: optional_path(config, "rules", "path"),
        rule_format,
        state_backend,
        state_path: optional_path(config, "state", "path"),
        data_backend,
        data_dir: optional_path(config, "data", "dir"),
        rates_backend,
        rates_path: optional_path(config, "macro", "rates_path"),
        report_path: optional_path(config, "report", "path"),
        settings: RunSettings {
            eval: EvalSettings {
                macd,
                momentum_length,
            },
            index_symbol,
        },
        log_format,
    })
}

/// `(ticker, annotation)` rows from a watchlist CSV with `Ticker` and
/// `Result` columns. Rows with an empty ticker are skipped.
pub fn read_rule_rows(path: &Path) -> Result<Vec<(String, String)>, RegimeError> {
    let codec_error = |reason: String| RegimeError::Codec {
        format: "watchlist csv".to_string(),
        reason,
    };

    let text = fs::read_to_string(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = rdr.headers().map_err(|e| codec_error(e.to_string()))?.clone();
    let ticker_col =
        column_index(&headers, "ticker").ok_or_else(|| codec_error("missing Ticker column".into()))?;
    let result_col =
        column_index(&headers, "result").ok_or_else(|| codec_error("missing Result column".into()))?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| codec_error(e.to_string()))?;
        let ticker = record.get(ticker_col).unwrap_or_default().trim();
        if ticker.is_empty() {
            continue;
        }
        let annotation = record.get(result_col).unwrap_or_default();
        rows.push((ticker.to_string(), annotation.to_string()));
    }
    Ok(rows)
}

fn resolve_rule_format(format: Option<&str>, path: &Path) -> Result<RuleFormat, RegimeError> {
    match format {
        Some(name) => RuleFormat::from_name(name),
        None => Ok(RuleFormat::from_path(path)),
    }
}

fn run_build_rules(input: &Path, out: &Path, format: Option<&str>) -> ExitCode {
    let format = match resolve_rule_format(format, out) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("Reading watchlist from {}", input.display());
    let rows = match read_rule_rows(input) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let rules = rule_parser::parse_bulk(rows);
    let defaulted = rules
        .iter()
        .filter(|r| r.entry == RuleSide::default_entry() && r.exit == RuleSide::default_exit())
        .count();

    if let Err(e) = rule_store::save(&rules, out, format) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    eprintln!(
        "Wrote {} rules ({} with default sides) to {} as {}",
        rules.len(),
        defaulted,
        out.display(),
        format.name()
    );
    ExitCode::SUCCESS
}

fn missing(section: &str, key: &str) -> RegimeError {
    RegimeError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

#[cfg(not(feature = "sqlite"))]
fn sqlite_unavailable() -> RegimeError {
    RegimeError::ConfigInvalid {
        section: "sqlite".to_string(),
        key: "path".to_string(),
        reason: "built without the sqlite feature".to_string(),
    }
}

fn open_data_port(
    run_config: &RunConfig,
    config: &dyn ConfigPort,
) -> Result<Box<dyn DataPort>, RegimeError> {
    match run_config.data_backend {
        SourceBackend::Csv => {
            let dir = run_config.data_dir.clone().ok_or_else(|| missing("data", "dir"))?;
            Ok(Box::new(CsvAdapter::new(dir)))
        }
        SourceBackend::Sqlite => {
            #[cfg(feature = "sqlite")]
            {
                Ok(Box::new(SqliteAdapter::from_config(config)?))
            }
            #[cfg(not(feature = "sqlite"))]
            {
                let _ = config;
                Err(sqlite_unavailable())
            }
        }
    }
}

fn open_macro_port(
    run_config: &RunConfig,
    config: &dyn ConfigPort,
) -> Result<Box<dyn MacroPort>, RegimeError> {
    match run_config.rates_backend {
        SourceBackend::Csv => {
            let path = run_config
                .rates_path
                .clone()
                .ok_or_else(|| missing("macro", "rates_path"))?;
            Ok(Box::new(FredCsvAdapter::new(path)))
        }
        SourceBackend::Sqlite => {
            #[cfg(feature = "sqlite")]
            {
                Ok(Box::new(SqliteAdapter::from_config(config)?))
            }
            #[cfg(not(feature = "sqlite"))]
            {
                let _ = config;
                Err(sqlite_unavailable())
            }
        }
    }
}

fn open_state_port(
    run_config: &RunConfig,
    config: &dyn ConfigPort,
    state_override: Option<&PathBuf>,
) -> Result<Box<dyn StatePort>, RegimeError> {
    match run_config.state_backend {
        StateBackend::File(codec) => {
            let path = state_override
                .cloned()
                .or_else(|| run_config.state_path.clone())
                .ok_or_else(|| missing("state", "path"))?;
            Ok(Box::new(FileStateStore::new(path, codec)))
        }
        StateBackend::Sqlite => {
            #[cfg(feature = "sqlite")]
            {
                Ok(Box::new(SqliteAdapter::from_config(config)?))
            }
            #[cfg(not(feature = "sqlite"))]
            {
                let _ = config;
                Err(sqlite_unavailable())
            }
        }
    }
}

fn run_report(
    config_path: &PathBuf,
    rules_override: Option<&PathBuf>,
    state_override: Option<&PathBuf>,
    out_override: Option<&PathBuf>,
    log_override: Option<LogFormat>,
) -> ExitCode {
    // Stage 1: Load and validate config
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let run_config = match build_run_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    init_logging(log_override.unwrap_or(run_config.log_format));
    tracing::info!(config = %config_path.display(), "config loaded");

    // Stage 2: Load rules
    let rules_path = match rules_override
        .cloned()
        .or_else(|| run_config.rules_path.clone())
    {
        Some(p) => p,
        None => {
            let e = missing("rules", "path");
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let rules = match rule_store::load(&rules_path, run_config.rule_format) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(path = %rules_path.display(), error = %e, "rule document rejected");
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    tracing::info!(path = %rules_path.display(), rules = rules.len(), "rules loaded");

    // Stage 3: Wire ports
    let ports = open_data_port(&run_config, &adapter).and_then(|data| {
        let rates = open_macro_port(&run_config, &adapter)?;
        let state = open_state_port(&run_config, &adapter, state_override)?;
        Ok((data, rates, state))
    });
    let (data_port, macro_port, state_port) = match ports {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "failed to open backends");
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 4: Evaluate and persist state
    let output = match engine::run(
        &rules,
        data_port.as_ref(),
        macro_port.as_ref(),
        state_port.as_ref(),
        &run_config.settings,
        Utc::now(),
    ) {
        Ok(o) => o,
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 5: Report
    let report_path = out_override
        .cloned()
        .or_else(|| run_config.report_path.clone());
    if let Some(path) = report_path {
        let path_str = path.display().to_string();
        if let Err(e) = CsvReportAdapter.write(&output.rows, &path_str) {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("Report written to {}", path_str);
    }

    print!("{}", render_markdown(&output.rows));
    ExitCode::SUCCESS
}

/// Problems that would make a rule fail closed at evaluation.
pub fn rule_problems(rule: &TickerRule) -> Vec<String> {
    let mut problems = Vec::new();
    for (side_name, side) in [("entry", &rule.entry), ("exit", &rule.exit)] {
        if let Err(e) = side.signal.validate() {
            problems.push(format!("{side_name}: {e}"));
        }
        if let Err(e) = validate_months(side.timeframe) {
            problems.push(format!("{side_name}: {e}"));
        }
    }
    for confirm in &rule.entry.confirms {
        if let Err(e) = validate_months(confirm.timeframe) {
            problems.push(format!("entry confirm: {e}"));
        }
    }
    problems
}

fn run_validate(rules_path: &Path, format: Option<&str>) -> ExitCode {
    let rules = match resolve_rule_format(format, rules_path)
        .and_then(|f| rule_store::load(rules_path, f))
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let mut invalid = 0;
    for rule in &rules {
        println!("{rule}");
        for problem in rule_problems(rule) {
            println!("  ! {problem}");
            invalid += 1;
        }
    }

    if invalid > 0 {
        let e = RegimeError::RuleInvalid {
            reason: format!("{invalid} problem(s) in {} rules", rules.len()),
        };
        eprintln!("error: {e}");
        return (&e).into();
    }

    eprintln!("{} rules OK", rules.len());
    ExitCode::SUCCESS
}

fn run_parse(ticker: &str, text: &str) -> ExitCode {
    let rule = rule_parser::parse(ticker, text);
    match serde_json::to_string_pretty(&rule) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let err = RegimeError::Codec {
                format: "json".to_string(),
                reason: e.to_string(),
            };
            eprintln!("error: {err}");
            (&err).into()
        }
    }
}
