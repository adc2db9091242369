//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    load_simulation_config, parse_symbols, strategy_id, validate_config,
};
use crate::domain::error::SimulatorError;
use crate::domain::simulation::{self, SimulationRequest, SimulationResult};
use crate::domain::strategy::{
    all_strategies, build_strategy, build_strategy_from_config, ParameterSpec, ParameterValues,
    Strategy,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_OUTPUT: &str = "simulation_results.csv";

#[derive(Parser, Debug)]
#[command(name = "investsim", about = "Daily-contribution strategy simulator")]
pub struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one simulation and write its result table
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: Option<String>,
        /// Comma-separated symbols, replacing [simulation] symbols
        #[arg(long)]
        symbols: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run several strategies over the same window in parallel
    Compare {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated strategy ids
        #[arg(long)]
        strategies: String,
        /// Write `<strategy_id>.csv` per run into this directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// List available strategies and their parameters
    Strategies,
    /// Show the stored data range for a symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
    },
    /// Validate a configuration file without simulating
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Install the fmt subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Run {
            config,
            strategy,
            symbols,
            output,
        } => run_single(&config, strategy.as_deref(), symbols.as_deref(), output.as_deref()),
        Command::Compare {
            config,
            strategies,
            output_dir,
        } => run_compare(&config, &strategies, output_dir.as_deref()),
        Command::Strategies => run_strategies(),
        Command::Info { config, symbol } => run_info(&config, &symbol),
        Command::Validate { config } => run_validate(&config),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, SimulatorError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

/// Price repository selected by `[data] source` (default `sqlite`).
pub fn open_data_port(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, SimulatorError> {
    let source = config
        .get_string("data", "source")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "sqlite".to_string());

    match source.as_str() {
        "csv" => {
            let dir = config
                .get_string("data", "csv_dir")
                .ok_or_else(|| SimulatorError::missing("data", "csv_dir"))?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))))
        }
        "sqlite" => open_sqlite(config),
        other => Err(SimulatorError::invalid(
            "data",
            "source",
            format!("unknown source {other} (expected sqlite or csv)"),
        )),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, SimulatorError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;
    use std::sync::Arc;

    let mut adapter = SqliteAdapter::from_config(config)?;
    if let Some(dir) = config.get_string("provider", "csv_dir") {
        adapter = adapter.with_provider(Arc::new(CsvAdapter::new(PathBuf::from(dir))));
    }
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, SimulatorError> {
    Err(SimulatorError::invalid(
        "data",
        "source",
        "built without the sqlite feature",
    ))
}

/// Load, validate and simulate the run described by `config`, applying
/// command-line overrides.
pub fn simulate_from_config(
    config: &dyn ConfigPort,
    data_port: &dyn DataPort,
    strategy_override: Option<&str>,
    symbols_override: Option<&str>,
) -> Result<SimulationResult, SimulatorError> {
    let id = strategy_id(config, strategy_override)?;
    let strategy = build_strategy_from_config(&id, config)?;
    let mut sim_config = load_simulation_config(config)?;
    if let Some(raw) = symbols_override {
        sim_config.symbols = parse_symbols(raw);
    }
    simulation::run_strategy(data_port, strategy.as_ref(), &sim_config)
}

/// Output path: flag, then `[report] output`, then the default.
pub fn resolve_output(config: &dyn ConfigPort, output: Option<&Path>) -> PathBuf {
    output
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("report", "output").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT))
}

fn run_single(
    config_path: &Path,
    strategy_override: Option<&str>,
    symbols_override: Option<&str>,
    output: Option<&Path>,
) -> Result<ExitCode, SimulatorError> {
    let config = load_config(config_path)?;
    let data_port = open_data_port(&config)?;
    let result = simulate_from_config(&config, data_port.as_ref(), strategy_override, symbols_override)?;

    print_summary(&result);

    let output_path = resolve_output(&config, output);
    CsvReportAdapter::new().write(&result, &output_path.to_string_lossy())?;
    eprintln!("\nResults written to: {}", output_path.display());
    Ok(ExitCode::SUCCESS)
}

/// One request per strategy id. Single-symbol strategies take the first
/// configured symbol; the rotation takes the whole list.
pub fn compare_requests(
    config: &dyn ConfigPort,
    strategy_ids: &str,
) -> Result<Vec<SimulationRequest>, SimulatorError> {
    let base = load_simulation_config(config)?;
    let ids: Vec<&str> = strategy_ids
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if ids.is_empty() {
        return Err(SimulatorError::invalid(
            "compare",
            "strategies",
            "no strategy ids given",
        ));
    }

    ids.into_iter()
        .map(|id| {
            let strategy = build_strategy(id, &ParameterValues::new())?;
            let params = ParameterValues::from_config(config, &strategy.parameters())?;
            let mut sim_config = base.clone();
            if !strategy.requires_symbol_list() {
                sim_config.symbols.truncate(1);
            }
            Ok(SimulationRequest {
                strategy_id: id.to_string(),
                params,
                config: sim_config,
            })
        })
        .collect()
}

fn run_compare(
    config_path: &Path,
    strategy_ids: &str,
    output_dir: Option<&Path>,
) -> Result<ExitCode, SimulatorError> {
    let config = load_config(config_path)?;
    let requests = compare_requests(&config, strategy_ids)?;
    let data_port = open_data_port(&config)?;

    eprintln!("Running {} strategies in parallel...", requests.len());
    let outcomes = simulation::run_batch(data_port.as_ref(), &requests);

    let mut results = Vec::new();
    let mut first_error: Option<SimulatorError> = None;
    eprintln!("\n=== Comparison ===");
    for (request, outcome) in requests.iter().zip(outcomes) {
        match outcome {
            Ok(result) => {
                eprintln!(
                    "  {:<24} principal ${:>12.2}  value ${:>12.2}  P/L ${:>11.2}  ({:+.2}%)",
                    result.strategy_id,
                    result.principal_invested(),
                    result.portfolio_value(),
                    result.profit_loss(),
                    result.return_pct(),
                );
                results.push(result);
            }
            Err(e) => {
                eprintln!("  {:<24} failed: {}", request.strategy_id, e);
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(dir) = output_dir {
        CsvReportAdapter::new().write_all(&results, &dir.to_string_lossy())?;
        eprintln!("\nResults written to: {}", dir.display());
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(ExitCode::SUCCESS),
    }
}

fn run_strategies() -> Result<ExitCode, SimulatorError> {
    for strategy in all_strategies()? {
        print_strategy(strategy.as_ref());
    }
    Ok(ExitCode::SUCCESS)
}

fn print_strategy(strategy: &dyn Strategy) {
    println!("{} - {}", strategy.id(), strategy.name());
    println!("    {}", strategy.description());
    for spec in strategy.parameters() {
        println!("{}", describe_parameter(&spec));
    }
}

/// Two lines per parameter: key, label and range, then the help text.
pub fn describe_parameter(spec: &ParameterSpec) -> String {
    format!(
        "    {:<26} {} (default {}, range [{}, {}]{})\n        {}",
        spec.name,
        spec.label,
        spec.default,
        spec.min,
        spec.max,
        if spec.integer { ", integer" } else { "" },
        spec.help,
    )
}

fn run_info(config_path: &Path, symbol: &str) -> Result<ExitCode, SimulatorError> {
    let config = load_config(config_path)?;
    let data_port = open_data_port(&config)?;
    let symbol = symbol.trim().to_uppercase();

    match data_port.get_data_range(&symbol)? {
        Some((first, last, count)) => println!("{}: {} bars, {} to {}", symbol, count, first, last),
        None => println!("{}: no data", symbol),
    }
    Ok(ExitCode::SUCCESS)
}

fn run_validate(config_path: &Path) -> Result<ExitCode, SimulatorError> {
    let config = load_config(config_path)?;
    let today = chrono::Local::now().date_naive();
    let (strategy, sim_config) = validate_config(&config, None, today)?;

    eprintln!("Config validated successfully");
    eprintln!("  strategy:         {} ({})", strategy.id(), strategy.name());
    eprintln!("  symbols:          {}", sim_config.symbols.join(", "));
    eprintln!(
        "  window:           {} to {}",
        sim_config.start_date, sim_config.end_date
    );
    eprintln!("  daily investment: ${:.2}", sim_config.daily_investment);
    eprintln!("  lookback:         {} days", strategy.lookback_days());
    Ok(ExitCode::SUCCESS)
}

fn print_summary(result: &SimulationResult) {
    eprintln!("\n=== {} ===", result.strategy_name);
    eprintln!("Symbols:            {}", result.symbols.join(", "));
    eprintln!(
        "Window:             {} to {} ({} trading days)",
        result.start_date,
        result.end_date,
        result.rows.len()
    );
    eprintln!("Principal Invested: ${:.2}", result.principal_invested());
    eprintln!("Portfolio Value:    ${:.2}", result.portfolio_value());
    eprintln!("Profit/Loss:        ${:.2}", result.profit_loss());
    eprintln!("Return:             {:+.2}%", result.return_pct());
    if let Some(row) = result.final_row() {
        if let Some(symbol) = &row.current_symbol {
            eprintln!("Current Stock:      {}", symbol);
        }
        if let Some(state) = &row.state_label {
            eprintln!("Current State:      {}", state);
        }
    }
}
