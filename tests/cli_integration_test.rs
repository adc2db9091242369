//! CLI integration tests with real INI, CSV and SQLite files on disk.
//!
//! Tests cover:
//! - Data source selection (csv, sqlite with a csv provider)
//! - Command-line overrides and output resolution
//! - Result table written by `run`
//! - Exit codes for configuration and data failures
//! - Parallel `compare`

mod common;

use clap::Parser;
use common::*;
use investsim::adapters::file_config_adapter::FileConfigAdapter;
use investsim::cli::{self, Cli};
use investsim::domain::error::SimulatorError;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn write_prices(dir: &Path, symbol: &str, start: &str, closes: &[f64]) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for bar in daily_bars(symbol, start, closes) {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.date, bar.open, bar.high, bar.low, bar.close, bar.volume
        ));
    }
    fs::write(dir.join(format!("{symbol}.csv")), content).unwrap();
}

/// Price directory with a flat SPY and a trending pair for rotation.
fn price_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_prices(dir.path(), "SPY", "2024-01-01", &[20.0; 10]);
    write_prices(dir.path(), "DEC", "2023-11-01", &linear(200.0, -1.0, 80));
    write_prices(dir.path(), "INC", "2023-11-01", &linear(100.0, 1.0, 80));
    dir
}

fn csv_ini(prices: &Path, extra: &str) -> String {
    format!(
        "[data]\nsource = csv\ncsv_dir = {}\n\n\
         [simulation]\nstrategy = simple_recurring\nsymbols = spy\n\
         start_date = 2024-01-01\nend_date = 2024-01-05\ndaily_investment = 100\n\n{}",
        prices.display(),
        extra
    )
}

mod data_sources {
    use super::*;

    #[test]
    fn csv_source_runs_simulation() {
        let prices = price_dir();
        let config = FileConfigAdapter::from_string(&csv_ini(prices.path(), "")).unwrap();
        let port = cli::open_data_port(&config).unwrap();

        let result = cli::simulate_from_config(&config, port.as_ref(), None, None).unwrap();

        assert_eq!(result.strategy_id, "simple_recurring");
        assert_eq!(result.symbols, vec!["SPY"]);
        assert_eq!(result.rows.len(), 5);
        assert_eq!(result.principal_invested(), 500.0);
        assert_eq!(result.final_row().unwrap().shares_held, 25.0);
    }

    #[test]
    fn overrides_replace_strategy_and_symbols() {
        let prices = price_dir();
        let config = FileConfigAdapter::from_string(&csv_ini(prices.path(), "")).unwrap();
        let port = cli::open_data_port(&config).unwrap();

        let result =
            cli::simulate_from_config(&config, port.as_ref(), Some("rsi_swing"), Some("inc,dec"))
                .unwrap();

        assert_eq!(result.strategy_id, "rsi_swing");
        assert_eq!(result.symbols, vec!["INC", "DEC"]);
        assert_eq!(result.rows[0].current_symbol.as_deref(), Some("DEC"));
    }

    #[test]
    fn strategy_section_feeds_parameters() {
        let prices = price_dir();
        let ini = csv_ini(prices.path(), "[strategy]\nrsi_period = 99\n");
        let config = FileConfigAdapter::from_string(&ini).unwrap();
        let port = cli::open_data_port(&config).unwrap();

        let result =
            cli::simulate_from_config(&config, port.as_ref(), Some("rsi_swing"), Some("INC,DEC"));
        assert!(matches!(
            result,
            Err(SimulatorError::ConfigInvalid { ref key, .. }) if key == "rsi_period"
        ));
    }

    #[test]
    fn missing_symbol_file_is_unavailable() {
        let prices = price_dir();
        let config = FileConfigAdapter::from_string(&csv_ini(prices.path(), "")).unwrap();
        let port = cli::open_data_port(&config).unwrap();

        let result = cli::simulate_from_config(&config, port.as_ref(), None, Some("QQQ"));
        assert!(matches!(result, Err(SimulatorError::DataUnavailable { .. })));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_source_fills_from_provider() {
        let prices = price_dir();
        let db_dir = TempDir::new().unwrap();
        let ini = format!(
            "[data]\nsource = sqlite\n\n\
             [sqlite]\npath = {}\npool_size = 2\n\n\
             [provider]\ncsv_dir = {}\n\n\
             [simulation]\nstrategy = simple_recurring\nsymbols = SPY\n\
             start_date = 2024-01-02\nend_date = 2024-01-06\ndaily_investment = 40\n",
            db_dir.path().join("prices.db").display(),
            prices.path().display()
        );
        let config = FileConfigAdapter::from_string(&ini).unwrap();

        {
            let port = cli::open_data_port(&config).unwrap();
            let result = cli::simulate_from_config(&config, port.as_ref(), None, None).unwrap();
            assert_eq!(result.rows.len(), 5);
            assert_eq!(result.principal_invested(), 200.0);
        }

        // The stored bars survive without a provider.
        let offline = FileConfigAdapter::from_string(&format!(
            "[sqlite]\npath = {}\n",
            db_dir.path().join("prices.db").display()
        ))
        .unwrap();
        let port = cli::open_data_port(&offline).unwrap();
        assert_eq!(
            port.get_data_range("SPY").unwrap(),
            Some((date("2024-01-02"), date("2024-01-06"), 5))
        );
    }
}

mod commands {
    use super::*;

    fn run_cli(args: &[&str]) -> ExitCode {
        cli::run(Cli::try_parse_from(args).unwrap())
    }

    #[test]
    fn run_writes_result_table() {
        let prices = price_dir();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("nested/result.csv");
        let ini = write_temp_ini(&csv_ini(prices.path(), ""));

        let code = run_cli(&[
            "investsim",
            "run",
            "--config",
            ini.path().to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
        ]);

        assert_eq!(code, ExitCode::SUCCESS);
        let table = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("Date,Investment $,Stocks Bought,Stocks,Total Account"));
        assert_eq!(
            lines[1],
            "2024-01-01,100.00,5.000000,5.000000,100.00,0.00,100.00,0.00,,,"
        );
    }

    #[test]
    fn report_section_sets_output() {
        let prices = price_dir();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("from_config.csv");
        let ini = write_temp_ini(&csv_ini(
            prices.path(),
            &format!("[report]\noutput = {}\n", output.display()),
        ));

        let code = run_cli(&["investsim", "run", "-c", ini.path().to_str().unwrap()]);

        assert_eq!(code, ExitCode::SUCCESS);
        assert!(output.exists());
    }

    #[test]
    fn validate_reports_config_errors() {
        let ini = write_temp_ini(
            "[simulation]\nstrategy = simple_recurring\nsymbols = SPY\n\
             start_date = 2024-02-01\nend_date = 2024-01-01\ndaily_investment = 100\n",
        );
        let code = run_cli(&["investsim", "validate", "--config", ini.path().to_str().unwrap()]);
        assert_eq!(code, ExitCode::from(2));
    }

    #[test]
    fn validate_accepts_good_config() {
        let prices = price_dir();
        let ini = write_temp_ini(&csv_ini(prices.path(), ""));
        let code = run_cli(&["investsim", "validate", "--config", ini.path().to_str().unwrap()]);
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn unknown_strategy_exit_code() {
        let prices = price_dir();
        let ini = write_temp_ini(&csv_ini(prices.path(), ""));
        let code = run_cli(&[
            "investsim",
            "run",
            "--config",
            ini.path().to_str().unwrap(),
            "--strategy",
            "martingale",
        ]);
        assert_eq!(code, ExitCode::from(4));
    }

    #[test]
    fn missing_data_exit_code() {
        let prices = price_dir();
        let out_dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&csv_ini(prices.path(), ""));
        let code = run_cli(&[
            "investsim",
            "run",
            "--config",
            ini.path().to_str().unwrap(),
            "--symbols",
            "NOPE",
            "--output",
            out_dir.path().join("x.csv").to_str().unwrap(),
        ]);
        assert_eq!(code, ExitCode::from(5));
    }

    #[test]
    fn missing_config_file_exit_code() {
        let code = run_cli(&["investsim", "validate", "--config", "/nonexistent/sim.ini"]);
        assert_eq!(code, ExitCode::from(2));
    }

    #[test]
    fn compare_writes_one_table_per_strategy() {
        let prices = price_dir();
        let out_dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&csv_ini(prices.path(), ""));

        let code = run_cli(&[
            "investsim",
            "compare",
            "--config",
            ini.path().to_str().unwrap(),
            "--strategies",
            "simple_recurring,macd_ema_trailing_stop",
            "--output-dir",
            out_dir.path().to_str().unwrap(),
        ]);

        assert_eq!(code, ExitCode::SUCCESS);
        assert!(out_dir.path().join("simple_recurring.csv").exists());
        assert!(out_dir.path().join("macd_ema_trailing_stop.csv").exists());
    }

    #[test]
    fn strategies_lists_registry() {
        assert_eq!(run_cli(&["investsim", "strategies"]), ExitCode::SUCCESS);
    }

    #[test]
    fn info_on_csv_source() {
        let prices = price_dir();
        let ini = write_temp_ini(&csv_ini(prices.path(), ""));
        let code = run_cli(&[
            "investsim",
            "info",
            "--config",
            ini.path().to_str().unwrap(),
            "--symbol",
            "spy",
        ]);
        assert_eq!(code, ExitCode::SUCCESS);
    }
}
