//! Strategy capability contract, parameter schema and registry.
//!
//! Each strategy is a per-run state machine over preloaded price history.
//! Identifiers map to constructors through a static lookup table; nothing
//! is discovered at runtime.

pub mod macd_ema_trailing_stop;
pub mod macd_swing;
pub mod recurring;
pub mod rsi_rotation;

use std::collections::{BTreeMap, HashMap};

use crate::domain::error::SimulatorError;
use crate::domain::price_history::{PriceHistory, SymbolHistory};
use crate::domain::simulation::{ResultRow, SimulationConfig};
use crate::ports::config_port::ConfigPort;

pub use macd_ema_trailing_stop::MacdEmaTrailingStop;
pub use macd_swing::MacdSwing;
pub use recurring::SimpleRecurring;
pub use rsi_rotation::RsiRotation;

/// Config section holding strategy parameters.
pub const PARAMETER_SECTION: &str = "strategy";

pub trait Strategy: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;

    fn parameters(&self) -> Vec<ParameterSpec> {
        Vec::new()
    }

    /// Calendar days of history to load before the simulation start.
    fn lookback_days(&self) -> i64 {
        0
    }

    /// True when the strategy takes a candidate list rather than one symbol.
    fn requires_symbol_list(&self) -> bool {
        false
    }

    /// Replay the window day by day. Rows are ascending by date.
    fn simulate(
        &self,
        history: &PriceHistory,
        config: &SimulationConfig,
    ) -> Result<Vec<ResultRow>, SimulatorError>;
}

/// One tunable numeric parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub integer: bool,
    pub help: &'static str,
}

impl ParameterSpec {
    pub fn check(&self, value: f64) -> Result<f64, SimulatorError> {
        if !value.is_finite() || value < self.min || value > self.max {
            return Err(SimulatorError::invalid(
                PARAMETER_SECTION,
                self.name,
                format!("must be between {} and {}", self.min, self.max),
            ));
        }
        if self.integer && value.fract() != 0.0 {
            return Err(SimulatorError::invalid(
                PARAMETER_SECTION,
                self.name,
                "must be a whole number",
            ));
        }
        Ok(value)
    }
}

/// Caller-supplied parameter values by schema name. Absent names take the
/// schema default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterValues {
    values: BTreeMap<String, f64>,
}

impl ParameterValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Read every parameter named in `specs` from the `[strategy]` section.
    pub fn from_config(
        config: &dyn ConfigPort,
        specs: &[ParameterSpec],
    ) -> Result<Self, SimulatorError> {
        let mut values = Self::new();
        for spec in specs {
            if let Some(raw) = config.get_string(PARAMETER_SECTION, spec.name) {
                let value: f64 = raw.trim().parse().map_err(|_| {
                    SimulatorError::invalid(PARAMETER_SECTION, spec.name, "not a number")
                })?;
                values.set(spec.name, value);
            }
        }
        Ok(values)
    }

    /// Value for `spec`, defaulted and range-checked.
    pub fn resolve(&self, spec: &ParameterSpec) -> Result<f64, SimulatorError> {
        spec.check(self.get(spec.name).unwrap_or(spec.default))
    }

    pub fn resolve_usize(&self, spec: &ParameterSpec) -> Result<usize, SimulatorError> {
        self.resolve(spec).map(|v| v as usize)
    }
}

pub type StrategyConstructor = fn(&ParameterValues) -> Result<Box<dyn Strategy>, SimulatorError>;

const REGISTRY: &[(&str, StrategyConstructor)] = &[
    (recurring::ID, SimpleRecurring::build),
    (rsi_rotation::ID, RsiRotation::build),
    (macd_swing::ID, MacdSwing::build),
    (macd_ema_trailing_stop::ID, MacdEmaTrailingStop::build),
];

pub fn available_ids() -> Vec<&'static str> {
    REGISTRY.iter().map(|(id, _)| *id).collect()
}

pub fn build_strategy(
    id: &str,
    params: &ParameterValues,
) -> Result<Box<dyn Strategy>, SimulatorError> {
    let id = id.trim();
    let (_, constructor) = REGISTRY
        .iter()
        .find(|(candidate, _)| *candidate == id)
        .ok_or_else(|| SimulatorError::UnknownStrategy {
            id: id.to_string(),
            available: available_ids().join(", "),
        })?;
    constructor(params)
}

/// Every registered strategy built with default parameters.
pub fn all_strategies() -> Result<Vec<Box<dyn Strategy>>, SimulatorError> {
    let defaults = ParameterValues::new();
    REGISTRY
        .iter()
        .map(|(_, constructor)| constructor(&defaults))
        .collect()
}

/// Build `id` with parameters read from the `[strategy]` section.
pub fn build_strategy_from_config(
    id: &str,
    config: &dyn ConfigPort,
) -> Result<Box<dyn Strategy>, SimulatorError> {
    let schema = build_strategy(id, &ParameterValues::new())?.parameters();
    let params = ParameterValues::from_config(config, &schema)?;
    build_strategy(id, &params)
}

/// The symbol history for a single-symbol strategy.
pub(crate) fn single_symbol<'a>(
    history: &'a PriceHistory,
    config: &SimulationConfig,
) -> Result<&'a SymbolHistory, SimulatorError> {
    let unavailable = |symbol: &str| SimulatorError::DataUnavailable {
        symbol: symbol.to_string(),
        start: config.start_date,
        end: config.end_date,
    };
    let symbol = config.symbols.first().ok_or_else(|| unavailable(""))?;
    history.get(symbol).ok_or_else(|| unavailable(symbol))
}

pub(crate) fn price_map(symbol: &str, price: f64) -> HashMap<String, f64> {
    HashMap::from([(symbol.to_string(), price)])
}
