use thiserror::Error;

/// Irrecoverable faults raised by the forecasting core. Missing ratings and
/// blank team names are handled locally and never surface here.
#[derive(Debug, Error, PartialEq)]
pub enum ForecastError {
    #[error("trial count must be at least 1")]
    InvalidTrials,

    #[error("expected goals must be finite and non-negative, got {lambda}")]
    InvalidRate { lambda: f64 },

    #[error("fixture references team {0} which is missing from the standings")]
    CorruptStandings(String),

    #[error("knockout bracket needs {needed} ranked teams, found {found}")]
    TooFewTeams { needed: usize, found: usize },

    #[error("{0}")]
    Distribution(String),
}

impl From<statrs::StatsError> for ForecastError {
    fn from(err: statrs::StatsError) -> Self {
        Self::Distribution(err.to_string())
    }
}
