//! Forecasts league and cup outcomes from a partial season: team strength
//! from played matches, Monte Carlo completion of the remaining schedule,
//! one sampled knockout bracket and exact odds for the next fixtures.

pub mod bracket;
pub mod cache;
pub mod config;
pub mod error;
pub mod forecast;
pub mod league;
pub mod model;
pub mod season;
pub mod standings;
pub mod strength;
pub mod upcoming;
pub mod win_prob;

pub use error::ForecastError;
