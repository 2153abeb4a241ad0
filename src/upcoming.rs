use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::model::{Dataset, Fixture, TeamId};
use crate::strength::estimate_strengths;
use crate::win_prob::MatchUp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub date: DateTime<Utc>,
    pub home: TeamId,
    pub away: TeamId,
    /// Most likely scoreline `(home, away)`.
    pub tip: (u32, u32),
    pub p_home: f64,
    pub p_draw: f64,
    pub p_away: f64,
}

/// Exact outcome odds for the next `n` unplayed fixtures, earliest first.
/// Uses the plain strength ratings; no form noise.
pub fn predict_upcoming(dataset: &Dataset, n: usize) -> Result<Vec<Prediction>, ForecastError> {
    let strengths = estimate_strengths(dataset);

    let mut next: Vec<&Fixture> = dataset.remaining().collect();
    next.sort_by_key(|f| f.date);
    next.truncate(n);

    next.into_iter()
        .map(|f| {
            let grid = MatchUp::new(
                strengths.rating(f.home),
                strengths.rating(f.away),
                strengths.league_avg_goals,
            )
            .distribution()?;
            let probs = grid.outcome_probs();
            Ok(Prediction {
                date: f.date,
                home: f.home,
                away: f.away,
                tip: grid.most_likely(),
                p_home: probs.home * 100.0,
                p_draw: probs.draw * 100.0,
                p_away: probs.away * 100.0,
            })
        })
        .collect()
}
