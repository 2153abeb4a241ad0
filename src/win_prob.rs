use rand::Rng;
use rand::distributions::Distribution;
use serde::{Deserialize, Serialize};
use statrs::distribution::Poisson;

use crate::error::ForecastError;
use crate::strength::TeamStrength;

pub const HOME_ADVANTAGE: f64 = 1.2;
/// Cells per side of the scoreline grid (0..=9 goals).
pub const MAX_GOALS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

pub fn classify_outcome(home_goals: u32, away_goals: u32) -> Outcome {
    if home_goals > away_goals {
        Outcome::Home
    } else if home_goals < away_goals {
        Outcome::Away
    } else {
        Outcome::Draw
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Prob3 {
    pub fn sum(&self) -> f64 {
        self.home + self.draw + self.away
    }
}

/// Two rated sides plus the multipliers applied on top of their ratings.
#[derive(Debug, Clone, Copy)]
pub struct MatchUp {
    pub home: TeamStrength,
    pub away: TeamStrength,
    pub league_avg_goals: f64,
    pub home_advantage: f64,
    pub home_boost: f64,
    pub away_boost: f64,
}

impl MatchUp {
    pub fn new(home: TeamStrength, away: TeamStrength, league_avg_goals: f64) -> Self {
        Self {
            home,
            away,
            league_avg_goals,
            home_advantage: HOME_ADVANTAGE,
            home_boost: 1.0,
            away_boost: 1.0,
        }
    }

    pub fn with_home_advantage(mut self, factor: f64) -> Self {
        self.home_advantage = factor;
        self
    }

    pub fn with_boosts(mut self, home: f64, away: f64) -> Self {
        self.home_boost = home;
        self.away_boost = away;
        self
    }

    /// Expected goals `(home, away)`. Only the home side gets the advantage factor.
    pub fn expected_goals(&self) -> (f64, f64) {
        let home = self.home.attack
            * self.away.defense
            * self.league_avg_goals
            * self.home_advantage
            * self.home_boost;
        let away = self.away.attack * self.home.defense * self.league_avg_goals * self.away_boost;
        (home, away)
    }

    /// One random scoreline, each side drawn independently.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<(u32, u32), ForecastError> {
        let (lambda_home, lambda_away) = self.expected_goals();
        let home = sample_goals(lambda_home, rng)?;
        let away = sample_goals(lambda_away, rng)?;
        Ok((home, away))
    }

    pub fn distribution(&self) -> Result<ScorelineGrid, ForecastError> {
        let (lambda_home, lambda_away) = self.expected_goals();
        ScorelineGrid::new(lambda_home, lambda_away)
    }
}

fn check_rate(lambda: f64) -> Result<f64, ForecastError> {
    if lambda.is_finite() && lambda >= 0.0 {
        Ok(lambda)
    } else {
        Err(ForecastError::InvalidRate { lambda })
    }
}

pub fn sample_goals<R: Rng + ?Sized>(lambda: f64, rng: &mut R) -> Result<u32, ForecastError> {
    let lambda = check_rate(lambda)?;
    if lambda == 0.0 {
        return Ok(0);
    }
    let dist = Poisson::new(lambda)?;
    Ok(dist.sample(rng) as u32)
}

/// P(k; lambda) for k in 0..=max_k. Mass above `max_k` is dropped, not folded in.
pub fn poisson_pmf(lambda: f64, max_k: usize) -> Vec<f64> {
    let mut out = vec![0.0; max_k + 1];
    out[0] = (-lambda).exp();
    for k in 1..=max_k {
        out[k] = out[k - 1] * lambda / k as f64;
    }
    out
}

/// Joint scoreline probabilities, `cells[i][j]` = P(home i, away j).
#[derive(Debug, Clone, PartialEq)]
pub struct ScorelineGrid {
    pub lambda_home: f64,
    pub lambda_away: f64,
    cells: [[f64; MAX_GOALS]; MAX_GOALS],
}

impl ScorelineGrid {
    pub fn new(lambda_home: f64, lambda_away: f64) -> Result<Self, ForecastError> {
        let lambda_home = check_rate(lambda_home)?;
        let lambda_away = check_rate(lambda_away)?;
        let pmf_h = poisson_pmf(lambda_home, MAX_GOALS - 1);
        let pmf_a = poisson_pmf(lambda_away, MAX_GOALS - 1);

        let mut cells = [[0.0; MAX_GOALS]; MAX_GOALS];
        for (i, p_i) in pmf_h.iter().enumerate() {
            for (j, p_j) in pmf_a.iter().enumerate() {
                cells[i][j] = p_i * p_j;
            }
        }
        Ok(Self {
            lambda_home,
            lambda_away,
            cells,
        })
    }

    pub fn p(&self, home_goals: usize, away_goals: usize) -> f64 {
        self.cells
            .get(home_goals)
            .and_then(|row| row.get(away_goals))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn total_mass(&self) -> f64 {
        self.cells.iter().flatten().sum()
    }

    /// Home win below the diagonal, draw on it, away win above it.
    pub fn outcome_probs(&self) -> Prob3 {
        let mut probs = Prob3 {
            home: 0.0,
            draw: 0.0,
            away: 0.0,
        };
        for (i, row) in self.cells.iter().enumerate() {
            for (j, p) in row.iter().enumerate() {
                match classify_outcome(i as u32, j as u32) {
                    Outcome::Home => probs.home += p,
                    Outcome::Draw => probs.draw += p,
                    Outcome::Away => probs.away += p,
                }
            }
        }
        probs
    }

    /// The single most probable cell; the first one wins on exact ties.
    pub fn most_likely(&self) -> (u32, u32) {
        let mut best = (0usize, 0usize);
        let mut best_p = f64::NEG_INFINITY;
        for (i, row) in self.cells.iter().enumerate() {
            for (j, p) in row.iter().enumerate() {
                if *p > best_p {
                    best_p = *p;
                    best = (i, j);
                }
            }
        }
        (best.0 as u32, best.1 as u32)
    }
}
