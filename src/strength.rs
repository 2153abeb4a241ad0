use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Dataset, Fixture, TeamId};

/// Combined goals per match assumed when nothing has been played yet.
pub const DEFAULT_LEAGUE_AVG_GOALS: f64 = 3.0;

#[derive(Debug, Clone, Copy)]
pub struct RecencyConfig {
    /// Share of the most recent finished matches that get the boosted weight.
    pub recent_share: f64,
    pub recent_weight: f64,
    /// Recency weighting only kicks in above this many finished matches.
    pub min_matches: usize,
}

impl Default for RecencyConfig {
    fn default() -> Self {
        Self {
            recent_share: 0.3,
            recent_weight: 2.0,
            min_matches: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamStrength {
    pub attack: f64,
    pub defense: f64,
}

impl TeamStrength {
    pub const NEUTRAL: TeamStrength = TeamStrength {
        attack: 1.0,
        defense: 1.0,
    };
}

impl Default for TeamStrength {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strengths {
    pub ratings: BTreeMap<TeamId, TeamStrength>,
    pub league_avg_goals: f64,
}

impl Strengths {
    pub fn empty() -> Self {
        Self {
            ratings: BTreeMap::new(),
            league_avg_goals: DEFAULT_LEAGUE_AVG_GOALS,
        }
    }

    /// Rating for `team`, or the neutral rating when the team never played.
    pub fn rating(&self, team: TeamId) -> TeamStrength {
        self.ratings.get(&team).copied().unwrap_or(TeamStrength::NEUTRAL)
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct TeamTally {
    scored: f64,
    conceded: f64,
    weight: f64,
}

pub fn estimate_strengths(dataset: &Dataset) -> Strengths {
    estimate_strengths_with(dataset, RecencyConfig::default())
}

pub fn estimate_strengths_with(dataset: &Dataset, cfg: RecencyConfig) -> Strengths {
    let mut played: Vec<&Fixture> = dataset.finished().collect();
    if played.is_empty() {
        return Strengths::empty();
    }
    // Stable, so same-day fixtures keep feed order.
    played.sort_by_key(|f| f.date);

    let n = played.len();
    let recent_from = if n > cfg.min_matches {
        n - ((n as f64) * cfg.recent_share) as usize
    } else {
        n
    };
    let weight_of = |idx: usize| if idx >= recent_from { cfg.recent_weight } else { 1.0 };

    let mut weighted_goals = 0.0;
    let mut weighted_count = 0.0;
    let mut tallies: BTreeMap<TeamId, TeamTally> = BTreeMap::new();

    for (idx, m) in played.iter().enumerate() {
        let w = weight_of(idx);
        let hg = m.home_goals as f64;
        let ag = m.away_goals as f64;
        weighted_goals += (hg + ag) * w;
        weighted_count += w;

        let home = tallies.entry(m.home).or_default();
        home.scored += hg * w;
        home.conceded += ag * w;
        home.weight += w;

        let away = tallies.entry(m.away).or_default();
        away.scored += ag * w;
        away.conceded += hg * w;
        away.weight += w;
    }

    let league_avg_goals = if weighted_count > 0.0 {
        weighted_goals / (weighted_count * 2.0)
    } else {
        DEFAULT_LEAGUE_AVG_GOALS
    };

    let ratings = tallies
        .into_iter()
        .map(|(team, t)| (team, rate(t, league_avg_goals)))
        .collect();

    Strengths {
        ratings,
        league_avg_goals,
    }
}

fn rate(t: TeamTally, league_avg_goals: f64) -> TeamStrength {
    // A goalless league gives no scale to rate against.
    if t.weight <= 0.0 || league_avg_goals <= 0.0 {
        return TeamStrength::NEUTRAL;
    }
    TeamStrength {
        attack: (t.scored / t.weight) / league_avg_goals,
        defense: (t.conceded / t.weight) / league_avg_goals,
    }
}
