use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bracket::{Bracket, simulate_bracket};
use crate::config::Settings;
use crate::league::{Competition, Format};
use crate::model::{Dataset, MatchRecord, TeamId};
use crate::season::{SeasonRow, simulate_season, trial_pool, with_trial_pool};
use crate::standings::{StandingsRow, build_standings};
use crate::upcoming::{Prediction, predict_upcoming};

/// Offset that keeps the bracket stream apart from the season trial streams.
const BRACKET_STREAM: u64 = 0xB7AC_4E75;

/// Everything one competition's forecast run produces. Team ids index `teams`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub competition: Competition,
    pub seed: u64,
    pub teams: Vec<String>,
    pub standings: Vec<StandingsRow>,
    pub season: Vec<SeasonRow>,
    pub bracket: Option<Bracket>,
    pub predictions: Vec<Prediction>,
}

impl Forecast {
    pub fn team_name(&self, team: TeamId) -> &str {
        self.teams.get(team as usize).map(String::as_str).unwrap_or("?")
    }

    /// Current table leader.
    pub fn leader(&self) -> Option<&str> {
        self.standings.first().map(|r| self.team_name(r.team))
    }

    /// Team with the best title odds; earlier rows win ties.
    pub fn favourite(&self) -> Option<&str> {
        let headline = self.competition.format().headline();
        let mut best: Option<&SeasonRow> = None;
        for row in &self.season {
            if best.is_none_or(|b| row.percent(headline) > b.percent(headline)) {
                best = Some(row);
            }
        }
        best.map(|r| self.team_name(r.team))
    }
}

/// Runs the table simulation, the knockout bracket (cup format only) and the
/// next-matchday predictions for one competition. Any failure fails the whole
/// run so no half-built forecast is ever returned.
pub fn forecast_competition(
    competition: Competition,
    records: &[MatchRecord],
    settings: &Settings,
) -> Result<Forecast> {
    let dataset = Dataset::from_records(records);
    let standings = build_standings(&dataset);
    let seed = settings.seed.unwrap_or_else(rand::random);
    let format = competition.format();

    let season = with_trial_pool(trial_pool(settings.threads), || {
        simulate_season(&dataset, &standings, settings.trials, format, seed)
    })
    .with_context(|| format!("season simulation failed for {}", competition.name()))?;

    let bracket = if format == Format::CupGroup {
        let mut rng = StdRng::seed_from_u64(seed ^ BRACKET_STREAM);
        let bracket = simulate_bracket(&dataset, &standings, &mut rng)
            .with_context(|| format!("bracket simulation failed for {}", competition.name()))?;
        Some(bracket)
    } else {
        None
    };

    let predictions = predict_upcoming(&dataset, competition.upcoming_count())
        .with_context(|| format!("match predictions failed for {}", competition.name()))?;

    info!(
        competition = competition.name(),
        seed,
        teams = dataset.teams().len(),
        skipped = dataset.skipped(),
        "forecast ready"
    );

    Ok(Forecast {
        competition,
        seed,
        teams: dataset.teams().names().to_vec(),
        standings: standings.rows().to_vec(),
        season,
        bracket,
        predictions,
    })
}
