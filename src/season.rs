use std::collections::HashMap;

use once_cell::sync::OnceCell;
use rand::SeedableRng;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use tracing::{debug, info};

use crate::error::ForecastError;
use crate::league::{Category, Format};
use crate::model::{Dataset, TeamId};
use crate::standings::Standings;
use crate::strength::{Strengths, TeamStrength, estimate_strengths};
use crate::win_prob::MatchUp;

pub const DEFAULT_TRIALS: usize = 500;
const FORM_MEAN: f64 = 1.0;
const FORM_SD: f64 = 0.10;

static TRIAL_POOL: OnceCell<Option<rayon::ThreadPool>> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonRow {
    pub team: TeamId,
    pub avg_points: f64,
    /// Percent of trials in each band, in `Format::categories` order.
    pub categories: Vec<(Category, f64)>,
}

impl SeasonRow {
    pub fn percent(&self, category: Category) -> f64 {
        self.categories
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, p)| *p)
            .unwrap_or(0.0)
    }
}

/// Per-trial counters, indexed by standings slot.
#[derive(Debug, Clone)]
struct Tally {
    hits: Vec<Vec<u32>>,
    points: Vec<i64>,
}

impl Tally {
    fn new(teams: usize, categories: usize) -> Self {
        Self {
            hits: vec![vec![0; categories]; teams],
            points: vec![0; teams],
        }
    }

    fn merge(mut self, other: Tally) -> Tally {
        for (mine, theirs) in self.hits.iter_mut().zip(other.hits) {
            for (a, b) in mine.iter_mut().zip(theirs) {
                *a += b;
            }
        }
        for (a, b) in self.points.iter_mut().zip(other.points) {
            *a += b;
        }
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct PlannedFixture {
    home: TeamId,
    away: TeamId,
    home_slot: usize,
    away_slot: usize,
}

struct TrialContext<'a> {
    standings: &'a Standings,
    strengths: Strengths,
    fixtures: Vec<PlannedFixture>,
    format: Format,
    form: Normal,
    seed: u64,
}

impl TrialContext<'_> {
    /// Ratings for one trial: each rated team draws a form factor that lifts
    /// attack and tightens defense together. Unrated teams stay neutral.
    fn form_ratings(&self, rng: &mut StdRng) -> HashMap<TeamId, TeamStrength> {
        self.strengths
            .ratings
            .iter()
            .map(|(team, s)| (*team, apply_form(*s, self.form.sample(rng))))
            .collect()
    }

    fn run(&self, trial: u64, tally: &mut Tally) -> Result<(), ForecastError> {
        let mut rng = StdRng::seed_from_u64(trial_seed(self.seed, trial));
        let ratings = self.form_ratings(&mut rng);
        let rating = |team: TeamId| ratings.get(&team).copied().unwrap_or(TeamStrength::NEUTRAL);

        let mut table = self.standings.clone();
        for f in &self.fixtures {
            let (hg, ag) = MatchUp::new(
                rating(f.home),
                rating(f.away),
                self.strengths.league_avg_goals,
            )
            .sample(&mut rng)?;
            table.award_points(f.home_slot, f.away_slot, hg, ag);
        }

        let order = table.order();
        let categories = self.format.categories();
        for (rank, &slot) in order.iter().enumerate() {
            for band in self.format.bands(rank, order.len()) {
                if let Some(k) = categories.iter().position(|c| *c == band) {
                    tally.hits[slot][k] += 1;
                }
            }
        }
        for (slot, row) in table.rows().iter().enumerate() {
            tally.points[slot] += row.points as i64;
        }
        Ok(())
    }
}

/// Scales attack by `form` and defense by `2 - form`, with `form` clamped to
/// [0, 2] so neither side of the rating goes negative.
fn apply_form(s: TeamStrength, form: f64) -> TeamStrength {
    let form = form.clamp(0.0, 2.0);
    TeamStrength {
        attack: s.attack * form,
        defense: s.defense * (2.0 - form),
    }
}

/// Monte Carlo completion of the remaining schedule. Trials run in parallel
/// on the current rayon pool; each trial seeds its own stream from `seed`, so
/// a fixed seed reproduces the table regardless of thread count.
///
/// Rows come back sorted by average points, highest first.
pub fn simulate_season(
    dataset: &Dataset,
    standings: &Standings,
    trials: usize,
    format: Format,
    seed: u64,
) -> Result<Vec<SeasonRow>, ForecastError> {
    if trials == 0 {
        return Err(ForecastError::InvalidTrials);
    }
    if standings.is_empty() {
        return Ok(Vec::new());
    }

    let fixtures = plan_fixtures(dataset, standings, format)?;
    let ctx = TrialContext {
        standings,
        strengths: estimate_strengths(dataset),
        fixtures,
        format,
        form: Normal::new(FORM_MEAN, FORM_SD)?,
        seed,
    };
    debug!(
        trials,
        teams = standings.len(),
        fixtures = ctx.fixtures.len(),
        rated = ctx.strengths.ratings.len(),
        "starting season simulation"
    );

    let categories = format.categories();
    let teams = standings.len();
    let tally = (0..trials as u64)
        .into_par_iter()
        .try_fold(
            || Tally::new(teams, categories.len()),
            |mut acc, trial| {
                ctx.run(trial, &mut acc)?;
                Ok::<_, ForecastError>(acc)
            },
        )
        .try_reduce(|| Tally::new(teams, categories.len()), |a, b| Ok(a.merge(b)))?;

    let n = trials as f64;
    let mut rows: Vec<SeasonRow> = standings
        .rows()
        .iter()
        .enumerate()
        .map(|(slot, row)| SeasonRow {
            team: row.team,
            avg_points: tally.points[slot] as f64 / n,
            categories: categories
                .iter()
                .zip(&tally.hits[slot])
                .map(|(c, hits)| (*c, *hits as f64 / n * 100.0))
                .collect(),
        })
        .collect();
    rows.sort_by(|a, b| b.avg_points.total_cmp(&a.avg_points));

    info!(trials, teams, "season simulation finished");
    Ok(rows)
}

/// Resolves the unplayed table fixtures to standings slots. Knockout-stage
/// fixtures never count toward a cup group table.
fn plan_fixtures(
    dataset: &Dataset,
    standings: &Standings,
    format: Format,
) -> Result<Vec<PlannedFixture>, ForecastError> {
    let slots = standings.slots();
    let slot_of = |team: TeamId| {
        slots
            .get(&team)
            .copied()
            .ok_or_else(|| ForecastError::CorruptStandings(dataset.teams().name(team).to_string()))
    };

    dataset
        .remaining()
        .filter(|f| format == Format::League || !f.is_knockout())
        .map(|f| {
            Ok(PlannedFixture {
                home: f.home,
                away: f.away,
                home_slot: slot_of(f.home)?,
                away_slot: slot_of(f.away)?,
            })
        })
        .collect()
}

/// Independent stream seed for one trial (splitmix64 finaliser).
pub fn trial_seed(seed: u64, trial: u64) -> u64 {
    let mut z = seed ^ trial.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Process-wide pool for season trials. The first caller fixes the size.
pub fn trial_pool(threads: usize) -> Option<&'static rayon::ThreadPool> {
    TRIAL_POOL
        .get_or_init(|| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads.clamp(1, 32))
                .thread_name(|i| format!("season-trial-{i}"))
                .build()
                .ok()
        })
        .as_ref()
}

pub fn with_trial_pool<T>(
    pool: Option<&rayon::ThreadPool>,
    action: impl FnOnce() -> T + Send,
) -> T
where
    T: Send,
{
    if let Some(pool) = pool {
        pool.install(action)
    } else {
        action()
    }
}
