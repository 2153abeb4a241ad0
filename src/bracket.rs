use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ForecastError;
use crate::model::{Dataset, TeamId};
use crate::standings::Standings;
use crate::strength::{Strengths, estimate_strengths};
use crate::win_prob::{HOME_ADVANTAGE, MatchUp};

/// Extra strength a group-phase leader carries into the knockouts.
const MAX_FORM_BONUS: f64 = 0.2;
const FINAL_HOME_ADVANTAGE: f64 = 1.0;
const SEEDED_DIRECT: std::ops::Range<usize> = 0..8;
const SEEDED_PLAYOFF: std::ops::Range<usize> = 8..16;
const UNSEEDED_PLAYOFF: std::ops::Range<usize> = 16..24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Round {
    Playoffs,
    RoundOf16,
    QuarterFinal,
    SemiFinal,
    Final,
}

impl Round {
    pub fn label(self) -> &'static str {
        match self {
            Round::Playoffs => "Playoffs",
            Round::RoundOf16 => "Round of 16",
            Round::QuarterFinal => "Quarterfinal",
            Round::SemiFinal => "Semifinal",
            Round::Final => "Final",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketMatch {
    pub round: Round,
    pub home: TeamId,
    pub away: TeamId,
    pub result: String,
    pub winner: TeamId,
}

/// One sampled realisation of the knockout phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    /// Final group-phase ranking used for seeding.
    pub seeding: Vec<TeamId>,
    pub matches: Vec<BracketMatch>,
}

impl Bracket {
    pub fn round(&self, round: Round) -> impl Iterator<Item = &BracketMatch> {
        self.matches.iter().filter(move |m| m.round == round)
    }

    pub fn champion(&self) -> Option<TeamId> {
        self.round(Round::Final).next().map(|m| m.winner)
    }
}

struct Knockout<'a> {
    strengths: &'a Strengths,
    boost: HashMap<TeamId, f64>,
}

struct Tie {
    first_leg: (u32, u32),
    second_leg: (u32, u32),
    winner: TeamId,
}

impl Knockout<'_> {
    fn boost(&self, team: TeamId) -> f64 {
        self.boost.get(&team).copied().unwrap_or(1.0)
    }

    fn leg<R: Rng + ?Sized>(
        &self,
        home: TeamId,
        away: TeamId,
        advantage: f64,
        rng: &mut R,
    ) -> Result<(u32, u32), ForecastError> {
        MatchUp::new(
            self.strengths.rating(home),
            self.strengths.rating(away),
            self.strengths.league_avg_goals,
        )
        .with_home_advantage(advantage)
        .with_boosts(self.boost(home), self.boost(away))
        .sample(rng)
    }

    /// `first` hosts the first leg, `second` the return leg.
    fn two_legs<R: Rng + ?Sized>(
        &self,
        first: TeamId,
        second: TeamId,
        rng: &mut R,
    ) -> Result<Tie, ForecastError> {
        let (h1, a1) = self.leg(first, second, HOME_ADVANTAGE, rng)?;
        let (h2, a2) = self.leg(second, first, HOME_ADVANTAGE, rng)?;
        let winner = decide(first, second, h1 + a2, a1 + h2, rng);
        Ok(Tie {
            first_leg: (h1, a1),
            second_leg: (h2, a2),
            winner,
        })
    }

    /// Seeded side hosts the return leg and is listed as home.
    fn seeded_tie<R: Rng + ?Sized>(
        &self,
        round: Round,
        unseeded: TeamId,
        seeded: TeamId,
        rng: &mut R,
    ) -> Result<BracketMatch, ForecastError> {
        let tie = self.two_legs(unseeded, seeded, rng)?;
        let (h1, a1) = tie.first_leg;
        let (h2, a2) = tie.second_leg;
        Ok(BracketMatch {
            round,
            home: seeded,
            away: unseeded,
            result: format!("{h2}:{a2} ({a1}:{h1})"),
            winner: tie.winner,
        })
    }

    fn open_draw<R: Rng + ?Sized>(
        &self,
        round: Round,
        t1: TeamId,
        t2: TeamId,
        rng: &mut R,
    ) -> Result<BracketMatch, ForecastError> {
        let (result, winner) = if round == Round::Final {
            let (h, a) = self.leg(t1, t2, FINAL_HOME_ADVANTAGE, rng)?;
            (format!("{h}:{a}"), decide(t1, t2, h, a, rng))
        } else {
            let tie = self.two_legs(t1, t2, rng)?;
            let (h1, a1) = tie.first_leg;
            let (h2, a2) = tie.second_leg;
            (format!("{h1}:{a1} / {h2}:{a2}"), tie.winner)
        };
        Ok(BracketMatch {
            round,
            home: t1,
            away: t2,
            result,
            winner,
        })
    }
}

/// Higher score goes through; a level score is a coin flip.
fn decide<R: Rng + ?Sized>(a: TeamId, b: TeamId, score_a: u32, score_b: u32, rng: &mut R) -> TeamId {
    if score_a > score_b {
        a
    } else if score_b > score_a {
        b
    } else if rng.gen_bool(0.5) {
        a
    } else {
        b
    }
}

/// Strength multiplier from the group phase: 1 + points / leader points * 0.2.
/// A table where nobody has points leaves everyone at 1.0.
fn performance_boost(table: &Standings) -> HashMap<TeamId, f64> {
    let max_points = table.max_points().unwrap_or(0);
    table
        .rows()
        .iter()
        .map(|r| {
            let b = if max_points > 0 {
                1.0 + (r.points as f64 / max_points as f64) * MAX_FORM_BONUS
            } else {
                1.0
            };
            (r.team, b)
        })
        .collect()
}

/// Plays out the rest of the group phase once, then one full knockout
/// bracket: playoffs (9-16 vs 17-24), round of 16 against the top 8, and
/// freshly drawn quarterfinals, semifinals and a neutral-venue final.
pub fn simulate_bracket<R: Rng + ?Sized>(
    dataset: &Dataset,
    standings: &Standings,
    rng: &mut R,
) -> Result<Bracket, ForecastError> {
    let strengths = estimate_strengths(dataset);

    let slots = standings.slots();
    let mut table = standings.clone();
    for f in dataset.remaining().filter(|f| !f.is_knockout()) {
        let slot_of = |team: TeamId| {
            slots.get(&team).copied().ok_or_else(|| {
                ForecastError::CorruptStandings(dataset.teams().name(team).to_string())
            })
        };
        let (home, away) = (slot_of(f.home)?, slot_of(f.away)?);
        let (hg, ag) = MatchUp::new(
            strengths.rating(f.home),
            strengths.rating(f.away),
            strengths.league_avg_goals,
        )
        .sample(rng)?;
        table.award_points(home, away, hg, ag);
    }
    table.rank();

    let ranking: Vec<TeamId> = table.rows().iter().map(|r| r.team).collect();
    if ranking.len() < UNSEEDED_PLAYOFF.end {
        return Err(ForecastError::TooFewTeams {
            needed: UNSEEDED_PLAYOFF.end,
            found: ranking.len(),
        });
    }

    let ko = Knockout {
        strengths: &strengths,
        boost: performance_boost(&table),
    };

    let mut matches = Vec::new();

    let mut playoff_winners = Vec::with_capacity(SEEDED_PLAYOFF.len());
    for (&seeded, &unseeded) in ranking[SEEDED_PLAYOFF].iter().zip(&ranking[UNSEEDED_PLAYOFF]) {
        let m = ko.seeded_tie(Round::Playoffs, unseeded, seeded, rng)?;
        playoff_winners.push(m.winner);
        matches.push(m);
    }

    playoff_winners.shuffle(rng);
    let mut alive = Vec::with_capacity(SEEDED_DIRECT.len());
    for (&seeded, &challenger) in ranking[SEEDED_DIRECT].iter().zip(&playoff_winners) {
        let m = ko.seeded_tie(Round::RoundOf16, challenger, seeded, rng)?;
        alive.push(m.winner);
        matches.push(m);
    }

    for round in [Round::QuarterFinal, Round::SemiFinal, Round::Final] {
        alive.shuffle(rng);
        let mut next = Vec::with_capacity(alive.len() / 2);
        for pair in alive.chunks_exact(2) {
            let m = ko.open_draw(round, pair[0], pair[1], rng)?;
            next.push(m.winner);
            matches.push(m);
        }
        alive = next;
    }

    debug!(
        matches = matches.len(),
        champion = ?alive.first().map(|t| dataset.teams().name(*t)),
        "knockout bracket simulated"
    );
    Ok(Bracket {
        seeding: ranking,
        matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MatchRecord;
    use crate::standings::{StandingsRow, build_standings};
    use crate::strength::TeamStrength;
    use chrono::{Duration, TimeZone, Utc};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn cup(teams: usize) -> Dataset {
        let start = Utc.with_ymd_and_hms(2024, 9, 17, 20, 0, 0).unwrap();
        let name = |i: usize| format!("Club {i:02}");
        let mut records = Vec::new();
        let mut day = 0;
        for i in 0..teams {
            for k in 1..=4 {
                let j = (i + k * 7) % teams;
                if i == j {
                    continue;
                }
                day += 1;
                records.push(MatchRecord {
                    date: start + Duration::hours(day),
                    home: name(i),
                    away: name(j),
                    home_goals: ((i * 3 + k) % 4) as u32,
                    away_goals: ((j + k) % 3) as u32,
                    finished: k <= 2,
                    stage: Some("LEAGUE_STAGE".to_string()),
                });
            }
        }
        Dataset::from_records(&records)
    }

    #[test]
    fn full_bracket_has_every_round() {
        let ds = cup(36);
        let table = build_standings(&ds);
        let mut rng = StdRng::seed_from_u64(2024);
        let bracket = simulate_bracket(&ds, &table, &mut rng).unwrap();

        assert_eq!(bracket.round(Round::Playoffs).count(), 8);
        assert_eq!(bracket.round(Round::RoundOf16).count(), 8);
        assert_eq!(bracket.round(Round::QuarterFinal).count(), 4);
        assert_eq!(bracket.round(Round::SemiFinal).count(), 2);
        let finals: Vec<_> = bracket.round(Round::Final).collect();
        assert_eq!(finals.len(), 1);
        let f = finals[0];
        assert!(f.winner == f.home || f.winner == f.away);
        assert_eq!(bracket.champion(), Some(f.winner));
        assert_eq!(bracket.seeding.len(), 36);
    }

    #[test]
    fn seeded_sides_host_the_listing() {
        let ds = cup(36);
        let table = build_standings(&ds);
        let mut rng = StdRng::seed_from_u64(11);
        let bracket = simulate_bracket(&ds, &table, &mut rng).unwrap();
        let seeding = &bracket.seeding;

        for (m, seeded) in bracket.round(Round::Playoffs).zip(&seeding[8..16]) {
            assert_eq!(m.home, *seeded);
            assert!(seeding[16..24].contains(&m.away));
        }
        let playoff_winners: Vec<_> = bracket.round(Round::Playoffs).map(|m| m.winner).collect();
        for (m, seeded) in bracket.round(Round::RoundOf16).zip(&seeding[0..8]) {
            assert_eq!(m.home, *seeded);
            assert!(playoff_winners.contains(&m.away));
        }
    }

    #[test]
    fn winners_advance_round_to_round() {
        let ds = cup(36);
        let table = build_standings(&ds);
        let mut rng = StdRng::seed_from_u64(5);
        let bracket = simulate_bracket(&ds, &table, &mut rng).unwrap();
        let rounds = [
            Round::RoundOf16,
            Round::QuarterFinal,
            Round::SemiFinal,
            Round::Final,
        ];
        for pair in rounds.windows(2) {
            let winners: Vec<_> = bracket.round(pair[0]).map(|m| m.winner).collect();
            for m in bracket.round(pair[1]) {
                assert!(winners.contains(&m.home) && winners.contains(&m.away));
            }
        }
    }

    #[test]
    fn same_seed_same_bracket() {
        let ds = cup(36);
        let table = build_standings(&ds);
        let a = simulate_bracket(&ds, &table, &mut StdRng::seed_from_u64(8)).unwrap();
        let b = simulate_bracket(&ds, &table, &mut StdRng::seed_from_u64(8)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn too_few_teams_is_an_error() {
        let ds = cup(12);
        let table = build_standings(&ds);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            simulate_bracket(&ds, &table, &mut rng),
            Err(ForecastError::TooFewTeams {
                needed: 24,
                found: 12
            })
        );
    }

    /// Team 0 scores at will, team 1 can never score.
    fn lopsided() -> Strengths {
        let mut s = Strengths::empty();
        s.ratings.insert(
            0,
            TeamStrength {
                attack: 10.0,
                defense: 1.0,
            },
        );
        s.ratings.insert(
            1,
            TeamStrength {
                attack: 0.0,
                defense: 1.0,
            },
        );
        s
    }

    #[test]
    fn aggregate_credits_each_leg_to_the_right_side() {
        let strengths = lopsided();
        let ko = Knockout {
            strengths: &strengths,
            boost: HashMap::new(),
        };
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..50 {
            assert_eq!(ko.two_legs(0, 1, &mut rng).unwrap().winner, 0);
            assert_eq!(ko.two_legs(1, 0, &mut rng).unwrap().winner, 0);
            assert_eq!(ko.seeded_tie(Round::Playoffs, 1, 0, &mut rng).unwrap().winner, 0);
            assert_eq!(ko.seeded_tie(Round::RoundOf16, 0, 1, &mut rng).unwrap().winner, 0);
            assert_eq!(ko.open_draw(Round::QuarterFinal, 0, 1, &mut rng).unwrap().winner, 0);
            assert_eq!(ko.open_draw(Round::SemiFinal, 1, 0, &mut rng).unwrap().winner, 0);
            assert_eq!(ko.open_draw(Round::Final, 1, 0, &mut rng).unwrap().winner, 0);
        }
    }

    #[test]
    fn result_strings_follow_the_listing() {
        let strengths = lopsided();
        let ko = Knockout {
            strengths: &strengths,
            boost: HashMap::new(),
        };
        let mut rng = StdRng::seed_from_u64(4);
        // Team 1 never scores, so its goal slots are always zero. The seeded
        // side's goals lead both legs of the listing.
        let m = ko.seeded_tie(Round::Playoffs, 1, 0, &mut rng).unwrap();
        assert_eq!((m.home, m.away), (0, 1));
        let (second_leg, first_leg) = m.result.split_once(" (").unwrap();
        assert!(second_leg.ends_with(":0") && !second_leg.starts_with("0:"));
        assert!(first_leg.ends_with(":0)") && !first_leg.starts_with("0:"));

        let m = ko.open_draw(Round::QuarterFinal, 1, 0, &mut rng).unwrap();
        let (first_leg, second_leg) = m.result.split_once(" / ").unwrap();
        assert!(first_leg.starts_with("0:"));
        assert!(second_leg.ends_with(":0"));
    }

    #[test]
    fn boost_scales_with_share_of_leader_points() {
        let mut leader = StandingsRow::new(0);
        leader.points = 20;
        let mut half = StandingsRow::new(1);
        half.points = 10;
        let pointless = StandingsRow::new(2);
        let boost = performance_boost(&Standings::new(vec![leader, half, pointless]));
        assert!((boost[&0] - 1.2).abs() < 1e-12);
        assert!((boost[&1] - 1.1).abs() < 1e-12);
        assert_eq!(boost[&2], 1.0);
    }

    #[test]
    fn no_points_anywhere_means_no_boost() {
        let table = Standings::new((0..4).map(StandingsRow::new).collect());
        let boost = performance_boost(&table);
        assert_eq!(boost.len(), 4);
        assert!(boost.values().all(|b| *b == 1.0));
    }

    #[test]
    fn level_scores_go_to_a_coin_flip() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut first = 0;
        for _ in 0..1000 {
            if decide(1, 2, 2, 2, &mut rng) == 1 {
                first += 1;
            }
        }
        assert!((400..600).contains(&first));
        assert_eq!(decide(1, 2, 3, 2, &mut rng), 1);
        assert_eq!(decide(1, 2, 0, 1, &mut rng), 2);
    }
}
