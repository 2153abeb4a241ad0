use chrono::{Duration, TimeZone, Utc};

use league_forecast::bracket::Round;
use league_forecast::config::Settings;
use league_forecast::forecast::forecast_competition;
use league_forecast::league::{Category, Competition};
use league_forecast::model::MatchRecord;

/// Round-robin style schedule where the first `played` rounds are finished.
fn schedule(teams: usize, rounds: usize, played: usize, stage: &str) -> Vec<MatchRecord> {
    let start = Utc.with_ymd_and_hms(2024, 8, 16, 19, 0, 0).unwrap();
    let mut out = Vec::new();
    for round in 0..rounds {
        for i in 0..teams / 2 {
            let home = (i + round) % teams;
            let away = (teams - 1 - i + round) % teams;
            let finished = round < played;
            out.push(MatchRecord {
                date: start + Duration::days(7 * round as i64) + Duration::minutes(i as i64),
                home: format!("Team {home:02}"),
                away: format!("Team {away:02}"),
                home_goals: if finished { ((home * 7 + round) % 4) as u32 } else { 0 },
                away_goals: if finished { ((away * 5 + round) % 3) as u32 } else { 0 },
                finished,
                stage: Some(stage.to_string()),
            });
        }
    }
    out
}

fn settings(seed: u64) -> Settings {
    Settings {
        trials: 200,
        seed: Some(seed),
        threads: 2,
        ..Settings::default()
    }
}

#[test]
fn cup_format_bands_partition_every_team() {
    let records = schedule(36, 8, 6, "LEAGUE_STAGE");
    let f = forecast_competition(Competition::ChampionsLeague, &records, &settings(11))
        .expect("forecast should run");

    assert_eq!(f.season.len(), 36);
    for row in &f.season {
        let total = row.percent(Category::Top8)
            + row.percent(Category::Playoff)
            + row.percent(Category::Out);
        assert!((total - 100.0).abs() < 1e-9, "{} -> {total}", f.team_name(row.team));
    }
    let title: f64 = f.season.iter().map(|r| r.percent(Category::Title)).sum();
    assert!((title - 100.0).abs() < 1e-9);
    assert!(f.favourite().is_some());

    let bracket = f.bracket.as_ref().expect("cup format plays a bracket");
    let finals: Vec<_> = bracket.round(Round::Final).collect();
    assert_eq!(finals.len(), 1);
    assert!(finals[0].winner == finals[0].home || finals[0].winner == finals[0].away);

    assert_eq!(f.predictions.len(), 18);
    for pair in f.predictions.windows(2) {
        assert!(pair[0].date <= pair[1].date);
    }
}

#[test]
fn league_format_counts_title_places_and_drop_zone() {
    let records = schedule(18, 34, 20, "REGULAR_SEASON");
    let f = forecast_competition(Competition::Bundesliga, &records, &settings(3))
        .expect("forecast should run");

    assert!(f.bracket.is_none());
    assert_eq!(f.predictions.len(), 9);

    let sum = |c: Category| f.season.iter().map(|r| r.percent(c)).sum::<f64>();
    assert!((sum(Category::Champion) - 100.0).abs() < 1e-9);
    assert!((sum(Category::Top4) - 400.0).abs() < 1e-9);
    assert!((sum(Category::Relegation) - 300.0).abs() < 1e-9);

    for pair in f.season.windows(2) {
        assert!(pair[0].avg_points >= pair[1].avg_points);
    }
    let leader = f.leader().expect("table has a leader");
    assert!(f.teams.iter().any(|t| t == leader));
}

#[test]
fn small_league_skips_relegation() {
    let records = schedule(10, 18, 9, "REGULAR_SEASON");
    let f = forecast_competition(Competition::SerieA, &records, &settings(1))
        .expect("forecast should run");
    assert!(f.season.iter().all(|r| r.percent(Category::Relegation) == 0.0));
}

#[test]
fn fixed_seed_reproduces_the_forecast() {
    let records = schedule(36, 8, 5, "LEAGUE_STAGE");
    let a = forecast_competition(Competition::ChampionsLeague, &records, &settings(42)).unwrap();
    let b = forecast_competition(Competition::ChampionsLeague, &records, &settings(42)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn too_small_cup_fails_the_whole_run() {
    let records = schedule(12, 6, 3, "LEAGUE_STAGE");
    let err = forecast_competition(Competition::ChampionsLeague, &records, &settings(9))
        .expect_err("bracket needs 24 teams");
    assert!(format!("{err:#}").contains("bracket"));
}
