use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::warn;

use league_forecast::cache::{ForecastCache, default_cache_path};
use league_forecast::config::Settings;
use league_forecast::forecast::{Forecast, forecast_competition};
use league_forecast::league::Competition;
use league_forecast::model::MatchRecord;

fn main() -> Result<()> {
    let settings = Settings::load();
    if std::env::var("RUST_LOG").is_err() {
        // SAFETY: single-threaded at this point, before any pool is spawned.
        unsafe { std::env::set_var("RUST_LOG", "info") };
    }
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("usage: forecast <matches.json> [competition]"))?;
    let competition = match args.next() {
        Some(raw) => {
            Competition::parse(&raw).ok_or_else(|| anyhow!("unknown competition: {raw}"))?
        }
        None => Competition::PremierLeague,
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    let records: Vec<MatchRecord> =
        serde_json::from_str(&raw).context("invalid match records json")?;

    let mut cache = match default_cache_path() {
        Some(cache_path) => ForecastCache::open(cache_path, settings.cache_ttl),
        None => ForecastCache::new(settings.cache_ttl),
    };
    // One entry per competition and dataset file.
    let key = format!("{}:{}", competition.key(), path.display());
    let forecast = cache.get_or_compute(&key, || {
        forecast_competition(competition, &records, &settings)
    })?;
    if let Err(err) = cache.save() {
        warn!("could not persist forecast cache: {err:#}");
    }

    print_forecast(&forecast);
    Ok(())
}

fn print_forecast(f: &Forecast) {
    println!("{} (seed {})", f.competition.name(), f.seed);
    println!();

    println!("Table");
    for (pos, row) in f.standings.iter().enumerate() {
        println!(
            "{:>3}. {:<28} {:>3} pts  {:>+4}  {:>3} gf  {:>2} pl",
            pos + 1,
            f.team_name(row.team),
            row.points,
            row.diff,
            row.goals_for,
            row.played,
        );
    }
    println!();

    println!("Projection");
    for (pos, row) in f.season.iter().enumerate() {
        let bands = row
            .categories
            .iter()
            .map(|(c, p)| format!("{} {:>5.1}%", c.label(), p))
            .collect::<Vec<_>>()
            .join("  ");
        println!(
            "{:>3}. {:<28} {:>5.1} pts  {}",
            pos + 1,
            f.team_name(row.team),
            row.avg_points,
            bands
        );
    }
    if let Some(fav) = f.favourite() {
        println!("Favourite: {fav}");
    }
    println!();

    if let Some(bracket) = f.bracket.as_ref() {
        println!("Knockout scenario");
        for m in &bracket.matches {
            println!(
                "{:<13} {:<24} - {:<24} {:<16} -> {}",
                m.round.label(),
                f.team_name(m.home),
                f.team_name(m.away),
                m.result,
                f.team_name(m.winner),
            );
        }
        println!();
    }

    println!("Next fixtures");
    for p in &f.predictions {
        println!(
            "{}  {:<24} - {:<24} tip {}:{}  1 {:>5.1}%  X {:>5.1}%  2 {:>5.1}%",
            p.date.format("%d.%m. %H:%M"),
            f.team_name(p.home),
            f.team_name(p.away),
            p.tip.0,
            p.tip.1,
            p.p_home,
            p.p_draw,
            p.p_away,
        );
    }
}
