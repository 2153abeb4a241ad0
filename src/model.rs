use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

pub type TeamId = u32;

/// One scheduled or played fixture as delivered by the results feed.
/// Absent or null goals read as 0; absent or null names read as blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub date: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub home: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub away: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub home_goals: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub away_goals: u32,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub stage: Option<String>,
}

fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

const KNOCKOUT_STAGES: &[&str] = &[
    "PLAYOFFS",
    "LAST_32",
    "LAST_16",
    "QUARTER_FINALS",
    "SEMI_FINALS",
    "THIRD_PLACE",
    "FINAL",
];

/// Stage labels that belong to the knockout bracket rather than the table.
pub fn is_knockout_stage(stage: Option<&str>) -> bool {
    let Some(stage) = stage else {
        return false;
    };
    let key = stage.trim().to_ascii_uppercase();
    KNOCKOUT_STAGES.iter().any(|s| *s == key)
}

/// Name <-> id registry. Ids are dense and assigned in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct Teams {
    names: Vec<String>,
    index: HashMap<String, TeamId>,
}

impl Teams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` for blank names; those never receive an id.
    pub fn intern(&mut self, name: &str) -> Option<TeamId> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        if let Some(id) = self.id(name) {
            return Some(id);
        }
        let id = self.names.len() as TeamId;
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        Some(id)
    }

    pub fn id(&self, name: &str) -> Option<TeamId> {
        self.index.get(name.trim()).copied()
    }

    pub fn name(&self, id: TeamId) -> &str {
        self.names.get(id as usize).map(String::as_str).unwrap_or("?")
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = TeamId> + '_ {
        (0..self.names.len()).map(|i| i as TeamId)
    }
}

/// A match with both sides resolved to registry ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub date: DateTime<Utc>,
    pub home: TeamId,
    pub away: TeamId,
    pub home_goals: u32,
    pub away_goals: u32,
    pub finished: bool,
    pub stage: Option<String>,
}

impl Fixture {
    pub fn is_knockout(&self) -> bool {
        is_knockout_stage(self.stage.as_deref())
    }
}

/// The immutable input of every forecast: a team registry plus the fixtures
/// that reference it. Records with a blank side are dropped on construction.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    teams: Teams,
    fixtures: Vec<Fixture>,
    skipped: usize,
}

impl Dataset {
    pub fn from_records(records: &[MatchRecord]) -> Self {
        let mut teams = Teams::new();
        let mut fixtures = Vec::with_capacity(records.len());
        let mut skipped = 0usize;

        for rec in records {
            if rec.home.trim().is_empty() || rec.away.trim().is_empty() {
                skipped += 1;
                continue;
            }
            let (Some(home), Some(away)) = (teams.intern(&rec.home), teams.intern(&rec.away))
            else {
                continue;
            };
            fixtures.push(Fixture {
                date: rec.date,
                home,
                away,
                home_goals: rec.home_goals,
                away_goals: rec.away_goals,
                finished: rec.finished,
                stage: rec.stage.clone(),
            });
        }

        if skipped > 0 {
            debug!(skipped, "dropped match records with a blank team name");
        }
        Self {
            teams,
            fixtures,
            skipped,
        }
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let records: Vec<MatchRecord> = serde_json::from_str(raw)?;
        Ok(Self::from_records(&records))
    }

    pub fn teams(&self) -> &Teams {
        &self.teams
    }

    pub fn fixtures(&self) -> &[Fixture] {
        &self.fixtures
    }

    /// Number of input records discarded for missing team identity.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn finished(&self) -> impl Iterator<Item = &Fixture> {
        self.fixtures.iter().filter(|f| f.finished)
    }

    pub fn remaining(&self) -> impl Iterator<Item = &Fixture> {
        self.fixtures.iter().filter(|f| !f.finished)
    }
}
