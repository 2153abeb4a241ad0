use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Dataset, TeamId};
use crate::win_prob::{Outcome, classify_outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingsRow {
    pub team: TeamId,
    pub points: i32,
    pub goals_for: i32,
    pub goals_against: i32,
    pub diff: i32,
    pub played: u32,
}

impl StandingsRow {
    pub fn new(team: TeamId) -> Self {
        Self {
            team,
            points: 0,
            goals_for: 0,
            goals_against: 0,
            diff: 0,
            played: 0,
        }
    }
}

/// Points desc, then goal difference desc, then goals scored desc.
pub fn table_order(a: &StandingsRow, b: &StandingsRow) -> Ordering {
    b.points
        .cmp(&a.points)
        .then(b.diff.cmp(&a.diff))
        .then(b.goals_for.cmp(&a.goals_for))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Standings {
    rows: Vec<StandingsRow>,
}

impl Standings {
    pub fn new(rows: Vec<StandingsRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[StandingsRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, team: TeamId) -> Option<&StandingsRow> {
        self.rows.iter().find(|r| r.team == team)
    }

    /// Row position of every team, for O(1) updates on a cloned table.
    pub fn slots(&self) -> HashMap<TeamId, usize> {
        self.rows
            .iter()
            .enumerate()
            .map(|(slot, row)| (row.team, slot))
            .collect()
    }

    /// Row positions in table order without moving the rows. Equal keys keep
    /// their current relative order.
    pub fn order(&self) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..self.rows.len()).collect();
        idx.sort_by(|&a, &b| table_order(&self.rows[a], &self.rows[b]));
        idx
    }

    pub fn ranking(&self) -> Vec<TeamId> {
        self.order().into_iter().map(|i| self.rows[i].team).collect()
    }

    pub fn rank(&mut self) {
        self.rows.sort_by(table_order);
    }

    pub fn max_points(&self) -> Option<i32> {
        self.rows.iter().map(|r| r.points).max()
    }

    /// Credits 3/1/0 points for a result between the rows at `home` and `away`.
    pub fn award_points(&mut self, home: usize, away: usize, home_goals: u32, away_goals: u32) {
        match classify_outcome(home_goals, away_goals) {
            Outcome::Home => self.rows[home].points += 3,
            Outcome::Away => self.rows[away].points += 3,
            Outcome::Draw => {
                self.rows[home].points += 1;
                self.rows[away].points += 1;
            }
        }
    }
}

/// The current table from finished results. Every team in the registry gets a
/// row, including teams that have not played yet. Knockout-stage results stay
/// out of the table.
pub fn build_standings(dataset: &Dataset) -> Standings {
    let mut table = Standings::new(dataset.teams().ids().map(StandingsRow::new).collect());

    for m in dataset.finished().filter(|m| !m.is_knockout()) {
        let (h, a) = (m.home as usize, m.away as usize);
        let (hg, ag) = (m.home_goals as i32, m.away_goals as i32);
        for (slot, scored, conceded) in [(h, hg, ag), (a, ag, hg)] {
            let row = &mut table.rows[slot];
            row.played += 1;
            row.goals_for += scored;
            row.goals_against += conceded;
            row.diff = row.goals_for - row.goals_against;
        }
        table.award_points(h, a, m.home_goals, m.away_goals);
    }

    table.rank();
    table
}
