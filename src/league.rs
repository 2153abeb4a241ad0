use serde::{Deserialize, Serialize};

/// Which placement bands a competition's table feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Format {
    /// Domestic league: title, continental places, relegation.
    League,
    /// Single-table group phase feeding a knockout bracket (36 entrants).
    CupGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Champion,
    Top4,
    Relegation,
    Title,
    Top8,
    Playoff,
    Out,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Champion => "Champion",
            Category::Top4 => "Top 4",
            Category::Relegation => "Relegation",
            Category::Title => "Title",
            Category::Top8 => "Top 8",
            Category::Playoff => "Playoff",
            Category::Out => "Out",
        }
    }
}

const LEAGUE_CATEGORIES: &[Category] = &[Category::Champion, Category::Top4, Category::Relegation];
const CUP_CATEGORIES: &[Category] = &[
    Category::Title,
    Category::Top8,
    Category::Playoff,
    Category::Out,
];

/// Smallest league that has a three-team relegation zone.
pub const RELEGATION_MIN_TEAMS: usize = 18;
const RELEGATION_SPOTS: usize = 3;
const CONTINENTAL_SPOTS: usize = 4;
const DIRECT_SPOTS: usize = 8;
const PLAYOFF_LAST_RANK: usize = 24;

impl Format {
    pub fn categories(self) -> &'static [Category] {
        match self {
            Format::League => LEAGUE_CATEGORIES,
            Format::CupGroup => CUP_CATEGORIES,
        }
    }

    /// Bands reached by the team finishing at zero-based `rank` of `teams`.
    pub fn bands(self, rank: usize, teams: usize) -> impl Iterator<Item = Category> {
        let hits: [Option<Category>; 3] = match self {
            Format::League => [
                (rank == 0).then_some(Category::Champion),
                (rank < CONTINENTAL_SPOTS).then_some(Category::Top4),
                (teams >= RELEGATION_MIN_TEAMS && rank >= teams - RELEGATION_SPOTS)
                    .then_some(Category::Relegation),
            ],
            Format::CupGroup => [
                (rank == 0).then_some(Category::Title),
                Some(if rank < DIRECT_SPOTS {
                    Category::Top8
                } else if rank < PLAYOFF_LAST_RANK {
                    Category::Playoff
                } else {
                    Category::Out
                }),
                None,
            ],
        };
        hits.into_iter().flatten()
    }

    /// Category used to name the favourite.
    pub fn headline(self) -> Category {
        match self {
            Format::League => Category::Champion,
            Format::CupGroup => Category::Title,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Competition {
    Bundesliga,
    PremierLeague,
    LaLiga,
    SerieA,
    Ligue1,
    ChampionsLeague,
}

impl Competition {
    pub const ALL: [Competition; 6] = [
        Competition::Bundesliga,
        Competition::PremierLeague,
        Competition::LaLiga,
        Competition::SerieA,
        Competition::Ligue1,
        Competition::ChampionsLeague,
    ];

    /// Competition id on the results feed.
    pub fn feed_id(self) -> u32 {
        match self {
            Competition::Bundesliga => 2002,
            Competition::PremierLeague => 2021,
            Competition::LaLiga => 2014,
            Competition::SerieA => 2019,
            Competition::Ligue1 => 2015,
            Competition::ChampionsLeague => 2001,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Competition::Bundesliga => "Bundesliga",
            Competition::PremierLeague => "Premier League",
            Competition::LaLiga => "La Liga",
            Competition::SerieA => "Serie A",
            Competition::Ligue1 => "Ligue 1",
            Competition::ChampionsLeague => "Champions League",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Competition::Bundesliga => "bundesliga",
            Competition::PremierLeague => "premier_league",
            Competition::LaLiga => "laliga",
            Competition::SerieA => "serie_a",
            Competition::Ligue1 => "ligue1",
            Competition::ChampionsLeague => "champions_league",
        }
    }

    pub fn format(self) -> Format {
        match self {
            Competition::ChampionsLeague => Format::CupGroup,
            _ => Format::League,
        }
    }

    /// How many upcoming fixtures make up one matchday.
    pub fn upcoming_count(self) -> usize {
        match self {
            Competition::ChampionsLeague => 18,
            Competition::Bundesliga | Competition::Ligue1 => 9,
            _ => 10,
        }
    }

    /// Accepts the display name, the key, or the feed id.
    pub fn parse(raw: &str) -> Option<Self> {
        let want = raw.trim();
        Self::ALL.into_iter().find(|c| {
            c.name().eq_ignore_ascii_case(want)
                || c.key().eq_ignore_ascii_case(want)
                || c.feed_id().to_string() == want
        })
    }
}
