use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Object categories produced by the detector.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ball,
    Goalkeepers,
    Players,
    Referees,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Ball,
        Category::Goalkeepers,
        Category::Players,
        Category::Referees,
    ];

    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Category::Ball => "ball",
            Category::Goalkeepers => "goalkeepers",
            Category::Players => "players",
            Category::Referees => "referees",
        }
    }

    #[inline(always)]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.iter().copied().find(|c| c.name() == s).ok_or(())
    }
}
