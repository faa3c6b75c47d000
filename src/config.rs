use std::fs;
use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};
use tracing::warn;

use crate::camera::CameraConfig;
use crate::category::Category;
use crate::error::Error;
use crate::insights::InsightsConfig;
use crate::possession::PossessionConfig;

/// Selection name that toggles the statistics overlay rather than a tracked category.
pub const STATS: &str = "stats";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// Any of `ball`, `goalkeepers`, `players`, `referees` and `stats`
    pub categories: Vec<String>,
    pub verbose: bool,
    pub output_dir: PathBuf,
    pub camera: CameraConfig,
    pub possession: PossessionConfig,
    pub insights: InsightsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            categories: Category::ALL
                .iter()
                .map(|c| c.name().to_string())
                .chain(Some(STATS.to_string()))
                .collect(),
            verbose: false,
            output_dir: PathBuf::from("output"),
            camera: CameraConfig::default(),
            possession: PossessionConfig::default(),
            insights: InsightsConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Validated view of `categories`. Unknown names are logged and skipped, a list with
    /// nothing valid left is an error.
    pub fn selection(&self) -> Result<Selection, Error> {
        Selection::parse(&self.categories)
    }

    #[inline]
    pub fn insights_dir(&self) -> PathBuf {
        self.output_dir.join("insights")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub categories: Vec<Category>,
    pub show_statistics: bool,
}

impl Selection {
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, Error> {
        let mut categories = Vec::new();
        let mut show_statistics = false;

        for name in names {
            let name = name.as_ref();

            if name == STATS {
                show_statistics = true;
            } else if let Ok(category) = name.parse::<Category>() {
                if !categories.contains(&category) {
                    categories.push(category);
                }
            } else {
                warn!("ignoring unknown category `{}`", name);
            }
        }

        if categories.is_empty() && !show_statistics {
            return Err(Error::NoValidCategories(
                names.iter().map(|n| n.as_ref().to_string()).collect(),
            ));
        }

        categories.sort();

        Ok(Self {
            categories,
            show_statistics,
        })
    }

    #[inline]
    pub fn contains(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selects_everything() {
        let sel = Config::default().selection().unwrap();
        assert_eq!(sel.categories, Category::ALL.to_vec());
        assert!(sel.show_statistics);
    }

    #[test]
    fn test_invalid_names_are_skipped() {
        let sel = Selection::parse(&["players", "coaches", "ball", "players"]).unwrap();
        assert_eq!(sel.categories, vec![Category::Ball, Category::Players]);
        assert!(!sel.show_statistics);
        assert!(sel.contains(Category::Ball));
        assert!(!sel.contains(Category::Referees));
    }

    #[test]
    fn test_nothing_valid_is_an_error() {
        match Selection::parse(&["coaches", "fans"]) {
            Err(Error::NoValidCategories(names)) => assert_eq!(names, vec!["coaches", "fans"]),
            other => panic!("unexpected {:?}", other),
        }
        assert!(Selection::parse::<&str>(&[]).is_err());
    }

    #[test]
    fn test_stats_only() {
        let sel = Selection::parse(&["stats"]).unwrap();
        assert!(sel.categories.is_empty());
        assert!(sel.show_statistics);
    }

    #[test]
    fn test_load_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "categories: [players, ball]\nverbose: true\npossession:\n  max_player_ball_distance: 50.0\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.verbose);
        assert_eq!(config.possession.max_player_ball_distance, 50.0);
        assert_eq!(config.camera.max_features, 100);
        assert_eq!(config.insights.bins, 50);
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.insights_dir(), PathBuf::from("output/insights"));
        assert_eq!(config.selection().unwrap().categories.len(), 2);
    }
}
