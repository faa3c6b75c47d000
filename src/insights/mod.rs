//! Match statistics derived from the annotated track store.

pub mod artifact;
pub mod heatmap;
pub mod sink;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserializer, Serializer};
use serde_derive::{Deserialize, Serialize};
use tracing::info;

use crate::category::Category;
use crate::error::Error;
use crate::possession::PossessionSequence;
use crate::store::TrackStore;
use crate::team::Team;
use crate::track::TrackId;

pub use artifact::{Artifact, HeatmapKind, InsightsArtifacts};
pub use heatmap::Heatmap;
pub use sink::{FsSink, MemorySink, OutputSink};

pub const FIELD_LENGTH_M: f64 = 105.0;
pub const FIELD_WIDTH_M: f64 = 68.0;
const MS_TO_KMH: f64 = 3.6;

pub const BALL_POSSESSION_FILE: &str = "ball_possession.json";
pub const TEAM_POSSESSION_FILE: &str = "team_possession.json";
pub const PLAYER_POSSESSION_FILE: &str = "player_possession.csv";
pub const PLAYER_SPEED_FILE: &str = "player_speed.csv";
pub const PLAYER_HEATMAP_FILE: &str = "player_heatmap.png";
pub const TEAM1_HEATMAP_FILE: &str = "team1_heatmap.png";
pub const TEAM2_HEATMAP_FILE: &str = "team2_heatmap.png";

pub const PLAYER_ID_COLUMN: &str = "Player ID";
pub const POSSESSION_TIME_COLUMN: &str = "Possession Time (s)";
pub const SPEED_COLUMN: &str = "Average Speed (km/h)";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct InsightsConfig {
    /// Heatmap bins per axis
    pub bins: usize,
    /// Heatmap cell size in the rendered image (px)
    pub cell_size: u32,
    /// Resolution the full pitch is assumed to fill when converting px to meters
    pub reference_resolution: [u32; 2],
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            bins: 50,
            cell_size: 10,
            reference_resolution: [1920, 1080],
        }
    }
}

impl InsightsConfig {
    /// Average of the horizontal and vertical pixel-per-meter scales.
    pub fn pixels_per_meter(&self) -> f64 {
        let [w, h] = self.reference_resolution;
        (w as f64 / FIELD_LENGTH_M + h as f64 / FIELD_WIDTH_M) / 2.0
    }
}

/// Key of the team level statistics, `"Team 1"`, `"Team 2"` or `"No possession"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PossessionKey {
    Team(Team),
    NoPossession,
}

impl From<Option<Team>> for PossessionKey {
    fn from(v: Option<Team>) -> Self {
        v.map_or(PossessionKey::NoPossession, PossessionKey::Team)
    }
}

impl fmt::Display for PossessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PossessionKey::Team(t) => write!(f, "{}", t),
            PossessionKey::NoPossession => f.write_str("No possession"),
        }
    }
}

impl FromStr for PossessionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Team 1" => Ok(PossessionKey::Team(Team::One)),
            "Team 2" => Ok(PossessionKey::Team(Team::Two)),
            "No possession" => Ok(PossessionKey::NoPossession),
            _ => Err(format!("unknown possession key `{}`", s)),
        }
    }
}

impl serde::Serialize for PossessionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for PossessionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Heatmaps {
    pub all: Heatmap,
    pub team1: Heatmap,
    pub team2: Heatmap,
}

/// Everything derived for one video. Built once, never changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightsBundle {
    pub ball_possession: BTreeMap<PossessionKey, f64>,
    pub team_possession_time: BTreeMap<PossessionKey, f64>,
    pub player_possession_time: BTreeMap<TrackId, f64>,
    pub player_speed: BTreeMap<TrackId, f64>,
    pub heatmaps: Heatmaps,
}

fn frame_counts(possession: &[Option<Team>]) -> BTreeMap<PossessionKey, usize> {
    let mut counts = BTreeMap::new();
    for p in possession {
        *counts.entry(PossessionKey::from(*p)).or_insert(0) += 1;
    }
    counts
}

/// Share of frames per value present in the sequence, in percent. Values that never
/// occur have no entry.
pub fn ball_possession(possession: &[Option<Team>]) -> BTreeMap<PossessionKey, f64> {
    let total = possession.len() as f64;

    frame_counts(possession)
        .into_iter()
        .map(|(k, n)| (k, n as f64 / total * 100.0))
        .collect()
}

pub fn team_possession_time(possession: &[Option<Team>], fps: f64) -> BTreeMap<PossessionKey, f64> {
    frame_counts(possession)
        .into_iter()
        .map(|(k, n)| (k, n as f64 / fps))
        .collect()
}

/// Seconds each player held the ball. Players that never did are absent.
pub fn player_possession_time(store: &TrackStore, fps: f64) -> BTreeMap<TrackId, f64> {
    let mut frames: BTreeMap<TrackId, usize> = BTreeMap::new();
    for (_, id) in store.possession().iter() {
        *frames.entry(id).or_insert(0) += 1;
    }

    frames
        .into_iter()
        .map(|(id, n)| (id, n as f64 / fps))
        .collect()
}

/// Average speed over the whole clip in km/h: adjusted distance covered between
/// consecutive frames where the player is seen in both, over the clip duration.
pub fn player_speed(store: &TrackStore, fps: f64, pixels_per_meter: f64) -> BTreeMap<TrackId, f64> {
    let mut distance_px: BTreeMap<TrackId, f64> = BTreeMap::new();

    for (frame, id, track) in store.iter(Category::Players) {
        let covered = distance_px.entry(id).or_insert(0.0);

        let prev = frame
            .checked_sub(1)
            .and_then(|f| store.get(Category::Players, f, id));
        if let Some(prev) = prev {
            let d = track.adjusted() - prev.adjusted();
            *covered += (d.x as f64).hypot(d.y as f64);
        }
    }

    let elapsed = store.len() as f64 / fps;

    distance_px
        .into_iter()
        .map(|(id, px)| (id, px / pixels_per_meter / elapsed * MS_TO_KMH))
        .collect()
}

pub fn player_heatmap(store: &TrackStore, team: Option<Team>, bins: usize) -> Heatmap {
    let positions: Vec<_> = store
        .iter(Category::Players)
        .filter(|(_, id, _)| team.is_none() || store.team_of(*id) == team)
        .map(|(_, _, t)| t.adjusted())
        .collect();

    Heatmap::from_positions(&positions, bins)
}

#[derive(Debug, Clone, Default)]
pub struct InsightsGenerator {
    config: InsightsConfig,
}

impl InsightsGenerator {
    pub fn new(config: InsightsConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &InsightsConfig {
        &self.config
    }

    pub fn generate(
        &self,
        store: &TrackStore,
        possession: &PossessionSequence,
        fps: f32,
    ) -> Result<InsightsBundle, Error> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(Error::InvalidFrameRate(fps));
        }

        let fps = fps as f64;
        let bins = self.config.bins;

        Ok(InsightsBundle {
            ball_possession: ball_possession(possession),
            team_possession_time: team_possession_time(possession, fps),
            player_possession_time: player_possession_time(store, fps),
            player_speed: player_speed(store, fps, self.config.pixels_per_meter()),
            heatmaps: Heatmaps {
                all: player_heatmap(store, None, bins),
                team1: player_heatmap(store, Some(Team::One), bins),
                team2: player_heatmap(store, Some(Team::Two), bins),
            },
        })
    }

    pub fn save<S: OutputSink + ?Sized>(&self, bundle: &InsightsBundle, sink: &mut S) -> Result<(), Error> {
        sink.write_document(BALL_POSSESSION_FILE, &serde_json::to_value(&bundle.ball_possession)?)?;
        sink.write_document(TEAM_POSSESSION_FILE, &serde_json::to_value(&bundle.team_possession_time)?)?;

        sink.write_table(
            PLAYER_POSSESSION_FILE,
            &[PLAYER_ID_COLUMN, POSSESSION_TIME_COLUMN],
            &table_rows(&bundle.player_possession_time),
        )?;
        sink.write_table(
            PLAYER_SPEED_FILE,
            &[PLAYER_ID_COLUMN, SPEED_COLUMN],
            &table_rows(&bundle.player_speed),
        )?;

        let cell = self.config.cell_size;
        sink.write_image(PLAYER_HEATMAP_FILE, &bundle.heatmaps.all.render(cell))?;
        sink.write_image(TEAM1_HEATMAP_FILE, &bundle.heatmaps.team1.render(cell))?;
        sink.write_image(TEAM2_HEATMAP_FILE, &bundle.heatmaps.team2.render(cell))?;

        Ok(())
    }

    /// Computes the bundle and writes it out.
    pub fn generate_all<S: OutputSink + ?Sized>(
        &self,
        store: &TrackStore,
        possession: &PossessionSequence,
        fps: f32,
        sink: &mut S,
    ) -> Result<InsightsBundle, Error> {
        let bundle = self.generate(store, possession, fps)?;
        self.save(&bundle, sink)?;

        info!(
            "insights: possession {:?}, {} players with possession, {} with speed",
            bundle
                .ball_possession
                .iter()
                .map(|(k, v)| format!("{} {:.1}%", k, v))
                .collect::<Vec<_>>(),
            bundle.player_possession_time.len(),
            bundle.player_speed.len()
        );

        Ok(bundle)
    }
}

fn table_rows(values: &BTreeMap<TrackId, f64>) -> Vec<Vec<String>> {
    values
        .iter()
        .map(|(id, v)| vec![id.to_string(), v.to_string()])
        .collect()
}
