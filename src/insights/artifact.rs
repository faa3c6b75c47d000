//! Read side of the insights directory, for consumers that come after the pipeline.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use image::RgbImage;
use serde_derive::Deserialize;

use crate::error::Error;
use crate::track::TrackId;

use super::{
    PossessionKey, BALL_POSSESSION_FILE, PLAYER_HEATMAP_FILE, PLAYER_POSSESSION_FILE,
    PLAYER_SPEED_FILE, TEAM1_HEATMAP_FILE, TEAM2_HEATMAP_FILE, TEAM_POSSESSION_FILE,
};

/// An artifact either exists and parses, or its file is missing.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact<T> {
    Available(T),
    NotAvailable(PathBuf),
}

impl<T> Artifact<T> {
    #[inline]
    pub fn is_available(&self) -> bool {
        matches!(self, Artifact::Available(_))
    }

    #[inline]
    pub fn available(self) -> Option<T> {
        match self {
            Artifact::Available(v) => Some(v),
            Artifact::NotAvailable(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatmapKind {
    AllPlayers,
    Team1,
    Team2,
}

impl HeatmapKind {
    pub fn file_name(self) -> &'static str {
        match self {
            HeatmapKind::AllPlayers => PLAYER_HEATMAP_FILE,
            HeatmapKind::Team1 => TEAM1_HEATMAP_FILE,
            HeatmapKind::Team2 => TEAM2_HEATMAP_FILE,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PossessionRow {
    #[serde(rename = "Player ID")]
    id: TrackId,
    #[serde(rename = "Possession Time (s)")]
    seconds: f64,
}

#[derive(Debug, Deserialize)]
struct SpeedRow {
    #[serde(rename = "Player ID")]
    id: TrackId,
    #[serde(rename = "Average Speed (km/h)")]
    kmh: f64,
}

/// Opens the files written by [`super::FsSink`] on demand.
#[derive(Debug, Clone)]
pub struct InsightsArtifacts {
    dir: PathBuf,
}

impl InsightsArtifacts {
    pub fn open<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ball_possession(&self) -> Result<Artifact<BTreeMap<PossessionKey, f64>>, Error> {
        self.json(BALL_POSSESSION_FILE)
    }

    pub fn team_possession(&self) -> Result<Artifact<BTreeMap<PossessionKey, f64>>, Error> {
        self.json(TEAM_POSSESSION_FILE)
    }

    pub fn player_possession(&self) -> Result<Artifact<BTreeMap<TrackId, f64>>, Error> {
        self.load(PLAYER_POSSESSION_FILE, |file| {
            csv::Reader::from_reader(file)
                .deserialize::<PossessionRow>()
                .map(|row| row.map(|r| (r.id, r.seconds)).map_err(Error::from))
                .collect()
        })
    }

    pub fn player_speed(&self) -> Result<Artifact<BTreeMap<TrackId, f64>>, Error> {
        self.load(PLAYER_SPEED_FILE, |file| {
            csv::Reader::from_reader(file)
                .deserialize::<SpeedRow>()
                .map(|row| row.map(|r| (r.id, r.kmh)).map_err(Error::from))
                .collect()
        })
    }

    pub fn heatmap(&self, kind: HeatmapKind) -> Result<Artifact<RgbImage>, Error> {
        self.load(kind.file_name(), |file| {
            let img = image::load(file, image::ImageFormat::Png)?;
            Ok(img.to_rgb8())
        })
    }

    /// Presence check for a rendered video next to the insights, e.g. `../output_normal.mp4`.
    pub fn video<P: AsRef<Path>>(&self, path: P) -> Artifact<PathBuf> {
        let path = self.dir.join(path);
        if path.is_file() {
            Artifact::Available(path)
        } else {
            Artifact::NotAvailable(path)
        }
    }

    fn json<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<Artifact<T>, Error> {
        self.load(name, |file| Ok(serde_json::from_reader(file)?))
    }

    fn load<T, F>(&self, name: &str, parse: F) -> Result<Artifact<T>, Error>
    where
        F: FnOnce(BufReader<File>) -> Result<T, Error>,
    {
        let path = self.dir.join(name);

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Artifact::NotAvailable(path))
            }
            Err(err) => return Err(err.into()),
        };

        parse(BufReader::new(file)).map(Artifact::Available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{FsSink, OutputSink};
    use crate::team::Team;

    #[test]
    fn test_missing_files_are_not_available() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = InsightsArtifacts::open(dir.path());

        assert_eq!(
            artifacts.ball_possession().unwrap(),
            Artifact::NotAvailable(dir.path().join(BALL_POSSESSION_FILE))
        );
        assert!(!artifacts.player_speed().unwrap().is_available());
        assert!(!artifacts.heatmap(HeatmapKind::Team2).unwrap().is_available());
        assert!(!artifacts.video("output_normal.mp4").is_available());
    }

    #[test]
    fn test_reads_back_written_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FsSink::new(dir.path());

        sink.write_document(
            BALL_POSSESSION_FILE,
            &serde_json::json!({"Team 1": 75.0, "No possession": 25.0}),
        )
        .unwrap();
        sink.write_table(
            PLAYER_SPEED_FILE,
            &["Player ID", "Average Speed (km/h)"],
            &[vec!["4".into(), "12.5".into()], vec!["9".into(), "3".into()]],
        )
        .unwrap();
        sink.write_image(PLAYER_HEATMAP_FILE, &RgbImage::new(4, 3)).unwrap();

        let artifacts = InsightsArtifacts::open(dir.path());

        let possession = artifacts.ball_possession().unwrap().available().unwrap();
        assert_eq!(possession[&PossessionKey::Team(Team::One)], 75.0);
        assert_eq!(possession[&PossessionKey::NoPossession], 25.0);

        let speed = artifacts.player_speed().unwrap().available().unwrap();
        assert_eq!(speed.into_iter().collect::<Vec<_>>(), vec![(4, 12.5), (9, 3.0)]);

        let img = artifacts.heatmap(HeatmapKind::AllPlayers).unwrap().available().unwrap();
        assert_eq!(img.dimensions(), (4, 3));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(TEAM_POSSESSION_FILE), b"{ not json").unwrap();

        let artifacts = InsightsArtifacts::open(dir.path());
        assert!(matches!(artifacts.team_possession(), Err(Error::JsonError(_))));
    }
}
