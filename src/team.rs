use std::collections::BTreeMap;
use std::fmt;

use nalgebra as na;
use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bbox::{BBox, Ltrb};
use crate::category::Category;
use crate::frame::Frame;
use crate::store::TrackStore;
use crate::track::TrackId;

const KMEANS_MAX_ITER: usize = 32;

pub type Color = na::Vector3<f32>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(into = "u8", try_from = "u8")]
pub enum Team {
    One,
    Two,
}

impl Team {
    #[inline]
    pub fn label(self) -> u8 {
        match self {
            Team::One => 1,
            Team::Two => 2,
        }
    }

    #[inline]
    fn from_cluster(idx: usize) -> Self {
        if idx == 0 {
            Team::One
        } else {
            Team::Two
        }
    }
}

impl From<Team> for u8 {
    fn from(t: Team) -> u8 {
        t.label()
    }
}

impl TryFrom<u8> for Team {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Team::One),
            2 => Ok(Team::Two),
            _ => Err(format!("team label must be 1 or 2, got {}", v)),
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team {}", self.label())
    }
}

/// Two-way k-means with deterministic seeding: the first point seeds cluster 0, the
/// point farthest from it seeds cluster 1. Ties go to the lower cluster.
pub fn kmeans2(points: &[Color]) -> ([Color; 2], Vec<usize>) {
    let Some(first) = points.first().copied() else {
        return ([Color::zeros(); 2], Vec::new());
    };

    let mut far = first;
    let mut far_d = 0.0;
    for p in points {
        let d = (p - first).norm_squared();
        if d > far_d {
            far_d = d;
            far = *p;
        }
    }

    let mut centers = [first, far];
    let mut labels = vec![usize::MAX; points.len()];

    for _ in 0..KMEANS_MAX_ITER {
        let mut changed = false;

        for (label, p) in labels.iter_mut().zip(points) {
            let nearest = nearest(&centers, p);
            if *label != nearest {
                *label = nearest;
                changed = true;
            }
        }

        if !changed {
            break;
        }

        let mut sums = [Color::zeros(); 2];
        let mut counts = [0usize; 2];
        for (label, p) in labels.iter().zip(points) {
            sums[*label] += p;
            counts[*label] += 1;
        }

        for k in 0..2 {
            if counts[k] > 0 {
                centers[k] = sums[k] / counts[k] as f32;
            }
        }
    }

    (centers, labels)
}

#[inline]
fn nearest(centers: &[Color; 2], p: &Color) -> usize {
    if (p - centers[1]).norm_squared() < (p - centers[0]).norm_squared() {
        1
    } else {
        0
    }
}

/// Jersey colour of the player inside `bbox`: the top half of the box is split into
/// two colour clusters and the one not owning most of the corners is the shirt.
pub fn player_color(frame: &Frame, bbox: &BBox<Ltrb>) -> Option<Color> {
    let (fw, fh) = frame.dims();
    let (x, y, w, h) = bbox.clip(fw, fh)?;
    let rows = if h >= 2 { h / 2 } else { h };

    let (x, y, w) = (x as usize, y as usize, w as usize);
    let mut pixels = Vec::with_capacity(w * rows as usize);
    for yy in y..y + rows as usize {
        for xx in x..x + w {
            let [r, g, b] = frame.pixel(xx, yy);
            pixels.push(Color::new(r as f32, g as f32, b as f32));
        }
    }

    let (centers, labels) = kmeans2(&pixels);

    let rows = rows as usize;
    let corners = [
        labels[0],
        labels[w - 1],
        labels[(rows - 1) * w],
        labels[rows * w - 1],
    ];
    let background = if corners.iter().filter(|&&l| l == 1).count() > 2 {
        1
    } else {
        0
    };

    Some(centers[1 - background])
}

#[derive(Debug, Clone, Default)]
pub struct TeamAssigner {
    team_colors: Option<[Color; 2]>,
}

impl TeamAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mean jersey colour per team, known after `assign` saw at least one player.
    #[inline]
    pub fn team_colors(&self) -> Option<[Color; 2]> {
        self.team_colors
    }

    #[inline]
    pub fn team_color(&self, team: Team) -> Option<Color> {
        self.team_colors.map(|c| match team {
            Team::One => c[0],
            Team::Two => c[1],
        })
    }

    /// Labels every player track with a team. Tracks that already carry a label keep it.
    /// Returns the number of newly labelled tracks.
    pub fn assign(&mut self, frames: &[Frame], store: &mut TrackStore) -> usize {
        let mut appearances: BTreeMap<TrackId, Vec<(usize, BBox<Ltrb>)>> = BTreeMap::new();
        for (frame, id, track) in store.iter(Category::Players) {
            if frame < frames.len() {
                appearances.entry(id).or_default().push((frame, track.bbox));
            }
        }

        if appearances.is_empty() {
            debug!("no player tracks, skipping team assignment");
            return 0;
        }

        let samples: Vec<(TrackId, Color)> = appearances
            .into_par_iter()
            .filter_map(|(id, seen)| {
                seen.iter()
                    .find_map(|(frame, bbox)| player_color(&frames[*frame], bbox))
                    .map(|color| (id, color))
            })
            .collect();

        if samples.is_empty() {
            debug!("no usable jersey samples, skipping team assignment");
            return 0;
        }

        let colors: Vec<Color> = samples.iter().map(|(_, c)| *c).collect();
        let (centers, _) = kmeans2(&colors);
        self.team_colors = Some(centers);

        let teams = store.teams_mut();
        let mut assigned = 0;
        for (id, color) in &samples {
            if teams.contains(*id) {
                continue;
            }

            teams.assign(*id, Team::from_cluster(nearest(&centers, color)));
            assigned += 1;
        }

        info!(
            "team assignment: {} players sampled, {} newly labelled",
            samples.len(),
            assigned
        );

        assigned
    }
}
