//! Per-category, per-frame arena of track records plus the overlays the
//! analysis stages write on top of the detector geometry.

use std::collections::{BTreeMap, BTreeSet};

use serde_derive::{Deserialize, Serialize};
use tracing::debug;

use crate::bbox::{BBox, Ltrb};
use crate::category::Category;
use crate::team::Team;
use crate::track::{Track, TrackId};

/// Raw record as produced by the tracker collaborator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RawRecord {
    pub bbox: BBox<Ltrb>,
}

/// `category -> frame -> track id -> {bbox}`, the shape the tracker hands over.
pub type RawTracks = BTreeMap<Category, Vec<BTreeMap<TrackId, RawRecord>>>;

/// Team labels keyed by track id. A label, once set, is never replaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamOverlay {
    labels: BTreeMap<TrackId, Team>,
}

impl TeamOverlay {
    /// Stores `team` for `id` unless it already has a label, returns the label in effect.
    #[inline]
    pub fn assign(&mut self, id: TrackId, team: Team) -> Team {
        *self.labels.entry(id).or_insert(team)
    }

    #[inline]
    pub fn get(&self, id: TrackId) -> Option<Team> {
        self.labels.get(&id).copied()
    }

    #[inline]
    pub fn contains(&self, id: TrackId) -> bool {
        self.labels.contains_key(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (TrackId, Team)> + '_ {
        self.labels.iter().map(|(id, t)| (*id, *t))
    }
}

/// Possession flags keyed by `(frame, track id)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PossessionOverlay {
    flags: BTreeSet<(usize, TrackId)>,
}

impl PossessionOverlay {
    /// Makes `id` the only holder of the ball in `frame`.
    pub fn set(&mut self, frame: usize, id: TrackId) {
        self.clear_frame(frame);
        self.flags.insert((frame, id));
    }

    pub fn clear_frame(&mut self, frame: usize) {
        let held: Vec<_> = self
            .flags
            .range((frame, TrackId::MIN)..=(frame, TrackId::MAX))
            .copied()
            .collect();

        for key in held {
            self.flags.remove(&key);
        }
    }

    #[inline]
    pub fn has_ball(&self, id: TrackId, frame: usize) -> bool {
        self.flags.contains(&(frame, id))
    }

    #[inline]
    pub fn holder(&self, frame: usize) -> Option<TrackId> {
        self.flags
            .range((frame, TrackId::MIN)..=(frame, TrackId::MAX))
            .next()
            .map(|(_, id)| *id)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (usize, TrackId)> + '_ {
        self.flags.iter().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackStore {
    frames: usize,
    categories: [Vec<BTreeMap<TrackId, Track>>; 4],
    teams: TeamOverlay,
    possession: PossessionOverlay,
}

impl TrackStore {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            categories: std::array::from_fn(|_| vec![BTreeMap::new(); frames]),
            teams: TeamOverlay::default(),
            possession: PossessionOverlay::default(),
        }
    }

    /// Builds the store from the tracker's raw shape. Frames beyond `frames` are dropped,
    /// missing trailing frames stay empty.
    pub fn from_raw(raw: &RawTracks, frames: usize) -> Self {
        let mut store = Self::new(frames);

        for (category, per_frame) in raw {
            if per_frame.len() > frames {
                debug!(
                    "{}: dropping {} frames beyond the video end",
                    category,
                    per_frame.len() - frames
                );
            }

            for (frame, records) in per_frame.iter().enumerate().take(frames) {
                for (id, rec) in records {
                    store.insert(*category, frame, *id, rec.bbox);
                }
            }
        }

        store
    }

    /// Number of frames covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Inserts or replaces a record. The ball is singular: a new ball id replaces any
    /// other ball in the same frame. Out of range frames are ignored.
    pub fn insert(
        &mut self,
        category: Category,
        frame: usize,
        id: TrackId,
        bbox: BBox<Ltrb>,
    ) -> Option<Track> {
        self.insert_track(category, frame, id, Track::new(bbox))
    }

    pub fn insert_track(
        &mut self,
        category: Category,
        frame: usize,
        id: TrackId,
        track: Track,
    ) -> Option<Track> {
        let records = self.categories[category.index()].get_mut(frame)?;

        if category == Category::Ball {
            let previous = std::mem::take(records).into_values().next();
            records.insert(id, track);
            return previous;
        }

        records.insert(id, track)
    }

    #[inline]
    pub fn get(&self, category: Category, frame: usize, id: TrackId) -> Option<&Track> {
        self.categories[category.index()].get(frame)?.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, category: Category, frame: usize, id: TrackId) -> Option<&mut Track> {
        self.categories[category.index()].get_mut(frame)?.get_mut(&id)
    }

    /// Records of one category in one frame, ascending by track id.
    #[inline]
    pub fn frame(&self, category: Category, frame: usize) -> impl Iterator<Item = (TrackId, &Track)> {
        self.categories[category.index()]
            .get(frame)
            .into_iter()
            .flat_map(|f| f.iter().map(|(id, t)| (*id, t)))
    }

    #[inline]
    pub fn ball(&self, frame: usize) -> Option<(TrackId, &Track)> {
        self.frame(Category::Ball, frame).next()
    }

    /// Every record of a category as `(frame, id, track)`, frame-major.
    pub fn iter(&self, category: Category) -> impl Iterator<Item = (usize, TrackId, &Track)> {
        self.categories[category.index()]
            .iter()
            .enumerate()
            .flat_map(|(frame, f)| f.iter().map(move |(id, t)| (frame, *id, t)))
    }

    pub fn iter_mut(
        &mut self,
        category: Category,
    ) -> impl Iterator<Item = (usize, TrackId, &mut Track)> {
        self.categories[category.index()]
            .iter_mut()
            .enumerate()
            .flat_map(|(frame, f)| f.iter_mut().map(move |(id, t)| (frame, *id, t)))
    }

    pub fn track_ids(&self, category: Category) -> BTreeSet<TrackId> {
        self.iter(category).map(|(_, id, _)| id).collect()
    }

    /// Number of records of a category over all frames.
    pub fn count(&self, category: Category) -> usize {
        self.categories[category.index()].iter().map(BTreeMap::len).sum()
    }

    #[inline]
    pub fn teams(&self) -> &TeamOverlay {
        &self.teams
    }

    #[inline]
    pub fn teams_mut(&mut self) -> &mut TeamOverlay {
        &mut self.teams
    }

    #[inline]
    pub fn team_of(&self, id: TrackId) -> Option<Team> {
        self.teams.get(id)
    }

    #[inline]
    pub fn possession(&self) -> &PossessionOverlay {
        &self.possession
    }

    #[inline]
    pub fn possession_mut(&mut self) -> &mut PossessionOverlay {
        &mut self.possession
    }

    #[inline]
    pub fn has_ball(&self, id: TrackId, frame: usize) -> bool {
        self.possession.has_ball(id, frame)
    }
}
