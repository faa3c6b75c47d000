use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use tracing::info;

use crate::category::Category;
use crate::store::TrackStore;
use crate::team::Team;
use crate::track::{Track, TrackId};

/// Team holding the ball in each frame, `None` when nobody does.
pub type PossessionSequence = Vec<Option<Team>>;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PossessionConfig {
    /// Players farther than this (px) from the ball are never credited. Inclusive.
    pub max_player_ball_distance: f32,
}

impl Default for PossessionConfig {
    fn default() -> Self {
        Self {
            max_player_ball_distance: 70.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlayerBallAssigner {
    config: PossessionConfig,
}

impl PlayerBallAssigner {
    pub fn new(config: PossessionConfig) -> Self {
        Self { config }
    }

    /// Distance from the ball center to the closer foot of the player.
    #[inline]
    pub fn distance(player: &Track, ball: na::Point2<f32>) -> f32 {
        player
            .bbox
            .feet()
            .iter()
            .map(|foot| na::distance(foot, &ball))
            .fold(f32::INFINITY, f32::min)
    }

    /// The player closest to the ball within the threshold. Equal distances resolve to
    /// the lowest track id.
    pub fn assign_ball_to_player<'a, I>(&self, players: I, ball: na::Point2<f32>) -> Option<TrackId>
    where
        I: IntoIterator<Item = (TrackId, &'a Track)>,
    {
        let mut best: Option<(TrackId, f32)> = None;

        for (id, player) in players {
            let d = Self::distance(player, ball);
            if d > self.config.max_player_ball_distance {
                continue;
            }

            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((id, d));
            }
        }

        best.map(|(id, _)| id)
    }

    /// Flags the possessor of every frame in the store and returns the per-frame team.
    pub fn assign(&self, store: &mut TrackStore) -> PossessionSequence {
        let mut sequence = Vec::with_capacity(store.len());

        for frame in 0..store.len() {
            let holder = store.ball(frame).and_then(|(_, ball)| {
                self.assign_ball_to_player(store.frame(Category::Players, frame), ball.bbox.center())
            });

            let possession = store.possession_mut();
            possession.clear_frame(frame);

            match holder {
                Some(id) => {
                    possession.set(frame, id);
                    sequence.push(store.team_of(id));
                }
                None => sequence.push(None),
            }
        }

        info!(
            "ball possession: {} of {} frames attributed",
            sequence.iter().filter(|p| p.is_some()).count(),
            sequence.len()
        );

        sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;

    fn store_with_ball(ball_x: f32) -> TrackStore {
        let mut store = TrackStore::new(1);
        // feet at (100, 200) and (120, 200)
        store.insert(Category::Players, 0, 1, BBox::ltrb(100.0, 150.0, 120.0, 200.0));
        store.insert(Category::Ball, 0, 1, BBox::ltrb(ball_x - 2.0, 198.0, ball_x + 2.0, 202.0));
        store.teams_mut().assign(1, Team::Two);
        store
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let assigner = PlayerBallAssigner::default();

        let mut at = store_with_ball(190.0);
        assert_eq!(assigner.assign(&mut at), vec![Some(Team::Two)]);
        assert!(at.has_ball(1, 0));

        let mut beyond = store_with_ball(190.5);
        assert_eq!(assigner.assign(&mut beyond), vec![None]);
        assert!(!beyond.has_ball(1, 0));
    }

    #[test]
    fn test_nearest_player_wins_and_ties_go_to_first() {
        let assigner = PlayerBallAssigner::default();
        let mut store = TrackStore::new(2);
        store.insert(Category::Players, 0, 4, BBox::ltrb(0.0, 0.0, 10.0, 50.0));
        store.insert(Category::Players, 0, 2, BBox::ltrb(30.0, 0.0, 40.0, 50.0));
        store.insert(Category::Ball, 0, 1, BBox::ltrb(12.0, 48.0, 16.0, 52.0));
        // equidistant: ball center 10 px from both inner feet
        store.insert(Category::Players, 1, 4, BBox::ltrb(0.0, 0.0, 10.0, 50.0));
        store.insert(Category::Players, 1, 2, BBox::ltrb(30.0, 0.0, 40.0, 50.0));
        store.insert(Category::Ball, 1, 1, BBox::ltrb(18.0, 48.0, 22.0, 52.0));
        store.teams_mut().assign(4, Team::One);
        store.teams_mut().assign(2, Team::Two);

        let seq = assigner.assign(&mut store);
        assert_eq!(seq, vec![Some(Team::One), Some(Team::Two)]);
        assert_eq!(store.possession().holder(0), Some(4));
        assert_eq!(store.possession().holder(1), Some(2));
        assert_eq!(store.possession().len(), 2);
    }

    #[test]
    fn test_missing_ball_or_players() {
        let assigner = PlayerBallAssigner::default();
        let mut store = TrackStore::new(2);
        store.insert(Category::Players, 0, 1, BBox::ltrb(0.0, 0.0, 10.0, 50.0));
        store.insert(Category::Ball, 1, 1, BBox::ltrb(0.0, 0.0, 4.0, 4.0));

        assert_eq!(assigner.assign(&mut store), vec![None, None]);
        assert!(store.possession().is_empty());
        assert!(assigner.assign(&mut TrackStore::new(0)).is_empty());
    }

    #[test]
    fn test_unlabelled_possessor() {
        let assigner = PlayerBallAssigner::default();
        let mut store = TrackStore::new(1);
        store.insert(Category::Players, 0, 3, BBox::ltrb(0.0, 0.0, 10.0, 50.0));
        store.insert(Category::Ball, 0, 1, BBox::ltrb(8.0, 48.0, 12.0, 52.0));

        assert_eq!(assigner.assign(&mut store), vec![None]);
        assert!(store.has_ball(3, 0));
    }
}
