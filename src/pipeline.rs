//! One video, end to end: tracks in, compensated positions, teams, possession and
//! insights out, plus the normal and zoomed renditions.

use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::bbox::{BBox, Ltrb};
use crate::camera::{self, CameraMotionEstimator, Displacement};
use crate::category::Category;
use crate::config::{Config, Selection};
use crate::error::Error;
use crate::frame::Frame;
use crate::insights::{InsightsBundle, InsightsGenerator, OutputSink};
use crate::interpolate::interpolate_ball_positions;
use crate::possession::{PlayerBallAssigner, PossessionSequence};
use crate::store::TrackStore;
use crate::team::{Color, Team, TeamAssigner};
use crate::track::TrackId;
use crate::video::{self, ObjectTracker, VideoSink, VideoSource};
use crate::zoom::crop_and_zoom;

pub const NORMAL_VIDEO_FILE: &str = "output_normal.mp4";
pub const ZOOMED_VIDEO_FILE: &str = "output_zoomed.mp4";

/// What the overlay renderer needs to know about one track in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedTrack {
    pub category: Category,
    pub id: TrackId,
    pub bbox: BBox<Ltrb>,
    pub team: Option<Team>,
    pub has_ball: bool,
    pub interpolated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnnotation {
    pub frame: usize,
    pub tracks: Vec<AnnotatedTrack>,
    pub camera_displacement: Displacement,
    pub possession: Option<Team>,
    pub show_statistics: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub frames: usize,
    pub fps: f32,
    pub displacement: Vec<Displacement>,
    pub possession: PossessionSequence,
    pub insights: InsightsBundle,
    pub annotations: Vec<FrameAnnotation>,
    pub team_colors: Option<[Color; 2]>,
}

pub struct Pipeline {
    config: Config,
    selection: Selection,
}

impl Pipeline {
    /// Fails when the configured categories select nothing.
    pub fn new(config: Config) -> Result<Self, Error> {
        let selection = config.selection()?;

        Ok(Self { config, selection })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn run<S, T, V, O>(
        &self,
        source: &mut S,
        tracker: &mut T,
        video_sink: &mut V,
        insights_sink: &mut O,
    ) -> Result<PipelineReport, Error>
    where
        S: VideoSource + ?Sized,
        T: ObjectTracker + ?Sized,
        V: VideoSink + ?Sized,
        O: OutputSink + ?Sized,
    {
        let (clip, mut store) = video::load_clip(source, tracker, &self.selection.categories)?;

        let Some(first) = clip.frames.first() else {
            return Err(Error::EmptyVideo);
        };
        if !(clip.fps.is_finite() && clip.fps > 0.0) {
            return Err(Error::InvalidFrameRate(clip.fps));
        }

        let estimator = CameraMotionEstimator::new(first, &Category::ALL, self.config.camera.clone());
        let motion = estimator.estimate(&clip.frames, &store);
        camera::adjust_positions(&mut store, &motion);

        if self.selection.contains(Category::Ball) {
            let filled = interpolate_ball_positions(&mut store);
            if filled > 0 {
                camera::adjust_category(&mut store, Category::Ball, &motion);
            }
        }

        let mut teams = TeamAssigner::new();
        teams.assign(&clip.frames, &mut store);

        let possession = PlayerBallAssigner::new(self.config.possession.clone()).assign(&mut store);

        let insights = InsightsGenerator::new(self.config.insights.clone()).generate_all(
            &store,
            &possession,
            clip.fps,
            insights_sink,
        )?;

        let annotations: Vec<FrameAnnotation> = (0..clip.len())
            .map(|frame| self.annotate(&store, frame, motion.per_frame[frame], possession[frame]))
            .collect();

        let zoomed = zoom_on_possessor(&clip.frames, &store);

        let out = &self.config.output_dir;
        video_sink.write(&out.join(NORMAL_VIDEO_FILE), &clip.frames, clip.fps)?;
        video_sink.write(&out.join(ZOOMED_VIDEO_FILE), &zoomed, clip.fps)?;

        info!(
            "processed {} frames, videos written to {}",
            clip.len(),
            out.display()
        );

        Ok(PipelineReport {
            frames: clip.len(),
            fps: clip.fps,
            displacement: motion.per_frame,
            possession,
            insights,
            annotations,
            team_colors: teams.team_colors(),
        })
    }

    fn annotate(
        &self,
        store: &TrackStore,
        frame: usize,
        camera_displacement: Displacement,
        possession: Option<Team>,
    ) -> FrameAnnotation {
        let tracks = self
            .selection
            .categories
            .iter()
            .flat_map(|&category| {
                store.frame(category, frame).map(move |(id, track)| {
                    let player = category == Category::Players;

                    AnnotatedTrack {
                        category,
                        id,
                        bbox: track.bbox,
                        team: if player { store.team_of(id) } else { None },
                        has_ball: player && store.has_ball(id, frame),
                        interpolated: track.interpolated,
                    }
                })
            })
            .collect();

        FrameAnnotation {
            frame,
            tracks,
            camera_displacement,
            possession,
            show_statistics: self.selection.show_statistics,
        }
    }

    /// Where the insights go when written to disk.
    #[inline]
    pub fn insights_dir(&self) -> PathBuf {
        self.config.insights_dir()
    }
}

fn zoom_on_possessor(frames: &[Frame], store: &TrackStore) -> Vec<Frame> {
    frames
        .par_iter()
        .enumerate()
        .map(|(idx, frame)| {
            let bbox = store
                .possession()
                .holder(idx)
                .and_then(|id| store.get(Category::Players, idx, id))
                .map(|t| t.bbox);

            if bbox.is_none() {
                debug!("frame {}: no possessor, zoomed frame is the full frame", idx);
            }

            crop_and_zoom(frame, bbox.as_ref())
        })
        .collect()
}
