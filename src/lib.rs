pub mod bbox;
pub mod camera;
pub mod category;
pub mod config;
pub mod error;
pub mod frame;
pub mod insights;
pub mod interpolate;
pub mod logging;
pub mod pipeline;
pub mod possession;
pub mod store;
pub mod team;
pub mod video;
pub mod zoom;

mod track;

pub use bbox::{BBox, Ltrb};
pub use camera::{CameraMotion, CameraMotionEstimator, Displacement};
pub use category::Category;
pub use config::{Config, Selection};
pub use error::Error;
pub use frame::{Frame, VideoClip};
pub use insights::{InsightsBundle, InsightsGenerator, PossessionKey};
pub use pipeline::{FrameAnnotation, Pipeline, PipelineReport};
pub use possession::{PlayerBallAssigner, PossessionSequence};
pub use store::TrackStore;
pub use team::{Team, TeamAssigner};
pub use track::{Track, TrackId};
pub use video::{ObjectTracker, RecordedTracks, VideoSink, VideoSource};
