use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Yaml Error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Csv Error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Image Error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Logging Error: {0}")]
    LoggingError(#[from] tracing_subscriber::util::TryInitError),

    #[cfg(feature = "opencv")]
    #[error("OpenCV Error: {0}")]
    OpenCvError(#[from] opencv::Error),

    #[error("no valid categories in {0:?}, expected any of: ball, goalkeepers, players, referees, stats")]
    NoValidCategories(Vec<String>),

    #[error("video contains no frames")]
    EmptyVideo,

    #[error("invalid frame rate: {0}")]
    InvalidFrameRate(f32),

    #[error("frame {index} has {found:?} dims, expected {expected:?}")]
    FrameShape {
        index: usize,
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("tracks cover {tracks} frames but the video has {frames}")]
    FrameCountMismatch { tracks: usize, frames: usize },

    #[error("unable to open video `{0}`")]
    VideoOpen(String),
}
