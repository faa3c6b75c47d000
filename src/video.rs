//! Seams to the collaborators around the analytics: video decode, video encode and the
//! object tracker.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::category::Category;
use crate::error::Error;
use crate::frame::{Frame, VideoClip};
use crate::store::{RawTracks, TrackStore};

pub trait VideoSource {
    /// Decodes the whole video into memory.
    fn read(&mut self) -> Result<VideoClip, Error>;
}

pub trait VideoSink {
    fn write(&mut self, path: &Path, frames: &[Frame], fps: f32) -> Result<(), Error>;
}

pub trait ObjectTracker {
    /// Tracks of `categories` for every frame of `clip`.
    fn track(&mut self, clip: &VideoClip, categories: &[Category]) -> Result<TrackStore, Error>;
}

impl VideoSource for VideoClip {
    fn read(&mut self) -> Result<VideoClip, Error> {
        Ok(self.clone())
    }
}

/// Tracker replaying tracks recorded earlier, in the
/// `{"players": [{"1": {"bbox": [x1, y1, x2, y2]}}, ...], ...}` layout.
#[derive(Debug, Clone, Default)]
pub struct RecordedTracks {
    raw: RawTracks,
}

impl RecordedTracks {
    pub fn new(raw: RawTracks) -> Self {
        Self { raw }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let raw: RawTracks = serde_json::from_reader(reader)?;

        debug!(
            "loaded recorded tracks from {}: {:?}",
            path.as_ref().display(),
            raw.iter().map(|(c, f)| (c.name(), f.len())).collect::<Vec<_>>()
        );

        Ok(Self { raw })
    }

    #[inline]
    pub fn raw(&self) -> &RawTracks {
        &self.raw
    }
}

impl ObjectTracker for RecordedTracks {
    fn track(&mut self, clip: &VideoClip, categories: &[Category]) -> Result<TrackStore, Error> {
        let mut selected = RawTracks::new();

        for category in categories {
            if let Some(frames) = self.raw.get(category) {
                if frames.len() != clip.len() {
                    return Err(Error::FrameCountMismatch {
                        tracks: frames.len(),
                        frames: clip.len(),
                    });
                }

                selected.insert(*category, frames.clone());
            }
        }

        Ok(TrackStore::from_raw(&selected, clip.len()))
    }
}

/// Keeps written videos in memory, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryVideoSink {
    pub videos: BTreeMap<PathBuf, (Vec<Frame>, f32)>,
}

impl MemoryVideoSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VideoSink for MemoryVideoSink {
    fn write(&mut self, path: &Path, frames: &[Frame], fps: f32) -> Result<(), Error> {
        self.videos.insert(path.to_path_buf(), (frames.to_vec(), fps));
        Ok(())
    }
}

#[cfg(feature = "opencv")]
pub use self::cv::{OpenCvVideoSource, OpenCvVideoWriter};

#[cfg(feature = "opencv")]
mod cv {
    use std::path::Path;

    use opencv::{core, imgproc, prelude::*, videoio};
    use tracing::{debug, info};

    use super::{VideoSink, VideoSource};
    use crate::error::Error;
    use crate::frame::{Frame, VideoClip};

    pub struct OpenCvVideoSource {
        path: String,
    }

    impl OpenCvVideoSource {
        pub fn new<S: ToString>(path: S) -> Self {
            Self {
                path: path.to_string(),
            }
        }
    }

    impl VideoSource for OpenCvVideoSource {
        fn read(&mut self) -> Result<VideoClip, Error> {
            let mut cam = videoio::VideoCapture::from_file(&self.path, videoio::CAP_ANY)?;
            if !videoio::VideoCapture::is_opened(&cam)? {
                return Err(Error::VideoOpen(self.path.clone()));
            }

            let fps = cam.get(videoio::CAP_PROP_FPS)? as f32;
            let mut frames = Vec::new();
            let mut bgr = core::Mat::default();
            let mut rgb = core::Mat::default();

            loop {
                if !cam.read(&mut bgr)? {
                    break;
                }

                let (width, height) = (bgr.cols(), bgr.rows());
                if width == 0 || height == 0 {
                    break;
                }

                imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

                let timestamp = if fps > 0.0 {
                    frames.len() as f32 / fps
                } else {
                    0.0
                };
                let frame = Frame::from_rgb(rgb.data_bytes()?.to_vec(), width as u32, height as u32, timestamp)
                    .ok_or_else(|| Error::VideoOpen(self.path.clone()))?;

                frames.push(frame);
            }

            info!("read {} frames at {} fps from {}", frames.len(), fps, self.path);

            Ok(VideoClip { frames, fps })
        }
    }

    pub struct OpenCvVideoWriter {
        writer: Option<videoio::VideoWriter>,
        size: Option<(i32, i32)>,
    }

    impl Default for OpenCvVideoWriter {
        fn default() -> Self {
            Self::new()
        }
    }

    impl OpenCvVideoWriter {
        pub fn new() -> Self {
            Self {
                writer: None,
                size: None,
            }
        }

        pub fn release(&mut self) -> Result<(), Error> {
            if let Some(mut w) = self.writer.take() {
                w.release()?;
            }

            self.size = None;
            Ok(())
        }

        fn reinit(&mut self, path: &Path, size: (i32, i32), fps: f32) -> Result<(), Error> {
            self.release()?;

            self.size = Some(size);
            self.writer = Some(videoio::VideoWriter::new(
                &path.to_string_lossy(),
                videoio::VideoWriter::fourcc(b'm' as _, b'p' as _, b'4' as _, b'v' as _)?,
                fps as f64,
                core::Size::new(size.0, size.1),
                true,
            )?);

            Ok(())
        }

        fn feed(&mut self, frame: &Frame) -> Result<(), Error> {
            let (width, height) = frame.dims();
            let data: Vec<u8> = frame.pixels.iter().copied().collect();

            let flat = core::Mat::from_slice(&data)?;
            let rgb = flat.reshape(3, height as i32)?;
            let mut bgr = core::Mat::default();
            imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;

            debug_assert_eq!((bgr.cols(), bgr.rows()), (width as i32, height as i32));

            if let Some(w) = self.writer.as_mut() {
                w.write(&bgr)?;
            }

            Ok(())
        }
    }

    impl VideoSink for OpenCvVideoWriter {
        fn write(&mut self, path: &Path, frames: &[Frame], fps: f32) -> Result<(), Error> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            for frame in frames {
                let (width, height) = frame.dims();
                let size = (width as i32, height as i32);

                if self.writer.is_none() || self.size != Some(size) {
                    self.reinit(path, size, fps)?;
                }

                self.feed(frame)?;
            }

            self.release()?;
            debug!("wrote {} frames to {}", frames.len(), path.display());

            Ok(())
        }
    }
}

/// Reads frames and tracks and checks they line up.
pub fn load_clip<S, T>(source: &mut S, tracker: &mut T, categories: &[Category]) -> Result<(VideoClip, TrackStore), Error>
where
    S: VideoSource + ?Sized,
    T: ObjectTracker + ?Sized,
{
    let clip = source.read()?;
    let store = tracker.track(&clip, categories)?;

    if store.len() != clip.len() {
        return Err(Error::FrameCountMismatch {
            tracks: store.len(),
            frames: clip.len(),
        });
    }

    info!(
        "clip: {} frames at {} fps, {} player records, {} ball records",
        clip.len(),
        clip.fps,
        store.count(Category::Players),
        store.count(Category::Ball)
    );

    Ok((clip, store))
}
