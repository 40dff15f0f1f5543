use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{PhotometryError, Result};
use crate::frame::Frame;
use crate::io::header::{check_frame_header, load_frame, HeaderKeys};

/// Ordered supply of frames; index 0 is the reference frame.
pub trait FrameSource: Send + Sync {
    fn len(&self) -> usize;

    fn load(&self, index: usize) -> Result<Frame>;

    /// Check every frame's metadata before any pixels are reduced.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// FITS files of one directory, in file-name order.
pub struct FitsDirectory {
    paths: Vec<PathBuf>,
    keys: HeaderKeys,
}

impl FitsDirectory {
    /// List `*.<extension>` files in `dir`. A missing directory or an empty
    /// listing is a fatal setup error.
    pub fn open(dir: &Path, extension: &str, keys: HeaderKeys) -> Result<Self> {
        if !dir.is_dir() {
            return Err(PhotometryError::MissingInputDir(dir.to_path_buf()));
        }
        let extension = extension.trim_start_matches('.');
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(extension))
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(PhotometryError::EmptyFrameList(dir.to_path_buf()));
        }
        info!(dir = %dir.display(), frames = paths.len(), "Listed input frames");
        Ok(Self { paths, keys })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl FrameSource for FitsDirectory {
    fn len(&self) -> usize {
        self.paths.len()
    }

    fn load(&self, index: usize) -> Result<Frame> {
        let path = self
            .paths
            .get(index)
            .ok_or(PhotometryError::FrameIndexOutOfRange {
                index,
                total: self.paths.len(),
            })?;
        let mut frame = load_frame(path, &self.keys)?;
        frame.metadata.frame_index = index;
        Ok(frame)
    }

    /// Read the primary header of every file; the first unusable one aborts.
    fn validate(&self) -> Result<()> {
        for path in &self.paths {
            if let Err(e) = check_frame_header(path, &self.keys) {
                warn!(path = %path.display(), error = %e, "Frame header rejected");
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Frames already in memory.
pub struct FrameList {
    frames: Vec<Frame>,
}

impl FrameList {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }
}

impl FrameSource for FrameList {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn load(&self, index: usize) -> Result<Frame> {
        let mut frame = self
            .frames
            .get(index)
            .cloned()
            .ok_or(PhotometryError::FrameIndexOutOfRange {
                index,
                total: self.frames.len(),
            })?;
        frame.metadata.frame_index = index;
        Ok(frame)
    }
}
