//! Classify a night's FITS files into bias, flat and science frames.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PhotometryError, Result};
use crate::io::fits::{header_text, FitsFile};
use crate::io::header::{read_identifiers, HeaderKeys};

/// How calibration frames are recognised.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    pub obstype_key: String,
    pub bias_id: String,
    pub flat_id: String,
    /// Only files whose name starts with this prefix are considered.
    pub file_prefix: String,
    pub file_extension: String,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            obstype_key: "OBSTYPE".into(),
            bias_id: "BIAS".into(),
            flat_id: "FLAT".into(),
            file_prefix: String::new(),
            file_extension: "fits".into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScienceFrame {
    pub path: PathBuf,
    pub object: String,
    pub filter: String,
    pub ra: Option<String>,
    pub dec: Option<String>,
}

impl ScienceFrame {
    /// Target label, e.g. `WASP-12 (V)`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.object, self.filter)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SortedFrames {
    pub bias: Vec<PathBuf>,
    /// Flat path and its filter.
    pub flats: Vec<(PathBuf, String)>,
    pub science: Vec<ScienceFrame>,
}

impl SortedFrames {
    /// Science frames grouped by target label, in label order.
    pub fn targets(&self) -> BTreeMap<String, Vec<&ScienceFrame>> {
        let mut groups: BTreeMap<String, Vec<&ScienceFrame>> = BTreeMap::new();
        for frame in &self.science {
            groups.entry(frame.label()).or_default().push(frame);
        }
        groups
    }
}

fn collect_files(dir: &Path, config: &SortConfig, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, config, out)?;
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let ext_ok = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(config.file_extension.trim_start_matches('.')));
        if ext_ok && name.starts_with(&config.file_prefix) {
            out.push(path);
        }
    }
    Ok(())
}

/// Walk `dir` recursively and classify every matching file by its header.
pub fn sort_frames(dir: &Path, config: &SortConfig, keys: &HeaderKeys) -> Result<SortedFrames> {
    if !dir.is_dir() {
        return Err(PhotometryError::MissingInputDir(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    collect_files(dir, config, &mut files)?;
    files.sort();
    debug!(dir = %dir.display(), files = files.len(), "Sorting frames");

    let mut sorted = SortedFrames::default();
    for path in files {
        let header = match FitsFile::open(&path).and_then(|f| f.primary()) {
            Ok(h) => h,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                continue;
            }
        };
        let ids = read_identifiers(&header, keys);
        let obstype = header_text(&header, &config.obstype_key)
            .unwrap_or_default()
            .to_uppercase();
        let object = ids.object.clone().unwrap_or_default();
        let object_upper = object.to_uppercase();
        let is = |id: &str| !id.is_empty() && (obstype.contains(id) || object_upper.contains(id));

        if is(&config.bias_id) {
            sorted.bias.push(path);
        } else if is(&config.flat_id) {
            sorted.flats.push((path, ids.filter_name()));
        } else {
            sorted.science.push(ScienceFrame {
                path,
                filter: ids.filter_name(),
                object,
                ra: ids.ra,
                dec: ids.dec,
            });
        }
    }
    Ok(sorted)
}
