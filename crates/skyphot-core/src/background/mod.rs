//! Spatially varying sky background.
//!
//! The image is divided into a mesh of boxes; each box gets a sigma-clipped
//! mode estimate and RMS, the mesh is median filtered, and the full-resolution
//! background is interpolated between box centres.

mod mesh;

use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{PhotometryError, Result};

pub use mesh::BackgroundMesh;

/// One (box-size, filter-width) background parameterization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackgroundSetting {
    pub box_width: usize,
    pub box_height: usize,
    pub filter_width: usize,
    pub filter_height: usize,
}

impl BackgroundSetting {
    /// Square box and square filter.
    pub fn square(box_size: usize, filter_width: usize) -> Self {
        Self {
            box_width: box_size,
            box_height: box_size,
            filter_width,
            filter_height: filter_width,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.box_width == 0 || self.box_height == 0 || self.filter_width == 0 || self.filter_height == 0 {
            return Err(PhotometryError::InvalidBackgroundSetting {
                box_size: self.box_width.min(self.box_height),
                filter_width: self.filter_width.min(self.filter_height),
            });
        }
        Ok(())
    }
}

impl fmt::Display for BackgroundSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "box {}x{}, filter {}x{}",
            self.box_width, self.box_height, self.filter_width, self.filter_height
        )
    }
}

/// Flatten box sizes x filter widths into the ordered setting axis
/// (box size outer, filter width inner).
pub fn setting_axis(box_sizes: &[usize], filter_widths: &[usize]) -> Vec<BackgroundSetting> {
    box_sizes
        .iter()
        .flat_map(|&b| filter_widths.iter().map(move |&f| BackgroundSetting::square(b, f)))
        .collect()
}

/// Smooth sky estimate for one image at one setting.
#[derive(Clone, Debug)]
pub struct Background {
    back: Array2<f32>,
    pub global_back: f64,
    pub global_rms: f64,
    pub setting: BackgroundSetting,
}

impl Background {
    /// Model the background of `data` with the given setting.
    pub fn estimate(data: &Array2<f32>, setting: BackgroundSetting) -> Result<Self> {
        setting.validate()?;
        let mesh = BackgroundMesh::build(data, &setting);
        let (global_back, global_rms) = mesh.global_stats();
        let back = mesh.interpolate(data.dim());
        Ok(Self {
            back,
            global_back,
            global_rms,
            setting,
        })
    }

    /// Full-resolution background image.
    pub fn back(&self) -> &Array2<f32> {
        &self.back
    }

    /// `data - background`.
    pub fn subtract_from(&self, data: &Array2<f32>) -> Array2<f32> {
        data - &self.back
    }
}
