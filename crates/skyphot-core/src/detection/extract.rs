use ndarray::Array2;
use tracing::debug;

use crate::consts::DEFAULT_MIN_AREA;

use super::components::label_components;

/// One source found by the extractor.
#[derive(Clone, Debug)]
pub struct DetectedObject {
    /// Flux-weighted centroid column.
    pub x: f64,
    /// Flux-weighted centroid row.
    pub y: f64,
    /// Sum of above-threshold pixel values.
    pub flux: f64,
    pub peak: f64,
    /// Number of connected pixels above threshold.
    pub area: usize,
}

/// Extracted sources plus the pixels attributed to them.
#[derive(Clone, Debug)]
pub struct Extraction {
    pub objects: Vec<DetectedObject>,
    /// Object `i` owns the pixels labelled `i + 1`; 0 is sky.
    pub segmentation: Array2<u32>,
}

impl Extraction {
    /// Boolean mask of source pixels.
    pub fn source_mask(&self) -> Array2<bool> {
        self.segmentation.mapv(|l| l != 0)
    }
}

/// Source extraction service: background-subtracted image in, candidates out.
pub trait SourceExtractor: Send + Sync {
    /// Detect sources brighter than `threshold * rms`.
    fn extract(&self, image: &Array2<f32>, threshold: f64, rms: f64) -> Extraction;
}

/// Threshold + connected-component extractor.
#[derive(Clone, Debug)]
pub struct ThresholdExtractor {
    pub min_area: usize,
}

impl Default for ThresholdExtractor {
    fn default() -> Self {
        Self {
            min_area: DEFAULT_MIN_AREA,
        }
    }
}

#[derive(Clone, Default)]
struct Accumulator {
    area: usize,
    flux: f64,
    sum_x: f64,
    sum_y: f64,
    peak: f64,
}

impl SourceExtractor for ThresholdExtractor {
    fn extract(&self, image: &Array2<f32>, threshold: f64, rms: f64) -> Extraction {
        let cutoff = threshold * rms;
        let mask = image.mapv(|v| v.is_finite() && v as f64 > cutoff);
        let labeling = label_components(&mask);

        let mut acc = vec![Accumulator::default(); labeling.count + 1];
        for ((row, col), &label) in labeling.labels.indexed_iter() {
            if label == 0 {
                continue;
            }
            let v = image[[row, col]] as f64;
            let a = &mut acc[label as usize];
            a.area += 1;
            a.flux += v;
            a.sum_x += v * col as f64;
            a.sum_y += v * row as f64;
            a.peak = a.peak.max(v);
        }

        // Drop undersized components and renumber the survivors.
        let mut remap = vec![0u32; acc.len()];
        let mut objects = Vec::new();
        for (label, a) in acc.iter().enumerate().skip(1) {
            if a.area < self.min_area || a.flux <= 0.0 {
                continue;
            }
            objects.push(DetectedObject {
                x: a.sum_x / a.flux,
                y: a.sum_y / a.flux,
                flux: a.flux,
                peak: a.peak,
                area: a.area,
            });
            remap[label] = objects.len() as u32;
        }

        let segmentation = labeling.labels.mapv(|l| remap[l as usize]);
        debug!(
            threshold,
            rms,
            components = labeling.count,
            objects = objects.len(),
            "Source extraction"
        );

        Extraction {
            objects,
            segmentation,
        }
    }
}
