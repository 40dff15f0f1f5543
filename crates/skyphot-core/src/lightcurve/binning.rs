//! Rebin a series to a fixed wall-clock duration without crossing cadence changes.

use crate::stats::nan_mean;

/// Maximal run of consecutive frames sharing one exposure time; `end` is exclusive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExposureBlock {
    pub start: usize,
    pub end: usize,
    pub exposure: f64,
}

impl ExposureBlock {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

pub fn exposure_blocks(exposure: &[f64]) -> Vec<ExposureBlock> {
    let mut blocks: Vec<ExposureBlock> = Vec::new();
    for (i, &e) in exposure.iter().enumerate() {
        match blocks.last_mut() {
            Some(b) if b.exposure == e => b.end = i + 1,
            _ => blocks.push(ExposureBlock {
                start: i,
                end: i + 1,
                exposure: e,
            }),
        }
    }
    blocks
}

/// Samples per bin for a cadence; at least one.
pub fn points_per_bin(duration: f64, exposure: f64) -> usize {
    let n = (duration / exposure).floor();
    if n.is_finite() && n >= 1.0 {
        n as usize
    } else {
        1
    }
}

/// Average contiguous groups of `ppb` samples; trailing samples that do not
/// fill a group are dropped.
pub fn bin_block(values: &[f64], ppb: usize) -> Vec<f64> {
    let ppb = ppb.max(1);
    values.chunks_exact(ppb).map(nan_mean).collect()
}

/// Bin `values` block by block, keeping only samples where `keep` is true.
///
/// Output length depends on the data.
pub fn bin_to_duration(values: &[f64], keep: &[bool], blocks: &[ExposureBlock], duration: f64) -> Vec<f64> {
    let mut out = Vec::new();
    for block in blocks {
        let end = block.end.min(values.len()).min(keep.len());
        if block.start >= end {
            continue;
        }
        let kept: Vec<f64> = values[block.start..end]
            .iter()
            .zip(&keep[block.start..end])
            .filter(|&(_, &k)| k)
            .map(|(&v, _)| v)
            .collect();
        out.extend(bin_block(&kept, points_per_bin(duration, block.exposure)));
    }
    out
}

/// Keep-mask of finite samples.
pub fn finite_mask(values: &[f64]) -> Vec<bool> {
    values.iter().map(|v| v.is_finite()).collect()
}
