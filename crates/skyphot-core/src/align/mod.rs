pub mod phase_correlation;
pub mod subpixel;

use ndarray::Array2;

use crate::error::Result;
use crate::frame::RegistrationOffset;

pub use phase_correlation::PhaseCorrelation;

/// Frame-to-frame registration service.
///
/// Implementations are pure functions of the frame pair. The returned offset
/// follows the [`RegistrationOffset`] convention: a star at `x_ref` in the
/// reference frame sits at `x_ref - dx` in `target`.
pub trait Registration: Send + Sync {
    fn measure_offset(
        &self,
        reference: &Array2<f32>,
        target: &Array2<f32>,
    ) -> Result<RegistrationOffset>;
}
