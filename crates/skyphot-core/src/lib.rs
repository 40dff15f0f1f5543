pub mod align;
pub mod background;
pub mod consts;
pub mod detection;
pub mod error;
pub mod frame;
pub mod grid;
pub mod io;
pub mod lightcurve;
pub mod photometry;
pub mod pipeline;
pub mod stats;
