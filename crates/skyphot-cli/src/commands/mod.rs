pub mod config;
pub mod info;
pub mod lightcurve;
pub mod phot;
pub mod sort;
