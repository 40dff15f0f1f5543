pub mod field_chart;
pub mod fits;
pub mod header;
pub mod output;
pub mod sort;
pub mod source;
