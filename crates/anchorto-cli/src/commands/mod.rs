pub mod config;
pub mod curve;
pub mod simulate;
