pub mod args;
pub mod hal;
pub mod spectral_scan;
