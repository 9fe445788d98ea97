//! File output for simulated data.

pub mod fits;
