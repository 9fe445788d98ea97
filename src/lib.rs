//! Synthetic observations for an observational-astrophysics course.
//!
//! Two simulators: [`ImageCompositor`] builds astronomical frames from
//! Gaussian point sources, sky background, shot noise and read-out noise so
//! students can practice photometry, and [`lightcurve::LightCurve`] degrades
//! transit light curves with noise, outliers, trends and observational gaps
//! for time-series exercises. [`ScenarioGenerator`] layers randomized,
//! locked practice images with recorded ground truth on top of the
//! compositor; [`presets`] holds the canned classroom setups.
//!
//! Everything is in-memory and single-threaded; instantiate one simulator
//! per student session. All randomized types take an injectable seed for
//! reproducible runs.

pub mod compositor;
pub mod error;
pub mod io;
pub mod lightcurve;
pub mod presets;
pub mod scenario;

// Re-exports for easier access
pub use compositor::ImageCompositor;
pub use error::SimError;
pub use lightcurve::LightCurve;
pub use scenario::{
    MatchOutcome, MatchReport, ScenarioConfig, ScenarioGenerator, ScenarioTruth, SourceTruth,
};
