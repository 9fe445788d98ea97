//! Practice-scenario generation and guess checking.
//!
//! A [`ScenarioGenerator`] wraps an [`ImageCompositor`], randomizes a set of
//! compositing calls, records the drawn values as ground truth, and locks
//! the image so students cannot peek at or alter it. Guesses are checked
//! against the recorded truth with configurable tolerances.

use rand::rngs::StdRng;
use rand::{thread_rng, Rng, RngCore, SeedableRng};

use crate::compositor::ImageCompositor;
use crate::error::SimError;

/// Parameters for a randomized practice image.
///
/// Ranges are `(lo, hi)` bounds with `lo <= hi`; equal bounds pin the drawn
/// value. `margin_fraction` keeps source centers away from the frame edge:
/// positions are drawn within `[margin, 1 - margin]` of each axis extent.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    /// Number of point sources to inject, at least 1.
    pub n_sources: usize,
    /// Range for per-source integrated flux.
    pub flux_range: (f64, f64),
    /// Range for the background level.
    pub bg_range: (f64, f64),
    /// Range for the PSF width; one shared value is drawn for all sources.
    pub sigma_range: (f64, f64),
    /// Range for the read-out noise level.
    pub read_noise_range: (f64, f64),
    /// Apply shot noise (scale 1) after compositing.
    pub apply_shot: bool,
    /// Apply read-out noise after compositing.
    pub apply_read_noise: bool,
    /// Edge fraction excluded from source placement, in `[0, 0.5]`.
    pub margin_fraction: f64,
}

impl Default for ScenarioConfig {
    /// The course defaults: two sources, both noise types on.
    fn default() -> Self {
        Self {
            n_sources: 2,
            flux_range: (500.0, 1000.0),
            bg_range: (2.0, 10.0),
            sigma_range: (3.0, 6.0),
            read_noise_range: (1.0, 10.0),
            apply_shot: true,
            apply_read_noise: true,
            margin_fraction: 0.1,
        }
    }
}

impl ScenarioConfig {
    /// Check every parameter against its domain.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.n_sources < 1 {
            return Err(SimError::InvalidConfig(
                "n_sources must be at least 1".to_string(),
            ));
        }
        check_range("flux_range", self.flux_range)?;
        check_range("bg_range", self.bg_range)?;
        check_range("sigma_range", self.sigma_range)?;
        check_range("read_noise_range", self.read_noise_range)?;
        if self.sigma_range.0 <= 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "sigma_range lower bound must be positive, got {}",
                self.sigma_range.0
            )));
        }
        if self.read_noise_range.0 < 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "read_noise_range lower bound must be non-negative, got {}",
                self.read_noise_range.0
            )));
        }
        if !(self.margin_fraction >= 0.0 && self.margin_fraction <= 0.5) {
            return Err(SimError::InvalidConfig(format!(
                "margin_fraction must be within [0, 0.5], got {}",
                self.margin_fraction
            )));
        }
        Ok(())
    }
}

fn check_range(name: &str, (lo, hi): (f64, f64)) -> Result<(), SimError> {
    if !(lo.is_finite() && hi.is_finite()) {
        return Err(SimError::InvalidConfig(format!(
            "{name} bounds must be finite, got ({lo}, {hi})"
        )));
    }
    if lo > hi {
        return Err(SimError::InvalidConfig(format!(
            "{name} bounds must be ascending, got ({lo}, {hi})"
        )));
    }
    Ok(())
}

/// Ground truth for one injected point source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceTruth {
    pub x: f64,
    pub y: f64,
    pub flux: f64,
}

/// Everything that was drawn for a practice scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioTruth {
    pub sources: Vec<SourceTruth>,
    /// PSF width shared by every source in the scenario.
    pub sigma: f64,
    pub background: f64,
    /// Drawn read-noise level, `None` when read noise was not applied.
    pub read_noise: Option<f64>,
    pub shot_applied: bool,
}

/// Match result for one recorded source against a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceCheck {
    pub x_matched: bool,
    pub y_matched: bool,
    pub flux_matched: bool,
}

impl SourceCheck {
    pub fn outcome(&self) -> MatchOutcome {
        match (self.x_matched && self.y_matched, self.flux_matched) {
            (true, true) => MatchOutcome::FullMatch,
            (true, false) => MatchOutcome::PositionOnly,
            (false, _) => MatchOutcome::NoMatch,
        }
    }
}

/// Three-way guess outcome, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchOutcome {
    NoMatch,
    PositionOnly,
    FullMatch,
}

/// Per-source checks for one guess, plus the overall verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    /// One entry per recorded source, in injection order.
    pub sources: Vec<SourceCheck>,
}

impl MatchReport {
    /// Best outcome across all recorded sources.
    pub fn outcome(&self) -> MatchOutcome {
        self.sources
            .iter()
            .map(SourceCheck::outcome)
            .max()
            .unwrap_or(MatchOutcome::NoMatch)
    }

    /// True when some source matched in x, y and flux simultaneously.
    pub fn is_full_match(&self) -> bool {
        self.outcome() == MatchOutcome::FullMatch
    }

    /// Human-readable verdict for classroom display.
    pub fn summary(&self) -> String {
        match self.outcome() {
            MatchOutcome::FullMatch => "Well done, full match!".to_string(),
            MatchOutcome::PositionOnly => "Match in position, but not flux.".to_string(),
            MatchOutcome::NoMatch => "No match found.".to_string(),
        }
    }
}

/// Randomized practice images layered on top of an [`ImageCompositor`].
///
/// Idle until [`generate`](Self::generate) is called; afterwards the
/// underlying compositor is locked and the drawn values are available
/// through [`explain`](Self::explain) and checked by
/// [`check_guess`](Self::check_guess). A fresh `generate` call unlocks,
/// resets and regenerates.
#[derive(Debug, Clone)]
pub struct ScenarioGenerator {
    compositor: ImageCompositor,
    truth: Option<ScenarioTruth>,
    rng: StdRng,
}

impl ScenarioGenerator {
    /// Wrap a compositor with a randomly seeded scenario RNG.
    pub fn new(compositor: ImageCompositor) -> Self {
        Self::with_seed(compositor, thread_rng().next_u64())
    }

    /// Wrap a compositor with an explicit seed for reproducible scenarios.
    ///
    /// The generator keeps its own RNG, separate from the compositor's noise
    /// RNG, so the drawn truth is reproducible independently of how many
    /// noise realizations the compositor has produced.
    pub fn with_seed(compositor: ImageCompositor, seed: u64) -> Self {
        Self {
            compositor,
            truth: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The wrapped compositor (read access; the image stays locked).
    pub fn compositor(&self) -> &ImageCompositor {
        &self.compositor
    }

    /// The observed image students work on.
    pub fn observed(&self) -> &ndarray::Array2<f64> {
        self.compositor.observed()
    }

    /// Recorded ground truth, `None` while idle. Instructor access; students
    /// should use [`explain`](Self::explain) once they have a guess.
    pub fn truth(&self) -> Option<&ScenarioTruth> {
        self.truth.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.truth.is_some()
    }

    /// Give the compositor back, e.g. to write the frame out.
    pub fn into_compositor(self) -> ImageCompositor {
        self.compositor
    }

    /// Build a randomized practice image and lock it.
    ///
    /// Draws one shared sigma, then per source a position within the margin
    /// box and a flux within `flux_range`; adds one background level; then
    /// applies read noise and shot noise as configured, in that order (the
    /// order the course material uses - note that shot noise replaces the
    /// observed image, so when both are enabled the recorded read noise does
    /// not survive into the final frame).
    pub fn generate(&mut self, config: &ScenarioConfig) -> Result<(), SimError> {
        config.validate()?;

        self.compositor.unlock();
        self.compositor.reset()?;
        self.truth = None;

        let (rows, cols) = self.compositor.dims();
        let margin = config.margin_fraction;

        let sigma = draw_uniform(&mut self.rng, config.sigma_range);

        let mut sources = Vec::with_capacity(config.n_sources);
        for _ in 0..config.n_sources {
            let x = draw_uniform(&mut self.rng, (margin * cols as f64, (1.0 - margin) * cols as f64));
            let y = draw_uniform(&mut self.rng, (margin * rows as f64, (1.0 - margin) * rows as f64));
            let flux = draw_uniform(&mut self.rng, config.flux_range);
            self.compositor.add_point_source(x, y, sigma, flux)?;
            sources.push(SourceTruth { x, y, flux });
        }

        let background = draw_uniform(&mut self.rng, config.bg_range);
        self.compositor.add_background(background)?;

        let read_noise = if config.apply_read_noise {
            let ron = draw_uniform(&mut self.rng, config.read_noise_range);
            self.compositor.apply_read_noise(ron)?;
            Some(ron)
        } else {
            None
        };

        if config.apply_shot {
            self.compositor.apply_shot_noise(1.0)?;
        }

        self.compositor.lock();
        log::debug!(
            "generated practice scenario: {} sources, sigma {sigma:.2}, background {background:.2}",
            config.n_sources
        );

        self.truth = Some(ScenarioTruth {
            sources,
            sigma,
            background,
            read_noise,
            shot_applied: config.apply_shot,
        });
        Ok(())
    }

    /// Full description of the active scenario, formatted for display.
    pub fn explain(&self) -> Result<String, SimError> {
        let truth = self.truth.as_ref().ok_or(SimError::NoActiveScenario)?;

        let mut out = String::new();
        out.push_str(&format!("There are {} objects in this image\n", truth.sources.len()));
        out.push_str("They have the following parameters:\n");
        out.push_str("x, y, flux\n-----------\n");
        for source in &truth.sources {
            out.push_str(&format!("{:.2}, {:.2}, {:.2}\n", source.x, source.y, source.flux));
        }
        out.push_str("-----------\n");
        out.push_str(&format!("Background level: {:.2}\n", truth.background));
        out.push_str(&format!(
            "Sigma/FWHM: {:.2}/{:.2}\n",
            truth.sigma,
            2.35 * truth.sigma
        ));
        match truth.read_noise {
            Some(ron) => out.push_str(&format!("RON: {ron:.2} added\n")),
            None => out.push_str("No RON added\n"),
        }
        if truth.shot_applied {
            out.push_str("Shot noise added\n");
        } else {
            out.push_str("No shot noise added\n");
        }
        Ok(out)
    }

    /// Source positions only, for exercises where fluxes stay hidden.
    pub fn positions(&self) -> Result<String, SimError> {
        let truth = self.truth.as_ref().ok_or(SimError::NoActiveScenario)?;

        let mut out = String::new();
        out.push_str(&format!(
            "There are {} objects in this image with positions\n",
            truth.sources.len()
        ));
        out.push_str("x, y\n-----------\n");
        for source in &truth.sources {
            out.push_str(&format!("{:.2}, {:.2}\n", source.x, source.y));
        }
        Ok(out)
    }

    /// Check a guessed source against the recorded truth.
    ///
    /// Every recorded source is tested independently: x within
    /// `position_error` of the true x, y likewise, flux within `flux_error`
    /// of the true flux (all tolerances inclusive). The report distinguishes
    /// no match, position-only match and full match per source.
    pub fn check_guess(
        &self,
        x: f64,
        y: f64,
        flux: f64,
        flux_error: f64,
        position_error: f64,
    ) -> Result<MatchReport, SimError> {
        let truth = self.truth.as_ref().ok_or(SimError::NoActiveScenario)?;

        let sources = truth
            .sources
            .iter()
            .map(|source| SourceCheck {
                x_matched: (x - source.x).abs() <= position_error,
                y_matched: (y - source.y).abs() <= position_error,
                flux_matched: (flux - source.flux).abs() <= flux_error,
            })
            .collect();
        Ok(MatchReport { sources })
    }
}

/// Uniform draw over an ascending pair; equal bounds pin the value.
fn draw_uniform(rng: &mut StdRng, (lo, hi): (f64, f64)) -> f64 {
    if lo < hi {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}
