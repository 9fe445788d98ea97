//! Image compositing and noise injection for synthetic astronomical frames.
//!
//! The compositor owns two grids of the same fixed shape: a noise-free flux
//! accumulator (backgrounds and point sources) and an observed image holding
//! the noisy realization of that flux. Students are handed the observed
//! image; the noise-free grid is the ground truth photometry is checked
//! against.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{thread_rng, RngCore, SeedableRng};
use rand_distr::{Distribution, Poisson};

use crate::error::SimError;

/// Simulated astronomical image with incremental compositing and noise.
///
/// All mutating operations fail with [`SimError::Locked`] while the image is
/// locked, apply fully or not at all, and append one record to the operation
/// log on success. Read accessors never fail, locked or not.
#[derive(Debug, Clone)]
pub struct ImageCompositor {
    /// Sum of all added backgrounds and point sources.
    noise_free: Array2<f64>,
    /// Noisy realization produced by the noise operations.
    observed: Array2<f64>,
    /// One human-readable record per successful mutating call.
    history: Vec<String>,
    locked: bool,
    rng: StdRng,
}

impl ImageCompositor {
    /// Create a compositor with the given grid shape and a random seed.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::with_seed(rows, cols, thread_rng().next_u64())
    }

    /// Create a compositor with an explicit RNG seed for reproducible noise.
    pub fn with_seed(rows: usize, cols: usize, seed: u64) -> Self {
        Self {
            noise_free: Array2::zeros((rows, cols)),
            observed: Array2::zeros((rows, cols)),
            history: Vec::new(),
            locked: false,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Grid shape as `(rows, cols)`.
    pub fn dims(&self) -> (usize, usize) {
        self.noise_free.dim()
    }

    /// The noise-free flux grid (ground truth).
    pub fn noise_free(&self) -> &Array2<f64> {
        &self.noise_free
    }

    /// The observed (noisy) image.
    pub fn observed(&self) -> &Array2<f64> {
        &self.observed
    }

    /// Records of every successful mutating call since the last reset.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Lock the image against mutation. Idempotent.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Unlock the image. Idempotent.
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    fn ensure_unlocked(&self) -> Result<(), SimError> {
        if self.locked {
            Err(SimError::Locked)
        } else {
            Ok(())
        }
    }

    /// Add a uniform background level to every pixel of the noise-free grid.
    ///
    /// # Arguments
    /// * `level` - Background level in counts per pixel
    pub fn add_background(&mut self, level: f64) -> Result<(), SimError> {
        self.ensure_unlocked()?;
        if !level.is_finite() {
            return Err(SimError::InvalidConfig(format!(
                "background level must be finite, got {level}"
            )));
        }
        self.noise_free += level;
        self.history.push(format!("background added: level = {level}"));
        Ok(())
    }

    /// Add an isotropic 2-D Gaussian point source to the noise-free grid.
    ///
    /// The Gaussian is evaluated at every pixel center and normalized so the
    /// analytic integral over the infinite plane equals `flux`; the peak
    /// amplitude is `flux / (2 pi sigma^2)`. Coordinates are in pixel units
    /// with x along columns and y along rows. No bounds check is applied:
    /// sources centered outside the canvas simply contribute their tail.
    ///
    /// # Arguments
    /// * `x` - Source center x position (column direction)
    /// * `y` - Source center y position (row direction)
    /// * `sigma` - Gaussian width, identical in x and y, must be positive
    /// * `flux` - Integrated flux of the source
    pub fn add_point_source(
        &mut self,
        x: f64,
        y: f64,
        sigma: f64,
        flux: f64,
    ) -> Result<(), SimError> {
        self.ensure_unlocked()?;
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "sigma must be a positive finite number, got {sigma}"
            )));
        }
        if !(x.is_finite() && y.is_finite() && flux.is_finite()) {
            return Err(SimError::InvalidConfig(
                "point source position and flux must be finite".to_string(),
            ));
        }

        let peak = flux / (2.0 * std::f64::consts::PI * sigma * sigma);
        let inv_two_sigma_sq = 1.0 / (2.0 * sigma * sigma);
        for ((row, col), value) in self.noise_free.indexed_iter_mut() {
            let dx = col as f64 - x;
            let dy = row as f64 - y;
            *value += peak * (-(dx * dx + dy * dy) * inv_two_sigma_sq).exp();
        }
        self.history.push(format!(
            "point source added: x = {x} y = {y} sigma = {sigma} flux = {flux}"
        ));
        Ok(())
    }

    /// Replace the observed image with a shot-noise realization.
    ///
    /// Each pixel is drawn from a Poisson distribution whose mean is the
    /// noise-free value times `scale`; pixels with non-positive mean draw
    /// zero. This is a single realization of the true flux, so the operation
    /// is non-additive: a second call overwrites the first draw instead of
    /// accumulating on it.
    pub fn apply_shot_noise(&mut self, scale: f64) -> Result<(), SimError> {
        self.ensure_unlocked()?;
        if !scale.is_finite() {
            return Err(SimError::InvalidConfig(format!(
                "shot noise scale must be finite, got {scale}"
            )));
        }

        let rng = &mut self.rng;
        let realization = self.noise_free.mapv(|mean| {
            let lambda = mean * scale;
            if lambda > 0.0 {
                Poisson::new(lambda)
                    .expect("Poisson parameter must be valid (lambda > 0)")
                    .sample(rng)
            } else {
                0.0
            }
        });
        self.observed = realization;
        self.history.push(format!("shot noise applied: scale = {scale}"));
        Ok(())
    }

    /// Add a read-out noise realization onto the observed image.
    ///
    /// Each pixel draws from a Poisson distribution with mean `std` and the
    /// sample is added in place, accumulating onto whatever shot noise
    /// produced. Using a Poisson draw to model read noise is an
    /// approximation inherited from the original course material and is kept
    /// for lock-step reproducibility; do not replace it with a Gaussian.
    pub fn apply_read_noise(&mut self, std: f64) -> Result<(), SimError> {
        self.ensure_unlocked()?;
        if !(std.is_finite() && std >= 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "read noise level must be finite and non-negative, got {std}"
            )));
        }

        if std > 0.0 {
            let dist = Poisson::new(std).map_err(|e| {
                SimError::InvalidConfig(format!("read noise level {std} rejected: {e}"))
            })?;
            let rng = &mut self.rng;
            self.observed.mapv_inplace(|value| value + dist.sample(rng));
        }
        self.history.push(format!("read noise applied: std = {std}"));
        Ok(())
    }

    /// Zero both grids and clear the operation log.
    pub fn reset(&mut self) -> Result<(), SimError> {
        self.ensure_unlocked()?;
        self.noise_free.fill(0.0);
        self.observed.fill(0.0);
        self.history.clear();
        Ok(())
    }
}

impl Default for ImageCompositor {
    /// The course's default frame: 400 rows by 600 columns.
    fn default() -> Self {
        Self::new(400, 600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn seeded(rows: usize, cols: usize) -> ImageCompositor {
        ImageCompositor::with_seed(rows, cols, 42)
    }

    #[test]
    fn test_background_adds_level_everywhere() {
        let mut comp = seeded(10, 20);
        comp.add_background(3.5).unwrap();

        assert_eq!(comp.dims(), (10, 20));
        for value in comp.noise_free().iter() {
            assert_eq!(*value, 3.5);
        }
    }

    #[test]
    fn test_background_is_additive() {
        let mut twice = seeded(8, 8);
        twice.add_background(2.0).unwrap();
        twice.add_background(5.0).unwrap();

        let mut once = seeded(8, 8);
        once.add_background(7.0).unwrap();

        for (a, b) in twice.noise_free().iter().zip(once.noise_free().iter()) {
            assert_eq!(*a, *b);
        }
    }

    #[test]
    fn test_point_source_peak_value() {
        let mut comp = seeded(50, 50);
        let sigma = 2.0;
        let flux = 5000.0;
        comp.add_point_source(20.0, 30.0, sigma, flux).unwrap();

        // Peak sits at [row = y, col = x] and equals flux / (2 pi sigma^2).
        let expected_peak = flux / (2.0 * std::f64::consts::PI * sigma * sigma);
        assert_eq!(comp.noise_free()[[30, 20]], expected_peak);
    }

    #[test]
    fn test_point_source_flux_is_conserved() {
        for sigma in [1.0, 2.0, 4.0] {
            let total_flux = 1000.0;
            let mut comp = seeded(60, 60);
            comp.add_point_source(30.0, 30.0, sigma, total_flux).unwrap();

            let added = comp.noise_free().sum();
            assert_relative_eq!(added, total_flux, epsilon = 1e-3 * total_flux);
        }
    }

    #[test]
    fn test_point_source_off_canvas_contributes_tail_only() {
        let mut comp = seeded(50, 50);
        comp.add_point_source(70.0, 70.0, 2.0, 1000.0).unwrap();

        let added = comp.noise_free().sum();
        assert!(added < 1.0, "off-canvas source left too much flux: {added}");
    }

    #[test]
    fn test_point_source_rejects_bad_sigma() {
        let mut comp = seeded(10, 10);
        assert!(matches!(
            comp.add_point_source(5.0, 5.0, 0.0, 100.0),
            Err(SimError::InvalidConfig(_))
        ));
        assert!(matches!(
            comp.add_point_source(5.0, 5.0, -1.0, 100.0),
            Err(SimError::InvalidConfig(_))
        ));
        assert!(comp.history().is_empty());
    }

    #[test]
    fn test_locked_mutations_fail_and_change_nothing() {
        let mut comp = seeded(10, 10);
        comp.add_background(5.0).unwrap();
        comp.apply_shot_noise(1.0).unwrap();
        comp.lock();

        let noise_free_before = comp.noise_free().clone();
        let observed_before = comp.observed().clone();
        let history_before = comp.history().to_vec();

        assert_eq!(comp.add_background(1.0), Err(SimError::Locked));
        assert_eq!(comp.add_point_source(5.0, 5.0, 2.0, 10.0), Err(SimError::Locked));
        assert_eq!(comp.apply_shot_noise(1.0), Err(SimError::Locked));
        assert_eq!(comp.apply_read_noise(3.0), Err(SimError::Locked));
        assert_eq!(comp.reset(), Err(SimError::Locked));

        assert_eq!(comp.noise_free(), &noise_free_before);
        assert_eq!(comp.observed(), &observed_before);
        assert_eq!(comp.history(), history_before.as_slice());
    }

    #[test]
    fn test_reads_work_while_locked() {
        let mut comp = seeded(5, 5);
        comp.add_background(2.0).unwrap();
        comp.lock();

        assert_eq!(comp.dims(), (5, 5));
        assert_eq!(comp.observed().dim(), (5, 5));
        assert_eq!(comp.history().len(), 1);
        assert!(comp.is_locked());
    }

    #[test]
    fn test_lock_unlock_idempotent() {
        let mut comp = seeded(5, 5);
        comp.lock();
        comp.lock();
        assert!(comp.is_locked());
        comp.unlock();
        comp.unlock();
        assert!(!comp.is_locked());
        assert!(comp.add_background(1.0).is_ok());
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut comp = seeded(12, 9);
        comp.add_background(4.0).unwrap();
        comp.add_point_source(4.0, 4.0, 1.5, 300.0).unwrap();
        comp.apply_shot_noise(1.0).unwrap();
        comp.reset().unwrap();

        let fresh = seeded(12, 9);
        assert_eq!(comp.noise_free(), fresh.noise_free());
        assert_eq!(comp.observed(), fresh.observed());
        assert!(comp.history().is_empty());
    }

    #[test]
    fn test_history_counts_successful_mutations() {
        let mut comp = seeded(10, 10);
        comp.add_background(2.0).unwrap();
        comp.add_point_source(5.0, 5.0, 2.0, 100.0).unwrap();
        comp.apply_shot_noise(1.0).unwrap();
        comp.apply_read_noise(3.0).unwrap();
        assert_eq!(comp.history().len(), 4);

        // Failed calls must not log.
        assert!(comp.add_point_source(5.0, 5.0, -2.0, 100.0).is_err());
        assert_eq!(comp.history().len(), 4);

        assert!(comp.history()[0].contains("background"));
        assert!(comp.history()[1].contains("point source"));
        assert!(comp.history()[2].contains("shot noise"));
        assert!(comp.history()[3].contains("read noise"));
    }

    #[test]
    fn test_shot_noise_mean_tracks_noise_free_grid() {
        // 100x100 pixels of Poisson(50): the sample mean should sit within
        // a few standard errors of 50.
        let mut comp = seeded(100, 100);
        comp.add_background(50.0).unwrap();
        comp.apply_shot_noise(1.0).unwrap();

        let mean = comp.observed().mean().unwrap();
        assert_relative_eq!(mean, 50.0, epsilon = 0.5);
    }

    #[test]
    fn test_shot_noise_scale_applies_before_draw() {
        let mut comp = seeded(100, 100);
        comp.add_background(10.0).unwrap();
        comp.apply_shot_noise(3.0).unwrap();

        let mean = comp.observed().mean().unwrap();
        assert_relative_eq!(mean, 30.0, epsilon = 0.5);
    }

    #[test]
    fn test_shot_noise_is_not_additive() {
        let mut comp = seeded(100, 100);
        comp.add_background(100.0).unwrap();
        comp.apply_shot_noise(1.0).unwrap();
        comp.apply_shot_noise(1.0).unwrap();

        // Two successive draws must leave a single realization, not a sum
        // of two draws (which would have mean ~200).
        let mean = comp.observed().mean().unwrap();
        assert_relative_eq!(mean, 100.0, epsilon = 1.0);
    }

    #[test]
    fn test_shot_noise_on_empty_image_is_zero() {
        let mut comp = seeded(20, 20);
        comp.apply_shot_noise(1.0).unwrap();
        assert_eq!(comp.observed().sum(), 0.0);
    }

    #[test]
    fn test_read_noise_accumulates_onto_observed() {
        let mut comp = seeded(100, 100);
        comp.add_background(100.0).unwrap();
        comp.apply_shot_noise(1.0).unwrap();
        comp.apply_read_noise(50.0).unwrap();

        let mean = comp.observed().mean().unwrap();
        assert_relative_eq!(mean, 150.0, epsilon = 1.5);
    }

    #[test]
    fn test_read_noise_zero_is_a_logged_noop() {
        let mut comp = seeded(10, 10);
        comp.apply_shot_noise(1.0).unwrap();
        let before = comp.observed().clone();

        comp.apply_read_noise(0.0).unwrap();
        assert_eq!(comp.observed(), &before);
        assert_eq!(comp.history().len(), 2);
    }

    #[test]
    fn test_read_noise_rejects_negative_std() {
        let mut comp = seeded(10, 10);
        assert!(matches!(
            comp.apply_read_noise(-1.0),
            Err(SimError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_seeded_compositors_are_deterministic() {
        let build = || {
            let mut comp = ImageCompositor::with_seed(30, 30, 7);
            comp.add_background(20.0).unwrap();
            comp.add_point_source(15.0, 15.0, 2.0, 4000.0).unwrap();
            comp.apply_shot_noise(1.0).unwrap();
            comp.apply_read_noise(5.0).unwrap();
            comp
        };

        let a = build();
        let b = build();
        assert_eq!(a.observed(), b.observed());

        let mut c = ImageCompositor::with_seed(30, 30, 8);
        c.add_background(20.0).unwrap();
        c.apply_shot_noise(1.0).unwrap();
        assert_ne!(a.observed(), c.observed());
    }

    #[test]
    fn test_tutorial_frame_statistics() {
        // The course's tutorial frame: two PSFs plus background, shot noise
        // at scale 1. The observed total must be consistent with the Poisson
        // mean grid evaluated before noise.
        let mut comp = seeded(50, 50);
        comp.add_point_source(20.0, 20.0, 2.0, 5000.0).unwrap();
        comp.add_point_source(30.0, 30.0, 2.0, 400.0).unwrap();
        comp.add_background(20.0).unwrap();

        let expected_total = comp.noise_free().sum();
        assert_relative_eq!(expected_total, 5000.0 + 400.0 + 20.0 * 2500.0, epsilon = 1.0);

        comp.apply_shot_noise(1.0).unwrap();
        let observed_total = comp.observed().sum();

        // Total of independent Poisson draws has variance equal to the
        // summed means; allow five standard deviations.
        let tolerance = 5.0 * expected_total.sqrt();
        assert!(
            (observed_total - expected_total).abs() < tolerance,
            "observed total {observed_total} too far from {expected_total}"
        );
    }
}
