//! Synthetic transit light curves for time-series exercises.
//!
//! A [`LightCurve`] keeps the pristine flux it was built with and a working
//! copy that noise, outliers, baselines and trends are layered onto. The
//! sampling helpers (thinning, random subsampling, nightly observation
//! windows) return new series and leave the stored curve untouched, so a
//! student can degrade the same curve several ways. Time is in days.

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{thread_rng, Rng, RngCore, SeedableRng};
use rand_distr::StandardNormal;

use crate::error::SimError;

/// A transit light curve with progressive degradation operations.
#[derive(Debug, Clone)]
pub struct LightCurve {
    time: Array1<f64>,
    /// Flux as constructed; `reset` restores the working copy from this.
    raw_flux: Array1<f64>,
    flux: Array1<f64>,
    error: Array1<f64>,
    rng: StdRng,
}

impl LightCurve {
    /// Build a light curve from matching time and flux series.
    pub fn new(time: Array1<f64>, flux: Array1<f64>) -> Result<Self, SimError> {
        Self::with_seed(time, flux, thread_rng().next_u64())
    }

    /// Seeded variant of [`new`](Self::new) for reproducible noise.
    pub fn with_seed(time: Array1<f64>, flux: Array1<f64>, seed: u64) -> Result<Self, SimError> {
        if time.len() != flux.len() {
            return Err(SimError::InvalidConfig(format!(
                "time and flux lengths must match, got {} and {}",
                time.len(),
                flux.len()
            )));
        }
        if time.is_empty() {
            return Err(SimError::InvalidConfig(
                "light curve must contain at least one point".to_string(),
            ));
        }
        let n = flux.len();
        Ok(Self {
            time,
            raw_flux: flux.clone(),
            flux,
            error: Array1::zeros(n),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Synthetic transit using the course's quartic transit model.
    ///
    /// `n` evenly spaced samples over `[0, span]` days. Out-of-transit flux
    /// is 1.0; between `t_begin` and `t_end` the flux follows a quartic dip
    /// reaching `depth` at mid-transit and rejoining the continuum at the
    /// contact points.
    pub fn quartic_transit(
        n: usize,
        span: f64,
        depth: f64,
        t_begin: f64,
        t_end: f64,
    ) -> Result<Self, SimError> {
        if n < 2 {
            return Err(SimError::InvalidConfig(format!(
                "need at least 2 samples, got {n}"
            )));
        }
        if !(span.is_finite() && span > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "span must be positive, got {span}"
            )));
        }
        if !(depth > 0.0 && depth <= 1.0) {
            return Err(SimError::InvalidConfig(format!(
                "transit depth must be within (0, 1], got {depth}"
            )));
        }
        if t_end <= t_begin {
            return Err(SimError::InvalidConfig(format!(
                "transit must end after it begins, got [{t_begin}, {t_end}]"
            )));
        }

        let time = Array1::linspace(0.0, span, n);
        let mid = (t_end + t_begin) / 2.0;
        let quartic_scale = 16.0 * (1.0 - depth) / (t_end - t_begin).powi(4);
        let flux = time.mapv(|t| {
            if t >= t_begin && t <= t_end {
                quartic_scale * (t - mid).powi(4) + depth
            } else {
                1.0
            }
        });
        Self::new(time, flux)
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self) -> &Array1<f64> {
        &self.time
    }

    pub fn flux(&self) -> &Array1<f64> {
        &self.flux
    }

    pub fn error(&self) -> &Array1<f64> {
        &self.error
    }

    /// Time, flux and error; with `shift_mid` the time axis is centered on
    /// its mean, matching the plots in the course notes.
    pub fn data(&self, shift_mid: bool) -> (Array1<f64>, Array1<f64>, Array1<f64>) {
        let shift = if shift_mid {
            self.time.mean().unwrap_or(0.0)
        } else {
            0.0
        };
        (&self.time - shift, self.flux.clone(), self.error.clone())
    }

    /// Restore the working flux from the pristine copy.
    pub fn reset(&mut self) {
        self.flux = self.raw_flux.clone();
    }

    /// Add Gaussian measurement noise for a target signal-to-noise ratio.
    ///
    /// Each point gets noise proportional to `flux * raw_flux / sn`, and the
    /// stored per-point error is updated to the same scale.
    pub fn add_noise(&mut self, sn: f64) -> Result<(), SimError> {
        if !(sn.is_finite() && sn > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "signal-to-noise must be positive, got {sn}"
            )));
        }
        let rng = &mut self.rng;
        let noisy = ndarray::Zip::from(&self.flux)
            .and(&self.raw_flux)
            .map_collect(|&f, &raw| {
                let draw: f64 = rng.sample(StandardNormal);
                f + f * (raw / sn) * draw
            });
        self.flux = noisy;
        self.error = &self.flux * &self.raw_flux / sn;
        Ok(())
    }

    /// Turn a fraction of points into catastrophic outliers.
    ///
    /// Outlier positions are drawn with replacement, so fewer than
    /// `frac * n` distinct points may be hit. The deviation scale is
    /// `std` times the mean raw flux.
    pub fn add_outliers(&mut self, frac: f64, std: f64) -> Result<(), SimError> {
        if !(frac >= 0.0 && frac <= 1.0) {
            return Err(SimError::InvalidConfig(format!(
                "outlier fraction must be within [0, 1], got {frac}"
            )));
        }
        if !(std.is_finite() && std >= 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "outlier scale must be non-negative, got {std}"
            )));
        }
        let n = self.len();
        let n_outliers = (frac * n as f64) as usize;
        let mean_raw = self.raw_flux.mean().unwrap_or(0.0);
        for _ in 0..n_outliers {
            let idx = self.rng.gen_range(0..n);
            let draw: f64 = self.rng.sample(StandardNormal);
            self.flux[idx] += draw * std * mean_raw;
        }
        Ok(())
    }

    /// Add a constant baseline, optionally with Gaussian scatter of
    /// signal-to-noise `sn` on the baseline itself.
    pub fn add_baseline(&mut self, level: f64, sn: Option<f64>) -> Result<(), SimError> {
        if !level.is_finite() {
            return Err(SimError::InvalidConfig(format!(
                "baseline level must be finite, got {level}"
            )));
        }
        let scatter = self.noise_scale(sn)?;
        if scatter == 0.0 {
            self.flux += level;
        } else {
            let rng = &mut self.rng;
            self.flux.mapv_inplace(|f| {
                let draw: f64 = rng.sample(StandardNormal);
                f + level + level * scatter * draw
            });
        }
        Ok(())
    }

    /// Add a polynomial trend in time.
    ///
    /// Coefficients follow the numpy `poly1d` convention, highest power
    /// first. With `sn` the trend itself carries Gaussian scatter.
    pub fn add_trend(&mut self, coeffs: &[f64], sn: Option<f64>) -> Result<(), SimError> {
        if coeffs.is_empty() {
            return Err(SimError::InvalidConfig(
                "trend needs at least one coefficient".to_string(),
            ));
        }
        let scatter = self.noise_scale(sn)?;
        let rng = &mut self.rng;
        let trend = self.time.mapv(|t| {
            let value = coeffs.iter().fold(0.0, |acc, &c| acc * t + c);
            if scatter == 0.0 {
                value
            } else {
                let draw: f64 = rng.sample(StandardNormal);
                value + value * scatter * draw
            }
        });
        self.flux += &trend;
        Ok(())
    }

    fn noise_scale(&self, sn: Option<f64>) -> Result<f64, SimError> {
        match sn {
            Some(sn) if sn.is_finite() && sn > 0.0 => Ok(1.0 / sn),
            Some(sn) => Err(SimError::InvalidConfig(format!(
                "signal-to-noise must be positive, got {sn}"
            ))),
            None => Ok(0.0),
        }
    }

    /// Keep every nth point.
    pub fn thin(&self, factor: usize) -> Result<(Array1<f64>, Array1<f64>, Array1<f64>), SimError> {
        if factor < 1 {
            return Err(SimError::InvalidConfig(
                "thinning factor must be at least 1".to_string(),
            ));
        }
        let pick = |series: &Array1<f64>| {
            series
                .iter()
                .step_by(factor)
                .copied()
                .collect::<Array1<f64>>()
        };
        Ok((pick(&self.time), pick(&self.flux), pick(&self.error)))
    }

    /// Keep a random fraction of points, drawn without replacement.
    pub fn random_subsample(
        &mut self,
        keep_frac: f64,
    ) -> Result<(Array1<f64>, Array1<f64>, Array1<f64>), SimError> {
        if !(keep_frac > 0.0 && keep_frac <= 1.0) {
            return Err(SimError::InvalidConfig(format!(
                "keep_frac must be within (0, 1], got {keep_frac}"
            )));
        }
        let n = self.len();
        let amount = (n as f64 * keep_frac) as usize;
        let indices = rand::seq::index::sample(&mut self.rng, n, amount);

        let pick = |series: &Array1<f64>| {
            indices
                .iter()
                .map(|i| series[i])
                .collect::<Array1<f64>>()
        };
        Ok((pick(&self.time), pick(&self.flux), pick(&self.error)))
    }

    /// Approximate a real observing campaign.
    ///
    /// Night `i` starts one day after night `i-1`, beginning at a random
    /// first sundown within the first day of the series. Each night hosts
    /// `obs_per_night` observation windows of `obs_length` days placed
    /// uniformly within the usable night fraction; a window is lost to
    /// weather with probability `missed_frac`. Returns the surviving points.
    pub fn realistic_sampling(
        &mut self,
        obs_length: f64,
        obs_per_night: usize,
        missed_frac: f64,
        night_frac: f64,
    ) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>), SimError> {
        if !(obs_length.is_finite() && obs_length > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "observation length must be positive, got {obs_length}"
            )));
        }
        if !(missed_frac >= 0.0 && missed_frac <= 1.0) {
            return Err(SimError::InvalidConfig(format!(
                "missed fraction must be within [0, 1], got {missed_frac}"
            )));
        }
        if !(night_frac > 0.0 && night_frac <= 1.0) {
            return Err(SimError::InvalidConfig(format!(
                "night fraction must be within (0, 1], got {night_frac}"
            )));
        }

        let t_min = self.time[0];
        let t_max = self.time[self.time.len() - 1];
        let first_sundown = self.rng.gen_range(t_min..t_min + 1.0);
        let n_nights = (t_max - first_sundown).max(0.0) as usize;

        let mut obs_t = Vec::new();
        let mut obs_flux = Vec::new();
        let mut obs_error = Vec::new();
        for night in 0..n_nights {
            let sundown = first_sundown + night as f64;
            for _ in 0..obs_per_night {
                let start = self.rng.gen_range(sundown..sundown + night_frac);
                let clear_sky: f64 = self.rng.gen();
                if clear_sky > missed_frac {
                    for (i, &t) in self.time.iter().enumerate() {
                        if t > start && t < start + obs_length {
                            obs_t.push(t);
                            obs_flux.push(self.flux[i]);
                            obs_error.push(self.error[i]);
                        }
                    }
                }
            }
        }
        Ok((obs_t, obs_flux, obs_error))
    }

    /// Phase-fold the curve on a trial period. Phases are within `[0, 1)`.
    pub fn fold(&self, period: f64) -> Result<(Array1<f64>, Array1<f64>, Array1<f64>), SimError> {
        if !(period.is_finite() && period > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "period must be positive, got {period}"
            )));
        }
        let phase = self.time.mapv(|t| t / period - (t / period).floor());
        Ok((phase, self.flux.clone(), self.error.clone()))
    }
}
