//! Canned classroom images and scenarios.
//!
//! These mirror the exercises handed out in the course: a fixed tutorial
//! frame and a few randomized setups of increasing difficulty. Each preset
//! takes an optional seed so an instructor can reproduce a student's frame.

use rand::rngs::StdRng;
use rand::{thread_rng, Rng, RngCore, SeedableRng};

use crate::compositor::ImageCompositor;
use crate::scenario::{ScenarioConfig, ScenarioGenerator};

/// The tutorial frame: two known PSFs on a flat background with shot noise,
/// locked. Used in the first photometry session; the source parameters are
/// deliberately not random.
pub fn tutorial_image() -> ImageCompositor {
    tutorial_image_with_seed(thread_rng().next_u64())
}

/// Seeded variant of [`tutorial_image`] for reproducible noise.
pub fn tutorial_image_with_seed(seed: u64) -> ImageCompositor {
    let mut comp = ImageCompositor::with_seed(50, 50, seed);
    comp.add_point_source(20.0, 20.0, 2.0, 5000.0)
        .expect("fresh compositor accepts point sources");
    comp.add_point_source(30.0, 30.0, 2.0, 400.0)
        .expect("fresh compositor accepts point sources");
    comp.add_background(20.0)
        .expect("fresh compositor accepts background");
    comp.apply_shot_noise(1.0)
        .expect("fresh compositor accepts shot noise");
    comp.lock();
    comp
}

/// A single bright PSF near the frame center, high signal-to-noise.
pub fn centred_psf_high_sn(seed: u64) -> ScenarioGenerator {
    centred_psf(seed, (5000.0, 50000.0))
}

/// A single faint PSF near the frame center, low signal-to-noise.
pub fn centred_psf_low_sn(seed: u64) -> ScenarioGenerator {
    centred_psf(seed, (500.0, 2000.0))
}

fn centred_psf(seed: u64, flux_range: (f64, f64)) -> ScenarioGenerator {
    let config = ScenarioConfig {
        n_sources: 1,
        flux_range,
        bg_range: (1.0, 5.0),
        sigma_range: (3.0, 6.0),
        read_noise_range: (1.0, 5.0),
        margin_fraction: 0.45,
        ..Default::default()
    };
    let compositor = ImageCompositor::with_seed(50, 50, seed);
    let mut generator = ScenarioGenerator::with_seed(compositor, seed);
    generator
        .generate(&config)
        .expect("preset scenario config is valid");
    generator
}

/// A crowded 100x100 field with five to nine sources. Good hunting.
pub fn crowded_field(seed: u64) -> ScenarioGenerator {
    let mut rng = StdRng::seed_from_u64(seed);
    let config = ScenarioConfig {
        n_sources: rng.gen_range(5..10),
        flux_range: (4000.0, 10000.0),
        bg_range: (1.0, 5.0),
        sigma_range: (3.0, 6.0),
        read_noise_range: (1.0, 5.0),
        margin_fraction: 0.05,
        ..Default::default()
    };
    let compositor = ImageCompositor::with_seed(100, 100, rng.next_u64());
    let mut generator = ScenarioGenerator::with_seed(compositor, rng.next_u64());
    generator
        .generate(&config)
        .expect("preset scenario config is valid");
    generator
}
