//! Locally generated heatmap used when the server snapshot is unavailable
//!
//! Three interaction clusters (screen centre, top-left menu, bottom action
//! bar) plus background noise, normalized to 0..=100. Cluster placement is
//! seeded from the device id so each device keeps a recognizable shape;
//! the noise layer differs on every call.

use super::{HeatmapEvent, HeatmapGrid};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const CENTRE_SAMPLES: usize = 5_000;
const MENU_SAMPLES: usize = 1_000;
const ACTION_BAR_SAMPLES: usize = 1_000;

/// Normal deviate via Box-Muller
fn gaussian<R: Rng>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + z * std_dev
}

fn device_seed(device_id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    device_id.hash(&mut hasher);
    hasher.finish()
}

/// Scatter one cluster. Positions come from `place`; each sample adds
/// movement weight U*move_scale+1 and, with probability `click_p`, click
/// weight U*click_scale+click_base.
fn scatter<R, F>(
    grid: &mut HeatmapGrid,
    rng: &mut R,
    samples: usize,
    mut place: F,
    move_scale: f64,
    click: (f64, f64, f64),
) where
    R: Rng,
    F: FnMut(&mut R) -> (f64, f64),
{
    let (click_p, click_scale, click_base) = click;
    for _ in 0..samples {
        let (x, y) = place(rng);
        let (x, y) = (x as i64, y as i64);
        grid.ingest(HeatmapEvent::movement(x, y, rng.random::<f64>() * move_scale + 1.0));
        if rng.random::<f64>() < click_p {
            grid.ingest(HeatmapEvent::click(x, y, rng.random::<f64>() * click_scale + click_base));
        }
    }
}

pub fn generate(device_id: &str, width: usize, height: usize) -> HeatmapGrid {
    let mut grid = HeatmapGrid::new(width, height);
    let w = grid.width() as f64;
    let h = grid.height() as f64;
    let (cx, cy) = (w / 2.0, h / 2.0);
    let mut rng = StdRng::seed_from_u64(device_seed(device_id));

    scatter(
        &mut grid,
        &mut rng,
        CENTRE_SAMPLES,
        |rng| {
            (
                gaussian(rng, cx, w / 6.0).clamp(0.0, w - 1.0),
                gaussian(rng, cy, h / 6.0).clamp(0.0, h - 1.0),
            )
        },
        2.0,
        (0.3, 5.0, 1.0),
    );

    scatter(
        &mut grid,
        &mut rng,
        MENU_SAMPLES,
        |rng| {
            (
                gaussian(rng, w / 10.0, w / 20.0).clamp(0.0, w / 5.0),
                gaussian(rng, h / 10.0, h / 20.0).clamp(0.0, h / 5.0),
            )
        },
        3.0,
        (0.4, 8.0, 2.0),
    );

    scatter(
        &mut grid,
        &mut rng,
        ACTION_BAR_SAMPLES,
        |rng| {
            (
                gaussian(rng, cx, w / 6.0).clamp(cx - w / 5.0, cx + w / 5.0),
                gaussian(rng, h * 0.9, h / 20.0).clamp(h * 0.8, (h - 1.0).max(h * 0.8)),
            )
        },
        2.0,
        (0.5, 6.0, 3.0),
    );

    let mut noise = rand::rng();
    for y in 0..grid.height() as i64 {
        for x in 0..grid.width() as i64 {
            grid.ingest(HeatmapEvent::movement(x, y, noise.random::<f64>() * 5.0));
            grid.ingest(HeatmapEvent::click(x, y, noise.random::<f64>() * 2.0));
        }
    }

    grid.normalize(100.0);
    grid
}
