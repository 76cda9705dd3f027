use candle_vae::candle_core::{Device, Tensor};
use image::{Rgb, RgbImage};
use std::path::Path;

pub const CANVAS_SIZE: u32 = 600;
const MARGIN: f32 = 20.0;
const DOT_RADIUS: i64 = 2;

/// one color per digit class
const LABEL_PALETTE: [(u8, u8, u8); 10] = [
    (230, 25, 75),
    (245, 130, 48),
    (191, 144, 0),
    (60, 180, 75),
    (70, 200, 200),
    (0, 130, 200),
    (145, 30, 180),
    (240, 50, 230),
    (170, 110, 40),
    (128, 128, 128),
];

/// Scatter the first two latent dimensions on a white canvas, one dot
/// per sample colored by its label (black when labels are absent).
pub fn plot_latent(
    file_path: &Path,
    z_nk: &Tensor,
    labels: Option<&Tensor>,
) -> anyhow::Result<()> {
    let z: Vec<Vec<f32>> = z_nk.to_device(&Device::Cpu)?.to_vec2()?;

    anyhow::ensure!(!z.is_empty(), "no latent points to plot");
    anyhow::ensure!(
        z.iter().all(|row| row.len() >= 2),
        "need at least two latent dimensions to plot"
    );

    let y: Option<Vec<u32>> = match labels {
        Some(labels) => Some(labels.to_device(&Device::Cpu)?.to_vec1()?),
        None => None,
    };

    let (x_lb, x_ub) = value_range(z.iter().map(|row| row[0]));
    let (y_lb, y_ub) = value_range(z.iter().map(|row| row[1]));

    let scale = (CANVAS_SIZE as f32 - 2.0 * MARGIN).max(1.0);
    let to_canvas = |v: f32, lb: f32, ub: f32| -> i64 {
        (MARGIN + (v - lb) / (ub - lb) * scale) as i64
    };

    let mut canvas = RgbImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, Rgb([255, 255, 255]));

    for (i, row) in z.iter().enumerate() {
        let px = to_canvas(row[0], x_lb, x_ub);
        // canvas rows grow downward
        let py = CANVAS_SIZE as i64 - to_canvas(row[1], y_lb, y_ub);

        let (r, g, b) = match y.as_ref() {
            Some(y) => LABEL_PALETTE[y[i] as usize % LABEL_PALETTE.len()],
            None => (0, 0, 0),
        };

        for dy in -DOT_RADIUS..=DOT_RADIUS {
            for dx in -DOT_RADIUS..=DOT_RADIUS {
                let (cx, cy) = (px + dx, py + dy);
                if cx >= 0 && cy >= 0 && (cx as u32) < CANVAS_SIZE && (cy as u32) < CANVAS_SIZE {
                    canvas.put_pixel(cx as u32, cy as u32, Rgb([r, g, b]));
                }
            }
        }
    }

    canvas.save(file_path)?;
    Ok(())
}

/// min/max over the values, widened when degenerate
fn value_range(values: impl Iterator<Item = f32>) -> (f32, f32) {
    let (mut lb, mut ub) = (f32::INFINITY, f32::NEG_INFINITY);
    for v in values {
        lb = lb.min(v);
        ub = ub.max(v);
    }
    if !(ub - lb).is_normal() {
        (lb - 1.0, lb + 1.0)
    } else {
        (lb, ub)
    }
}
