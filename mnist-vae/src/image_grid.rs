use crate::mnist_data::{IMAGE_COLS, IMAGE_PIXELS, IMAGE_ROWS};
use candle_vae::candle_core::{Device, Tensor};
use image::GrayImage;
use std::path::Path;

/// Combine a `(n, 784)` batch into one near-square grid image with
/// ceil(sqrt(n)) columns.
pub fn combine_images(x_nd: &Tensor) -> anyhow::Result<GrayImage> {
    let images: Vec<Vec<f32>> = x_nd.to_device(&Device::Cpu)?.to_vec2()?;

    let num_images = images.len();
    let ncol = ((num_images as f64).sqrt().ceil() as usize).max(1);
    let nrow = num_images.div_ceil(ncol);

    let mut canvas = GrayImage::new((ncol * IMAGE_COLS) as u32, (nrow * IMAGE_ROWS) as u32);

    for (idx, img) in images.iter().enumerate() {
        anyhow::ensure!(
            img.len() == IMAGE_PIXELS,
            "expected {} pixels per image, found {}",
            IMAGE_PIXELS,
            img.len()
        );

        let r0 = (idx / ncol) * IMAGE_ROWS;
        let c0 = (idx % ncol) * IMAGE_COLS;
        for (p, &v) in img.iter().enumerate() {
            let val = (v.clamp(0.0, 1.0) * 255.0) as u8;
            canvas.put_pixel(
                (c0 + p % IMAGE_COLS) as u32,
                (r0 + p / IMAGE_COLS) as u32,
                image::Luma([val]),
            );
        }
    }

    Ok(canvas)
}

/// Save the combined grid as a grayscale PNG
pub fn save_image_grid(file_path: &Path, x_nd: &Tensor) -> anyhow::Result<()> {
    combine_images(x_nd)?.save(file_path)?;
    Ok(())
}
