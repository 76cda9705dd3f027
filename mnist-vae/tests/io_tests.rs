use candle_vae::candle_core::{Device, Tensor};
use flate2::write::GzEncoder;
use flate2::Compression;
use mnist_vae::image_grid::combine_images;
use mnist_vae::latent_plot::{plot_latent, CANVAS_SIZE};
use mnist_vae::mnist_data::{read_idx_images, MnistData, IMAGE_PIXELS};
use std::io::Write;
use std::path::Path;

fn write_gz(file_path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let out = std::fs::File::create(file_path)?;
    let mut enc = GzEncoder::new(out, Compression::default());
    enc.write_all(bytes)?;
    enc.finish()?;
    Ok(())
}

fn idx_image_bytes(num_images: usize) -> Vec<u8> {
    let mut bytes = vec![];
    bytes.extend_from_slice(&2051_u32.to_be_bytes());
    bytes.extend_from_slice(&(num_images as u32).to_be_bytes());
    bytes.extend_from_slice(&28_u32.to_be_bytes());
    bytes.extend_from_slice(&28_u32.to_be_bytes());
    bytes.extend((0..num_images * IMAGE_PIXELS).map(|i| (i % 256) as u8));
    bytes
}

fn idx_label_bytes(labels: &[u8]) -> Vec<u8> {
    let mut bytes = vec![];
    bytes.extend_from_slice(&2049_u32.to_be_bytes());
    bytes.extend_from_slice(&(labels.len() as u32).to_be_bytes());
    bytes.extend_from_slice(labels);
    bytes
}

#[test]
fn idx_round_trip_with_gzip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    write_gz(
        &dir.path().join("train-images-idx3-ubyte.gz"),
        &idx_image_bytes(3),
    )?;
    write_gz(
        &dir.path().join("train-labels-idx1-ubyte.gz"),
        &idx_label_bytes(&[1, 2, 3]),
    )?;

    let mnist = MnistData::from_dir(dir.path().to_str().unwrap())?;

    assert_eq!(mnist.images.nrows(), 3);
    assert_eq!(mnist.images.ncols(), IMAGE_PIXELS);
    assert_eq!(mnist.labels, vec![1, 2, 3]);

    // byte 255 of the first image scales to 1.0
    approx::assert_abs_diff_eq!(mnist.images[[0, 255]], 1.0, epsilon = 1e-6);
    assert!(mnist
        .images
        .iter()
        .all(|&v| (0.0..=1.0).contains(&v)));

    Ok(())
}

#[test]
fn idx_magic_is_checked() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    let mut bad = idx_image_bytes(1);
    bad[0..4].copy_from_slice(&1234_u32.to_be_bytes());

    let file_path = dir.path().join("train-images-idx3-ubyte.gz");
    write_gz(&file_path, &bad)?;

    assert!(read_idx_images(&file_path).is_err());
    Ok(())
}

#[test]
fn image_grid_has_a_near_square_layout() -> anyhow::Result<()> {
    let dev = Device::Cpu;

    // five images pack into a 3 x 2 grid
    let x_nd = Tensor::rand(0_f32, 1_f32, (5, IMAGE_PIXELS), &dev)?;
    let grid = combine_images(&x_nd)?;

    assert_eq!(grid.width(), 3 * 28);
    assert_eq!(grid.height(), 2 * 28);

    Ok(())
}

#[test]
fn latent_plot_writes_a_png() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let dir = tempfile::tempdir()?;

    let z_nk = Tensor::randn(0_f32, 1_f32, (50, 4), &dev)?;
    let labels = Tensor::from_iter((0..50).map(|i| (i % 10) as u32), &dev)?;

    let file_path = dir.path().join("vae_z_0.png");
    plot_latent(&file_path, &z_nk, Some(&labels))?;

    let plotted = image::open(&file_path)?;
    assert_eq!(plotted.width(), CANVAS_SIZE);
    assert_eq!(plotted.height(), CANVAS_SIZE);

    Ok(())
}
