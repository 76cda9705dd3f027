use anyhow::Context;
use flate2::read::GzDecoder;
use ndarray::Array2;
use std::io::Read;
use std::path::{Path, PathBuf};

const IMAGE_MAGIC: u32 = 2051;
const LABEL_MAGIC: u32 = 2049;

pub const IMAGE_ROWS: usize = 28;
pub const IMAGE_COLS: usize = 28;
pub const IMAGE_PIXELS: usize = IMAGE_ROWS * IMAGE_COLS;

/// Flattened images (n x 784, values in [0, 1]) with their labels
pub struct MnistData {
    pub images: Array2<f32>,
    pub labels: Vec<u8>,
}

impl MnistData {
    /// Read `train-images-idx3-ubyte[.gz]` and
    /// `train-labels-idx1-ubyte[.gz]` from `data_dir`.
    pub fn from_dir(data_dir: &str) -> anyhow::Result<Self> {
        let images = read_idx_images(&find_idx_file(data_dir, "train-images-idx3-ubyte")?)?;
        let labels = read_idx_labels(&find_idx_file(data_dir, "train-labels-idx1-ubyte")?)?;

        anyhow::ensure!(
            images.nrows() == labels.len(),
            "{} images vs. {} labels",
            images.nrows(),
            labels.len()
        );

        Ok(MnistData { images, labels })
    }
}

fn find_idx_file(data_dir: &str, stem: &str) -> anyhow::Result<PathBuf> {
    let dir = Path::new(data_dir);
    for name in [stem.to_string(), format!("{}.gz", stem)] {
        let file_path = dir.join(&name);
        if file_path.exists() {
            return Ok(file_path);
        }
    }
    Err(anyhow::anyhow!("missing {}[.gz] under {}", stem, data_dir))
}

/// read a whole file, transparently un-gzipping by extension
fn read_bytes(file_path: &Path) -> anyhow::Result<Vec<u8>> {
    let raw = std::fs::File::open(file_path)
        .with_context(|| format!("failed to open {:?}", file_path))?;

    let mut buf = vec![];
    match file_path.extension().and_then(|x| x.to_str()) {
        Some("gz") => {
            GzDecoder::new(raw).read_to_end(&mut buf)?;
        }
        _ => {
            std::io::BufReader::new(raw).read_to_end(&mut buf)?;
        }
    }
    Ok(buf)
}

fn be_u32(bytes: &[u8], at: usize) -> anyhow::Result<u32> {
    let word: [u8; 4] = bytes
        .get(at..at + 4)
        .ok_or_else(|| anyhow::anyhow!("truncated idx header"))?
        .try_into()?;
    Ok(u32::from_be_bytes(word))
}

/// idx3: magic, count, rows, cols, then row-major u8 pixels
pub fn read_idx_images(file_path: &Path) -> anyhow::Result<Array2<f32>> {
    let bytes = read_bytes(file_path)?;

    anyhow::ensure!(
        be_u32(&bytes, 0)? == IMAGE_MAGIC,
        "bad image magic in {:?}",
        file_path
    );

    let num_images = be_u32(&bytes, 4)? as usize;
    let nrow = be_u32(&bytes, 8)? as usize;
    let ncol = be_u32(&bytes, 12)? as usize;

    anyhow::ensure!(
        nrow == IMAGE_ROWS && ncol == IMAGE_COLS,
        "expected {}x{} images, found {}x{}",
        IMAGE_ROWS,
        IMAGE_COLS,
        nrow,
        ncol
    );

    let pixels = &bytes[16..];
    anyhow::ensure!(
        pixels.len() == num_images * nrow * ncol,
        "truncated image data in {:?}",
        file_path
    );

    let data: Vec<f32> = pixels.iter().map(|&b| b as f32 / 255.0).collect();
    Ok(Array2::from_shape_vec((num_images, nrow * ncol), data)?)
}

/// idx1: magic, count, then u8 labels
pub fn read_idx_labels(file_path: &Path) -> anyhow::Result<Vec<u8>> {
    let bytes = read_bytes(file_path)?;

    anyhow::ensure!(
        be_u32(&bytes, 0)? == LABEL_MAGIC,
        "bad label magic in {:?}",
        file_path
    );

    let num_labels = be_u32(&bytes, 4)? as usize;
    let labels = bytes[8..].to_vec();
    anyhow::ensure!(
        labels.len() == num_labels,
        "truncated label data in {:?}",
        file_path
    );

    Ok(labels)
}
