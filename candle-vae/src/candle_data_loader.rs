use candle_core::{Device, Tensor};
use ndarray::Array2;
use rand_distr::{Distribution, Uniform};
use rayon::prelude::*;

pub struct MinibatchData {
    pub input: Tensor,
    pub labels: Option<Tensor>,
}

/// `DataLoader` for minibatch learning
pub trait DataLoader {
    /// a minibatch of `batch_size` rows sampled uniformly with replacement
    fn sample_minibatch(
        &self,
        batch_size: usize,
        target_device: &Device,
    ) -> anyhow::Result<MinibatchData>;

    fn num_samples(&self) -> usize;
}

///
/// A simple data loader for an in-memory 2d matrix. Each row will be
/// considered as a feature vector (one flattened image); labels, when
/// present, line up with the rows.
///
pub struct InMemoryData {
    input_data: Vec<Tensor>,
    label_data: Option<Vec<u32>>,
}

impl InMemoryData {
    ///
    /// Create a data loader with the main data tensor `data`
    ///
    pub fn new(data: &Array2<f32>) -> anyhow::Result<Self> {
        Ok(InMemoryData {
            input_data: rows_to_tensor_vec(data),
            label_data: None,
        })
    }

    ///
    /// Create a data loader with the main `data` and per-row `labels`
    ///
    pub fn new_with_labels(data: &Array2<f32>, labels: &[u8]) -> anyhow::Result<Self> {
        anyhow::ensure!(
            data.nrows() == labels.len(),
            "each row needs a label: {} rows vs. {} labels",
            data.nrows(),
            labels.len()
        );

        Ok(InMemoryData {
            input_data: rows_to_tensor_vec(data),
            label_data: Some(labels.iter().map(|&y| y as u32).collect()),
        })
    }
}

impl DataLoader for InMemoryData {
    fn sample_minibatch(
        &self,
        batch_size: usize,
        target_device: &Device,
    ) -> anyhow::Result<MinibatchData> {
        let ntot = self.input_data.len();
        anyhow::ensure!(ntot > 0, "empty data loader");

        let unif = Uniform::new(0, ntot)?;
        let mut rng = rand::rng();
        let rows: Vec<usize> = (0..batch_size).map(|_| unif.sample(&mut rng)).collect();

        let chunk: Vec<Tensor> = rows.iter().map(|&i| self.input_data[i].clone()).collect();
        let input = Tensor::cat(&chunk, 0)?.to_device(target_device)?;

        let labels = match self.label_data.as_ref() {
            Some(label_data) => {
                let picked = rows.iter().map(|&i| label_data[i]);
                Some(Tensor::from_iter(picked, target_device)?)
            }
            None => None,
        };

        Ok(MinibatchData { input, labels })
    }

    fn num_samples(&self) -> usize {
        self.input_data.len()
    }
}

///
/// Convert rows of a matrix to a vector of `(1 x d)` tensors
///
fn rows_to_tensor_vec(data: &Array2<f32>) -> Vec<Tensor> {
    let mut idx_data = data
        .axis_iter(ndarray::Axis(0))
        .enumerate()
        .par_bridge()
        .map(|(i, row)| {
            let mut v = Tensor::from_iter(row.iter().map(|x| *x), &Device::Cpu)
                .expect("failed to create tensor");
            v = v.reshape((1, row.len())).expect("failed to reshape");
            (i, v)
        })
        .collect::<Vec<_>>();

    idx_data.sort_by_key(|(i, _)| *i);
    idx_data.into_iter().map(|(_, t)| t).collect()
}
