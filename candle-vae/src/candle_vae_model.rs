use crate::candle_data_loader::{DataLoader, MinibatchData};
use crate::candle_inference::{TrainConfig, TrainContext};
use crate::candle_model_traits::{DecoderModuleT, EncoderModuleT};

use candle_core::{DType, Device, Result, Tensor};
use candle_nn::Optimizer;
use log::info;

pub struct Vae<'a, Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    pub encoder: &'a Enc,
    pub decoder: &'a Dec,
    pub variable_map: &'a candle_nn::VarMap,
}

/// Loss components evaluated on a monitoring batch after each `fit`
#[derive(Debug, Clone, Copy)]
pub struct FitMetrics {
    pub loss: f32,
    pub rec_loss: f32,
    pub kld_loss: f32,
}

pub trait VaeT<'a, Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    /// Run `config.local_steps` optimization iterations on freshly
    /// sampled minibatches, then evaluate loss components on a larger
    /// monitoring batch (5x the minibatch size). Mutates the model
    /// parameters and advances `ctx.global_step`.
    ///
    /// * `data` - data loader with `sample_minibatch`
    /// * `llik` - log likelihood function over (observed, logits)
    /// * `ctx` - training context (optimizer and global step)
    /// * `train_config` - training configuration
    fn fit<DataL, LlikFn>(
        &self,
        data: &DataL,
        llik: &LlikFn,
        ctx: &mut TrainContext,
        train_config: &TrainConfig,
    ) -> anyhow::Result<FitMetrics>
    where
        DataL: DataLoader,
        LlikFn: Fn(&Tensor, &Tensor) -> Result<Tensor>;

    /// Decode `num_samples` latent vectors drawn from N(0, I);
    /// read-only with respect to the model parameters.
    fn generate(&self, num_samples: usize, device: &Device) -> Result<Tensor>;

    /// Encode a freshly sampled batch of real images and return the
    /// sampled latent states along with their labels; read-only.
    fn latent_states<DataL>(
        &self,
        data: &DataL,
        num_samples: usize,
        device: &Device,
    ) -> anyhow::Result<(Tensor, Option<Tensor>)>
    where
        DataL: DataLoader;

    /// Build a VAE model
    /// * `encoder` - encoder module
    /// * `decoder` - decoder module
    fn build(encoder: &'a Enc, decoder: &'a Dec, variable_map: &'a candle_nn::VarMap) -> Self;
}

impl<'a, Enc, Dec> Vae<'a, Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    /// Loss components on one minibatch without touching parameters.
    /// With `train` the latent state is sampled through the
    /// reparameterization step; otherwise the posterior mean is used.
    pub fn evaluate_losses<LlikFn>(
        &self,
        minibatch: &MinibatchData,
        llik_func: &LlikFn,
        train: bool,
    ) -> anyhow::Result<FitMetrics>
    where
        LlikFn: Fn(&Tensor, &Tensor) -> Result<Tensor>,
    {
        let (z_nk, kl_n) = self.encoder.forward_t(&minibatch.input, train)?;
        let (_, llik_n) = self
            .decoder
            .forward_with_llik(&z_nk, &minibatch.input, llik_func)?;

        let rec_loss = llik_n.neg()?.mean_all()?.to_scalar::<f32>()?;
        let kld_loss = kl_n.mean_all()?.to_scalar::<f32>()?;

        Ok(FitMetrics {
            loss: rec_loss + kld_loss,
            rec_loss,
            kld_loss,
        })
    }
}

impl<'a, Enc, Dec> VaeT<'a, Enc, Dec> for Vae<'a, Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    fn fit<DataL, LlikFn>(
        &self,
        data: &DataL,
        llik_func: &LlikFn,
        ctx: &mut TrainContext,
        train_config: &TrainConfig,
    ) -> anyhow::Result<FitMetrics>
    where
        DataL: DataLoader,
        LlikFn: Fn(&Tensor, &Tensor) -> Result<Tensor>,
    {
        for _local in 0..train_config.local_steps {
            let minibatch = data.sample_minibatch(train_config.batch_size, &ctx.device)?;

            let (z_nk, kl_n) = self.encoder.forward_t(&minibatch.input, true)?;
            let (_, llik_n) = self
                .decoder
                .forward_with_llik(&z_nk, &minibatch.input, llik_func)?;

            let loss = (kl_n - &llik_n)?.mean_all()?;
            ctx.optimizer.backward_step(&loss)?;
            ctx.global_step += 1;
        }

        // monitoring pass on a larger batch, with a freshly sampled z
        // like every other forward pass
        let minibatch = data.sample_minibatch(train_config.batch_size * 5, &ctx.device)?;
        let metrics = self.evaluate_losses(&minibatch, llik_func, true)?;

        if train_config.verbose {
            info!(
                "[{}] loss: {} rec: {} kld: {}",
                ctx.global_step, metrics.loss, metrics.rec_loss, metrics.kld_loss
            );
        }

        Ok(metrics)
    }

    fn generate(&self, num_samples: usize, device: &Device) -> Result<Tensor> {
        if num_samples == 0 {
            return Tensor::zeros((0, self.decoder.dim_obs()), DType::F32, device);
        }

        let z_nk = Tensor::randn(
            0_f32,
            1_f32,
            (num_samples, self.decoder.dim_latent()),
            device,
        )?;
        self.decoder.forward(&z_nk)
    }

    fn latent_states<DataL>(
        &self,
        data: &DataL,
        num_samples: usize,
        device: &Device,
    ) -> anyhow::Result<(Tensor, Option<Tensor>)>
    where
        DataL: DataLoader,
    {
        let minibatch = data.sample_minibatch(num_samples, device)?;
        let (z_nk, _) = self.encoder.forward_t(&minibatch.input, true)?;
        Ok((z_nk, minibatch.labels))
    }

    fn build(encoder: &'a Enc, decoder: &'a Dec, variable_map: &'a candle_nn::VarMap) -> Self {
        assert_eq!(encoder.dim_latent(), decoder.dim_latent());

        Self {
            encoder,
            decoder,
            variable_map,
        }
    }
}
