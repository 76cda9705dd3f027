use crate::candle_aux_layers::StackLayers;
use crate::candle_loss_functions::gaussian_kl_loss;
use crate::candle_model_traits::EncoderModuleT;
use candle_core::{Result, Tensor};
use candle_nn::{Linear, ModuleT, VarBuilder};

pub struct GaussianEncoder {
    n_features: usize,
    n_latent: usize,
    fc: StackLayers<Linear>,
    z_mean: Linear,
    z_lnvar: Linear,
}

impl EncoderModuleT for GaussianEncoder {
    fn forward_t(&self, x_nd: &Tensor, train: bool) -> Result<(Tensor, Tensor)> {
        let (z_mean_nk, z_lnvar_nk) = self.latent_gaussian_params(x_nd, train)?;
        let z_nk = self.reparameterize(&z_mean_nk, &z_lnvar_nk, train)?;

        Ok((z_nk, gaussian_kl_loss(&z_mean_nk, &z_lnvar_nk)?))
    }

    fn dim_obs(&self) -> usize {
        self.n_features
    }

    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}

impl GaussianEncoder {
    ///
    /// Evaluate latent Gaussian parameters: mu and log_var
    /// z ~ (mu(x), log_var(x))
    pub fn latent_gaussian_params(
        &self,
        x_nd: &Tensor,
        train: bool,
    ) -> Result<(Tensor, Tensor)> {
        let min_lv = -8.; // keep the log variance
        let max_lv = 8.; // within a sane range

        debug_assert_eq!(x_nd.dims().len(), 2);

        let fc_nl = self.fc.forward_t(x_nd, train)?;
        let z_mean_nk = self.z_mean.forward_t(&fc_nl, train)?;
        let z_lnvar_nk = self
            .z_lnvar
            .forward_t(&fc_nl, train)?
            .clamp(min_lv, max_lv)?;
        Ok((z_mean_nk, z_lnvar_nk))
    }

    ///
    /// z = mu + sigma * eps
    /// where eps ~ N(0, 1)
    ///
    /// # Arguments
    /// * `z_mean` - mean of Gaussian distribution
    /// * `z_lnvar` - log variance of Gaussian distribution
    pub fn reparameterize(
        &self,
        z_mean: &Tensor,
        z_lnvar: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        if train {
            let eps = Tensor::randn_like(z_mean, 0., 1.)?;
            z_mean + (z_lnvar * 0.5)?.exp()? * eps
        } else {
            Ok(z_mean.clone())
        }
    }

    /// Will create a new Gaussian posterior encoder
    /// with these variables:
    ///
    /// * `nn.enc.fc.{}.weight` where {} is the layer index
    /// * `nn.enc.z.mean.weight`
    /// * `nn.enc.z.lnvar.weight`
    ///
    /// # Arguments
    /// * `n_features` - the number of input pixels
    /// * `n_latent` - latent dimensionality
    /// * `layers` - fully connected layers, each with the dim
    /// * `vs` - variable builder
    pub fn new(
        n_features: usize,
        n_latent: usize,
        layers: &[usize],
        vs: VarBuilder,
    ) -> Result<Self> {
        debug_assert!(!layers.is_empty());

        // (1) data -> fc
        let mut fc = StackLayers::<Linear>::new();
        let mut prev_dim = n_features;
        for (j, &next_dim) in layers.iter().enumerate() {
            let _name = format!("nn.enc.fc.{}", j);
            fc.push_with_act(
                candle_nn::linear(prev_dim, next_dim, vs.pp(_name))?,
                candle_nn::Activation::Relu,
            );
            prev_dim = next_dim;
        }

        // (2) fc -> K
        let z_mean = candle_nn::linear(prev_dim, n_latent, vs.pp("nn.enc.z.mean"))?;
        let z_lnvar = candle_nn::linear(prev_dim, n_latent, vs.pp("nn.enc.z.lnvar"))?;

        Ok(Self {
            n_features,
            n_latent,
            fc,
            z_mean,
            z_lnvar,
        })
    }
}
