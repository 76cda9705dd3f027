use crate::candle_aux_layers::StackLayers;
use crate::candle_model_traits::DecoderModuleT;
use candle_core::{Result, Tensor};
use candle_nn::{ops, Linear, Module, VarBuilder};

/////////////////////////////
// Bernoulli Pixel Decoder //
/////////////////////////////

pub struct BernoulliDecoder {
    n_features: usize,
    n_latent: usize,
    fc: StackLayers<Linear>,
}

impl BernoulliDecoder {
    /// Will create a new Bernoulli pixel decoder with these variables:
    ///
    /// * `nn.dec.fc.{}.weight` where {} is the layer index
    /// * `nn.dec.logits.weight`
    ///
    /// # Arguments
    /// * `n_features` - the number of output pixels
    /// * `n_latent` - latent dimensionality
    /// * `layers` - fully connected layers, each with the dim
    /// * `vs` - variable builder
    pub fn new(
        n_features: usize,
        n_latent: usize,
        layers: &[usize],
        vs: VarBuilder,
    ) -> Result<Self> {
        // (1) K -> fc
        let mut fc = StackLayers::<Linear>::new();
        let mut prev_dim = n_latent;
        for (j, &next_dim) in layers.iter().enumerate() {
            let _name = format!("nn.dec.fc.{}", j);
            fc.push_with_act(
                candle_nn::linear(prev_dim, next_dim, vs.pp(_name))?,
                candle_nn::Activation::Relu,
            );
            prev_dim = next_dim;
        }

        // (2) fc -> pre-sigmoid pixel logits, no activation
        fc.push(candle_nn::linear(
            prev_dim,
            n_features,
            vs.pp("nn.dec.logits"),
        )?);

        Ok(Self {
            n_features,
            n_latent,
            fc,
        })
    }

    /// pre-sigmoid reconstruction logits (n x d)
    pub fn forward_logits(&self, z_nk: &Tensor) -> Result<Tensor> {
        self.fc.forward(z_nk)
    }
}

impl DecoderModuleT for BernoulliDecoder {
    fn forward(&self, z_nk: &Tensor) -> Result<Tensor> {
        ops::sigmoid(&self.forward_logits(z_nk)?)
    }

    fn forward_with_llik<LlikFn>(
        &self,
        z_nk: &Tensor,
        x_nd: &Tensor,
        llik: &LlikFn,
    ) -> Result<(Tensor, Tensor)>
    where
        LlikFn: Fn(&Tensor, &Tensor) -> Result<Tensor>,
    {
        let logits_nd = self.forward_logits(z_nk)?;
        let recon_nd = ops::sigmoid(&logits_nd)?;
        let llik_n = llik(x_nd, &logits_nd)?;

        Ok((recon_nd, llik_n))
    }

    fn dim_obs(&self) -> usize {
        self.n_features
    }

    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}
