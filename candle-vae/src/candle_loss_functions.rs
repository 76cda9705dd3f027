use candle_core::{Result, Tensor};

/// KL divergence loss between the approximate posterior and N(0, I)
///
/// 0.5 * sum_k (sigma^2 - 1 + mu^2 - log(sigma^2))
///
/// * `z_mean` - mean of Gaussian distribution (n x k)
/// * `z_lnvar` - log variance of Gaussian distribution (n x k)
///
pub fn gaussian_kl_loss(z_mean: &Tensor, z_lnvar: &Tensor) -> Result<Tensor> {
    let z_var = z_lnvar.exp()?;
    (z_var - 1. + z_mean.powf(2.)? - z_lnvar)?.sum(z_mean.rank() - 1)? * 0.5
}

/// Bernoulli log-likelihood of pixel data against pre-sigmoid logits
///
/// llik(i) = -sum_j [ max(l, 0) - l * x + log(1 + exp(-|l|)) ]
///
/// the stable form of summed pixel-wise sigmoid cross-entropy, so the
/// reconstruction loss `-llik` is non-negative
///
/// * `x_nd` - data tensor with values in [0, 1]
/// * `logits_nd` - pre-sigmoid reconstruction logits
///
pub fn bernoulli_likelihood(x_nd: &Tensor, logits_nd: &Tensor) -> Result<Tensor> {
    let ce_nd = ((logits_nd.relu()? - logits_nd.mul(x_nd)?)?
        + (logits_nd.abs()?.neg()?.exp()? + 1.)?.log()?)?;
    ce_nd.sum(x_nd.rank() - 1)?.neg()
}
