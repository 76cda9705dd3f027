use candle_vae::candle_core::{DType, Device, Tensor};
use candle_vae::candle_loss_functions::{bernoulli_likelihood, gaussian_kl_loss};

#[test]
fn kl_loss_is_zero_for_the_standard_normal() -> anyhow::Result<()> {
    let dev = Device::Cpu;

    let z_mean = Tensor::zeros((4, 16), DType::F32, &dev)?;
    let z_lnvar = Tensor::zeros((4, 16), DType::F32, &dev)?;

    let kl: Vec<f32> = gaussian_kl_loss(&z_mean, &z_lnvar)?.to_vec1()?;

    for k in kl {
        approx::assert_abs_diff_eq!(k, 0.0, epsilon = 1e-6);
    }

    Ok(())
}

#[test]
fn kl_loss_is_positive_away_from_the_prior() -> anyhow::Result<()> {
    let dev = Device::Cpu;

    // 0.5 * sum_k (1 - 1 + 1 - 0) = 4 for eight unit means
    let z_mean = Tensor::ones((3, 8), DType::F32, &dev)?;
    let z_lnvar = Tensor::zeros((3, 8), DType::F32, &dev)?;

    let kl: Vec<f32> = gaussian_kl_loss(&z_mean, &z_lnvar)?.to_vec1()?;

    for k in kl {
        approx::assert_abs_diff_eq!(k, 4.0, epsilon = 1e-5);
    }

    Ok(())
}

#[test]
fn reconstruction_loss_is_non_negative() -> anyhow::Result<()> {
    let dev = Device::Cpu;

    let x_nd = Tensor::rand(0_f32, 1_f32, (5, 12), &dev)?;
    let logits_nd = Tensor::randn(0_f32, 1_f32, (5, 12), &dev)?;

    let llik: Vec<f32> = bernoulli_likelihood(&x_nd, &logits_nd)?.to_vec1()?;

    for l in llik {
        assert!(l <= 0.0, "log-likelihood must be non-positive, found {}", l);
    }

    Ok(())
}

#[test]
fn bernoulli_likelihood_matches_naive_cross_entropy() -> anyhow::Result<()> {
    let dev = Device::Cpu;

    let x = vec![0.0_f32, 1.0, 0.5];
    let logits = vec![0.3_f32, -1.2, 2.0];

    let x_nd = Tensor::from_vec(x.clone(), (1, 3), &dev)?;
    let logits_nd = Tensor::from_vec(logits.clone(), (1, 3), &dev)?;

    let llik: Vec<f32> = bernoulli_likelihood(&x_nd, &logits_nd)?.to_vec1()?;

    let expected: f32 = x
        .iter()
        .zip(logits.iter())
        .map(|(&x_j, &l_j)| {
            let sig = 1.0 / (1.0 + (-l_j).exp());
            x_j * sig.ln() + (1.0 - x_j) * (1.0 - sig).ln()
        })
        .sum();

    approx::assert_abs_diff_eq!(llik[0], expected, epsilon = 1e-4);

    Ok(())
}
