use candle_vae::candle_checkpoint::{restore_checkpoint, save_checkpoint, ModelState};
use candle_vae::candle_core::{DType, Device, Tensor};
use candle_vae::candle_data_loader::InMemoryData;
use candle_vae::candle_decoder_bernoulli::BernoulliDecoder;
use candle_vae::candle_encoder_gaussian::GaussianEncoder;
use candle_vae::candle_inference::{TrainConfig, TrainContext};
use candle_vae::candle_loss_functions::bernoulli_likelihood;
use candle_vae::candle_nn;
use candle_vae::candle_vae_model::{Vae, VaeT};

const N_PIXELS: usize = 12;
const N_LATENT: usize = 4;

fn new_model_parts(
    dev: &Device,
) -> anyhow::Result<(candle_nn::VarMap, GaussianEncoder, BernoulliDecoder)> {
    let parameters = candle_nn::VarMap::new();
    let param_builder = candle_nn::VarBuilder::from_varmap(&parameters, DType::F32, dev);

    let encoder = GaussianEncoder::new(N_PIXELS, N_LATENT, &[8], param_builder.clone())?;
    let decoder = BernoulliDecoder::new(N_PIXELS, N_LATENT, &[8], param_builder.clone())?;

    Ok((parameters, encoder, decoder))
}

#[test]
fn restore_without_a_checkpoint_starts_fresh() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let dir = tempfile::tempdir()?;

    let (mut parameters, _encoder, _decoder) = new_model_parts(&dev)?;
    let state = restore_checkpoint(dir.path(), &mut parameters)?;

    assert_eq!(state, ModelState::Fresh);
    Ok(())
}

#[test]
fn checkpoint_round_trip_restores_parameters_and_step() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let dir = tempfile::tempdir()?;

    let (parameters_a, encoder_a, _decoder_a) = new_model_parts(&dev)?;
    save_checkpoint(dir.path(), &parameters_a, 123)?;

    let (mut parameters_b, encoder_b, _decoder_b) = new_model_parts(&dev)?;
    let state = restore_checkpoint(dir.path(), &mut parameters_b)?;
    assert_eq!(state, ModelState::Resumed { step: 123 });

    // the two encoders must now agree on every input
    let x_nd = Tensor::rand(0_f32, 1_f32, (4, N_PIXELS), &dev)?;

    let (mu_a, lv_a) = encoder_a.latent_gaussian_params(&x_nd, false)?;
    let (mu_b, lv_b) = encoder_b.latent_gaussian_params(&x_nd, false)?;

    let mu_a: Vec<Vec<f32>> = mu_a.to_vec2()?;
    let mu_b: Vec<Vec<f32>> = mu_b.to_vec2()?;
    let lv_a: Vec<Vec<f32>> = lv_a.to_vec2()?;
    let lv_b: Vec<Vec<f32>> = lv_b.to_vec2()?;

    for (row_a, row_b) in mu_a.iter().zip(mu_b.iter()) {
        for (a, b) in row_a.iter().zip(row_b.iter()) {
            approx::assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
    }
    for (row_a, row_b) in lv_a.iter().zip(lv_b.iter()) {
        for (a, b) in row_a.iter().zip(row_b.iter()) {
            approx::assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    Ok(())
}

#[test]
fn resumed_training_moves_past_the_saved_step() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let dir = tempfile::tempdir()?;

    let (parameters_a, _encoder_a, _decoder_a) = new_model_parts(&dev)?;
    save_checkpoint(dir.path(), &parameters_a, 200)?;

    let (mut parameters_b, encoder_b, decoder_b) = new_model_parts(&dev)?;
    let state = restore_checkpoint(dir.path(), &mut parameters_b)?;

    let train_config = TrainConfig {
        learning_rate: 1e-3,
        batch_size: 4,
        num_steps: 300,
        local_steps: 2,
        device: dev.clone(),
        verbose: false,
        show_progress: false,
    };

    let mut ctx = TrainContext::new(&parameters_b, &train_config)?;
    if let ModelState::Resumed { step } = state {
        ctx.global_step = step;
    }
    assert_eq!(ctx.global_step, 200);

    let images =
        ndarray::Array2::from_shape_fn((16, N_PIXELS), |(i, j)| ((i + j) % 10) as f32 / 10.0);
    let data = InMemoryData::new(&images)?;

    let model = Vae::build(&encoder_b, &decoder_b, &parameters_b);
    model.fit(&data, &bernoulli_likelihood, &mut ctx, &train_config)?;

    assert_eq!(ctx.global_step, 202);
    assert!(ctx.global_step > 200, "the step never restarts at zero");

    Ok(())
}
