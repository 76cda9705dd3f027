use crate::image_grid::save_image_grid;
use crate::latent_plot::plot_latent;
use crate::mnist_data::{MnistData, IMAGE_PIXELS};

use candle_vae::candle_checkpoint::{restore_checkpoint, save_checkpoint, ModelState};
use candle_vae::candle_data_loader::InMemoryData;
use candle_vae::candle_decoder_bernoulli::BernoulliDecoder;
use candle_vae::candle_encoder_gaussian::GaussianEncoder;
use candle_vae::candle_inference::{TrainConfig, TrainContext};
use candle_vae::candle_loss_functions::bernoulli_likelihood;
use candle_vae::candle_vae_model::{Vae, VaeT};
use candle_vae::{candle_core, candle_nn};

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::info;
use std::io::Write;
use std::path::Path;

#[derive(ValueEnum, Clone, Debug, PartialEq)]
#[clap(rename_all = "lowercase")]
enum ComputeDevice {
    Cpu,
    Cuda,
    Metal,
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "MNIST-VAE",
    long_about = "Train a variational autoencoder on MNIST-style 28x28 images.\n\
		  The training loop checkpoints into the log directory and\n\
		  resumes from it when restarted."
)]
pub struct TrainVaeArgs {
    #[arg(
        required = true,
        help = "Data directory",
        long_help = "Directory holding the MNIST idx files:\n\
		     train-images-idx3-ubyte[.gz]\n\
		     train-labels-idx1-ubyte[.gz]"
    )]
    data_dir: Box<str>,

    #[arg(
        long,
        short,
        default_value = "./logs/vae/",
        help = "Log directory",
        long_help = "Log directory for generated files:\n\
		     - model.safetensors / state.json (checkpoint)\n\
		     - metrics.tsv (loss trace)\n\
		     - train{step}.png (sample grids)\n\
		     - vae_z_{step}.png (latent plots)"
    )]
    out: Box<str>,

    #[arg(
        long,
        short,
        default_value_t = 20000,
        help = "Total training steps",
        long_help = "Total optimization step budget.\n\
		     The loop stops once the global step reaches it."
    )]
    steps: usize,

    #[arg(
        long,
        default_value_t = 100,
        help = "Optimization steps per round",
        long_help = "Optimization steps between checkpoints, metric\n\
		     records, and sample image grids."
    )]
    local_steps: usize,

    #[arg(
        long,
        default_value_t = 64,
        help = "Minibatch size",
        long_help = "Minibatch size for training.\n\
		     The monitoring batch is five times larger."
    )]
    minibatch_size: usize,

    #[arg(
        long,
        short = 'k',
        default_value_t = 16,
        help = "Latent dimensionality",
        long_help = "Dimensionality of the latent Gaussian code shared by\n\
		     the encoder heads and the decoder input."
    )]
    latent_dim: usize,

    #[arg(
        long,
        short = 'e',
        value_delimiter(','),
        default_values_t = vec![512, 256],
        help = "Encoder layers",
        long_help = "Encoder hidden layers (comma-separated).\n\
		     Example: 512,256"
    )]
    encoder_layers: Vec<usize>,

    #[arg(
        long,
        value_delimiter(','),
        default_values_t = vec![256, 512],
        help = "Decoder layers",
        long_help = "Decoder hidden layers (comma-separated).\n\
		     Example: 256,512"
    )]
    decoder_layers: Vec<usize>,

    #[arg(
        long,
        default_value_t = 1e-3,
        help = "Learning rate",
        long_help = "Learning rate for the Adam updates."
    )]
    learning_rate: f32,

    #[arg(
        long,
        default_value_t = 100,
        help = "Images per sample grid",
        long_help = "Number of decoded prior samples per train{step}.png grid."
    )]
    gen_samples: usize,

    #[arg(
        long,
        default_value_t = 1000,
        help = "Steps between latent plots",
        long_help = "Interval (in global steps) between vae_z_{step}.png\n\
		     latent scatter plots."
    )]
    latent_plot_interval: usize,

    #[arg(
        long,
        default_value_t = 2000,
        help = "Points per latent plot",
        long_help = "Number of encoded training images per latent plot."
    )]
    latent_plot_points: usize,

    #[arg(
        long,
        value_enum,
        default_value = "cpu",
        help = "Candle device",
        long_help = "Candle device to use for computation.\n\
		     Options: cpu, cuda, metal."
    )]
    device: ComputeDevice,

    #[arg(
        long,
        default_value_t = 0,
        help = "A device number for cuda/metal",
        long_help = "For cuda or metal, we may want to choose a different device."
    )]
    device_no: usize,

    #[arg(
        long,
        short,
        help = "Verbosity",
        long_help = "Enable verbose output.\n\
		     Prints additional information during execution."
    )]
    verbose: bool,
}

pub fn fit_vae(args: &TrainVaeArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let dev = match args.device {
        ComputeDevice::Metal => candle_core::Device::new_metal(args.device_no)?,
        ComputeDevice::Cuda => candle_core::Device::new_cuda(args.device_no)?,
        _ => candle_core::Device::Cpu,
    };

    let log_dir = Path::new(args.out.as_ref());
    std::fs::create_dir_all(log_dir)?;

    // 1. Load the training data
    info!("Reading MNIST data from {}", args.data_dir);
    let mnist = MnistData::from_dir(&args.data_dir)?;
    info!("{} training images", mnist.images.nrows());

    let data = InMemoryData::new_with_labels(&mnist.images, &mnist.labels)?;

    // 2. Build the computation graph
    let mut parameters = candle_nn::VarMap::new();
    let param_builder =
        candle_nn::VarBuilder::from_varmap(&parameters, candle_core::DType::F32, &dev);

    let encoder = GaussianEncoder::new(
        IMAGE_PIXELS,
        args.latent_dim,
        &args.encoder_layers,
        param_builder.clone(),
    )?;
    let decoder = BernoulliDecoder::new(
        IMAGE_PIXELS,
        args.latent_dim,
        &args.decoder_layers,
        param_builder.clone(),
    )?;

    info!(
        "input: {} -> encoder -> z: {} -> decoder -> output: {}",
        IMAGE_PIXELS, args.latent_dim, IMAGE_PIXELS
    );

    // 3. Fresh start or resume from the previous checkpoint
    let state = restore_checkpoint(log_dir, &mut parameters)?;

    let train_config = TrainConfig {
        learning_rate: args.learning_rate,
        batch_size: args.minibatch_size,
        num_steps: args.steps,
        local_steps: args.local_steps,
        device: dev.clone(),
        verbose: args.verbose,
        show_progress: !args.verbose,
    };

    let mut ctx = TrainContext::new(&parameters, &train_config)?;
    match state {
        ModelState::Resumed { step } => {
            ctx.global_step = step;
            info!("Resuming training from step {}", step);
        }
        ModelState::Fresh => {
            info!("Starting training from scratch");
        }
    }

    let model = Vae::build(&encoder, &decoder, &parameters);

    // 4. Train until the step budget is reached
    let metrics_file = log_dir.join("metrics.tsv");
    let mut metrics_out = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&metrics_file)?;
    if metrics_out.metadata()?.len() == 0 {
        writeln!(metrics_out, "step\tloss\trec_loss\tkld_loss")?;
    }

    let pb = ProgressBar::new(args.steps as u64);
    if !train_config.show_progress {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    pb.set_position(ctx.global_step.min(args.steps) as u64);

    while ctx.global_step < args.steps {
        let metrics = model.fit(&data, &bernoulli_likelihood, &mut ctx, &train_config)?;
        let step = ctx.global_step;

        save_checkpoint(log_dir, &parameters, step)?;
        writeln!(
            metrics_out,
            "{}\t{}\t{}\t{}",
            step, metrics.loss, metrics.rec_loss, metrics.kld_loss
        )?;
        info!(
            "Train [{}/{}] loss [{:.3}] rec_loss [{:.3}] kld_loss [{:.3}]",
            step, args.steps, metrics.loss, metrics.rec_loss, metrics.kld_loss
        );

        let gen_x = model.generate(args.gen_samples, &dev)?;
        save_image_grid(&log_dir.join(format!("train{}.png", step)), &gen_x)?;

        if step % args.latent_plot_interval == 0 {
            let (z_nk, y) = model.latent_states(&data, args.latent_plot_points, &dev)?;
            plot_latent(&log_dir.join(format!("vae_z_{}.png", step)), &z_nk, y.as_ref())?;
        }

        pb.set_position(step.min(args.steps) as u64);
    }
    pb.finish_and_clear();

    info!("Done");
    Ok(())
}
