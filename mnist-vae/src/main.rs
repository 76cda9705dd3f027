use clap::Parser;
use mnist_vae::fit_vae::{fit_vae, TrainVaeArgs};

fn main() -> anyhow::Result<()> {
    let args = TrainVaeArgs::parse();
    fit_vae(&args)?;
    Ok(())
}
