pub mod fit_vae;
pub mod image_grid;
pub mod latent_plot;
pub mod mnist_data;
