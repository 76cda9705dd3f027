use candle_core::Device;
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};

pub struct TrainConfig {
    pub learning_rate: f32,
    pub batch_size: usize,
    pub num_steps: usize,
    pub local_steps: usize,
    pub device: Device,
    pub verbose: bool,
    pub show_progress: bool,
}

/// Explicit training context threaded through every operation: the
/// optimizer (whose moments persist across `fit` calls), the target
/// device, and the global step counter persisted with checkpoints.
pub struct TrainContext {
    pub device: Device,
    pub optimizer: AdamW,
    pub global_step: usize,
}

impl TrainContext {
    /// Adam with zero weight decay over all variables in `variable_map`
    pub fn new(variable_map: &VarMap, config: &TrainConfig) -> candle_core::Result<Self> {
        let params = ParamsAdamW {
            lr: config.learning_rate.into(),
            weight_decay: 0.0,
            ..Default::default()
        };
        let optimizer = AdamW::new(variable_map.all_vars(), params)?;

        Ok(Self {
            device: config.device.clone(),
            optimizer,
            global_step: 0,
        })
    }
}
