use candle_nn::VarMap;
use log::info;
use std::path::Path;

pub const PARAMETERS_FILE: &str = "model.safetensors";
pub const STATE_FILE: &str = "state.json";

/// Parameter state selected once at process start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Fresh,
    Resumed { step: usize },
}

/// Persist all learnable parameters and the global step counter into
/// `dir`, overwriting the previous snapshot.
pub fn save_checkpoint(dir: &Path, variable_map: &VarMap, global_step: usize) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    variable_map.save(dir.join(PARAMETERS_FILE))?;

    let state = serde_json::json!({ "global_step": global_step });
    std::fs::write(dir.join(STATE_FILE), serde_json::to_string_pretty(&state)?)?;
    Ok(())
}

/// Load parameters and step back into an already-constructed model.
/// A missing checkpoint yields `Fresh`; a corrupt or incompatible one
/// is an error.
pub fn restore_checkpoint(dir: &Path, variable_map: &mut VarMap) -> anyhow::Result<ModelState> {
    let parameters_file = dir.join(PARAMETERS_FILE);
    let state_file = dir.join(STATE_FILE);

    if !parameters_file.exists() || !state_file.exists() {
        return Ok(ModelState::Fresh);
    }

    variable_map.load(&parameters_file)?;

    let state: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&state_file)?)?;
    let step = state["global_step"]
        .as_u64()
        .ok_or_else(|| anyhow::anyhow!("no global_step in {:?}", state_file))?
        as usize;

    info!("restored checkpoint at step {}", step);
    Ok(ModelState::Resumed { step })
}
