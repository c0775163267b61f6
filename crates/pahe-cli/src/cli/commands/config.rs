//! `apdl config` – show where the config lives and what is in effect.

use anyhow::Result;
use pahe_core::config::{self, PaheConfig};

pub fn run_config(cfg: &PaheConfig) -> Result<()> {
    println!("# {}", config::config_path()?.display());
    println!("# downloads go to {}", cfg.downloads_root().display());
    print!("{}", config::render(cfg)?);
    Ok(())
}
