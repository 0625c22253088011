use std::path::Path;

use anyhow::{bail, Result};
use talib_bootstrap::config::BootstrapConfig;
use talib_bootstrap::pipeline;

fn usage() -> &'static str {
    "Usage:\n  talib-bootstrap [install] [--config <path>]\n  talib-bootstrap preflight [--config <path>]\n  talib-bootstrap fetch [--config <path>]\n  talib-bootstrap clean [--config <path>]"
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        // Bare invocation matches the original bootstrap script: full install.
        [] => install(None),
        [cmd] if cmd == "install" => install(None),
        [cmd, flag, path] if cmd == "install" && flag == "--config" => {
            install(Some(Path::new(path)))
        }
        [cmd] if cmd == "preflight" => preflight(None),
        [cmd, flag, path] if cmd == "preflight" && flag == "--config" => {
            preflight(Some(Path::new(path)))
        }
        [cmd] if cmd == "fetch" => fetch(None),
        [cmd, flag, path] if cmd == "fetch" && flag == "--config" => fetch(Some(Path::new(path))),
        [cmd] if cmd == "clean" => clean(None),
        [cmd, flag, path] if cmd == "clean" && flag == "--config" => clean(Some(Path::new(path))),
        _ => bail!(usage()),
    }
}

fn install(config_path: Option<&Path>) -> Result<()> {
    let config = BootstrapConfig::load(config_path)?;
    pipeline::install(&config)
}

fn preflight(config_path: Option<&Path>) -> Result<()> {
    let config = BootstrapConfig::load(config_path)?;
    pipeline::preflight(&config)
}

fn fetch(config_path: Option<&Path>) -> Result<()> {
    let config = BootstrapConfig::load(config_path)?;
    let archive = pipeline::fetch(&config)?;
    println!("[bootstrap:fetch] archive ready at {}", archive.display());
    Ok(())
}

fn clean(config_path: Option<&Path>) -> Result<()> {
    let config = BootstrapConfig::load(config_path)?;
    pipeline::clean(&config)
}
