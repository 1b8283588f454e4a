/// Configuration management command handlers
use anyhow::{Context, Result};
use restwise_core::config::{default_config_path, Config};
use std::path::{Path, PathBuf};

pub fn handle_config_init(path: Option<&Path>, force: bool) -> Result<()> {
    let path = resolve(path)?;
    if write_default_config(&path, force)? {
        println!("Wrote default configuration to {}", path.display());
    } else {
        println!(
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    Ok(())
}

pub fn handle_config_show(path: Option<&Path>) -> Result<()> {
    let path = resolve(path)?;
    let config = Config::load(Some(&path))?;

    println!("Configuration: {}", path.display());
    if !path.exists() {
        println!("(file not found, showing defaults)");
    }
    match config.validate() {
        Ok(()) => println!("Status: valid"),
        Err(e) => println!("Status: {e}"),
    }
    println!();
    print!("{}", render(&config)?);
    Ok(())
}

/// Write the defaults to `path`. Returns `false` when an existing file was kept.
pub fn write_default_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    Config::default().save(path)?;
    Ok(true)
}

/// TOML rendering with the advisor API key masked
fn render(config: &Config) -> Result<String> {
    let mut shown = config.clone();
    if let Some(key) = shown.advisor.api_key.as_mut() {
        *key = format!("{}***", key.chars().take(8).collect::<String>());
    }
    toml::to_string_pretty(&shown).context("Failed to render configuration")
}

fn resolve(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(p.to_path_buf()),
        None => default_config_path(),
    }
}
