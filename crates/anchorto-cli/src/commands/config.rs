use std::path::Path;

use anyhow::Result;

use anchorto_core::AnchorConfig;

pub fn run(config: &AnchorConfig, path: Option<&Path>, init: bool) -> Result<()> {
    if !init {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(AnchorConfig::config_path);

    if path.exists() {
        println!("Config already exists: {}", path.display());
        return Ok(());
    }

    config.save_to(&path)?;
    println!("Wrote {}", path.display());

    Ok(())
}
