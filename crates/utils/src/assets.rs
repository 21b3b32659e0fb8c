use std::{env, io, path::PathBuf};

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");
const ASSET_DIR_ENV: &str = "PROPOSAL_WORKFLOW_ASSET_DIR";

/// Directory holding the SQLite database and `config.json`.
///
/// Resolution order: `PROPOSAL_WORKFLOW_ASSET_DIR`, then `dev_assets/` at the
/// workspace root in debug builds, then the platform data directory.
pub fn asset_dir() -> io::Result<PathBuf> {
    let path = if let Ok(custom_dir) = env::var(ASSET_DIR_ENV) {
        PathBuf::from(custom_dir)
    } else if cfg!(debug_assertions) {
        PathBuf::from(PROJECT_ROOT).join("../../dev_assets")
    } else {
        ProjectDirs::from("org", "callforpapers", "proposal-workflow")
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))?
            .data_dir()
            .to_path_buf()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path)?;
        tracing::info!("Created asset directory: {}", path.display());
    }

    Ok(path)
}

pub fn config_path() -> io::Result<PathBuf> {
    Ok(asset_dir()?.join("config.json"))
}

pub fn database_path() -> io::Result<PathBuf> {
    Ok(asset_dir()?.join("db.sqlite"))
}
