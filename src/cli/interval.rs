use crate::core::settings::{Settings, MIN_REFRESH_INTERVAL_SECS};
use anyhow::{Context, Result};
use std::path::Path;

pub fn run(seconds: u64) -> Result<()> {
    let path = Settings::config_path().context("Could not determine config directory")?;
    let applied = set_interval(&path, seconds)?;
    println!(
        "Refresh interval set to {}s in {}",
        applied,
        path.display()
    );
    Ok(())
}

/// Updates `refresh_interval_secs` in the file at `path`, keeping every other
/// setting. Returns the value actually stored.
fn set_interval(path: &Path, seconds: u64) -> Result<u64> {
    let mut settings = Settings::load_from(path)?;

    let applied = if seconds < MIN_REFRESH_INTERVAL_SECS {
        tracing::warn!(
            requested = seconds,
            min = MIN_REFRESH_INTERVAL_SECS,
            "Interval below minimum, using minimum"
        );
        MIN_REFRESH_INTERVAL_SECS
    } else {
        seconds
    };

    settings.refresh_interval_secs = applied;
    settings.save_to(path)?;
    Ok(applied)
}
