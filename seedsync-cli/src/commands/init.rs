//! Init command - write a default configuration file.

use std::path::Path;

use seedsync::config::ConfigFile;

use crate::error::CliError;

/// Run the init command.
///
/// An existing file is left alone unless `force` is set.
pub fn run(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        println!("Configuration file already exists: {}", path.display());
        println!("Use --force to overwrite it with defaults.");
        return Ok(());
    }

    ConfigFile::default().save(path)?;
    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to point SeedSync at another backend or to add");
    println!("[trait.<name>] and [variable.<name>] sections.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seedsync").join("config.ini");

        run(&path, false).unwrap();

        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_init_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[engine]\nlatitude_variable = LATITUDE\n").unwrap();

        run(&path, false).unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.engine.latitude_variable, "LATITUDE");
    }
}
