//! Config command implementation.

use crate::cli::ConfigArgs;
use crate::config::SieveConfig;
use crate::error::Result;
use crate::output::Formatter;
use std::path::Path;

/// Execute the config command.
pub fn execute_config(
    args: ConfigArgs,
    config: &SieveConfig,
    path: &Path,
    formatter: &Formatter,
) -> Result<()> {
    print!("{}", config.to_toml()?);
    if args.save {
        config.save(path)?;
        eprintln!(
            "{}",
            formatter.success(&format!("Configuration saved to {}", path.display()))
        );
    }
    Ok(())
}
