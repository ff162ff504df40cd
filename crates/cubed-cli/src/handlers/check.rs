//! Check command handler.
//!
//! Prints the resolved launch configuration and verifies the executable
//! is actually there, without starting anything.

use anyhow::Result;
use cubed_core::ServerConfig;

/// Execute the check command.
pub fn execute(config: &ServerConfig) -> Result<()> {
    config.validate()?;

    let exists = config.executable.is_file();

    println!("Executable:   {}", config.executable.display());
    println!("  exists:     {}", if exists { "yes" } else { "NO" });
    match config.resolved_working_dir() {
        Some(dir) => println!("Working dir:  {}", dir.display()),
        None => println!("Working dir:  (inherited)"),
    }
    if config.args.is_empty() {
        println!("Arguments:    (none)");
    } else {
        println!("Arguments:    {}", config.args.join(" "));
    }
    match &config.stop_command {
        Some(cmd) => println!("Stop command: {cmd}"),
        None => println!("Stop command: (disabled, signal only)"),
    }
    println!("Grace period: {}s", config.grace_period.as_secs());
    println!("Log history:  {} lines", config.log_capacity);

    if !exists {
        anyhow::bail!(
            "server executable not found: {}",
            config.executable.display()
        );
    }

    println!();
    println!("Configuration OK");
    Ok(())
}
