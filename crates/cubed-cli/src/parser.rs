//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface definition for the cubed supervisor.
#[derive(Parser)]
#[command(name = "cubed")]
#[command(about = "Supervise a game server process and bridge its console")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parser_builds() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_verbose_flag() {
        let cli = Cli::parse_from(["cubed", "-v"]);
        assert!(cli.verbose);
        assert!(cli.command.is_none());

        let cli = Cli::parse_from(["cubed"]);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::parse_from([
            "cubed",
            "run",
            "--executable",
            "/srv/cuberite/Cuberite",
            "--server-dir",
            "/srv/cuberite",
            "--server-arg",
            "--port",
            "--server-arg",
            "25565",
            "--grace-secs",
            "10",
        ]);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.executable.to_str(), Some("/srv/cuberite/Cuberite"));
        assert_eq!(args.server_dir.as_deref().and_then(|p| p.to_str()), Some("/srv/cuberite"));
        assert_eq!(args.server_args, vec!["--port", "25565"]);
        assert_eq!(args.grace_secs, 10);
        assert!(!args.no_stop_command);
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::parse_from(["cubed", "run", "--executable", "/opt/server"]);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.stop_command, "stop");
        assert_eq!(args.grace_secs, 5);
        assert_eq!(args.log_lines, 5000);
        assert!(!args.ready_immediately);
    }
}
