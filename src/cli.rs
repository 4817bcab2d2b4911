use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use log::info;

use crate::backup;
use crate::config::Config;
use crate::database::Database;
use crate::error::SecTrackError;
use crate::seed;

#[derive(Parser)]
#[command(
    name = "sectrack",
    version,
    about = "sectrack: security control implementation status tracking service"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the server (default if no command specified)
    Serve,

    /// Export all data to a JSON backup file
    Export {
        /// Output file (default: sectrack-export-<date>.json)
        #[arg(long = "output", short = 'o')]
        output: Option<PathBuf>,
    },

    /// Import a JSON backup file, replacing all current data
    Import {
        /// Export file to import
        file: PathBuf,

        /// Skip the confirmation prompt
        #[arg(long = "yes", short = 'y', default_value_t = false)]
        yes: bool,
    },

    /// Delete every row from the database
    Wipe {
        /// Skip the confirmation prompt
        #[arg(long = "yes", short = 'y', default_value_t = false)]
        yes: bool,
    },

    /// Load the example data set into an empty database
    Seed,
}

impl Cli {
    pub fn handle_command_line() -> Result<(), SecTrackError> {
        let args = Cli::parse();

        Database::init(&Config::get_db_path())?;

        // Default to Serve if no command specified
        match args.command.unwrap_or(Command::Serve) {
            Command::Serve => Self::start_server(),
            Command::Export { output } => Self::export(output),
            Command::Import { file, yes } => Self::import(file, yes),
            Command::Wipe { yes } => Self::wipe(yes),
            Command::Seed => Self::seed(),
        }
    }

    fn start_server() -> Result<(), SecTrackError> {
        let host = Config::get_server_host();
        let port = Config::get_server_port();

        info!("Starting server on {}:{}", host, port);

        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| SecTrackError::Error(format!("Failed to create runtime: {}", e)))?;

        rt.block_on(async {
            let web_server = crate::server::WebServer::new(host, port);
            web_server.start().await
        })
    }

    fn export(output: Option<PathBuf>) -> Result<(), SecTrackError> {
        let path = output.unwrap_or_else(|| {
            PathBuf::from(format!(
                "sectrack-export-{}.json",
                Utc::now().format("%Y-%m-%d")
            ))
        });

        let conn = Database::get_connection()?;
        let metadata = backup::export_to_file(&conn, &path)?;

        println!("Exported to {}", path.display());
        println!("  {} items", metadata.total_items);
        println!("  {} controls", metadata.total_controls);
        println!("  {} sub-controls", metadata.total_sub_controls);
        println!("  {} implementations", metadata.total_implementations);
        println!(
            "  {} sub-control implementations",
            metadata.total_sub_control_implementations
        );
        Ok(())
    }

    fn import(file: PathBuf, yes: bool) -> Result<(), SecTrackError> {
        if !yes && !Self::confirm("Importing replaces ALL current data. Continue?")? {
            println!("Import cancelled");
            return Ok(());
        }

        let mut conn = Database::get_connection()?;
        let metadata = backup::import_from_file(&mut conn, &file)?;

        println!("Imported from {}", file.display());
        println!("  {} items", metadata.total_items);
        println!("  {} controls", metadata.total_controls);
        println!("  {} sub-controls", metadata.total_sub_controls);
        println!("  {} implementations", metadata.total_implementations);
        println!(
            "  {} sub-control implementations",
            metadata.total_sub_control_implementations
        );
        Ok(())
    }

    fn wipe(yes: bool) -> Result<(), SecTrackError> {
        if !yes && !Self::confirm("This deletes ALL data. Continue?")? {
            println!("Wipe cancelled");
            return Ok(());
        }

        let mut conn = Database::get_connection()?;
        backup::wipe(&mut conn)?;

        println!("Database wiped");
        Ok(())
    }

    fn seed() -> Result<(), SecTrackError> {
        let mut conn = Database::get_connection()?;
        seed::seed(&mut conn)?;

        println!("Example data loaded");
        Ok(())
    }

    fn confirm(prompt: &str) -> Result<bool, SecTrackError> {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| SecTrackError::Error(format!("Prompt failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parsing_no_command_defaults_to_serve() {
        let result = Cli::try_parse_from(["sectrack"]);
        assert!(result.is_ok(), "Should accept no command");

        let cli = result.unwrap();
        assert!(cli.command.is_none());
        assert!(matches!(
            cli.command.unwrap_or(Command::Serve),
            Command::Serve
        ));
    }

    #[test]
    fn test_cli_parsing_explicit_serve_command() {
        let result = Cli::try_parse_from(["sectrack", "serve"]);
        assert!(result.is_ok(), "Should accept explicit serve command");

        let cli = result.unwrap();
        assert!(matches!(cli.command, Some(Command::Serve)));
    }

    #[test]
    fn test_cli_parsing_import_requires_file() {
        assert!(Cli::try_parse_from(["sectrack", "import"]).is_err());

        let cli = Cli::try_parse_from(["sectrack", "import", "backup.json", "-y"]).unwrap();
        match cli.command {
            Some(Command::Import { file, yes }) => {
                assert_eq!(file, PathBuf::from("backup.json"));
                assert!(yes);
            }
            _ => panic!("Expected import command"),
        }
    }

    #[test]
    fn test_cli_parsing_invalid_arguments() {
        let result = Cli::try_parse_from(["sectrack", "nonexistent-command"]);
        assert!(result.is_err(), "Should reject unknown commands");

        let result = Cli::try_parse_from(["sectrack", "serve", "--invalid-flag"]);
        assert!(result.is_err(), "Should reject unknown flags on serve");
    }
}
