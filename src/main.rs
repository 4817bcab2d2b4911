mod api;
mod backup;
mod cli;
mod config;
mod controls;
mod database;
mod error;
mod implementations;
mod items;
mod matrix;
mod schema;
mod seed;
mod server;
mod utils;

use directories::ProjectDirs;
use log::error;

use crate::cli::Cli;
use crate::config::Config;

fn main() {
    let Some(project_dirs) = ProjectDirs::from("", "", "sectrack") else {
        eprintln!("Could not determine application data directory");
        std::process::exit(1);
    };

    if let Err(err) = Config::init(&project_dirs) {
        eprintln!("{}", err);
        std::process::exit(1);
    }

    // The handle must stay alive for the duration of the program
    let _logger = match flexi_logger::Logger::try_with_str(Config::get_log_level())
        .and_then(|logger| logger.start())
    {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("Failed to initialize logger: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = Cli::handle_command_line() {
        error!("{:?}", err);
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
