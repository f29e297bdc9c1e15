use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use tarndb::manager::DatabaseManager;
use tarndb::server;

/// In-memory relational database engine served over a Unix socket.
#[derive(Parser, Debug)]
#[command(name = "tarndb", version)]
struct Args {
    /// Directory holding the database files
    database: PathBuf,

    /// Path of the Unix socket to listen on
    socket: PathBuf,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let manager = match DatabaseManager::open(&args.database) {
        Ok(manager) => Arc::new(manager),
        Err(err) => {
            eprintln!("tarndb: {}", err);
            std::process::exit(1);
        }
    };
    if let Err(err) = server::run(manager, &args.socket) {
        eprintln!("tarndb: {}", err);
        std::process::exit(1);
    }
}
