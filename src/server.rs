//! The IPC front end: a Unix-domain-socket listener serving one worker
//! thread per connection.
//!
//! Protocol: one statement per request line. The reply is the response
//! text followed by a blank line as terminator — `OK`/`ERROR` responses
//! are a single line, a serialized SELECT result spans several.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::error::Result;
use crate::manager::DatabaseManager;

/// Registry of connection worker threads. Workers are tracked and joined,
/// never detached.
#[derive(Default)]
pub struct JobQueue {
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobQueue {
    pub fn new() -> JobQueue {
        JobQueue::default()
    }

    pub fn add_job<F: FnOnce() + Send + 'static>(&self, job: F) {
        self.workers.lock().push(std::thread::spawn(job));
    }

    /// Wait for every worker to finish.
    pub fn finish(&self) {
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                log::error!("connection worker panicked");
            }
        }
    }
}

/// Bind the socket and serve clients until the process is terminated.
pub fn run(manager: Arc<DatabaseManager>, socket_path: &Path) -> Result<()> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    let listener = UnixListener::bind(socket_path)?;
    log::info!("listening on {}", socket_path.display());

    let jobs = JobQueue::new();
    for connection in listener.incoming() {
        match connection {
            Ok(stream) => {
                let manager = manager.clone();
                jobs.add_job(move || handle_connection(stream, manager));
            }
            Err(err) => log::error!("accept error: {}", err),
        }
    }
    jobs.finish();
    Ok(())
}

fn handle_connection(stream: UnixStream, manager: Arc<DatabaseManager>) {
    let database = manager.database();
    let reader = match stream.try_clone() {
        Ok(clone) => BufReader::new(clone),
        Err(err) => {
            log::error!("failed to clone connection: {}", err);
            return;
        }
    };
    let mut writer = stream;
    log::info!("client connected");

    for line in reader.lines() {
        let query = match line {
            Ok(query) => query,
            Err(err) => {
                log::error!("read error: {}", err);
                break;
            }
        };
        if query.trim().is_empty() {
            continue;
        }

        let response = database.process_query(&query);
        let mutated = response.starts_with("OK ");

        let mut reply = response;
        if !reply.ends_with('\n') {
            reply.push('\n');
        }
        reply.push('\n');
        if let Err(err) = writer.write_all(reply.as_bytes()) {
            log::error!("write error: {}", err);
            break;
        }

        // Persist after every successful mutation so killing the process
        // loses nothing.
        if mutated {
            if let Err(err) = manager.save() {
                log::error!("failed to save database: {}", err);
            }
        }
    }
    log::info!("client disconnected");
}
