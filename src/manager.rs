//! Binds a [`Database`] to a filesystem directory.
//!
//! A database directory carries a `.magic.db` marker and, while open, a
//! `.lock.db` mutex file. Every other file in the directory is a serialized
//! table named after its file. Saving writes everything into a fresh
//! staging directory next to the target and swaps it in with a rename.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::Database;
use crate::error::{QueryError, Result};
use crate::serial;

const MAGIC_FILE_NAME: &str = ".magic.db";
const LOCK_FILE_NAME: &str = ".lock.db";

pub struct DatabaseManager {
    path: PathBuf,
    database: Arc<Database>,
    save_lock: Mutex<()>,
}

impl DatabaseManager {
    /// Open a database directory, initializing it when absent, and load
    /// every table file. Fails if the directory is not a database or is
    /// locked by another process.
    pub fn open(path: impl Into<PathBuf>) -> Result<DatabaseManager> {
        let path = path.into();
        if !path.exists() {
            Self::init_directory(&path)?;
        }
        Self::check_directory(&path)?;
        Self::lock_directory(&path)?;

        let database = Arc::new(Database::new());
        for entry in fs::read_dir(&path)? {
            let file_path = entry?.path();
            if !Self::is_table_file(&file_path) {
                continue;
            }
            let name = file_path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| QueryError::internal("invalid table file name"))?
                .to_string();
            let file = fs::File::open(&file_path)?;
            let table = serial::load_table(BufReader::new(file)).map_err(|err| {
                QueryError::internal(format!("failed to load table {}: {}", name, err))
            })?;
            database.insert_table(&name, table)?;
        }
        log::info!("database loaded from {}", path.display());

        Ok(DatabaseManager {
            path,
            database,
            save_lock: Mutex::new(()),
        })
    }

    pub fn database(&self) -> Arc<Database> {
        self.database.clone()
    }

    /// Serialize every table into a staging directory adjacent to the
    /// target, then swap it in with a remove-and-rename.
    pub fn save(&self) -> Result<()> {
        let _guard = self.save_lock.lock();

        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let staging = tempfile::Builder::new()
            .prefix(".tarndb-save-")
            .tempdir_in(parent)?;

        for (name, table) in self.database.snapshot() {
            let mut file = fs::File::create(staging.path().join(&name))?;
            serial::serialize_table(&table, &mut file)?;
        }
        fs::File::create(staging.path().join(MAGIC_FILE_NAME))?;
        fs::File::create(staging.path().join(LOCK_FILE_NAME))?;

        let staged = staging.keep();
        fs::remove_dir_all(&self.path)?;
        fs::rename(&staged, &self.path)?;
        Ok(())
    }

    fn init_directory(path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        fs::File::create(path.join(MAGIC_FILE_NAME))?;
        Ok(())
    }

    fn check_directory(path: &Path) -> Result<()> {
        if !path.is_dir() {
            return Err(QueryError::internal(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        if !path.join(MAGIC_FILE_NAME).exists() {
            return Err(QueryError::internal(format!(
                "{} is not a database",
                path.display()
            )));
        }
        Ok(())
    }

    fn lock_directory(path: &Path) -> Result<()> {
        let lock = path.join(LOCK_FILE_NAME);
        if lock.exists() {
            return Err(QueryError::internal(format!(
                "database {} is already locked",
                path.display()
            )));
        }
        fs::File::create(lock)?;
        Ok(())
    }

    fn unlock_directory(path: &Path) {
        if let Err(err) = fs::remove_file(path.join(LOCK_FILE_NAME)) {
            log::warn!("no lock file when unlocking the database: {}", err);
        }
    }

    /// Anything without a `.db` extension is a table file.
    fn is_table_file(path: &Path) -> bool {
        path.extension().map(|ext| ext != "db").unwrap_or(true)
    }
}

impl Drop for DatabaseManager {
    fn drop(&mut self) {
        if let Err(err) = self.save() {
            log::warn!("failed to save database on shutdown: {}", err);
        }
        Self::unlock_directory(&self.path);
    }
}
