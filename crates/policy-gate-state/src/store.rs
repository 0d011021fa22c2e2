//! Persisted per-task state
//!
//! One JSON record per task under the state directory. Writers serialize
//! through an advisory `fd-lock` on a sidecar lock file, polled with a
//! bounded wait; the record itself is replaced by write-to-temp plus
//! rename so readers never observe a partial file.

use std::fs;
use std::io::Write;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use fd_lock::RwLock;
use tracing::debug;

use crate::{StateError, WorkflowState};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Handle to the state directory.
pub struct StateStore {
    dir: Utf8PathBuf,
    lock_timeout: Duration,
}

impl StateStore {
    #[must_use]
    pub fn new(dir: Utf8PathBuf, lock_timeout: Duration) -> Self {
        Self { dir, lock_timeout }
    }

    /// Read the current record without taking the write lock.
    ///
    /// A task with no record is in its initial Stopped state.
    pub fn load(&self, task_id: &str) -> Result<WorkflowState, StateError> {
        let path = self.state_path(task_id);
        read_state(&path, task_id)
    }

    /// Read-modify-write the record under the exclusive lock.
    ///
    /// The mutation either succeeds as a whole or leaves the record
    /// untouched; concurrent writers beyond the lock timeout get
    /// [`StateError::LockTimeout`].
    pub fn update<F>(&self, task_id: &str, mutate: F) -> Result<WorkflowState, StateError>
    where
        F: FnOnce(&mut WorkflowState) -> Result<(), StateError>,
    {
        fs::create_dir_all(&self.dir).map_err(|e| StateError::Io {
            path: self.dir.to_string(),
            source: e,
        })?;

        let lock_path = self.lock_path(task_id);
        let lock_file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| StateError::Io {
                path: lock_path.to_string(),
                source: e,
            })?;

        let mut lock = RwLock::new(lock_file);
        let started = Instant::now();
        let _guard = loop {
            match lock.try_write() {
                Ok(guard) => break guard,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if started.elapsed() >= self.lock_timeout {
                        return Err(StateError::LockTimeout {
                            path: lock_path.to_string(),
                            waited_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(StateError::Io {
                        path: lock_path.to_string(),
                        source: e,
                    });
                }
            }
        };

        let path = self.state_path(task_id);
        let mut state = read_state(&path, task_id)?;
        mutate(&mut state)?;
        write_state(&path, &state)?;
        debug!(task = task_id, phase = %state.phase, "state updated");
        Ok(state)
    }

    fn state_path(&self, task_id: &str) -> Utf8PathBuf {
        self.dir.join(format!("{}.json", sanitize_task_id(task_id)))
    }

    fn lock_path(&self, task_id: &str) -> Utf8PathBuf {
        self.dir.join(format!("{}.lock", sanitize_task_id(task_id)))
    }
}

/// Make a task id safe as a file name. Branch names contain slashes.
fn sanitize_task_id(task_id: &str) -> String {
    task_id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '-' })
        .collect()
}

fn read_state(path: &Utf8Path, task_id: &str) -> Result<WorkflowState, StateError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(WorkflowState::new(task_id, Utc::now()));
        }
        Err(e) => {
            return Err(StateError::Io {
                path: path.to_string(),
                source: e,
            });
        }
    };
    serde_json::from_slice(&bytes).map_err(|e| StateError::Corrupted {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn write_state(path: &Utf8Path, state: &WorkflowState) -> Result<(), StateError> {
    let io_err = |source| StateError::Io {
        path: path.to_string(),
        source,
    };
    let json = serde_json::to_vec_pretty(state).map_err(|e| StateError::Corrupted {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(&json).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
    }
    fs::rename(&tmp, path).map_err(io_err)
}
