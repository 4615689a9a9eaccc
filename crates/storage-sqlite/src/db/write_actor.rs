//! Dedicated writer thread serializing every mutation.
//!
//! SQLite takes a single write lock per database file. Funnelling all writes
//! through one thread keeps concurrent callers from tripping over
//! `SQLITE_BUSY`, and it makes read-modify-write sequences inside a single
//! job atomic without row locking. Each job runs in an immediate
//! transaction; a job that returns `Err` is rolled back wholesale.

use std::thread;

use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;
use log::warn;
use tokio::sync::{mpsc, oneshot};

use stockroom_core::errors::{DatabaseError, Error, Result};

use crate::errors::StorageError;

type WriteJob = Box<dyn FnOnce(&mut SqliteConnection) + Send>;

/// Cloneable handle submitting jobs to the writer thread.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<WriteJob>,
}

/// Distinguishes a job's own failure from a transaction-machinery failure so
/// both abort the transaction through the same `Err` path.
enum JobError {
    Job(Error),
    Db(diesel::result::Error),
}

impl From<diesel::result::Error> for JobError {
    fn from(err: diesel::result::Error) -> Self {
        JobError::Db(err)
    }
}

impl WriteHandle {
    /// Runs `job` on the writer thread inside an immediate transaction and
    /// hands its result back. An `Err` from the job rolls everything back.
    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let wrapped: WriteJob = Box::new(move |conn| {
            let outcome = conn
                .immediate_transaction(|tx| job(tx).map_err(JobError::Job))
                .map_err(|err| match err {
                    JobError::Job(inner) => inner,
                    JobError::Db(inner) => Error::from(StorageError::from(inner)),
                });
            // The caller may have given up waiting; that is fine.
            let _ = done_tx.send(outcome);
        });
        self.tx.send(wrapped).map_err(|_| writer_gone())?;
        done_rx.await.map_err(|_| writer_gone())?
    }
}

fn writer_gone() -> Error {
    Error::Database(DatabaseError::Internal(
        "Database writer is not running".to_string(),
    ))
}

/// Spawns the writer thread and returns the handle feeding it. The thread
/// exits once every handle has been dropped.
pub fn spawn_writer(pool: Pool<ConnectionManager<SqliteConnection>>) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<WriteJob>();
    thread::spawn(move || {
        while let Some(job) = rx.blocking_recv() {
            match pool.get() {
                Ok(mut conn) => job(&mut conn),
                // Dropping the job closes its oneshot, waking the caller
                // with a writer error.
                Err(err) => warn!("[WriteActor] Could not check out a connection: {err}"),
            }
        }
    });
    WriteHandle { tx }
}
