use std::any::Any;
use std::sync::Arc;

use diesel::SqliteConnection;
use log::error;
use tokio::sync::{mpsc, oneshot};

use super::DbPool;
use crate::errors::StorageError;
use listrack_core::errors::{DatabaseError, Error, Result};

// A job executed on the writer's dedicated connection. The return type is
// erased so one channel can carry jobs with different result types.
type Job<T> = Box<dyn FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static>;

type Reply = oneshot::Sender<Result<Box<dyn Any + Send + 'static>>>;

/// Handle for sending jobs to the writer actor.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<(Job<Box<dyn Any + Send + 'static>>, Reply)>,
}

impl WriteHandle {
    /// Executes a database job on the writer actor's dedicated connection,
    /// inside an immediate transaction.
    ///
    /// Returns an internal database error when the actor is no longer
    /// running, for example while the process shuts down.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static + Any,
    {
        let (ret_tx, ret_rx) = oneshot::channel();

        let erased: Job<Box<dyn Any + Send + 'static>> =
            Box::new(move |conn| job(conn).map(|value| Box::new(value) as Box<dyn Any + Send>));
        if self.tx.send((erased, ret_tx)).await.is_err() {
            return Err(Error::Database(DatabaseError::Internal(
                "Writer actor is not running".to_string(),
            )));
        }

        match ret_rx.await {
            Ok(result) => result.map(|boxed| {
                *boxed
                    .downcast::<T>()
                    .expect("writer job result had an unexpected type")
            }),
            Err(_) => Err(Error::Database(DatabaseError::Internal(
                "Writer actor dropped the reply".to_string(),
            ))),
        }
    }
}

/// Spawns a background Tokio task that acts as the single writer to the
/// database. The actor owns one pooled connection and processes write jobs
/// serially, which keeps SQLite write contention out of the callers.
pub fn spawn_writer(pool: Arc<DbPool>) -> WriteHandle {
    // Bounded so a stalled database applies backpressure to writers.
    let (tx, mut rx) = mpsc::channel::<(Job<Box<dyn Any + Send + 'static>>, Reply)>(1024);

    tokio::spawn(async move {
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                // Pending exec() calls observe the closed channel as an error.
                error!("Writer actor could not acquire a connection: {}", e);
                return;
            }
        };

        while let Some((job, reply_tx)) = rx.recv().await {
            let result: Result<Box<dyn Any + Send + 'static>> = conn
                .immediate_transaction::<_, StorageError, _>(|c| job(c).map_err(StorageError::from))
                .map_err(|e: StorageError| e.into());

            // The requester may have gone away; nothing left to do then.
            let _ = reply_tx.send(result);
        }
        // rx drained and all senders dropped: the actor terminates.
    });

    WriteHandle { tx }
}
