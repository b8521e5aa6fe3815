//! Readiness-based serving runtime.
//!
//! - `InterestSet`: descriptors an event loop watches
//! - `ClientConnection`: one accepted peer and its single request cycle
//! - `Worker`: the mio event loop tying both together
//!
//! One worker runs on the calling thread by default. With more than one
//! configured, each gets its own thread and poller over the shared listener.

mod connection;
mod event_loop;
mod interest;

pub use connection::{ClientConnection, ConnectionOutcome};
pub use event_loop::Worker;
pub use interest::InterestSet;

use crate::error::ServerError;
use crate::resource::Resource;
use std::net::TcpListener;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread;
use tracing::{error, info};

/// Receive buffer size, also the cap on response body bytes.
pub const BUFFER_SIZE: usize = 4096;

/// Serve on `listener` with `workers` event loops. Only returns on error.
pub fn run(
    listener: TcpListener,
    resource: Arc<dyn Resource>,
    workers: usize,
) -> Result<(), ServerError> {
    let listener = Arc::new(listener);

    if workers <= 1 {
        return Worker::new(0, listener, resource)?.run();
    }

    info!(workers, "Starting event loops");

    let loops = (0..workers).map(|worker_id| {
        let listener = Arc::clone(&listener);
        let resource = Arc::clone(&resource);
        move || Worker::new(worker_id, listener, resource).and_then(|mut w| w.run())
    });

    supervise(loops)
}

/// Run each loop on its own named thread and return as soon as one fails.
///
/// Returns `Ok` only once every loop has returned `Ok`.
fn supervise<I, F>(loops: I) -> Result<(), ServerError>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Result<(), ServerError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let mut running = 0;

    for (worker_id, body) in loops.into_iter().enumerate() {
        let tx = tx.clone();

        thread::Builder::new()
            .name(format!("worker-{worker_id}"))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(body))
                    .unwrap_or(Err(ServerError::Panicked { worker: worker_id }));
                if let Err(ref e) = result {
                    error!(worker = worker_id, error = %e, "Worker failed");
                }
                let _ = tx.send(result);
            })
            .map_err(ServerError::Spawn)?;

        running += 1;
    }
    drop(tx);

    // The first loop to fail takes the process down.
    while running > 0 {
        match rx.recv() {
            Ok(Ok(())) => running -= 1,
            Ok(Err(e)) => return Err(e),
            Err(mpsc::RecvError) => break,
        }
    }

    Ok(())
}
