//! C8 worker pool: dequeues tasks, executes the command, enforces the
//! per-task soft deadline, and performs the final socket send.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use mio::net::TcpStream;
use rokt_query::Response;
use rokt_storage::Catalog;

use crate::connection::send_response_and_close;
use crate::queue::PriorityQueue;

const TASK_DEADLINE: Duration = Duration::from_millis(5000);
const REQUEST_TIMEOUT_CODE: i32 = 504;

/// One unit of work handed from the acceptor to a worker: an accepted
/// connection, the single request line read off it, and its priority.
pub struct Task {
    pub stream: TcpStream,
    pub request_text: String,
    pub priority: u8,
}

/// A fixed pool of worker threads draining a shared [`PriorityQueue`].
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `count` worker threads, each looping on `queue` until it
    /// returns `None` (closed and drained).
    pub fn spawn(count: usize, queue: Arc<PriorityQueue<Task>>, catalog: Arc<Catalog>) -> Self {
        let mut handles = Vec::with_capacity(count);
        for id in 0..count {
            let queue = Arc::clone(&queue);
            let catalog = Arc::clone(&catalog);
            let handle = thread::Builder::new()
                .name(format!("rokt-worker-{id}"))
                .spawn(move || worker_loop(&queue, &catalog))
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }
        Self { handles }
    }

    /// Joins all worker threads. Callers must `queue.close()` first so
    /// each worker's blocking pop eventually returns `None`.
    pub fn join(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(queue: &PriorityQueue<Task>, catalog: &Catalog) {
    while let Some(task) = queue.pop_blocking() {
        process_task(task, catalog);
    }
}

fn process_task(task: Task, catalog: &Catalog) {
    let started = Instant::now();
    tracing::debug!(priority = task.priority, "dequeued task");

    let response = rokt_query::execute(catalog, &task.request_text);
    let response = if started.elapsed() > TASK_DEADLINE {
        tracing::warn!(elapsed_ms = started.elapsed().as_millis() as u64, "task exceeded deadline");
        Response::from_code(REQUEST_TIMEOUT_CODE)
    } else {
        response
    };

    let body = serde_json::to_vec(&response).expect("Response always serialises");
    send_response_and_close(task.stream, &body);
}
