//! C8: the request pipeline. A single event-loop thread accepts
//! connections and reads requests; a fixed worker pool executes them
//! against the catalog and sends the reply. See §4.8/§5.

mod connection;
mod error;
mod queue;
mod worker;

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use rokt_query::{priority_for_keyword, Response};
use rokt_storage::Catalog;

pub use error::{ServerError, ServerResult};

use connection::PendingConnection;
use queue::{PriorityQueue, PushResult};
use worker::{Task, WorkerPool};

const LISTENER_TOKEN: Token = Token(0);
const POLL_TIMEOUT: Duration = Duration::from_millis(1000);
const BACKPRESSURE_SLEEP: Duration = Duration::from_millis(100);
const MAX_WORKERS_HARD_CAP: usize = 64;
const QUEUE_FULL_CODE: i32 = 503;

/// Tunables for the request pipeline (§4.8 admission control).
#[derive(Debug, Clone, Copy)]
pub struct ServerParams {
    pub port: u16,
    pub max_workers: usize,
    pub max_task_queue_size: usize,
}

/// The running pipeline: one event-loop thread plus a fixed worker
/// pool, sharing the catalog behind an `Arc`.
pub struct Server {
    poll: Poll,
    listener: TcpListener,
    addr: SocketAddr,
    queue: Arc<PriorityQueue<Task>>,
    pool: WorkerPool,
    worker_count: usize,
}

impl Server {
    /// Binds the listener and spawns the worker pool. Returns an error
    /// only for bind/registration failures (startup-time only; §7).
    pub fn new(params: ServerParams, catalog: Arc<Catalog>) -> ServerResult<Self> {
        let addr: SocketAddr = ([0, 0, 0, 0], params.port).into();
        let mut listener =
            TcpListener::bind(addr).map_err(|source| ServerError::BindFailed { addr, source })?;

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .map_err(ServerError::PollRegister)?;

        let worker_count = params.max_workers.clamp(1, MAX_WORKERS_HARD_CAP);
        let queue = Arc::new(PriorityQueue::new(params.max_task_queue_size.max(1)));
        let pool = WorkerPool::spawn(worker_count, Arc::clone(&queue), catalog);

        tracing::info!(%addr, workers = worker_count, "server listening");
        Ok(Self { poll, listener, addr, queue, pool, worker_count })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the accept/read loop until `shutdown` is set, then drains
    /// the queue and joins every worker (§4.8 "Shutdown").
    pub fn run(mut self, shutdown: &AtomicBool) -> ServerResult<()> {
        let mut events = Events::with_capacity(1024);
        let mut next_token = 1usize;
        let mut pending: std::collections::HashMap<Token, PendingConnection> =
            std::collections::HashMap::new();

        while !shutdown.load(Ordering::SeqCst) {
            match self.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                Ok(()) => {}
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            for event in &events {
                if event.token() == LISTENER_TOKEN {
                    self.accept_all(&mut next_token, &mut pending);
                    continue;
                }
                self.service_readable(event.token(), &mut pending);
            }

            pending.retain(|_, conn| {
                if conn.is_idle() {
                    tracing::debug!("closing idle connection");
                    false
                } else {
                    true
                }
            });
        }

        tracing::info!("shutdown requested, draining queue");
        self.queue.close();
        self.pool.join();
        Ok(())
    }

    fn accept_all(
        &mut self,
        next_token: &mut usize,
        pending: &mut std::collections::HashMap<Token, PendingConnection>,
    ) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer)) => {
                    let token = Token(*next_token);
                    *next_token += 1;
                    if let Err(err) =
                        self.poll.registry().register(&mut stream, token, Interest::READABLE)
                    {
                        tracing::warn!(%peer, %err, "failed to register accepted connection");
                        continue;
                    }
                    tracing::debug!(%peer, "accepted connection");
                    pending.insert(token, PendingConnection::new(stream));
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(err) => {
                    tracing::warn!(%err, "accept failed");
                    break;
                }
            }
        }
    }

    fn service_readable(
        &mut self,
        token: Token,
        pending: &mut std::collections::HashMap<Token, PendingConnection>,
    ) {
        let Some(mut conn) = pending.remove(&token) else { return };
        match conn.try_read_request() {
            Ok(Some(request_text)) => self.dispatch(conn, request_text),
            Ok(None) => {
                pending.insert(token, conn);
            }
            Err(_) => {
                tracing::debug!("connection closed or errored before a request arrived");
            }
        }
    }

    /// Computes priority and admits the task per §4.8's backpressure
    /// rules: reject at capacity, throttle above `max_workers * 2`.
    fn dispatch(&mut self, mut conn: PendingConnection, request_text: String) {
        let keyword = request_text.split_whitespace().next().unwrap_or("");
        let priority = priority_for_keyword(keyword);
        let _ = self.poll.registry().deregister(&mut conn.stream);
        let stream = conn.stream;

        if self.queue.len() >= self.queue.capacity() {
            tracing::warn!("queue at capacity, rejecting with 503");
            let body = serde_json::to_vec(&Response::from_code(QUEUE_FULL_CODE))
                .expect("Response always serialises");
            connection::send_response_and_close(stream, &body);
            return;
        }

        if self.queue.len() >= self.worker_count * 2 {
            std::thread::sleep(BACKPRESSURE_SLEEP);
        }

        let task = Task { stream, request_text, priority };
        if let PushResult::Backpressure(task) = self.queue.try_push(priority, task) {
            let body = serde_json::to_vec(&Response::from_code(QUEUE_FULL_CODE))
                .expect("Response always serialises");
            connection::send_response_and_close(task.stream, &body);
        }
    }
}
