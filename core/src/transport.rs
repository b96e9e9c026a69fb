//! Transport seam: the part of the client that touches the network.
//!
//! # Design
//! `Webservice` never performs I/O itself. It hands an `HttpRequest` and a
//! `Completion` to a `Transport`, which must return immediately and finish
//! the round-trip elsewhere. `UreqTransport` is the default: one shared
//! `ureq::Agent` (and so one connection pool) for every call, with requests
//! queued to a fixed set of worker threads.
//!
//! A `Completion` fires exactly once. Completing it consumes it, and
//! dropping it unfired reports `TransportError::Abandoned`, so a panicking
//! worker or a buggy transport still produces an outcome.

use std::fmt;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, warn};
use ureq::{Agent, AsSendBody};

use crate::error::BoxError;
use crate::http::{HttpRequest, HttpResponse};

#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, TLS, timeout or protocol failure reported by ureq.
    #[error(transparent)]
    Http(#[from] ureq::Error),

    /// The request could not be expressed as an `http::Request`.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] http::Error),

    /// The transport dropped the request without reporting an outcome.
    #[error("transport abandoned the request before completing it")]
    Abandoned,

    /// Failure reported by a third-party transport.
    #[error("{0}")]
    Other(BoxError),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Http(ureq::Error::Timeout(_)) => true,
            TransportError::Http(ureq::Error::Io(e)) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

type CompletionFn = Box<dyn FnOnce(Result<HttpResponse, TransportError>) + Send>;

/// Exactly-once completion handle passed to `Transport::send`.
pub struct Completion {
    callback: Option<CompletionFn>,
}

impl Completion {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Result<HttpResponse, TransportError>) + Send + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// Report the outcome of the round-trip.
    pub fn complete(mut self, outcome: Result<HttpResponse, TransportError>) {
        if let Some(callback) = self.callback.take() {
            callback(outcome);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            warn!("transport dropped a request without completing it");
            callback(Err(TransportError::Abandoned));
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("pending", &self.callback.is_some())
            .finish()
    }
}

/// Executes `HttpRequest`s off the caller's thread.
///
/// `send` must not block on the network, and must eventually complete or
/// drop `completion`.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest, completion: Completion);
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: HttpRequest, completion: Completion) {
        (**self).send(request, completion);
    }
}

/// Worker threads started by `UreqTransport::new`.
pub const DEFAULT_WORKERS: usize = 8;

type Task = (HttpRequest, Completion);

/// Default transport backed by a shared `ureq::Agent`.
///
/// Requests are queued to a fixed pool of named worker threads
/// (`webservice-transport-<n>`). The workers exit once every clone of the
/// transport has been dropped and the queue has drained.
#[derive(Clone)]
pub struct UreqTransport {
    sender: mpsc::Sender<Task>,
    workers: usize,
}

impl UreqTransport {
    pub fn new() -> io::Result<Self> {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self::with_agent(agent, DEFAULT_WORKERS)
    }

    /// Use a preconfigured agent on `workers` threads (at least one). Status
    /// codes must not be configured as errors if parsers are expected to see
    /// 4xx/5xx bodies.
    pub fn with_agent(agent: Agent, workers: usize) -> io::Result<Self> {
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::channel::<Task>();
        let receiver = Arc::new(Mutex::new(receiver));

        for i in 0..workers {
            let agent = agent.clone();
            let receiver = Arc::clone(&receiver);
            thread::Builder::new()
                .name(format!("webservice-transport-{i}"))
                .spawn(move || worker_loop(&agent, &receiver))?;
        }

        Ok(Self { sender, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: HttpRequest, completion: Completion) {
        // A failed send hands the task back; dropping it reports the
        // completion as abandoned.
        if let Err(mpsc::SendError(task)) = self.sender.send((request, completion)) {
            error!("transport workers are gone, abandoning request");
            drop(task);
        }
    }
}

fn worker_loop(agent: &Agent, receiver: &Mutex<mpsc::Receiver<Task>>) {
    loop {
        let task = receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        let Ok((request, completion)) = task else {
            break;
        };
        // An unwinding task drops its completion, which reports Abandoned.
        let outcome = catch_unwind(AssertUnwindSafe(move || {
            completion.complete(execute(agent, request));
        }));
        if outcome.is_err() {
            error!("transport task panicked");
        }
    }
    debug!("transport worker shut down");
}

fn execute(agent: &Agent, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let mut builder = http::Request::builder()
        .method(request.method)
        .uri(request.url.clone());
    for (key, value) in &request.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }

    let outcome = match request.body {
        Some(body) => run(agent, builder.body(body)?, request.timeout),
        None => run(agent, builder.body(())?, request.timeout),
    };

    match &outcome {
        Ok(response) => debug!(
            "{} {} completed with status {}",
            request.method, request.url, response.status
        ),
        Err(e) => warn!("{} {} failed: {e}", request.method, request.url),
    }
    outcome
}

fn run<S: AsSendBody>(
    agent: &Agent,
    request: http::Request<S>,
    timeout: Duration,
) -> Result<HttpResponse, TransportError> {
    let request = agent
        .configure_request(request)
        .timeout_global(Some(timeout))
        .build();
    let mut response = agent.run(request)?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(key, value)| {
            (
                key.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let body = response.body_mut().read_to_vec()?;

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}
