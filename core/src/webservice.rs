//! Request executor.
//!
//! # Design
//! `Webservice` holds only immutable shared handles: its configuration, the
//! transport and the dispatcher for completion callbacks. Clones share all
//! three, so the service can be built once or per call.
//!
//! A call goes through `build_request` (pure, testable without a network),
//! then the transport, then the resource's parser. Whatever happens, the
//! caller sees exactly one `Result` delivered through its callback; nothing
//! is returned or raised synchronously.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::channel::oneshot;
use tracing::{debug, error, warn};

use crate::dispatch::{CallbackQueue, Dispatch};
use crate::error::{Result, WebserviceError};
use crate::http::HttpRequest;
use crate::resource::Resource;
use crate::transport::{Completion, Transport, TransportError, UreqTransport};

/// Timeout applied when a call does not supply its own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebserviceConfig {
    pub default_timeout: Duration,
}

impl WebserviceConfig {
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

impl Default for WebserviceConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Clone)]
pub struct Webservice {
    config: WebserviceConfig,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<dyn Dispatch>,
}

impl Webservice {
    /// Service using `UreqTransport` and a dedicated callback thread named
    /// `webservice-callbacks`. Every completion callback runs on that thread.
    pub fn new() -> Result<Self> {
        let transport = UreqTransport::new().map_err(WebserviceError::TransportWorkers)?;
        let queue =
            CallbackQueue::spawn("webservice-callbacks").map_err(WebserviceError::CallbackQueue)?;
        Ok(Self::with_parts(WebserviceConfig::default(), transport, queue))
    }

    pub fn with_parts(
        config: WebserviceConfig,
        transport: impl Transport + 'static,
        dispatcher: impl Dispatch + 'static,
    ) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn config(&self) -> &WebserviceConfig {
        &self.config
    }

    /// Build the transport-level request for `resource`.
    ///
    /// `Content-Type: application/json` and a body are attached only when the
    /// method carries a non-empty body.
    pub fn build_request<T>(
        &self,
        resource: &Resource<T>,
        timeout: Duration,
    ) -> Result<HttpRequest> {
        let url = resource.url();
        if url.scheme().is_none() || url.authority().is_none() {
            return Err(WebserviceError::RequestConstruction(format!(
                "url must be absolute: {url}"
            )));
        }

        let method = resource.method();
        let body = method.body();
        let (headers, body) = if body.is_empty() {
            (Vec::new(), None)
        } else {
            let bytes = serde_json::to_vec(&*body).map_err(|e| {
                WebserviceError::RequestConstruction(format!(
                    "request body serialization failed: {e}"
                ))
            })?;
            (
                vec![("Content-Type".to_string(), "application/json".to_string())],
                Some(bytes),
            )
        };

        Ok(HttpRequest {
            method: method.name(),
            url: url.clone(),
            headers,
            body,
            timeout,
        })
    }

    /// Execute `resource` with the configured default timeout.
    pub fn request<T, F>(&self, resource: Resource<T>, completion: F)
    where
        T: Send + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        self.request_with_timeout(resource, self.config.default_timeout, completion);
    }

    /// Execute `resource` and deliver the outcome to `completion` on the
    /// service's callback context. Returns as soon as the request is handed
    /// to the transport.
    pub fn request_with_timeout<T, F>(
        &self,
        resource: Resource<T>,
        timeout: Duration,
        completion: F,
    ) where
        T: Send + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let dispatcher = Arc::clone(&self.dispatcher);
        self.execute(resource, timeout, move |result| {
            dispatcher.dispatch(Box::new(move || completion(result)));
        });
    }

    /// Execute `resource` with the configured default timeout and await the
    /// outcome on the calling task.
    pub async fn fetch<T: Send + 'static>(&self, resource: Resource<T>) -> Result<T> {
        self.fetch_with_timeout(resource, self.config.default_timeout)
            .await
    }

    pub async fn fetch_with_timeout<T: Send + 'static>(
        &self,
        resource: Resource<T>,
        timeout: Duration,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.execute(resource, timeout, move |result| {
            let _ = tx.send(result);
        });
        rx.await
            .unwrap_or_else(|_| Err(WebserviceError::Transport(TransportError::Abandoned)))
    }

    fn execute<T, F>(&self, resource: Resource<T>, timeout: Duration, deliver: F)
    where
        T: Send + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let request = match self.build_request(&resource, timeout) {
            Ok(request) => request,
            Err(e) => {
                warn!("not dispatching request to {}: {e}", resource.url());
                deliver(Err(e));
                return;
            }
        };

        debug!(
            "dispatching {} {} with timeout {:?}",
            request.method, request.url, request.timeout
        );
        self.transport.send(
            request,
            Completion::new(move |outcome| {
                let result = match outcome {
                    Ok(response) => {
                        catch_unwind(AssertUnwindSafe(|| resource.parse(&response.body)))
                            .unwrap_or_else(|_| {
                                error!("parser for {} panicked", resource.url());
                                Err(WebserviceError::Parse("parser panicked".into()))
                            })
                    }
                    Err(e) => Err(WebserviceError::Transport(e)),
                };
                if let Err(e) = &result {
                    debug!("request to {} failed: {e}", resource.url());
                }
                deliver(result);
            }),
        );
    }
}

impl fmt::Debug for Webservice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Webservice")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
