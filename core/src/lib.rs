//! Minimal asynchronous HTTP resource client.
//!
//! # Overview
//! A `Resource<T>` describes one call: URL, method (with its JSON body for
//! `POST`/`PUT`) and a parser from response bytes to `T`. `Webservice`
//! executes it off the caller's thread and delivers exactly one
//! `Result<T>` to a completion callback.
//!
//! # Design
//! - `Webservice` is stateless apart from immutable shared handles and can be
//!   cloned or rebuilt freely.
//! - Network I/O sits behind the `Transport` trait; `UreqTransport` is the
//!   default.
//! - Callbacks run on a `Dispatch` context. `Webservice::new()` uses a
//!   dedicated serial thread (`webservice-callbacks`); `CallbackQueue::manual`
//!   lets the caller run them from its own loop instead.
//! - Request-construction, transport and parse failures all arrive as `Err`
//!   through the callback; `request` itself cannot fail.

pub mod dispatch;
pub mod error;
pub mod http;
pub mod resource;
pub mod transport;
pub mod webservice;

pub use crate::dispatch::{CallbackPump, CallbackQueue, Dispatch, Inline, Job};
pub use crate::error::{BoxError, Result, WebserviceError};
pub use crate::http::{json_body, HttpMethod, HttpRequest, HttpResponse, JsonBody};
pub use crate::resource::Resource;
pub use crate::transport::{
    Completion, Transport, TransportError, UreqTransport, DEFAULT_WORKERS,
};
pub use crate::webservice::{Webservice, WebserviceConfig, DEFAULT_TIMEOUT};
