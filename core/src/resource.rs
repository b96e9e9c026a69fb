//! Descriptor of a single HTTP call.
//!
//! # Design
//! A `Resource<T>` bundles the target URL, the method (with its body) and the
//! parser that turns the raw response bytes into `T`. It is built right before
//! a call and dropped once the completion fires. The parser sits behind an
//! `Arc` so the descriptor is cheap to clone and can move to the transport's
//! worker thread.

use std::fmt;
use std::sync::Arc;

use http::Uri;
use serde::de::DeserializeOwned;

use crate::error::{BoxError, Result, WebserviceError};
use crate::http::HttpMethod;

type ParseFn<T> = dyn Fn(&[u8]) -> std::result::Result<T, BoxError> + Send + Sync;

pub struct Resource<T> {
    url: Uri,
    method: HttpMethod,
    parse: Arc<ParseFn<T>>,
}

impl<T: 'static> Resource<T> {
    /// Describe a call to `url` whose response is decoded by `parse`.
    ///
    /// `parse` may fail on malformed input; the failure is delivered to the
    /// caller as `WebserviceError::Parse`.
    pub fn new<F, E>(url: Uri, method: HttpMethod, parse: F) -> Self
    where
        F: Fn(&[u8]) -> std::result::Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self {
            url,
            method,
            parse: Arc::new(move |bytes: &[u8]| {
                parse(bytes).map_err(Into::<BoxError>::into)
            }),
        }
    }
}

impl<T> Resource<T> {
    pub fn url(&self) -> &Uri {
        &self.url
    }

    pub fn method(&self) -> &HttpMethod {
        &self.method
    }

    /// Run the parser over a response body.
    pub fn parse(&self, bytes: &[u8]) -> Result<T> {
        (self.parse)(bytes).map_err(WebserviceError::Parse)
    }
}

impl<T: DeserializeOwned + 'static> Resource<T> {
    /// Resource whose response body is JSON deserialized into `T`.
    pub fn json(url: Uri, method: HttpMethod) -> Self {
        Self::new(url, method, |bytes| serde_json::from_slice::<T>(bytes))
    }
}

impl Resource<String> {
    /// Resource whose response body is decoded as UTF-8 text.
    pub fn text(url: Uri, method: HttpMethod) -> Self {
        Self::new(url, method, |bytes| String::from_utf8(bytes.to_vec()))
    }
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            method: self.method.clone(),
            parse: Arc::clone(&self.parse),
        }
    }
}

impl<T> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("url", &self.url)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}
