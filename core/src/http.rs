//! HTTP method and transport types for the webservice client.
//!
//! # Design
//! `HttpMethod` is a closed enum: the body travels inside the variants that
//! can carry one, so `name()` and `body()` are total functions of the variant
//! and a new method forces every `match` to be revisited.
//!
//! `HttpRequest` and `HttpResponse` describe a single round-trip as plain
//! data. `Webservice` builds the request, a `Transport` executes it and hands
//! back the response; neither side needs to know how the other works.

use std::borrow::Cow;
use std::time::Duration;

use http::Uri;
use serde::Serialize;
use serde_json::Value;

use crate::error::WebserviceError;

/// JSON object carried by `POST` and `PUT`.
pub type JsonBody = serde_json::Map<String, Value>;

/// HTTP method of a resource, with the request body for mutating methods.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpMethod {
    Get,
    Post(JsonBody),
    Put(JsonBody),
    Delete,
}

impl HttpMethod {
    pub fn get() -> Self {
        HttpMethod::Get
    }

    pub fn post(body: JsonBody) -> Self {
        HttpMethod::Post(body)
    }

    pub fn put(body: JsonBody) -> Self {
        HttpMethod::Put(body)
    }

    pub fn delete() -> Self {
        HttpMethod::Delete
    }

    /// Method name as sent on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post(_) => "POST",
            HttpMethod::Put(_) => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Request payload. Always empty for `GET` and `DELETE`.
    pub fn body(&self) -> Cow<'_, JsonBody> {
        match self {
            HttpMethod::Post(body) | HttpMethod::Put(body) => Cow::Borrowed(body),
            HttpMethod::Get | HttpMethod::Delete => Cow::Owned(JsonBody::new()),
        }
    }
}

/// Convert any serializable value into a request body.
///
/// Fails with `RequestConstruction` when serialization fails or when the
/// value does not serialize to a JSON object.
pub fn json_body<T: Serialize + ?Sized>(value: &T) -> Result<JsonBody, WebserviceError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(WebserviceError::RequestConstruction(format!(
            "request body must be a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(WebserviceError::RequestConstruction(format!(
            "request body serialization failed: {e}"
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// An HTTP request described as plain data.
///
/// Built by `Webservice::build_request` and executed by a `Transport`.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: &'static str,
    pub url: Uri,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

impl HttpRequest {
    /// First value of the header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// An HTTP response described as plain data.
///
/// Any status code counts as a completed round-trip; interpreting the status
/// is left to the resource's parser.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// First value of the header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
