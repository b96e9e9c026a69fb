//! End-to-end requests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives the default
//! `Webservice` (ureq transport, dedicated callback thread) over real HTTP.
//! Each test collects callback invocations through a channel so it can check
//! both the outcome and that exactly one invocation happened.

use std::net::SocketAddr;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use http::Uri;
use mock_server::{sample_items, Echo, Item};
use serde_json::{json, Value};
use webservice_core::{
    json_body, HttpMethod, JsonBody, Resource, Result, Webservice, WebserviceError,
};

const WAIT: Duration = Duration::from_secs(10);

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn url(addr: SocketAddr, path: &str) -> Uri {
    format!("http://{addr}{path}").parse().unwrap()
}

/// Issue `resource` and return the receiving end of its callback channel.
fn request<T: Send + 'static>(
    service: &Webservice,
    resource: Resource<T>,
    timeout: Option<Duration>,
) -> Receiver<(Option<String>, Result<T>)> {
    let (tx, rx) = mpsc::channel();
    let completion = move |result: Result<T>| {
        let thread_name = thread::current().name().map(str::to_string);
        tx.send((thread_name, result)).unwrap();
    };
    match timeout {
        Some(timeout) => service.request_with_timeout(resource, timeout, completion),
        None => service.request(resource, completion),
    }
    rx
}

/// Wait for the single callback invocation and check no second one follows.
fn outcome<T>(rx: Receiver<(Option<String>, Result<T>)>) -> Result<T> {
    let (thread_name, result) = rx.recv_timeout(WAIT).expect("callback never fired");
    assert_eq!(thread_name.as_deref(), Some("webservice-callbacks"));
    assert!(
        rx.recv_timeout(Duration::from_millis(100)).is_err(),
        "callback fired more than once"
    );
    result
}

fn body(value: Value) -> JsonBody {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

#[test]
fn get_text_success() {
    let addr = start_server();
    let service = Webservice::new().unwrap();

    let rx = request(&service, Resource::text(url(addr, "/items"), HttpMethod::get()), None);
    assert_eq!(outcome(rx).unwrap(), "ok");
}

#[test]
fn get_json_success() {
    let addr = start_server();
    let service = Webservice::new().unwrap();

    let resource: Resource<Vec<Item>> = Resource::json(url(addr, "/items/json"), HttpMethod::get());
    assert_eq!(outcome(request(&service, resource, None)).unwrap(), sample_items());
}

#[test]
fn malformed_payload_is_a_parse_failure() {
    let addr = start_server();
    let service = Webservice::new().unwrap();

    let resource: Resource<Vec<Item>> = Resource::json(url(addr, "/malformed"), HttpMethod::get());
    let err = outcome(request(&service, resource, None)).unwrap_err();
    assert!(matches!(err, WebserviceError::Parse(_)), "got {err:?}");
}

#[test]
fn connection_refused_is_a_transport_failure() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let service = Webservice::new().unwrap();

    let rx = request(&service, Resource::text(url(addr, "/items"), HttpMethod::get()), None);
    let err = outcome(rx).unwrap_err();
    assert!(err.is_transport(), "got {err:?}");
}

#[test]
fn exceeding_the_timeout_is_a_transport_failure() {
    let addr = start_server();
    let service = Webservice::new().unwrap();

    let resource = Resource::text(url(addr, "/slow/3000"), HttpMethod::get());
    let rx = request(&service, resource, Some(Duration::from_millis(200)));
    let err = outcome(rx).unwrap_err();
    assert!(err.is_transport(), "got {err:?}");
}

#[test]
fn post_sends_json_body() {
    let addr = start_server();
    let service = Webservice::new().unwrap();

    let method = HttpMethod::post(body(json!({"name": "x"})));
    let resource: Resource<Echo> = Resource::json(url(addr, "/echo"), method);
    let echo = outcome(request(&service, resource, None)).unwrap();
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.content_type.as_deref(), Some("application/json"));
    assert_eq!(echo.body, Some(json!({"name": "x"})));
}

#[test]
fn put_sends_serialized_struct() {
    let addr = start_server();
    let service = Webservice::new().unwrap();

    let item = Item {
        id: 3,
        name: "third".to_string(),
    };
    let method = HttpMethod::put(json_body(&item).unwrap());
    let resource: Resource<Echo> = Resource::json(url(addr, "/echo"), method);
    let echo = outcome(request(&service, resource, None)).unwrap();
    assert_eq!(echo.method, "PUT");
    assert_eq!(echo.content_type.as_deref(), Some("application/json"));
    let sent: Item = serde_json::from_value(echo.body.unwrap()).unwrap();
    assert_eq!(sent, item);
}

#[test]
fn bodyless_methods_send_no_content_type() {
    let addr = start_server();
    let service = Webservice::new().unwrap();

    for method in [
        HttpMethod::get(),
        HttpMethod::delete(),
        HttpMethod::post(JsonBody::new()),
        HttpMethod::put(JsonBody::new()),
    ] {
        let name = method.name();
        let resource: Resource<Echo> = Resource::json(url(addr, "/echo"), method);
        let echo = outcome(request(&service, resource, None)).unwrap();
        assert_eq!(echo.method, name);
        assert!(echo.content_type.is_none(), "{name}: unexpected content type");
        assert!(echo.body.is_none(), "{name}: unexpected body");
    }
}

#[test]
fn error_status_is_handed_to_the_parser() {
    let addr = start_server();
    let service = Webservice::new().unwrap();

    let rx = request(&service, Resource::text(url(addr, "/status/503"), HttpMethod::get()), None);
    assert_eq!(outcome(rx).unwrap(), "status 503");
}

#[test]
fn relative_url_fails_without_dispatch() {
    let service = Webservice::new().unwrap();

    let resource = Resource::text(Uri::from_static("/items"), HttpMethod::get());
    let err = outcome(request(&service, resource, None)).unwrap_err();
    assert!(matches!(err, WebserviceError::RequestConstruction(_)), "got {err:?}");
}

#[test]
fn repeated_requests_complete_independently() {
    let addr = start_server();
    let service = Webservice::new().unwrap();
    let resource = Resource::text(url(addr, "/items"), HttpMethod::get());

    let first = request(&service, resource.clone(), None);
    let second = request(&service, resource, None);
    assert_eq!(outcome(first).unwrap(), "ok");
    assert_eq!(outcome(second).unwrap(), "ok");
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_awaits_on_the_calling_task() {
    let addr = start_server();
    let service = Webservice::new().unwrap();

    let text = service
        .fetch(Resource::text(url(addr, "/items"), HttpMethod::get()))
        .await
        .unwrap();
    assert_eq!(text, "ok");

    let err = service
        .fetch_with_timeout(
            Resource::text(url(addr, "/slow/3000"), HttpMethod::get()),
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();
    assert!(err.is_transport(), "got {err:?}");
}
