//! axum server for exercising downloads against real sockets.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures::stream::{self, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Clone, Debug)]
pub struct Resource {
    pub body: Arc<Vec<u8>>,
    /// Announce `Accept-Ranges: bytes` on HEAD.
    pub accept_ranges: bool,
    /// Answer ranged GETs with 206. When false every GET gets the whole body
    /// with 200, whatever HEAD announced.
    pub honor_ranges: bool,
    pub head_length: bool,
    /// Size announced on HEAD, defaults to the body length.
    pub advertised_size: Option<u64>,
    pub disposition: Option<String>,
    /// GET requests whose range starts here answer 500.
    pub fail_range_from: Option<u64>,
    /// Body sent in chunks of this size with a pause before each.
    pub slow: Option<(usize, Duration)>,
}

impl Resource {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body: Arc::new(body),
            accept_ranges: true,
            honor_ranges: true,
            head_length: true,
            advertised_size: None,
            disposition: None,
            fail_range_from: None,
            slow: None,
        }
    }

    /// A server that knows nothing about ranges.
    pub fn without_ranges(body: Vec<u8>) -> Self {
        Self {
            accept_ranges: false,
            honor_ranges: false,
            ..Self::new(body)
        }
    }
}

struct Shared {
    routes: HashMap<String, Resource>,
    ranges: Mutex<Vec<String>>,
}

pub struct TestServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(routes: Vec<(&str, Resource)>) -> Self {
        let shared = Arc::new(Shared {
            routes: routes
                .into_iter()
                .map(|(path, resource)| (path.to_string(), resource))
                .collect(),
            ranges: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(serve).with_state(shared.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            shared,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// `Range` headers of every GET received so far.
    pub fn ranges(&self) -> Vec<String> {
        self.shared.ranges.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Deterministic, non-repeating-looking test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}

async fn serve(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let Some(resource) = shared.routes.get(uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if method == Method::HEAD {
        return head(resource);
    }

    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    if let Some(range) = &range {
        shared.ranges.lock().unwrap().push(range.clone());
    }

    let requested = range.as_deref().and_then(parse_range);
    if let (Some(fail_from), Some((from, _))) = (resource.fail_range_from, requested) {
        if from == fail_from {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let len = resource.body.len() as u64;
    let (status, body) = match requested {
        Some((from, to)) if resource.honor_ranges && from < len => {
            let to = to.min(len - 1);
            (
                StatusCode::PARTIAL_CONTENT,
                &resource.body[from as usize..=to as usize],
            )
        }
        _ => (StatusCode::OK, &resource.body[..]),
    };

    let body = match resource.slow {
        Some((chunk, pause)) => {
            let chunks: Vec<Bytes> = body.chunks(chunk).map(Bytes::copy_from_slice).collect();
            Body::from_stream(stream::iter(chunks).then(move |piece| async move {
                tokio::time::sleep(pause).await;
                Ok::<_, std::io::Error>(piece)
            }))
        }
        None => Body::from(body.to_vec()),
    };
    (status, body).into_response()
}

fn head(resource: &Resource) -> Response {
    let mut response = if resource.head_length {
        let size = resource
            .advertised_size
            .unwrap_or(resource.body.len() as u64);
        // The body is dropped for HEAD; its length still becomes Content-Length.
        Body::from(vec![0u8; size as usize]).into_response()
    } else {
        // Unknown length: no Content-Length is derived from a stream body.
        Body::from_stream(stream::empty::<Result<Bytes, std::io::Error>>()).into_response()
    };

    let headers = response.headers_mut();
    if resource.accept_ranges {
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    }
    if let Some(disposition) = &resource.disposition {
        headers.insert(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_str(disposition).unwrap(),
        );
    }
    response
}

fn parse_range(value: &str) -> Option<(u64, u64)> {
    let spec = value.strip_prefix("bytes=")?;
    let (from, to) = spec.split_once('-')?;
    let from = from.trim().parse().ok()?;
    let to = if to.trim().is_empty() {
        u64::MAX
    } else {
        to.trim().parse().ok()?
    };
    Some((from, to))
}
