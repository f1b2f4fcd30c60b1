//! In-process fake registry for integration tests
//!
//! Replies are scripted per `(method, path)`; unscripted requests get a 404. Every request
//! is recorded so tests can assert which calls were (not) made.

#![allow(dead_code)]

use airgap_mirror::cli::config::TransportConfig;
use airgap_mirror::logging::Logger;
use airgap_mirror::registry::{RegistryClient, RegistryEndpoint, RegistryFlavor};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::response::Response;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Self::status(200)
        }
    }

    pub fn json(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::ok(body).header("Content-Type", content_type)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct Shared {
    routes: Vec<(Method, String, Reply)>,
    requests: Vec<Recorded>,
}

#[derive(Clone)]
pub struct FakeRegistry {
    addr: SocketAddr,
    shared: Arc<Mutex<Shared>>,
}

impl FakeRegistry {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Mutex::new(Shared::default()));

        let app = Router::new().fallback(handle).with_state(shared.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, shared }
    }

    /// `http://127.0.0.1:<port>`
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn authority(&self) -> String {
        self.addr.to_string()
    }

    pub fn endpoint(&self, flavor: RegistryFlavor) -> RegistryEndpoint {
        RegistryEndpoint::parse(&self.url(), flavor).unwrap()
    }

    /// Script a reply; later registrations for the same route win
    pub fn on(&self, method: Method, path: &str, reply: Reply) {
        let mut shared = self.shared.lock().unwrap();
        shared.routes.insert(0, (method, path.to_string(), reply));
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.shared.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub fn count(&self, method: Method) -> usize {
        self.requests().iter().filter(|r| r.method == method).count()
    }

    /// Accept blob uploads for `repository`: session POST, then PUT to `/upload/<repository>`
    pub fn accept_uploads(&self, repository: &str) {
        let session = format!("/upload/{}", repository);
        self.on(
            Method::POST,
            &format!("/v2/{}/blobs/uploads/", repository),
            Reply::status(202).header("Location", &format!("{}?_state=s", session)),
        );
        self.on(Method::PUT, &session, Reply::status(201));
    }
}

async fn handle(State(shared): State<Arc<Mutex<Shared>>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap_or_default().to_vec();
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let recorded = Recorded {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        query: url::form_urlencoded::parse(parts.uri.query().unwrap_or("").as_bytes())
            .into_owned()
            .collect(),
        authorization: header("authorization"),
        content_type: header("content-type"),
        body,
    };

    let mut shared = shared.lock().unwrap();
    let reply = shared
        .routes
        .iter()
        .find(|(method, path, _)| *method == recorded.method && *path == recorded.path)
        .map(|(_, _, reply)| reply.clone())
        .unwrap_or_else(|| Reply::status(404));
    shared.requests.push(recorded);

    let mut response =
        axum::http::Response::builder().status(StatusCode::from_u16(reply.status).unwrap());
    for (name, value) in &reply.headers {
        response = response.header(name, value);
    }
    response.body(Body::from(reply.body)).unwrap()
}

pub fn sha256(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
}

pub fn transport(work_dir: &Path) -> TransportConfig {
    TransportConfig {
        work_dir: work_dir.to_path_buf(),
        ..TransportConfig::default()
    }
}

pub fn client(work_dir: &Path) -> RegistryClient {
    RegistryClient::builder(transport(work_dir))
        .with_output(Logger::new_quiet())
        .build()
        .unwrap()
}

/// Gzipped tarball with the given members
pub fn targz(members: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(flate2::write::GzEncoder::new(
        Vec::new(),
        flate2::Compression::default(),
    ));
    for (name, content) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, content.as_bytes())
            .unwrap();
    }
    let mut encoder = builder.into_inner().unwrap();
    encoder.flush().unwrap();
    encoder.finish().unwrap()
}

/// A chart package `{name}-{version}.tgz` in `dir`
pub fn write_chart(dir: &Path, name: &str, version: &str) -> std::path::PathBuf {
    let path = dir.join(format!("{}-{}.tgz", name, version));
    let chart_yaml = format!("apiVersion: v2\nname: {}\nversion: {}\n", name, version);
    let chart_path = format!("{}/Chart.yaml", name);
    let values_path = format!("{}/values.yaml", name);
    let data = targz(&[
        (chart_path.as_str(), chart_yaml.as_str()),
        (values_path.as_str(), "replicaCount: 1\n"),
    ]);
    std::fs::write(&path, data).unwrap();
    path
}
