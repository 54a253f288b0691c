//! In-process stand-in for the file hosting API.

#![expect(clippy::unwrap_used, clippy::indexing_slicing, reason = "test")]

use {
    base64::{Engine, prelude::BASE64_STANDARD},
    bytes::Bytes,
    eph_protocol::{
        AccessToken, ChunkLayout,
        dto::{BoxInfo, FileInfo, WrappedKeyRequest},
        endpoints::{
            CHUNK_FORM_FIELD, Endpoints, FILE_ID_HEADER, PUBLIC_KEY_HEADER,
            TRANSACTION_ID_HEADER, UPLOAD_ID_HEADER,
        },
    },
    eph_sdk::{
        Client, Progress, Timeouts,
        crypto::{ChunkCipher, SessionKey},
    },
    http_body_util::{BodyExt, Full},
    hyper::{
        Method, Request, Response, StatusCode,
        body::Incoming,
        header::{AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE},
        server::conn::http1,
        service::service_fn,
    },
    hyper_util::rt::TokioIo,
    parking_lot::Mutex,
    reqwest::Url,
    rsa::{Oaep, RsaPrivateKey, pkcs8::DecodePrivateKey},
    sha2::Sha256,
    std::{convert::Infallible, sync::Arc, time::Duration},
    tokio::net::TcpListener,
};

pub const TOKEN: &str = "test-token";
pub const PUBLIC_KEY: &str = include_str!("../data/rsa_public_key.pem");
const PRIVATE_KEY: &str = include_str!("../data/rsa_private_key.pem");

pub const UPLOAD_TRANSACTION: &str = "tx-up";
pub const DOWNLOAD_TRANSACTION: &str = "tx-down";
pub const NEW_FILE_ID: &str = "file-new";
pub const EMAIL: &str = "user@example.com";
pub const QUOTA: BoxInfo = BoxInfo {
    capacity_mb: 1024,
    used_mb: 300,
    remaining_mb: 724,
};

/// File offered for download.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    pub content: Vec<u8>,
    pub chunk_size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Behavior {
    pub reject_key: bool,
    pub fail_chunk: Option<u64>,
    /// Download chunk answered with a body too short to hold a nonce.
    pub truncate_chunk: Option<u64>,
    pub omit_public_key: bool,
    pub file: Option<StoredFile>,
    /// Size reported in the file info instead of the real one.
    pub reported_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub content_range: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadedChunk {
    pub index: u64,
    pub file_name: String,
    pub ciphertext_len: usize,
    pub plaintext: Vec<u8>,
}

#[derive(Default)]
struct State {
    behavior: Behavior,
    requests: Vec<Recorded>,
    key: Option<SessionKey>,
    uploaded: Vec<UploadedChunk>,
}

pub struct MockServer {
    url: Url,
    state: Arc<Mutex<State>>,
}

impl MockServer {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(State {
            behavior,
            ..State::default()
        }));

        let server_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = Arc::clone(&server_state);
                tokio::spawn(async move {
                    let _ = http1::Builder::new()
                        .serve_connection(
                            TokioIo::new(stream),
                            service_fn(move |req| handle(Arc::clone(&state), req)),
                        )
                        .await;
                });
            }
        });

        Self {
            url: format!("http://{addr}/").parse().unwrap(),
            state,
        }
    }

    pub fn client(&self) -> Client {
        self.client_with_token(TOKEN)
    }

    pub fn client_with_token(&self, token: &str) -> Client {
        Client::new(
            Endpoints::new(self.url.clone()).unwrap(),
            token.parse::<AccessToken>().unwrap(),
        )
        .unwrap()
        .with_timeouts(Timeouts {
            control: Duration::from_secs(5),
            chunk: Duration::from_secs(30),
        })
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().requests.clone()
    }

    pub fn chunk_requests(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.starts_with("/api/v1/multipart/"))
            .collect()
    }

    pub fn uploaded(&self) -> Vec<UploadedChunk> {
        self.state.lock().uploaded.clone()
    }

    pub fn uploaded_plaintext(&self) -> Vec<u8> {
        self.uploaded()
            .into_iter()
            .flat_map(|chunk| chunk.plaintext)
            .collect()
    }

    pub fn has_key(&self) -> bool {
        self.state.lock().key.is_some()
    }
}

/// Progress sink that remembers what it was told.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<String>>,
}

impl Progress for RecordingProgress {
    fn start(&self, label: &str, total: u64) {
        self.events.lock().push(format!("start {label} {total}"));
    }

    fn advance(&self, bytes: u64) {
        self.events.lock().push(format!("advance {bytes}"));
    }

    fn finish(&self) {
        self.events.lock().push("finish".into());
    }
}

type HttpResponse = Response<Full<Bytes>>;

fn respond(status: StatusCode, body: impl Into<Bytes>) -> HttpResponse {
    Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .unwrap()
}

async fn handle(
    state: Arc<Mutex<State>>,
    request: Request<Incoming>,
) -> Result<HttpResponse, Infallible> {
    let (parts, body) = request.into_parts();
    let body = body.collect().await.unwrap().to_bytes();
    let path = parts.uri.path().to_owned();

    let mut state = state.lock();
    state.requests.push(Recorded {
        method: parts.method.clone(),
        path: path.clone(),
        content_range: parts
            .headers
            .get(CONTENT_RANGE)
            .map(|v| v.to_str().unwrap().to_owned()),
    });

    let authorized = parts
        .headers
        .get(AUTHORIZATION)
        .is_some_and(|v| v.to_str().unwrap() == format!("Bearer {TOKEN}"));
    if !authorized {
        return Ok(respond(
            StatusCode::UNAUTHORIZED,
            r#"{"error":true,"msg":"invalid token"}"#,
        ));
    }

    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let response = match (&parts.method, segments.as_slice()) {
        (&Method::HEAD, ["api", "v1", "files"]) => {
            let mut response = Response::builder()
                .header(UPLOAD_ID_HEADER, UPLOAD_TRANSACTION)
                .header(FILE_ID_HEADER, NEW_FILE_ID);
            if !state.behavior.omit_public_key {
                response = response.header(PUBLIC_KEY_HEADER, single_line(PUBLIC_KEY));
            }
            response.body(Full::new(Bytes::new())).unwrap()
        }
        (&Method::HEAD, ["api", "v1", "public-key", "download", file_id]) => {
            if state.behavior.file.as_ref().is_none_or(|f| f.id != *file_id) {
                respond(StatusCode::NOT_FOUND, r#"{"error":"not found","message":"no such file"}"#)
            } else {
                let mut response =
                    Response::builder().header(TRANSACTION_ID_HEADER, DOWNLOAD_TRANSACTION);
                if !state.behavior.omit_public_key {
                    response = response.header(PUBLIC_KEY_HEADER, single_line(PUBLIC_KEY));
                }
                response.body(Full::new(Bytes::new())).unwrap()
            }
        }
        (&Method::POST, ["api", "v1", "files", UPLOAD_TRANSACTION, "upload-key"])
        | (&Method::POST, ["api", "v1", "download-transaction", DOWNLOAD_TRANSACTION, "aeskey"]) => {
            if state.behavior.reject_key {
                respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    r#"{"error":"internal","message":"key rejected"}"#,
                )
            } else {
                state.key = Some(unwrap_session_key(&body));
                respond(StatusCode::OK, "{}")
            }
        }
        (&Method::DELETE, ["api", "v1", "files", file_id]) => {
            if state.behavior.file.as_ref().is_some_and(|f| f.id == *file_id) {
                state.behavior.file = None;
                respond(StatusCode::OK, "{}")
            } else {
                respond(StatusCode::NOT_FOUND, r#"{"error":"not found","message":"no such file"}"#)
            }
        }
        (&Method::GET, ["api", "v1", "box", EMAIL, "default"]) => {
            respond(StatusCode::OK, serde_json::to_vec(&QUOTA).unwrap())
        }
        (&Method::GET, ["api", "v1", "files", "info", file_id]) => {
            match state.behavior.file.as_ref().filter(|f| f.id == *file_id) {
                Some(file) => {
                    let size = u64::try_from(file.content.len()).unwrap();
                    let info = FileInfo {
                        filename: file.name.clone(),
                        size: state.behavior.reported_size.unwrap_or(size),
                        nb_parts: ChunkLayout::new(size, file.chunk_size)
                            .unwrap()
                            .chunk_count(),
                    };
                    respond(StatusCode::OK, serde_json::to_vec(&info).unwrap())
                }
                None => respond(StatusCode::NOT_FOUND, "404 page not found"),
            }
        }
        (&Method::POST, ["api", "v1", "multipart", UPLOAD_TRANSACTION, index]) => {
            let index: u64 = index.parse().unwrap();
            if state.behavior.fail_chunk == Some(index) {
                respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    r#"{"error":true,"msg":"storage failure"}"#,
                )
            } else {
                let content_type = parts.headers[CONTENT_TYPE].to_str().unwrap();
                let (file_name, ciphertext) = parse_multipart(content_type, &body);
                let key = state.key.as_ref().unwrap();
                let plaintext = ChunkCipher::new(key).decrypt_chunk(&ciphertext).unwrap();
                state.uploaded.push(UploadedChunk {
                    index,
                    file_name,
                    ciphertext_len: ciphertext.len(),
                    plaintext,
                });
                respond(StatusCode::OK, "{}")
            }
        }
        (&Method::GET, ["api", "v1", "multipart", DOWNLOAD_TRANSACTION, index]) => {
            let index: u64 = index.parse().unwrap();
            if state.behavior.fail_chunk == Some(index) {
                respond(StatusCode::BAD_GATEWAY, "bad gateway")
            } else if state.behavior.truncate_chunk == Some(index) {
                respond(StatusCode::OK, Bytes::from_static(b"short"))
            } else {
                let file = state.behavior.file.as_ref().unwrap();
                let layout =
                    ChunkLayout::new(u64::try_from(file.content.len()).unwrap(), file.chunk_size)
                        .unwrap();
                let chunk = layout.chunk(index).unwrap();
                let start = usize::try_from(chunk.range.start).unwrap();
                let end = usize::try_from(chunk.range.end).unwrap();
                let key = state.key.as_ref().unwrap();
                let ciphertext = ChunkCipher::new(key)
                    .encrypt_chunk(&file.content[start..end])
                    .unwrap();
                respond(StatusCode::OK, ciphertext)
            }
        }
        _ => respond(StatusCode::NOT_FOUND, "404 page not found"),
    };
    Ok(response)
}

pub fn single_line(pem: &str) -> String {
    pem.lines().collect()
}

fn unwrap_session_key(body: &[u8]) -> SessionKey {
    let request: WrappedKeyRequest = serde_json::from_slice(body).unwrap();
    let ciphertext = BASE64_STANDARD.decode(request.aeskey).unwrap();
    let private_key = RsaPrivateKey::from_pkcs8_pem(PRIVATE_KEY).unwrap();
    let key_hex = private_key
        .decrypt(Oaep::new::<Sha256>(), &ciphertext)
        .unwrap();
    SessionKey::from_hex(std::str::from_utf8(&key_hex).unwrap()).unwrap()
}

/// Extracts the file name and content of the single file part of a form.
fn parse_multipart(content_type: &str, body: &[u8]) -> (String, Vec<u8>) {
    let boundary = content_type
        .split("boundary=")
        .nth(1)
        .unwrap()
        .trim_matches('"');
    let header_end = find(body, b"\r\n\r\n").unwrap();
    let headers = std::str::from_utf8(&body[..header_end]).unwrap();
    assert!(
        headers.contains(&format!("name=\"{CHUNK_FORM_FIELD}\"")),
        "{headers}"
    );
    assert!(headers.contains("application/octet-stream"), "{headers}");
    let file_name = headers
        .split("filename=\"")
        .nth(1)
        .unwrap()
        .split('"')
        .next()
        .unwrap()
        .to_owned();

    let data = &body[header_end + 4..];
    let closing = format!("\r\n--{boundary}--");
    let data_end = rfind(data, closing.as_bytes()).unwrap();
    (file_name, data[..data_end].to_vec())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
