//! State of a single HTTP exchange: [`HttpExchange`] and [`ExchangeId`].
//!
//! An exchange moves through `Unsent -> Opened -> Headers -> Loading -> Done`. Only the transport
//! driver mutates it (request/response metadata, body chunks, completion or failure); consumers
//! read the ready state, progress and the materialized body views, and may pick the text
//! encoding.
//!
//! ### Concurrency
//! - Metadata, ready state and body live behind one `RwLock`, so a reader never sees a
//!   half-applied append or a status without its headers.
//! - Progress lives in atomics and is read without locking. It may lag the body by one update.
//! - Share the exchange as an [`ExchangeHandle`] (`Arc<HttpExchange>`).
//!
//! ### Misuse
//! Calling a mutating operation from the wrong state returns
//! [`ExchangeError`](crate::errors::ExchangeError) and logs at `error` level. A transport failure
//! is never returned: it is recorded with [`HttpExchange::fail`].
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use encoding_rs::Encoding;
use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;
use uuid::Uuid;

use crate::config::{validate, ExchangeConfig};
use crate::errors::{ExchangeError, MaterializeError};
use crate::net::materialize::{decode_text, encoding_for_label, into_array, into_object, parse_document};
use crate::net::{Progress, ReadyState, RequestMetadata, ResponseMetadata, TransportError};

/// A unique identifier for an exchange, represented as a UUID.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExchangeId(Uuid);

impl ExchangeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ExchangeId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type ExchangeHandle = Arc<HttpExchange>;

#[derive(Debug, Default)]
struct ExchangeInner {
    ready_state: ReadyState,
    connected: bool,
    request: Option<RequestMetadata>,
    url: Option<Url>,
    status: Option<u16>,
    status_text: Option<String>,
    headers: Option<HeaderMap>,
    connection_type: Option<String>,
    location: Option<String>,
    /// Charset from the response `Content-Type`
    declared_encoding: Option<&'static Encoding>,
    /// Charset chosen by the consumer, wins over everything else
    encoding_override: Option<&'static Encoding>,
    expected_length: Option<u64>,
    error: Option<TransportError>,
    body: Vec<u8>,
}

/// Observable state of one HTTP request/response cycle.
#[derive(Debug)]
pub struct HttpExchange {
    id: ExchangeId,
    default_encoding: &'static Encoding,
    max_body_size: Option<usize>,
    inner: RwLock<ExchangeInner>,
    download: Progress,
    upload: Progress,
}

impl Default for HttpExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpExchange {
    /// Creates an exchange in the `Unsent` state with UTF-8 as fallback encoding and no body limit.
    pub fn new() -> Self {
        Self {
            id: ExchangeId::new(),
            default_encoding: encoding_rs::UTF_8,
            max_body_size: None,
            inner: RwLock::new(ExchangeInner::default()),
            download: Progress::new(),
            upload: Progress::new(),
        }
    }

    /// Creates an exchange using the fallback encoding and body limit from `config`.
    ///
    /// The config is validated again here since its fields are public and may not have gone
    /// through the builder.
    pub fn with_config(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        validate(config)?;
        Ok(Self {
            default_encoding: encoding_for_label(&config.default_encoding)?,
            max_body_size: config.max_body_size,
            ..Self::new()
        })
    }

    pub fn into_handle(self) -> ExchangeHandle {
        Arc::new(self)
    }

    pub fn id(&self) -> ExchangeId {
        self.id
    }

    fn read(&self) -> RwLockReadGuard<'_, ExchangeInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ExchangeInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn misuse(&self, op: &'static str, state: ReadyState) -> ExchangeError {
        let err = ExchangeError::InvalidTransition { op, state };
        log::error!("Exchange[{}]: {}", self.id, err);
        err
    }

    // ****************************************
    // ** Transport driver side

    /// Binds the outgoing request. Only valid while `Unsent`, and only once.
    ///
    /// The request URL becomes the exchange URL until a response names a final URL.
    pub fn set_request(&self, request: RequestMetadata) -> Result<(), ExchangeError> {
        let mut inner = self.write();
        if inner.ready_state != ReadyState::Unsent {
            return Err(self.misuse("set_request", inner.ready_state));
        }
        if inner.request.is_some() {
            log::error!("Exchange[{}]: request bound twice", self.id);
            return Err(ExchangeError::RequestAlreadySet);
        }

        log::debug!("Exchange[{}]: {} {}", self.id, request.method, request.url);
        inner.url = Some(request.url.clone());
        inner.request = Some(request);
        Ok(())
    }

    /// Marks the transport channel as open: `Unsent -> Opened`.
    pub fn open(&self) -> Result<(), ExchangeError> {
        let mut inner = self.write();
        if !inner.ready_state.can_advance_to(ReadyState::Opened) {
            return Err(self.misuse("open", inner.ready_state));
        }

        inner.ready_state = ReadyState::Opened;
        inner.connected = true;
        log::debug!("Exchange[{}]: opened", self.id);
        Ok(())
    }

    /// Applies the response head: `Opened -> Headers`.
    pub fn set_response(&self, response: ResponseMetadata) -> Result<(), ExchangeError> {
        let mut inner = self.write();
        match inner.ready_state {
            ReadyState::Opened => {}
            ReadyState::Headers | ReadyState::Loading => {
                log::error!("Exchange[{}]: response applied twice", self.id);
                return Err(ExchangeError::ResponseAlreadySet);
            }
            state => return Err(self.misuse("set_response", state)),
        }

        let declared_encoding = response.charset().and_then(|label| {
            let enc = Encoding::for_label(label.as_bytes());
            if enc.is_none() {
                log::warn!("Exchange[{}]: ignoring unknown charset {:?}", self.id, label);
            }
            enc
        });

        if let Some(url) = response.url.clone() {
            inner.url = Some(url);
        }
        inner.connection_type = response.header("connection");
        inner.location = response.header("location");
        inner.declared_encoding = declared_encoding;
        inner.expected_length = response.content_length();
        inner.status = Some(response.status);
        inner.status_text = Some(response.status_text);
        inner.headers = Some(response.headers);
        inner.ready_state = ReadyState::Headers;

        log::debug!("Exchange[{}]: status {}", self.id, response.status);
        Ok(())
    }

    /// Appends a body chunk. The first chunk moves `Headers -> Loading`.
    ///
    /// When the response declared a `Content-Length`, download progress follows the number of
    /// bytes received. A chunk that would push the body over the configured limit is rejected
    /// and the buffer is left as it was.
    pub fn append_data(&self, chunk: &[u8]) -> Result<(), ExchangeError> {
        let mut inner = self.write();
        if !inner.ready_state.can_advance_to(ReadyState::Loading) {
            return Err(self.misuse("append_data", inner.ready_state));
        }

        let attempted = inner.body.len() + chunk.len();
        if let Some(limit) = self.max_body_size {
            if attempted > limit {
                log::error!("Exchange[{}]: body limit of {} bytes exceeded", self.id, limit);
                return Err(ExchangeError::BodyLimitExceeded { limit, attempted });
            }
        }

        inner.ready_state = ReadyState::Loading;
        inner.body.extend_from_slice(chunk);

        if let Some(total) = inner.expected_length {
            self.download.advance_ratio(inner.body.len() as u64, total);
        }
        Ok(())
    }

    /// Completes the exchange normally. Requires a response head.
    pub fn finish(&self) -> Result<(), ExchangeError> {
        let mut inner = self.write();
        if !matches!(inner.ready_state, ReadyState::Headers | ReadyState::Loading) {
            return Err(self.misuse("finish", inner.ready_state));
        }

        inner.ready_state = ReadyState::Done;
        inner.connected = false;
        self.download.advance(1.0);

        log::debug!("Exchange[{}]: done ({} bytes)", self.id, inner.body.len());
        Ok(())
    }

    /// Records a transport failure and moves straight to `Done`, from any state but `Done`.
    ///
    /// Body bytes received so far are kept.
    pub fn fail(&self, error: TransportError) -> Result<(), ExchangeError> {
        let mut inner = self.write();
        if inner.ready_state.is_done() {
            return Err(self.misuse("fail", inner.ready_state));
        }

        log::warn!("Exchange[{}]: failed in state {}: {}", self.id, inner.ready_state, error);
        inner.error = Some(error);
        inner.ready_state = ReadyState::Done;
        inner.connected = false;
        Ok(())
    }

    pub fn set_download_progress(&self, value: f32) {
        self.download.advance(value);
    }

    pub fn set_upload_progress(&self, value: f32) {
        self.upload.advance(value);
    }

    pub fn update_upload_progress(&self, sent: u64, total: u64) {
        self.upload.advance_ratio(sent, total);
    }

    // ****************************************
    // ** Consumer side

    /// Forces the text encoding by WHATWG label. Overrides the server-declared charset.
    pub fn set_encoding(&self, label: &str) -> Result<(), ExchangeError> {
        let encoding = encoding_for_label(label)?;
        self.set_encoding_override(Some(encoding));
        Ok(())
    }

    /// Sets or clears (with `None`) the encoding override.
    pub fn set_encoding_override(&self, encoding: Option<&'static Encoding>) {
        self.write().encoding_override = encoding;
    }

    /// Effective encoding: override, then declared charset, then the configured default.
    pub fn encoding(&self) -> &'static Encoding {
        self.effective_encoding(&self.read())
    }

    fn effective_encoding(&self, inner: &ExchangeInner) -> &'static Encoding {
        inner
            .encoding_override
            .or(inner.declared_encoding)
            .unwrap_or(self.default_encoding)
    }

    pub fn ready_state(&self) -> ReadyState {
        self.read().ready_state
    }

    pub fn is_connected(&self) -> bool {
        self.read().connected
    }

    pub fn request(&self) -> Option<RequestMetadata> {
        self.read().request.clone()
    }

    pub fn url(&self) -> Option<Url> {
        self.read().url.clone()
    }

    pub fn status(&self) -> Option<u16> {
        self.read().status
    }

    pub fn status_text(&self) -> Option<String> {
        self.read().status_text.clone()
    }

    pub fn headers(&self) -> Option<HeaderMap> {
        self.read().headers.clone()
    }

    /// Single response header value, case-insensitive.
    pub fn header(&self, name: &str) -> Option<String> {
        self.read()
            .headers
            .as_ref()?
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    }

    /// Value of the `Connection` response header.
    pub fn connection_type(&self) -> Option<String> {
        self.read().connection_type.clone()
    }

    /// Raw `Location` response header.
    pub fn location(&self) -> Option<String> {
        self.read().location.clone()
    }

    /// `Location` resolved against the exchange URL, so relative redirects become absolute.
    pub fn location_url(&self) -> Option<Url> {
        let inner = self.read();
        let location = inner.location.as_deref()?;
        match &inner.url {
            Some(base) => base.join(location).ok(),
            None => Url::parse(location).ok(),
        }
    }

    pub fn expected_length(&self) -> Option<u64> {
        self.read().expected_length
    }

    pub fn error(&self) -> Option<TransportError> {
        self.read().error.clone()
    }

    pub fn download_progress(&self) -> f32 {
        self.download.get()
    }

    pub fn upload_progress(&self) -> f32 {
        self.upload.get()
    }

    pub fn body_len(&self) -> usize {
        self.read().body.len()
    }

    /// Raw body bytes received so far.
    pub fn response_data(&self) -> Vec<u8> {
        self.read().body.clone()
    }

    /// Body decoded with the effective [`encoding`](Self::encoding).
    pub fn response_string(&self) -> String {
        let inner = self.read();
        decode_text(self.effective_encoding(&inner), &inner.body)
    }

    /// Body parsed as a JSON object.
    pub fn response_dictionary(&self) -> Result<Map<String, Value>, MaterializeError> {
        into_object(self.response_document()?)
    }

    /// Body parsed as a JSON array.
    pub fn response_array(&self) -> Result<Vec<Value>, MaterializeError> {
        into_array(self.response_document()?)
    }

    /// Body parsed as any JSON document.
    pub fn response_document(&self) -> Result<Value, MaterializeError> {
        let inner = self.read();
        parse_document(self.effective_encoding(&inner), &inner.body)
    }

    /// Body deserialized into `T`.
    pub fn response_json<T: DeserializeOwned>(&self) -> Result<T, MaterializeError> {
        let inner = self.read();
        if inner.body.is_empty() {
            return Err(MaterializeError::NoData);
        }
        let text = decode_text(self.effective_encoding(&inner), &inner.body);
        Ok(serde_json::from_str(&text)?)
    }

    /// Consistent view of the whole exchange, taken under a single lock.
    pub fn snapshot(&self) -> ExchangeSnapshot {
        let inner = self.read();

        ExchangeSnapshot {
            id: self.id,
            ready_state: inner.ready_state,
            connected: inner.connected,
            url: inner.url.as_ref().map(|u| u.to_string()),
            status: inner.status,
            headers: inner.headers.as_ref().map(flatten_headers),
            connection_type: inner.connection_type.clone(),
            location: inner.location.clone(),
            encoding: self.effective_encoding(&inner).name().to_string(),
            body_len: inner.body.len(),
            download_progress: self.download.get(),
            upload_progress: self.upload.get(),
            error: inner.error.clone(),
        }
    }
}

/// Serializable point-in-time view of an exchange for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeSnapshot {
    pub id: ExchangeId,
    pub ready_state: ReadyState,
    pub connected: bool,
    pub url: Option<String>,
    pub status: Option<u16>,
    pub headers: Option<BTreeMap<String, String>>,
    pub connection_type: Option<String>,
    pub location: Option<String>,
    pub encoding: String,
    pub body_len: usize,
    pub download_progress: f32,
    pub upload_progress: f32,
    pub error: Option<TransportError>,
}

/// Repeated headers are joined with `", "`. Non-ASCII values are skipped.
fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else { continue };
        out.entry(name.as_str().to_string())
            .and_modify(|v| {
                v.push_str(", ");
                v.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::net::TransportErrorKind;
    use http::{HeaderValue, Method};
    use serde_json::json;

    fn request(url: &str) -> RequestMetadata {
        RequestMetadata::new(Method::GET, Url::parse(url).unwrap())
    }

    fn response(status: u16, pairs: &[(&'static str, &'static str)]) -> ResponseMetadata {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.append(*k, HeaderValue::from_static(v));
        }
        ResponseMetadata::new(status, headers)
    }

    /// Exchange that went through request, open and response head.
    fn at_headers(pairs: &[(&'static str, &'static str)]) -> HttpExchange {
        let ex = HttpExchange::new();
        ex.set_request(request("https://example.com/api")).unwrap();
        ex.open().unwrap();
        ex.set_response(response(200, pairs)).unwrap();
        ex
    }

    #[test]
    fn fresh_exchange_is_unsent_and_empty() {
        let ex = HttpExchange::new();
        assert_eq!(ex.ready_state(), ReadyState::Unsent);
        assert!(!ex.is_connected());
        assert!(ex.status().is_none());
        assert!(ex.headers().is_none());
        assert!(ex.connection_type().is_none());
        assert!(ex.location().is_none());
        assert!(ex.error().is_none());
        assert!(ex.response_data().is_empty());
        assert_eq!(ex.response_string(), "");
        assert!(matches!(ex.response_dictionary(), Err(MaterializeError::NoData)));
    }

    #[test]
    fn full_lifecycle_is_monotonic() {
        let ex = HttpExchange::new();
        let mut seen = vec![ex.ready_state()];

        ex.set_request(request("https://example.com/")).unwrap();
        seen.push(ex.ready_state());
        ex.open().unwrap();
        assert!(ex.is_connected());
        seen.push(ex.ready_state());
        ex.set_response(response(200, &[])).unwrap();
        seen.push(ex.ready_state());
        ex.append_data(b"a").unwrap();
        seen.push(ex.ready_state());
        ex.append_data(b"b").unwrap();
        seen.push(ex.ready_state());
        ex.finish().unwrap();
        seen.push(ex.ready_state());

        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.iter().filter(|s| s.is_done()).count(), 1);
        assert!(!ex.is_connected());
        assert_eq!(ex.download_progress(), 1.0);
    }

    #[test]
    fn chunks_are_concatenated_in_order() {
        let ex = at_headers(&[]);
        let chunks: [&[u8]; 4] = [b"al", b"pha", b"", b"bet"];
        for c in chunks {
            ex.append_data(c).unwrap();
        }
        assert_eq!(ex.response_data(), b"alphabet".to_vec());
        assert_eq!(ex.body_len(), 8);
    }

    #[test]
    fn response_head_populates_metadata() {
        let ex = HttpExchange::new();
        ex.set_request(request("https://example.com/old")).unwrap();
        assert_eq!(ex.url().unwrap().as_str(), "https://example.com/old");
        assert!(ex.status().is_none());

        ex.open().unwrap();
        let meta = response(302, &[("location", "/new?x=1"), ("connection", "keep-alive")])
            .with_url(Url::parse("https://example.com/final").unwrap());
        ex.set_response(meta).unwrap();

        assert_eq!(ex.ready_state(), ReadyState::Headers);
        assert_eq!(ex.status(), Some(302));
        assert_eq!(ex.status_text().as_deref(), Some("Found"));
        assert_eq!(ex.url().unwrap().as_str(), "https://example.com/final");
        assert_eq!(ex.connection_type().as_deref(), Some("keep-alive"));
        assert_eq!(ex.location().as_deref(), Some("/new?x=1"));
        assert_eq!(ex.location_url().unwrap().as_str(), "https://example.com/new?x=1");
        assert_eq!(ex.header("Connection").as_deref(), Some("keep-alive"));
        assert_eq!(ex.request().unwrap().method, Method::GET);
    }

    #[test]
    fn response_without_url_keeps_request_url() {
        let ex = at_headers(&[]);
        assert_eq!(ex.url().unwrap().as_str(), "https://example.com/api");
    }

    #[test]
    fn no_content_scenario() {
        let ex = HttpExchange::new();
        ex.set_request(request("https://example.com/ping")).unwrap();
        ex.open().unwrap();
        ex.set_response(response(204, &[])).unwrap();
        ex.finish().unwrap();

        assert_eq!(ex.status(), Some(204));
        assert_eq!(ex.ready_state(), ReadyState::Done);
        assert_eq!(ex.response_data(), Vec::<u8>::new());
        assert!(ex.error().is_none());
    }

    #[test]
    fn dictionary_from_split_chunks() {
        let ex = at_headers(&[("content-type", "application/json")]);
        ex.append_data(b"{\"x\":").unwrap();
        ex.append_data(b"1").unwrap();
        ex.append_data(b"}").unwrap();
        ex.finish().unwrap();

        let dict = ex.response_dictionary().unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get("x"), Some(&json!(1)));
    }

    #[test]
    fn dictionary_parse_failure_is_reported() {
        let ex = at_headers(&[]);
        ex.append_data(b"not json").unwrap();

        assert!(matches!(ex.response_dictionary(), Err(MaterializeError::Parse(_))));
        assert!(matches!(ex.response_array(), Err(MaterializeError::Parse(_))));
        // buffer and state are untouched
        assert_eq!(ex.response_data(), b"not json".to_vec());
        assert_eq!(ex.ready_state(), ReadyState::Loading);
        assert!(ex.error().is_none());
    }

    #[test]
    fn array_and_typed_views() {
        let ex = at_headers(&[]);
        ex.append_data(br#"[{"id":1},{"id":2}]"#).unwrap();

        let arr = ex.response_array().unwrap();
        assert_eq!(arr, vec![json!({"id": 1}), json!({"id": 2})]);
        assert!(matches!(
            ex.response_dictionary(),
            Err(MaterializeError::UnexpectedShape { expected: "object", found: "array" })
        ));

        #[derive(serde::Deserialize)]
        struct Item {
            id: u32,
        }
        let items: Vec<Item> = ex.response_json().unwrap();
        assert_eq!(items.iter().map(|i| i.id).sum::<u32>(), 3);
    }

    #[test]
    fn encoding_override_changes_string_view_only() {
        let ex = at_headers(&[("content-type", "text/plain; charset=utf-8")]);
        ex.append_data("naïve".as_bytes()).unwrap();
        assert_eq!(ex.encoding(), encoding_rs::UTF_8);
        assert_eq!(ex.response_string(), "naïve");

        ex.set_encoding("windows-1252").unwrap();
        assert_eq!(ex.response_string(), "naÃ¯ve");
        assert_eq!(ex.response_data(), "naïve".as_bytes().to_vec());

        ex.set_encoding_override(None);
        assert_eq!(ex.response_string(), "naïve");

        assert!(matches!(ex.set_encoding("bogus"), Err(ExchangeError::UnknownEncoding(_))));
    }

    #[test]
    fn declared_charset_is_used_when_no_override() {
        let ex = at_headers(&[("content-type", "text/plain; charset=iso-8859-1")]);
        ex.append_data(&[0x63, 0x61, 0x66, 0xE9]).unwrap();
        assert_eq!(ex.response_string(), "café");
    }

    #[test]
    fn unknown_declared_charset_falls_back_to_default() {
        let cfg = ExchangeConfig::builder().default_encoding("latin1").build().unwrap();
        let ex = HttpExchange::with_config(&cfg).unwrap();
        ex.set_request(request("https://example.com/")).unwrap();
        ex.open().unwrap();
        ex.set_response(response(200, &[("content-type", "text/plain; charset=x-nonsense")])).unwrap();
        ex.append_data(&[0xE9]).unwrap();

        assert_eq!(ex.encoding(), encoding_rs::WINDOWS_1252);
        assert_eq!(ex.response_string(), "é");
    }

    #[test]
    fn failure_from_every_live_state() {
        let steps: [fn(&HttpExchange); 4] = [
            |_| {},
            |ex| ex.open().unwrap(),
            |ex| {
                ex.open().unwrap();
                ex.set_response(response(200, &[])).unwrap();
            },
            |ex| {
                ex.open().unwrap();
                ex.set_response(response(200, &[])).unwrap();
                ex.append_data(b"partial").unwrap();
            },
        ];

        for (i, advance) in steps.iter().enumerate() {
            let ex = HttpExchange::new();
            advance(&ex);
            let body_before = ex.response_data();

            ex.fail(TransportError::new(TransportErrorKind::Connection, "reset by peer")).unwrap();

            assert_eq!(ex.ready_state(), ReadyState::Done, "step {i}");
            assert!(!ex.is_connected(), "step {i}");
            assert_eq!(ex.error().unwrap().kind, TransportErrorKind::Connection);
            assert_eq!(ex.response_data(), body_before, "partial data is kept");
        }
    }

    #[test]
    fn nothing_mutates_after_done() {
        let ex = at_headers(&[]);
        ex.append_data(b"x").unwrap();
        ex.finish().unwrap();

        assert!(matches!(
            ex.append_data(b"y"),
            Err(ExchangeError::InvalidTransition { op: "append_data", state: ReadyState::Done })
        ));
        assert!(ex.finish().is_err());
        assert!(ex.fail(TransportError::cancelled()).is_err());
        assert!(ex.set_response(response(200, &[])).is_err());
        assert_eq!(ex.response_data(), b"x".to_vec());
        assert!(ex.error().is_none());
    }

    #[test]
    fn out_of_order_calls_are_misuse() {
        let ex = HttpExchange::new();
        assert!(matches!(
            ex.append_data(b"early"),
            Err(ExchangeError::InvalidTransition { state: ReadyState::Unsent, .. })
        ));
        assert!(ex.set_response(response(200, &[])).is_err());
        assert!(ex.finish().is_err());

        ex.set_request(request("https://example.com/")).unwrap();
        assert!(matches!(ex.set_request(request("https://example.com/")), Err(ExchangeError::RequestAlreadySet)));

        ex.open().unwrap();
        assert!(ex.open().is_err());
        assert!(ex.set_request(request("https://example.com/")).is_err());
        assert!(ex.append_data(b"early").is_err());
        assert!(matches!(ex.finish(), Err(ExchangeError::InvalidTransition { op: "finish", .. })));

        ex.set_response(response(200, &[])).unwrap();
        assert!(matches!(ex.set_response(response(500, &[])), Err(ExchangeError::ResponseAlreadySet)));
        assert_eq!(ex.status(), Some(200));
        assert_eq!(ex.ready_state(), ReadyState::Headers);
    }

    #[test]
    fn download_progress_follows_content_length() {
        let ex = at_headers(&[("content-length", "8")]);
        assert_eq!(ex.expected_length(), Some(8));
        assert_eq!(ex.download_progress(), 0.0);

        ex.append_data(b"12").unwrap();
        assert_eq!(ex.download_progress(), 0.25);
        ex.append_data(b"345678").unwrap();
        assert_eq!(ex.download_progress(), 1.0);
    }

    #[test]
    fn upload_progress_is_monotonic() {
        let ex = HttpExchange::new();
        ex.update_upload_progress(50, 100);
        ex.set_upload_progress(0.1);
        assert_eq!(ex.upload_progress(), 0.5);
        ex.set_download_progress(2.0);
        assert_eq!(ex.download_progress(), 1.0);
    }

    #[test]
    fn body_limit_rejects_without_corrupting() {
        let cfg = ExchangeConfig::builder().max_body_size(4).build().unwrap();
        let ex = HttpExchange::with_config(&cfg).unwrap();
        ex.open().unwrap();
        ex.set_response(response(200, &[])).unwrap();

        ex.append_data(b"abc").unwrap();
        assert!(matches!(
            ex.append_data(b"de"),
            Err(ExchangeError::BodyLimitExceeded { limit: 4, attempted: 5 })
        ));
        assert_eq!(ex.response_data(), b"abc".to_vec());
        ex.append_data(b"d").unwrap();
        assert_eq!(ex.body_len(), 4);
    }

    #[test]
    fn readers_never_see_torn_appends() {
        let ex = at_headers(&[]).into_handle();
        const CHUNK: &[u8] = b"0123456789";

        let writer = {
            let ex = ex.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    ex.append_data(CHUNK).unwrap();
                }
                ex.finish().unwrap();
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let ex = ex.clone();
                std::thread::spawn(move || loop {
                    let snap = ex.snapshot();
                    let data = ex.response_data();
                    assert_eq!(snap.body_len % CHUNK.len(), 0);
                    assert_eq!(data.len() % CHUNK.len(), 0);
                    assert!(data.chunks(CHUNK.len()).all(|c| c == CHUNK));
                    if snap.ready_state.is_done() {
                        break;
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(ex.body_len(), 5000);
    }

    #[test]
    fn snapshot_serializes_for_consumers() {
        let ex = at_headers(&[("set-cookie", "a=1"), ("set-cookie", "b=2"), ("content-type", "text/plain")]);
        ex.append_data(b"hi").unwrap();
        ex.fail(TransportError::new(TransportErrorKind::TimedOut, "slow")).unwrap();

        let snap = ex.snapshot();
        assert_eq!(snap.ready_state, ReadyState::Done);
        assert_eq!(snap.encoding, "UTF-8");
        assert_eq!(snap.headers.as_ref().unwrap().get("set-cookie").map(String::as_str), Some("a=1, b=2"));

        let v = serde_json::to_value(&snap).unwrap();
        assert_eq!(v["ready_state"], json!("Done"));
        assert_eq!(v["status"], json!(200));
        assert_eq!(v["body_len"], json!(2));
        assert_eq!(v["error"]["kind"], json!("TimedOut"));
        assert_eq!(v["connected"], json!(false));
    }

    #[test]
    fn invalid_config_encoding_is_rejected() {
        let cfg = ExchangeConfig {
            default_encoding: "???".into(),
            ..ExchangeConfig::default()
        };
        assert!(matches!(
            HttpExchange::with_config(&cfg),
            Err(ExchangeError::InvalidConfig(ConfigError::UnknownEncoding(_)))
        ));
    }

    #[test]
    fn zero_body_limit_in_struct_literal_is_rejected() {
        let cfg = ExchangeConfig {
            max_body_size: Some(0),
            ..ExchangeConfig::default()
        };
        assert!(matches!(
            HttpExchange::with_config(&cfg),
            Err(ExchangeError::InvalidConfig(ConfigError::ZeroBodySize))
        ));
    }
}
