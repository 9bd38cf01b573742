use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{self, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde_json::Value;
use tokio::time::Sleep;
use url::Url;

use crate::accumulator::ByteStream;
use crate::client_logger::ClientLogger;
use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_PROBE_FAILURES, CLIENT_PROBES, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS,
    CLIENT_REQUESTS,
};
use crate::types::{ChatRequest, ValidationStatus};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// The network collaborator used by the session.
///
/// Implementations convert every failure into an [`Error`]; nothing
/// transport-specific crosses this boundary.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Sends one chat request and returns its body once a success status arrives.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream>;

    /// Issues a read-only authenticated request against the model listing.
    async fn probe(&self, credential: &str) -> Result<()>;
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream> {
        (**self).open_stream(request).await
    }

    async fn probe(&self, credential: &str) -> Result<()> {
        (**self).probe(credential).await
    }
}

/// HTTP client for the chat proxy and the provider's model listing.
///
/// The timeout bounds connecting, waiting for response headers, and each gap
/// between body chunks. A reply that keeps arriving is never cut off.
#[derive(Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    endpoint: Url,
    models_url: Url,
    timeout: Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl ChatClient {
    /// Create a client from a resolved configuration.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        Self::with_options(&config.endpoint, &config.models_url, Some(config.timeout))
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        endpoint: &str,
        models_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        let models_url = Url::parse(models_url)?;
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            endpoint,
            models_url,
            timeout,
            logger: None,
        })
    }

    /// Attaches a logger that observes every request.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The chat endpoint requests are POSTed to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The model listing used to probe credentials.
    pub fn models_url(&self) -> &Url {
        &self.models_url
    }

    /// Send a chat request and return its streamed body.
    ///
    /// Fails before any body is read if the request cannot be sent or the
    /// status is not a success.
    pub async fn stream(&self, request: &ChatRequest) -> Result<ByteStream> {
        CLIENT_REQUESTS.click();
        if let Some(logger) = &self.logger {
            logger.log_request(request);
        }

        let start = Instant::now();
        let sent = tokio::time::timeout(
            self.timeout,
            self.client
                .post(self.endpoint.clone())
                .header(
                    header::ACCEPT,
                    HeaderValue::from_static("text/plain, text/event-stream"),
                )
                .json(request)
                .send(),
        )
        .await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        let response = match sent {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(self.record_error(self.map_send_error(e))),
            Err(_) => {
                let err = Error::timeout(
                    "no response headers received",
                    Some(self.timeout.as_secs_f64()),
                );
                return Err(self.record_error(err));
            }
        };
        if !response.status().is_success() {
            let err = Self::process_error_response(response).await;
            return Err(self.record_error(err));
        }
        if let Some(logger) = &self.logger {
            logger.log_stream_opened(response.status().as_u16());
        }

        let body = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
            })
        });
        let logger = self.logger.clone();
        let body = IdleTimeout::new(Box::pin(body), self.timeout).inspect(move |chunk| {
            if let (Err(err), Some(logger)) = (chunk, &logger) {
                logger.log_stream_error(err);
            }
        });
        Ok(Box::pin(body))
    }

    /// Check a credential against the model listing.
    ///
    /// Any success status means the credential works; the body is ignored.
    pub async fn probe_models(&self, credential: &str) -> Result<()> {
        CLIENT_PROBES.click();
        let result = self.send_probe(credential).await;
        let status = if result.is_ok() {
            ValidationStatus::Valid
        } else {
            CLIENT_PROBE_FAILURES.click();
            ValidationStatus::Invalid
        };
        if let Some(logger) = &self.logger {
            logger.log_probe(status);
        }
        result
    }

    async fn send_probe(&self, credential: &str) -> Result<()> {
        let mut authorization = HeaderValue::from_str(&format!("Bearer {credential}"))
            .map_err(|_| {
                Error::validation(
                    "API key contains characters that cannot be sent in a header",
                    Some("api_key".to_string()),
                )
            })?;
        authorization.set_sensitive(true);

        let response = self
            .client
            .get(self.models_url.clone())
            .timeout(self.timeout)
            .header(header::AUTHORIZATION, authorization)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::process_error_response(response).await)
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("{e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    fn record_error(&self, err: Error) -> Error {
        CLIENT_REQUEST_ERRORS.click();
        if let Some(logger) = &self.logger {
            logger.log_stream_error(&err);
        }
        err
    }

    /// Turn a non-success response into an [`Error`] naming its status.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        // The proxy reports `{"detail": ...}`; the provider reports `{"error": {"message": ...}}`.
        let detail = match response.text().await {
            Ok(body) => serde_json::from_str::<Value>(&body).ok().and_then(|value| {
                ["/detail", "/error/message"]
                    .iter()
                    .find_map(|pointer| value.pointer(pointer).and_then(Value::as_str))
                    .map(str::to_string)
            }),
            Err(_) => None,
        };
        let detail = detail.map(|detail| detail.split_whitespace().collect::<Vec<_>>().join(" "));
        let message = match detail {
            Some(detail) if !detail.is_empty() => format!("HTTP status {status_code}: {detail}"),
            _ => format!("HTTP status {status_code}"),
        };

        match status_code {
            429 => Error::rate_limit(message, retry_after),
            _ => Error::from_status(status_code, message),
        }
    }
}

/////////////////////////////////////////////// IdleTimeout ///////////////////////////////////////////////

/// Fails a body that goes `idle` without yielding a chunk, then ends it.
struct IdleTimeout {
    inner: ByteStream,
    idle: Duration,
    deadline: Pin<Box<Sleep>>,
    expired: bool,
}

impl IdleTimeout {
    fn new(inner: ByteStream, idle: Duration) -> Self {
        Self {
            inner,
            idle,
            deadline: Box::pin(tokio::time::sleep(idle)),
            expired: false,
        }
    }
}

impl Stream for IdleTimeout {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.expired {
            return Poll::Ready(None);
        }
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(item) => {
                let next = tokio::time::Instant::now() + this.idle;
                this.deadline.as_mut().reset(next);
                Poll::Ready(item)
            }
            Poll::Pending => match this.deadline.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    this.expired = true;
                    Poll::Ready(Some(Err(Error::timeout(
                        "no data received from the stream",
                        Some(this.idle.as_secs_f64()),
                    ))))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("models_url", &self.models_url.as_str())
            .field("timeout", &self.timeout)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

#[async_trait::async_trait]
impl Transport for ChatClient {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream> {
        self.stream(request).await
    }

    async fn probe(&self, credential: &str) -> Result<()> {
        self.probe_models(credential).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KnownModel, Model};
    use std::io::Write;
    use std::sync::Mutex;

    fn request() -> ChatRequest {
        ChatRequest::new(
            "You are helpful.",
            "Hello",
            Model::Known(KnownModel::Gpt41Mini),
            "sk-test",
        )
    }

    fn client_for(server: &mockito::Server) -> ChatClient {
        ChatClient::with_options(
            &format!("{}/api/chat", server.url()),
            &format!("{}/v1/models", server.url()),
            Some(Duration::from_secs(5)),
        )
        .unwrap()
    }

    async fn read_body(mut body: ByteStream) -> String {
        let mut text = Vec::new();
        while let Some(chunk) = body.next().await {
            text.extend_from_slice(&chunk.unwrap());
        }
        String::from_utf8(text).unwrap()
    }

    #[derive(Default)]
    struct RecordingLogger {
        lines: Mutex<Vec<String>>,
    }

    impl ClientLogger for RecordingLogger {
        fn log_request(&self, request: &ChatRequest) {
            self.lines.lock().unwrap().push(format!("request {request:?}"));
        }

        fn log_stream_opened(&self, status: u16) {
            self.lines.lock().unwrap().push(format!("opened {status}"));
        }

        fn log_stream_error(&self, error: &Error) {
            self.lines.lock().unwrap().push(format!("error {error}"));
        }

        fn log_probe(&self, status: ValidationStatus) {
            self.lines.lock().unwrap().push(format!("probe {status}"));
        }
    }

    #[test]
    fn client_creation() {
        let client = ChatClient::with_options(
            "http://localhost:8000/api/chat",
            "https://api.openai.com/v1/models",
            None,
        )
        .unwrap();
        assert_eq!(client.endpoint().as_str(), "http://localhost:8000/api/chat");
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);

        let client = ChatClient::new(&ChatConfig::default()).unwrap();
        assert_eq!(client.models_url().as_str(), "https://api.openai.com/v1/models");
    }

    #[test]
    fn client_rejects_bad_url() {
        let err = ChatClient::with_options("not a url", "https://example.com", None).unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[tokio::test]
    async fn stream_posts_request_and_returns_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "developer_message": "You are helpful.",
                "user_message": "Hello",
                "model": "gpt-4.1-mini",
                "api_key": "sk-test"
            })))
            .with_status(200)
            .with_header("content-type", "text/plain; charset=utf-8")
            .with_body("Hi there")
            .create_async()
            .await;

        let logger = Arc::new(RecordingLogger::default());
        let client = client_for(&server).with_logger(logger.clone());
        let body = client.stream(&request()).await.unwrap();
        assert_eq!(read_body(body).await, "Hi there");
        mock.assert_async().await;

        let lines = logger.lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("request"));
        assert!(!lines[0].contains("sk-test"));
        assert_eq!(lines[1], "opened 200");
    }

    #[tokio::test]
    async fn stream_maps_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/chat")
            .with_status(401)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.stream(&request()).await.err().unwrap();
        assert!(err.is_authentication());
        assert_eq!(err.to_string(), "Authentication error: HTTP status 401");
    }

    #[tokio::test]
    async fn stream_surfaces_proxy_detail() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/chat")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail": "upstream exploded"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.stream(&request()).await.err().unwrap();
        assert_eq!(err.status_code(), Some(500));
        assert!(err.to_string().contains("upstream exploded"));
    }

    #[tokio::test]
    async fn stream_flattens_multiline_detail() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/chat")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail": "line one\nline two\r\n\tline three"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.stream(&request()).await.err().unwrap();
        assert_eq!(
            err.to_string(),
            "Upstream error: HTTP status 500: line one line two line three"
        );
    }

    #[tokio::test]
    async fn slow_body_outlives_timeout() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/chat")
            .with_status(200)
            .with_chunked_body(|w| {
                for part in [&b"Hi"[..], &b" there"[..], &b"!"[..]] {
                    std::thread::sleep(Duration::from_millis(250));
                    w.write_all(part)?;
                }
                Ok(())
            })
            .create_async()
            .await;

        let client = ChatClient::with_options(
            &format!("{}/api/chat", server.url()),
            &format!("{}/v1/models", server.url()),
            Some(Duration::from_millis(400)),
        )
        .unwrap();
        let body = client.stream(&request()).await.unwrap();
        assert_eq!(read_body(body).await, "Hi there!");
    }

    #[tokio::test]
    async fn stalled_body_times_out() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/chat")
            .with_status(200)
            .with_chunked_body(|w| {
                w.write_all(b"Hi")?;
                std::thread::sleep(Duration::from_millis(1000));
                w.write_all(b" there")
            })
            .create_async()
            .await;

        let logger = Arc::new(RecordingLogger::default());
        let client = ChatClient::with_options(
            &format!("{}/api/chat", server.url()),
            &format!("{}/v1/models", server.url()),
            Some(Duration::from_millis(200)),
        )
        .unwrap()
        .with_logger(logger.clone());
        let mut body = client.stream(&request()).await.unwrap();
        assert_eq!(&body.next().await.unwrap().unwrap()[..], b"Hi");
        let err = body.next().await.unwrap().unwrap_err();
        assert!(err.is_timeout());
        assert!(body.next().await.is_none());
        assert!(logger.lines.lock().unwrap().last().unwrap().starts_with("error Timeout"));
    }

    #[tokio::test]
    async fn stream_rate_limit_carries_retry_after() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/chat")
            .with_status(429)
            .with_header("retry-after", "7")
            .with_body(r#"{"error": {"message": "slow down"}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.stream(&request()).await.err().unwrap();
        match err {
            Error::RateLimit {
                message,
                retry_after,
            } => {
                assert_eq!(message, "HTTP status 429: slow down");
                assert_eq!(retry_after, Some(7));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_connection_refused() {
        let client = ChatClient::with_options(
            "http://127.0.0.1:9/api/chat",
            "http://127.0.0.1:9/v1/models",
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        let err = client.stream(&request()).await.err().unwrap();
        assert!(!err.is_stream_read());
    }

    #[tokio::test]
    async fn probe_sends_bearer_credential() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/models")
            .match_header("authorization", "Bearer sk-good")
            .with_status(200)
            .with_body(r#"{"data": []}"#)
            .create_async()
            .await;

        let logger = Arc::new(RecordingLogger::default());
        let client = client_for(&server).with_logger(logger.clone());
        tokio_test::assert_ok!(client.probe_models("sk-good").await);
        mock.assert_async().await;
        assert_eq!(*logger.lines.lock().unwrap(), vec!["probe valid".to_string()]);
    }

    #[tokio::test]
    async fn probe_rejected_credential() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/models")
            .with_status(401)
            .with_body(r#"{"error": {"message": "Incorrect API key provided"}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = tokio_test::assert_err!(client.probe_models("sk-bad").await);
        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn probe_rejects_unsendable_credential() {
        let client = ChatClient::new(&ChatConfig::default()).unwrap();
        let err = client.probe_models("sk-\nbad").await.unwrap_err();
        assert!(err.is_validation());
    }
}
