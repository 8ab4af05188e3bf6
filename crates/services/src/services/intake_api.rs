//! HTTP client for the intake endpoints, used by quiz front-ends.

use std::time::Duration;

use async_trait::async_trait;
use db::models::intake_session::IntakeSessionView;
use reqwest::{Client, Method};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;
use url::Url;
use utils::response::ApiResponse;
use uuid::Uuid;

use super::{
    autosave::RemoteIntakeStore,
    intake::{CompleteIntakeRequest, CompleteIntakeResponse, SaveIntakeRequest},
};

pub const SAVE_TIMEOUT: Duration = Duration::from_secs(5);
pub const COMPLETE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Error)]
pub enum IntakeApiError {
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
    #[error("timeout")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },
    #[error("invalid response: {0}")]
    Decode(String),
}

impl IntakeApiError {
    /// Short message suitable for showing to the person filling in the quiz.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout => "The server took too long to respond. Your answers are kept locally.".to_string(),
            Self::Network(_) | Self::InvalidUrl(_) => {
                "Could not reach the server. Your answers are kept locally.".to_string()
            }
            Self::Server { .. } => {
                "The server ran into a problem. Your answers are kept locally.".to_string()
            }
            Self::Http { message, .. } => message.clone(),
            Self::Decode(_) => "The server sent an unexpected response.".to_string(),
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> IntakeApiError {
    if e.is_timeout() {
        IntakeApiError::Timeout
    } else if e.is_decode() {
        IntakeApiError::Decode(e.to_string())
    } else {
        IntakeApiError::Network(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct IntakeApiClient {
    http: Client,
    base_url: Url,
    save_timeout: Duration,
    complete_timeout: Duration,
}

impl IntakeApiClient {
    pub fn new(base_url: &str) -> Result<Self, IntakeApiError> {
        let base_url = Url::parse(base_url).map_err(|e| IntakeApiError::InvalidUrl(e.to_string()))?;
        let http = Client::builder()
            .user_agent(concat!("energiewijzer-intake/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IntakeApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            save_timeout: SAVE_TIMEOUT,
            complete_timeout: COMPLETE_TIMEOUT,
        })
    }

    pub fn with_timeouts(mut self, save: Duration, complete: Duration) -> Self {
        self.save_timeout = save;
        self.complete_timeout = complete;
        self
    }

    pub async fn save(&self, request: &SaveIntakeRequest) -> Result<IntakeSessionView, IntakeApiError> {
        self.send(Method::POST, "/api/intake/save", Some(request), self.save_timeout)
            .await?
            .ok_or_else(|| IntakeApiError::Decode("missing session in response".to_string()))
    }

    pub async fn complete(
        &self,
        request: &CompleteIntakeRequest,
    ) -> Result<CompleteIntakeResponse, IntakeApiError> {
        self.send(
            Method::POST,
            "/api/intake/complete",
            Some(request),
            self.complete_timeout,
        )
        .await?
        .ok_or_else(|| IntakeApiError::Decode("missing profile in response".to_string()))
    }

    /// Previously saved session, for resuming.
    pub async fn load(&self, session_id: Uuid) -> Result<Option<IntakeSessionView>, IntakeApiError> {
        self.send::<(), _>(
            Method::GET,
            &format!("/api/intake/sessions/{session_id}"),
            None,
            self.save_timeout,
        )
        .await
    }

    async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        timeout: Duration,
    ) -> Result<Option<T>, IntakeApiError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| IntakeApiError::InvalidUrl(e.to_string()))?;
        debug!(%url, %method, "Intake API request");

        let mut builder = self.http.request(method, url).timeout(timeout);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let res = builder.send().await.map_err(map_reqwest_error)?;
        let status = res.status();
        let text = res.text().await.map_err(map_reqwest_error)?;

        if status.is_success() {
            let envelope: ApiResponse<T> =
                serde_json::from_str(&text).map_err(|e| IntakeApiError::Decode(e.to_string()))?;
            return Ok(envelope.into_data());
        }

        let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&text)
            .ok()
            .and_then(|envelope| envelope.message().map(str::to_string))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        let status = status.as_u16();
        if (500..=599).contains(&status) {
            Err(IntakeApiError::Server { status, message })
        } else {
            Err(IntakeApiError::Http { status, message })
        }
    }
}

#[async_trait]
impl RemoteIntakeStore for IntakeApiClient {
    async fn save(&self, snapshot: &SaveIntakeRequest) -> Result<(), IntakeApiError> {
        IntakeApiClient::save(self, snapshot).await.map(|_| ())
    }

    async fn complete(
        &self,
        request: &CompleteIntakeRequest,
    ) -> Result<CompleteIntakeResponse, IntakeApiError> {
        IntakeApiClient::complete(self, request).await
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;

    /// Serves one canned HTTP response per connection.
    async fn canned_server(status_line: &'static str, body: String, delay: Duration) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let body = body.clone();
                tokio::spawn(async move {
                    read_request(&mut socket).await;
                    tokio::time::sleep(delay).await;
                    let response = format!(
                        "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        addr
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let Ok(n) = socket.read(&mut chunk).await else { return };
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    fn snapshot() -> SaveIntakeRequest {
        SaveIntakeRequest {
            session_id: Uuid::new_v4(),
            user_id: None,
            responses: Default::default(),
            current_step: "goals".to_string(),
            disciplines: vec![],
        }
    }

    #[tokio::test]
    async fn test_server_errors_are_classified() {
        let addr = canned_server(
            "503 Service Unavailable",
            r#"{"success":false,"data":null,"error_data":null,"message":"database unavailable"}"#.to_string(),
            Duration::ZERO,
        )
        .await;
        let client = IntakeApiClient::new(&format!("http://{addr}")).unwrap();

        let err = client.save(&snapshot()).await.unwrap_err();
        assert!(matches!(
            &err,
            IntakeApiError::Server { status: 503, message } if message == "database unavailable"
        ));
        assert!(err.user_message().contains("server"));
    }

    #[tokio::test]
    async fn test_client_errors_surface_the_server_message() {
        let addr = canned_server(
            "422 Unprocessable Entity",
            r#"{"success":false,"data":null,"error_data":null,"message":"postcode has an invalid format"}"#.to_string(),
            Duration::ZERO,
        )
        .await;
        let client = IntakeApiClient::new(&format!("http://{addr}")).unwrap();

        let err = client.save(&snapshot()).await.unwrap_err();
        assert_eq!(err.user_message(), "postcode has an invalid format");
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let addr = canned_server("200 OK", "{}".to_string(), Duration::from_secs(5)).await;
        let client = IntakeApiClient::new(&format!("http://{addr}"))
            .unwrap()
            .with_timeouts(Duration::from_millis(100), Duration::from_millis(100));

        let err = client.save(&snapshot()).await.unwrap_err();
        assert!(matches!(err, IntakeApiError::Timeout));
        assert!(err.user_message().contains("too long"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = IntakeApiClient::new(&format!("http://{addr}")).unwrap();
        let err = client.save(&snapshot()).await.unwrap_err();
        assert!(matches!(err, IntakeApiError::Network(_)));
        assert!(err.user_message().contains("reach"));
    }

    #[tokio::test]
    async fn test_successful_response_is_decoded() {
        let addr = canned_server(
            "200 OK",
            r#"{"success":true,"data":null,"error_data":null,"message":null}"#.to_string(),
            Duration::ZERO,
        )
        .await;
        let client = IntakeApiClient::new(&format!("http://{addr}")).unwrap();
        assert!(client.load(Uuid::new_v4()).await.unwrap().is_none());
    }
}
