//! Authenticated asset download.
//!
//! The body is streamed into `<dest>.part` and renamed to `<dest>` only after
//! the last chunk has been written, so a file under the final name always
//! holds a complete download. Every failure removes the partial file.
//!
//! Success means exactly `200 OK` after redirects. This module never retries;
//! a caller that wants retries wraps [`Downloader::fetch`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{DownloadFailure, InstallError};
use crate::request::Credential;

/// Media type requested for release assets.
pub const ACCEPT_OCTET_STREAM: &str = "application/octet-stream";

/// Time allowed to establish a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed without receiving any data.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

const USER_AGENT_VALUE: &str = concat!("bina/", env!("CARGO_PKG_VERSION"));

/// Tunables for [`Downloader`].
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub connect_timeout: Duration,
    pub inactivity_timeout: Duration,
    /// Optional third header line, sent after `accept` and `authorization`.
    pub extra_header: Option<(String, String)>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            extra_header: None,
        }
    }
}

/// HTTP client configured for one installation run.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    headers: HeaderMap,
    connect_timeout: Duration,
    inactivity_timeout: Duration,
}

impl Downloader {
    /// Creates a downloader. The authorization header is attached only when a
    /// credential is given.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::HttpClient`] if the client cannot be built and
    /// [`InstallError::InvalidHeader`] if a header value is not valid HTTP.
    pub fn new(
        credential: Option<&Credential>,
        options: &DownloadOptions,
    ) -> Result<Self, InstallError> {
        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()
            .map_err(InstallError::HttpClient)?;

        let headers = build_headers(credential, options.extra_header.as_ref())?;

        Ok(Self {
            client,
            headers,
            connect_timeout: options.connect_timeout,
            inactivity_timeout: options.inactivity_timeout,
        })
    }

    /// Downloads `url` to `dest` and returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::DownloadFailed`] for a non-200 status, network
    /// failure, timeout or local write error, and [`InstallError::Cancelled`]
    /// if `cancel` fires first. `dest` does not exist after an error.
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, InstallError> {
        let partial = partial_path(dest);
        debug!(url, dest = %dest.display(), "downloading");

        match self.fetch_into(url, &partial, cancel).await {
            Ok(written) => {
                tokio::fs::rename(&partial, dest).await.map_err(|source| {
                    InstallError::download(
                        url,
                        DownloadFailure::Io {
                            path: dest.to_path_buf(),
                            source,
                        },
                    )
                })?;
                debug!(bytes = written, "download complete");
                Ok(written)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }

    async fn fetch_into(
        &self,
        url: &str,
        partial: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, InstallError> {
        let request = self.client.get(url).headers(self.headers.clone());

        let response = tokio::select! {
            () = cancel.cancelled() => return Err(InstallError::Cancelled),
            response = tokio::time::timeout(self.inactivity_timeout, request.send()) => response,
        };
        let response = match response {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(self.request_error(url, e)),
            Err(_) => {
                return Err(InstallError::download(
                    url,
                    DownloadFailure::Timeout(self.inactivity_timeout),
                ));
            }
        };

        if response.status() != StatusCode::OK {
            return Err(InstallError::download(
                url,
                DownloadFailure::HttpStatus(response.status().as_u16()),
            ));
        }

        let io_error = |source| {
            InstallError::download(
                url,
                DownloadFailure::Io {
                    path: partial.to_path_buf(),
                    source,
                },
            )
        };

        let mut file = tokio::fs::File::create(partial).await.map_err(io_error)?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => return Err(InstallError::Cancelled),
                next = tokio::time::timeout(self.inactivity_timeout, stream.next()) => next,
            };
            let chunk = match next {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => return Err(self.request_error(url, e)),
                Ok(None) => break,
                Err(_) => {
                    return Err(InstallError::download(
                        url,
                        DownloadFailure::Timeout(self.inactivity_timeout),
                    ));
                }
            };
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(io_error)?;
        Ok(written)
    }

    fn request_error(&self, url: &str, e: reqwest::Error) -> InstallError {
        let failure = if e.is_timeout() {
            DownloadFailure::Timeout(if e.is_connect() {
                self.connect_timeout
            } else {
                self.inactivity_timeout
            })
        } else {
            DownloadFailure::Network(e)
        };
        InstallError::download(url, failure)
    }
}

/// Builds the ordered header set: accept, authorization, spare.
fn build_headers(
    credential: Option<&Credential>,
    extra: Option<&(String, String)>,
) -> Result<HeaderMap, InstallError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_OCTET_STREAM));

    if let Some(credential) = credential {
        debug!("adding credential to download requests");
        let mut value = HeaderValue::from_str(&credential.authorization())
            .map_err(|_| InstallError::InvalidHeader(AUTHORIZATION.to_string()))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    if let Some((name, value)) = extra {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| InstallError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| InstallError::InvalidHeader(name.clone()))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::resolve_credential;
    use mockito::{Matcher, Server};

    fn downloader(token: Option<&str>) -> Downloader {
        let credential = resolve_credential(token, None);
        Downloader::new(credential.as_ref(), &DownloadOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn ok_response_writes_exact_bytes() {
        let body: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/asset.tar.gz")
            .match_header("accept", ACCEPT_OCTET_STREAM)
            .with_status(200)
            .with_body(body.clone())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("asset.tar.gz");
        let url = format!("{}/asset.tar.gz", server.url());

        let written = downloader(None)
            .fetch(&url, &dest, &CancellationToken::new())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn non_ok_status_leaves_no_file() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/missing.tar.gz")
            .with_status(404)
            .with_body("Not Found")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.tar.gz");
        let url = format!("{}/missing.tar.gz", server.url());

        let err = downloader(None)
            .fetch(&url, &dest, &CancellationToken::new())
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.http_status(), Some(404));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn success_status_other_than_200_is_failure() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/partial")
            .with_status(206)
            .with_body("abc")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("partial");
        let url = format!("{}/partial", server.url());

        let err = downloader(None)
            .fetch(&url, &dest, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), Some(206));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn credential_is_sent_as_token_authorization() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/private.zip")
            .match_header("authorization", "token s3cr3t")
            .with_status(200)
            .with_body("zip")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("private.zip");
        let url = format!("{}/private.zip", server.url());

        downloader(Some("s3cr3t"))
            .fetch(&url, &dest, &CancellationToken::new())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn no_authorization_without_credential() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/public.zip")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body("zip")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("public.zip");
        let url = format!("{}/public.zip", server.url());

        downloader(None)
            .fetch(&url, &dest, &CancellationToken::new())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn extra_header_is_sent() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/asset")
            .match_header("x-bina-run", "1")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let options = DownloadOptions {
            extra_header: Some(("x-bina-run".to_string(), "1".to_string())),
            ..DownloadOptions::default()
        };
        let downloader = Downloader::new(None, &options).unwrap();
        let dir = tempfile::tempdir().unwrap();
        downloader
            .fetch(
                &format!("{}/asset", server.url()),
                &dir.path().join("asset"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn redirects_are_followed() {
        let mut server = Server::new_async().await;
        let target = format!("{}/storage/asset.tgz", server.url());
        let _redirect = server
            .mock("GET", "/releases/asset.tgz")
            .with_status(302)
            .with_header("location", &target)
            .create_async()
            .await;
        let _storage = server
            .mock("GET", "/storage/asset.tgz")
            .with_status(200)
            .with_body("payload")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("asset.tgz");
        downloader(None)
            .fetch(
                &format!("{}/releases/asset.tgz", server.url()),
                &dest,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn connection_refused_is_network_failure() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("asset.tar.gz");

        let err = downloader(None)
            .fetch(
                "http://127.0.0.1:1/asset.tar.gz",
                &dest,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            InstallError::DownloadFailed {
                kind: DownloadFailure::Network(_),
                ..
            }
        ));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn stalled_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let options = DownloadOptions {
            inactivity_timeout: Duration::from_millis(300),
            ..DownloadOptions::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("asset.tar.gz");
        let err = Downloader::new(None, &options)
            .unwrap()
            .fetch(
                &format!("http://{addr}/asset.tar.gz"),
                &dest,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        server.abort();

        assert!(matches!(
            err,
            InstallError::DownloadFailed {
                kind: DownloadFailure::Timeout(window),
                ..
            } if window == Duration::from_millis(300)
        ));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn truncated_body_removes_partial_file() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\n0123456789")
                .await
                .unwrap();
            socket.flush().await.unwrap();
        });

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("asset.tar.gz");
        let err = downloader(None)
            .fetch(
                &format!("http://{addr}/asset.tar.gz"),
                &dest,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        server.await.unwrap();

        assert!(matches!(
            err,
            InstallError::DownloadFailed {
                kind: DownloadFailure::Network(_),
                ..
            }
        ));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn cancelled_token_aborts_download() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/asset")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("asset");
        let err = downloader(None)
            .fetch(&format!("{}/asset", server.url()), &dest, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Cancelled));
        assert!(!dest.exists());
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/tmp/x/tool.tar.gz")),
            PathBuf::from("/tmp/x/tool.tar.gz.part")
        );
    }

    #[test]
    fn invalid_extra_header_is_rejected() {
        let options = DownloadOptions {
            extra_header: Some(("bad header".to_string(), "v".to_string())),
            ..DownloadOptions::default()
        };
        let err = Downloader::new(None, &options).unwrap_err();
        assert!(matches!(err, InstallError::InvalidHeader(name) if name == "bad header"));
    }
}
