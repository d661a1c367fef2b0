// ABOUTME: Downloads an MTA archive from an http:// URL into the local store.
// ABOUTME: Plain HTTP/1.1 over a TCP connection; runs on the URL-fetch pool.

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use super::{FileError, LocalFileStore};
use crate::types::{ArchiveId, SpaceId};

fn fetch_error(url: &str, reason: impl Into<String>) -> FileError {
    FileError::Fetch {
        url: url.to_string(),
        reason: reason.into(),
    }
}

/// Fetch `url` and store the body as a new archive of `space`.
pub async fn fetch_archive(
    url: &str,
    store: &LocalFileStore,
    space: &SpaceId,
) -> Result<ArchiveId, FileError> {
    let uri: hyper::Uri = url
        .parse()
        .map_err(|e| fetch_error(url, format!("invalid URL: {e}")))?;
    if uri.scheme_str() != Some("http") {
        return Err(fetch_error(url, "only http:// URLs are supported"));
    }
    let host = uri
        .host()
        .ok_or_else(|| fetch_error(url, "URL has no host"))?;
    let port = uri.port_u16().unwrap_or(80);

    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| fetch_error(url, format!("failed to connect: {e}")))?;
    let io = TokioIo::new(stream);

    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| fetch_error(url, format!("HTTP handshake failed: {e}")))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::warn!("archive download connection error: {}", e);
        }
    });

    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let authority = uri.authority().map(|a| a.as_str()).unwrap_or(host);
    let req = hyper::Request::builder()
        .method("GET")
        .uri(path)
        .header("Host", authority)
        .body(Empty::<Bytes>::new())
        .map_err(|e| fetch_error(url, format!("failed to build request: {e}")))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| fetch_error(url, format!("request failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(fetch_error(url, format!("server answered {status}")));
    }

    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| fetch_error(url, format!("failed to read response: {e}")))?
        .to_bytes();
    tracing::debug!(url, bytes = body.len(), "downloaded archive");

    let store = store.clone();
    let space = space.clone();
    tokio::task::spawn_blocking(move || store.store(&space, &mut body.as_ref()))
        .await
        .map_err(|e| fetch_error(url, format!("storing archive was interrupted: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::{FileService, process_file_content};
    use std::io::Read;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(status_line: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
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
            let head = format!(
                "{status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
        });
        format!("http://{addr}/archives/app.mtar")
    }

    #[tokio::test]
    async fn downloads_into_store() {
        let url = serve_once("HTTP/1.1 200 OK", b"mtar-bytes").await;
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        let space = SpaceId::new("dev");

        let id = fetch_archive(&url, &store, &space).await.unwrap();
        let content = process_file_content(&store, &space, &id, |reader| {
            let mut bytes = Vec::new();
            reader
                .read_to_end(&mut bytes)
                .map_err(FileError::io("download"))?;
            Ok(bytes)
        })
        .unwrap();
        assert_eq!(content, b"mtar-bytes");
        assert!(store.open(&space, &id).is_ok());
    }

    #[tokio::test]
    async fn error_status_is_a_fetch_error() {
        let url = serve_once("HTTP/1.1 404 Not Found", b"").await;
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        let err = fetch_archive(&url, &store, &SpaceId::new("dev"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn https_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        let err = fetch_archive("https://repo/app.mtar", &store, &SpaceId::new("dev"))
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::Fetch { .. }));
    }
}
