//! Relay client: implements the `RelayConnector` and `RelaySession` ports.
//!
//! Control requests (join, start server, leave) go to the relay endpoint over
//! HTTPS and are authorized with the relay SAS. Forwarded ports are plain
//! loopback listeners; each accepted connection dials the relay stream
//! address, sends a one-line JSON preamble naming the remote port, then
//! copies bytes in both directions.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Mutex;

use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{RelayConnector, RelaySession, RemoteServer, ServerRequest};
use crate::domain::codespace::ConnectionInfo;
use crate::domain::error::ApiError;

/// Opens relay sessions.
#[derive(Debug, Clone, Default)]
pub struct RelayClient {
    http: reqwest::Client,
}

#[derive(Serialize)]
struct JoinRequest<'a> {
    session_token: &'a str,
}

#[derive(Deserialize)]
struct JoinResponse {
    /// `host:port` accepting forwarded streams.
    stream_address: String,
    stream_token: String,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ServerBody<'a> {
    Ssh { authorized_keys: &'a str },
    Notebook,
}

#[derive(Deserialize)]
struct ServerResponse {
    port: u16,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

/// First line written on every forwarded stream.
#[derive(Serialize)]
struct StreamPreamble<'a> {
    session_id: &'a str,
    stream_token: &'a str,
    port: u16,
}

fn encode_preamble(preamble: &StreamPreamble<'_>) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(preamble).context("cannot encode stream preamble")?;
    line.push(b'\n');
    Ok(line)
}

fn session_url(connection: &ConnectionInfo, suffix: &str) -> String {
    format!(
        "{}/sessions/{}{suffix}",
        connection.relay_endpoint.trim_end_matches('/'),
        connection.session_id
    )
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message: message.trim().to_string(),
    }
    .into())
}

impl RelayConnector for RelayClient {
    type Session = RelayConnection;

    async fn open(&self, connection: &ConnectionInfo) -> Result<RelayConnection> {
        let mut headers = HeaderMap::new();
        let sas = HeaderValue::from_str(&format!("SharedAccessSignature {}", connection.relay_sas))
            .context("relay SAS is not a valid header value")?;
        headers.insert(AUTHORIZATION, sas);

        let resp = self
            .http
            .post(session_url(connection, "/join"))
            .headers(headers.clone())
            .json(&JoinRequest {
                session_token: &connection.session_token,
            })
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let joined: JoinResponse = check(resp)
            .await?
            .json()
            .await
            .context("invalid relay join response")?;

        Ok(RelayConnection {
            http: self.http.clone(),
            headers,
            servers_url: session_url(connection, "/servers"),
            leave_url: session_url(connection, "/leave"),
            session_id: connection.session_id.clone(),
            stream_address: joined.stream_address,
            stream_token: joined.stream_token,
            cancel: CancellationToken::new(),
            forwards: Mutex::new(Vec::new()),
        })
    }
}

/// A joined relay session.
///
/// Dropping the connection stops every forwarded port; [`RelaySession::close`]
/// additionally tells the relay the session is over.
pub struct RelayConnection {
    http: reqwest::Client,
    headers: HeaderMap,
    servers_url: String,
    leave_url: String,
    session_id: String,
    stream_address: String,
    stream_token: String,
    cancel: CancellationToken,
    forwards: Mutex<Vec<JoinHandle<()>>>,
}

impl RelayConnection {
    fn stop_forwards(&self) {
        self.cancel.cancel();
        let handles = match self.forwards.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for handle in handles {
            handle.abort();
        }
    }
}

impl Drop for RelayConnection {
    fn drop(&mut self) {
        self.stop_forwards();
    }
}

impl RelaySession for RelayConnection {
    async fn start_server(&self, request: &ServerRequest) -> Result<RemoteServer> {
        let body = match request {
            ServerRequest::Ssh { authorized_keys } => ServerBody::Ssh { authorized_keys },
            ServerRequest::Notebook => ServerBody::Notebook,
        };
        let resp = self
            .http
            .post(&self.servers_url)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let server: ServerResponse = check(resp)
            .await?
            .json()
            .await
            .context("invalid relay server response")?;
        Ok(RemoteServer {
            port: server.port,
            user: server.user,
            token: server.token,
        })
    }

    async fn forward_port(&self, remote_port: u16) -> Result<u16> {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .await
            .context("cannot bind local port")?;
        let local_port = listener.local_addr().context("local port")?.port();

        let preamble = encode_preamble(&StreamPreamble {
            session_id: &self.session_id,
            stream_token: &self.stream_token,
            port: remote_port,
        })?;
        let handle = tokio::spawn(accept_loop(
            listener,
            self.stream_address.clone(),
            preamble,
            self.cancel.child_token(),
        ));
        match self.forwards.lock() {
            Ok(mut guard) => guard.push(handle),
            Err(poisoned) => poisoned.into_inner().push(handle),
        }
        tracing::debug!(local_port, remote_port, "forwarding port");
        Ok(local_port)
    }

    async fn close(&self) -> Result<()> {
        self.stop_forwards();
        let resp = self
            .http
            .post(&self.leave_url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        check(resp).await?;
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    stream_address: String,
    preamble: Vec<u8>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = listener.accept() => match result {
                Ok((local, peer)) => {
                    tracing::debug!(%peer, "accepted forwarded connection");
                    let address = stream_address.clone();
                    let preamble = preamble.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            () = cancel.cancelled() => {}
                            result = bridge(local, &address, &preamble) => {
                                if let Err(e) = result {
                                    tracing::debug!(error = %e, "forwarded connection ended");
                                }
                            }
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed on forwarded port");
                    break;
                }
            }
        }
    }
}

async fn bridge(mut local: TcpStream, stream_address: &str, preamble: &[u8]) -> Result<()> {
    let mut remote = TcpStream::connect(stream_address)
        .await
        .with_context(|| format!("cannot reach relay at {stream_address}"))?;
    remote
        .write_all(preamble)
        .await
        .context("cannot send stream preamble")?;
    tokio::io::copy_bidirectional(&mut local, &mut remote)
        .await
        .context("relay stream failed")?;
    Ok(())
}
