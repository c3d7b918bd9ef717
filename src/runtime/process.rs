// ABOUTME: Local-process runtime: start directives run as commands.
// ABOUTME: Implements HTTP, TCP, and exec readiness probes.

use super::{ProbeOutcome, Runtime, RuntimeError, StartOutcome};
use crate::manifest::{ProbeTarget, StartDirective};
use crate::types::UnitName;
use async_trait::async_trait;
use http_body_util::Empty;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};

/// Runtime that executes start directives as local commands. This is the
/// compose-wrapper shape: the directive itself knows how to bring the unit
/// up (usually `docker compose up -d <service>`).
pub struct ProcessRuntime {
    // Children are retained so launched processes get reaped, and surface in
    // no other way: directives are expected to detach themselves.
    children: Mutex<Vec<Child>>,
}

impl ProcessRuntime {
    pub fn new() -> Self {
        Self {
            children: Mutex::new(Vec::new()),
        }
    }
}

impl Default for ProcessRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runtime for ProcessRuntime {
    async fn start(
        &self,
        unit: &UnitName,
        directive: &StartDirective,
        env: &HashMap<String, String>,
    ) -> Result<StartOutcome, RuntimeError> {
        tracing::debug!("Starting {} via `{}`", unit, directive);

        let spawned = Command::new(directive.program())
            .args(directive.args())
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false)
            .spawn();

        match spawned {
            Ok(child) => {
                self.children.lock().push(child);
                Ok(StartOutcome::Accepted)
            }
            // Spawn failure (program missing, permission denied) is a
            // rejection of the directive, not an orchestrator fault.
            Err(e) => Ok(StartOutcome::Rejected(e.to_string())),
        }
    }

    async fn probe(&self, unit: &UnitName, target: &ProbeTarget) -> ProbeOutcome {
        let outcome = match target {
            ProbeTarget::Http {
                http,
                expect_status,
            } => probe_http(http, *expect_status).await,
            ProbeTarget::Tcp { tcp } => probe_tcp(tcp).await,
            ProbeTarget::Exec { exec } => probe_exec(exec).await,
        };

        if let ProbeOutcome::Fail(ref reason) = outcome {
            tracing::debug!("Probe attempt for {} failed: {}", unit, reason);
        }

        outcome
    }
}

/// Split an `http://host[:port]/path` URL. Only plain HTTP is supported;
/// readiness endpoints behind TLS should use a tcp or exec probe instead.
fn split_http_url(url: &str) -> Result<(String, u16, String), RuntimeError> {
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| RuntimeError::InvalidProbe(format!("expected http:// URL, got {url}")))?;

    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], rest[i..].to_string()),
        None => (rest, "/".to_string()),
    };

    // IPv6 literals carry brackets in the URL but not in the host handed to
    // the connector, e.g. http://[::1]:8080/health probes ::1 port 8080.
    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, after) = bracketed
            .split_once(']')
            .ok_or_else(|| RuntimeError::InvalidProbe(format!("unclosed '[' in {url}")))?;
        let port = match after.strip_prefix(':') {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| RuntimeError::InvalidProbe(format!("invalid port in {url}")))?,
            None if after.is_empty() => 80,
            None => {
                return Err(RuntimeError::InvalidProbe(format!(
                    "unexpected characters after ']' in {url}"
                )));
            }
        };
        (host.to_string(), port)
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| RuntimeError::InvalidProbe(format!("invalid port in {url}")))?;
                (host.to_string(), port)
            }
            None => (authority.to_string(), 80),
        }
    };

    if host.is_empty() {
        return Err(RuntimeError::InvalidProbe(format!("missing host in {url}")));
    }

    Ok((host, port, path))
}

async fn probe_http(url: &str, expect_status: u16) -> ProbeOutcome {
    let (host, port, path) = match split_http_url(url) {
        Ok(parts) => parts,
        Err(e) => return ProbeOutcome::Fail(e.to_string()),
    };

    let stream = match TcpStream::connect((host.as_str(), port)).await {
        Ok(s) => s,
        Err(e) => return ProbeOutcome::Fail(format!("connect {host}:{port}: {e}")),
    };

    let io = TokioIo::new(stream);
    let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
        Ok(pair) => pair,
        Err(e) => return ProbeOutcome::Fail(format!("HTTP handshake failed: {e}")),
    };

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("Probe connection error: {}", e);
        }
    });

    // IPv6 hosts are re-bracketed in the Host header, the inverse of the
    // stripping done for the connector.
    let host_header = if host.contains(':') {
        format!("[{host}]")
    } else {
        host.clone()
    };

    let req = match hyper::Request::builder()
        .method("GET")
        .uri(&path)
        .header("Host", &host_header)
        .body(Empty::<bytes::Bytes>::new())
    {
        Ok(req) => req,
        Err(e) => return ProbeOutcome::Fail(format!("failed to build request: {e}")),
    };

    match sender.send_request(req).await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            if status == expect_status {
                ProbeOutcome::Pass
            } else {
                ProbeOutcome::Fail(format!("expected status {expect_status}, got {status}"))
            }
        }
        Err(e) => ProbeOutcome::Fail(format!("request failed: {e}")),
    }
}

async fn probe_tcp(addr: &str) -> ProbeOutcome {
    match TcpStream::connect(addr).await {
        Ok(_) => ProbeOutcome::Pass,
        Err(e) => ProbeOutcome::Fail(format!("connect {addr}: {e}")),
    }
}

async fn probe_exec(argv: &[String]) -> ProbeOutcome {
    let Some((program, args)) = argv.split_first() else {
        return ProbeOutcome::Fail("empty exec probe".to_string());
    };

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => ProbeOutcome::Pass,
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            ProbeOutcome::Fail(format!(
                "exit code {:?}: {}",
                output.status.code(),
                stderr.trim()
            ))
        }
        Err(e) => ProbeOutcome::Fail(format!("failed to execute probe: {e}")),
    }
}
