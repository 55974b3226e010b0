//! Probe sources
//!
//! A probe performs one round trip to the target and reports its latency.
//! Every implementation has to honor the timeout it is given; the scheduler
//! additionally wraps each call in its own timeout.

use std::net::{IpAddr, SocketAddr};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::trace;

use crate::config::ProbeConfig;
use crate::error::ProbeError;

#[async_trait]
pub trait Probe: Send + Sync {
    /// Perform one round trip and return its latency.
    async fn probe(&self, address: IpAddr, timeout: Duration) -> Result<Duration, ProbeError>;
}

#[async_trait]
impl Probe for Box<dyn Probe> {
    async fn probe(&self, address: IpAddr, timeout: Duration) -> Result<Duration, ProbeError> {
        (**self).probe(address, timeout).await
    }
}

/// Build the probe selected by the configuration
pub fn build_probe(config: &ProbeConfig) -> Box<dyn Probe> {
    match config {
        ProbeConfig::Icmp => Box::new(IcmpProbe::new()),
        ProbeConfig::Tcp { port } => Box::new(TcpProbe::new(*port)),
    }
}

static RTT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"time[=<]\s*(?P<rtt>\d+(?:\.\d+)?)\s*ms").expect("valid RTT pattern")
});

/// ICMP echo through the system `ping` utility
///
/// Sending raw ICMP needs elevated privileges, the setuid `ping` binary does
/// not.
#[derive(Debug, Clone)]
pub struct IcmpProbe {
    program: String,
}

impl IcmpProbe {
    pub fn new() -> Self {
        Self {
            program: "ping".to_string(),
        }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, address: IpAddr, timeout: Duration) -> Command {
        let mut command = Command::new(&self.program);
        if address.is_ipv6() {
            command.arg("-6");
        }
        command
            .args(["-n", "-c", "1", "-W"])
            .arg(wait_arg(timeout))
            .arg(address.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl Default for IcmpProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Reply wait for `ping -W`: milliseconds on macOS and FreeBSD, whole
/// seconds with Linux iputils and busybox.
#[cfg(any(target_os = "macos", target_os = "freebsd", target_os = "dragonfly"))]
fn wait_arg(timeout: Duration) -> String {
    timeout.as_millis().max(1).to_string()
}

#[cfg(not(any(target_os = "macos", target_os = "freebsd", target_os = "dragonfly")))]
fn wait_arg(timeout: Duration) -> String {
    (timeout.as_secs_f64().ceil().max(1.0) as u64).to_string()
}

/// Read the round trip time from the output of `ping`.
pub fn parse_rtt(output: &str) -> Option<Duration> {
    let captures = RTT_PATTERN.captures(output)?;
    let millis: f64 = captures.name("rtt")?.as_str().parse().ok()?;
    Some(Duration::from_secs_f64(millis / 1000.0))
}

#[async_trait]
impl Probe for IcmpProbe {
    async fn probe(&self, address: IpAddr, timeout: Duration) -> Result<Duration, ProbeError> {
        let child = self.command(address, timeout).spawn()?;

        // dropping the future kills the child
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ProbeError::Timeout(timeout))??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        trace!("ping {address} exited with {}: {}", output.status, stdout.trim());

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::NoReply(format!(
                "ping exited with {}{}",
                output.status,
                if stderr.trim().is_empty() {
                    String::new()
                } else {
                    format!(": {}", stderr.trim())
                }
            )));
        }

        parse_rtt(&stdout).ok_or_else(|| ProbeError::Unparseable(stdout.trim().to_string()))
    }
}

/// TCP connect probe, for targets that filter ICMP
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    port: u16,
}

impl TcpProbe {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, address: IpAddr, timeout: Duration) -> Result<Duration, ProbeError> {
        let target = SocketAddr::new(address, self.port);
        let start = Instant::now();

        let stream = tokio::time::timeout(timeout, TcpStream::connect(target))
            .await
            .map_err(|_| ProbeError::Timeout(timeout))??;
        let latency = start.elapsed();

        trace!("connected to {target} in {}ms", latency.as_millis());
        drop(stream);

        Ok(latency)
    }
}
