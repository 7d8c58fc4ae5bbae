//! Health checks and the polling probe loop.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use fileferry_protocol::constants::MessageType;
use fileferry_protocol::envelope::Message;
use fileferry_protocol::messages::{HealthCheckRequest, HealthCheckResponse, ServingStatus};
use fileferry_transfer::ProbeStats;

use crate::client::FerryClient;
use crate::conn::Incoming;
use crate::ClientError;

impl FerryClient {
    /// Issues one health check. An empty `service` asks for overall process
    /// health; an unknown named service surfaces as a NotFound
    /// [`ClientError::Remote`].
    pub async fn check(
        &mut self,
        service: &str,
        label: &str,
        counter: u64,
    ) -> Result<ProbeStats, ClientError> {
        let started_at = Utc::now();
        let id = Self::new_id("hc");

        let req = HealthCheckRequest {
            service: service.into(),
            ping_at: started_at.to_rfc3339(),
            label: label.into(),
            counter: counter.to_string(),
        };
        self.conn
            .send_envelope(&Message::new(&id, MessageType::HealthCheck, Some(&req))?)
            .await?;

        loop {
            match self.conn.recv(self.config.request_timeout).await? {
                Incoming::Envelope(msg) if msg.id == id => {
                    if let Some(err) = &msg.error {
                        return Err(ClientError::Remote {
                            code: err.code,
                            message: err.message.clone(),
                        });
                    }
                    if msg.msg_type != MessageType::HealthStatus {
                        return Err(ClientError::Protocol(format!(
                            "unexpected reply type {:?}",
                            msg.msg_type
                        )));
                    }
                    let resp: HealthCheckResponse = msg
                        .parse_payload()?
                        .ok_or_else(|| ClientError::Protocol("health status without payload".into()))?;
                    return Ok(ProbeStats {
                        ok: resp.status == ServingStatus::Serving,
                        started_at,
                        finished_at: Utc::now(),
                        server_received_at: resp.received_at,
                    });
                }
                Incoming::Envelope(msg) => {
                    tracing::warn!(id = %msg.id, "reply for unknown request, dropping");
                }
                Incoming::Binary(header, _) => {
                    tracing::warn!(id = %header.id, "unexpected binary frame during health check");
                }
            }
        }
    }
}

/// Polls a health check until cancelled.
///
/// `check` is called with a counter starting at 1 and incremented every
/// tick. Transient failures (transport errors and the transient slice of
/// the remote code space) are logged and polling continues; any other
/// error ends the loop.
pub async fn probe_loop<F, Fut>(
    mut check: F,
    interval: Duration,
    cancel: CancellationToken,
) -> Result<(), ClientError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<ProbeStats, ClientError>>,
{
    let mut counter: u64 = 0;
    loop {
        counter += 1;
        match check(counter).await {
            Ok(stats) => {
                tracing::info!(
                    counter,
                    ok = stats.ok,
                    duration_ms = stats.duration_ms(),
                    server_received_at = %stats.server_received_at,
                    "health probe"
                );
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(counter, "transient probe failure: {e}");
            }
            Err(e) => return Err(e),
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
