// src/health/http.rs

use std::time::Duration;

use anyhow::{Context, bail};

use crate::types::BoxFuture;

use super::{HealthBody, HealthProbe, ProbeReport};

/// HTTP GET probe. Any 2xx within `timeout` is healthy.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("building HTTP client for health probes")?;
        Ok(Self { client })
    }
}

impl HealthProbe for HttpProbe {
    fn probe<'a>(&'a self, endpoint: &'a str) -> BoxFuture<'a, anyhow::Result<ProbeReport>> {
        Box::pin(async move {
            let resp = self
                .client
                .get(endpoint)
                .send()
                .await
                .with_context(|| format!("GET {endpoint}"))?;

            let status = resp.status();
            if !status.is_success() {
                bail!("GET {endpoint} returned {status}");
            }

            // The body is informational; a non-JSON 200 is still healthy.
            let body = resp.json::<HealthBody>().await.ok();
            Ok(ProbeReport {
                status_code: status.as_u16(),
                body,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response per connection, `responses.len()` times.
    async fn serve(responses: Vec<(u16, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for (code, body) in responses {
                let (mut sock, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = sock.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let reply = format!(
                    "HTTP/1.1 {code} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                sock.write_all(reply.as_bytes()).await.unwrap();
                let _ = sock.shutdown().await;
            }
        });

        format!("http://{addr}/health")
    }

    #[tokio::test]
    async fn success_status_parses_readiness_body() {
        let url = serve(vec![(
            200,
            r#"{"status":"healthy","modules":{"bind_pdf":true,"admisibilidad":true}}"#,
        )])
        .await;

        let probe = HttpProbe::new(Duration::from_secs(2)).unwrap();
        let report = probe.probe(&url).await.unwrap();

        assert_eq!(report.status_code, 200);
        let body = report.body.unwrap();
        assert_eq!(body.status.as_deref(), Some("healthy"));
        assert_eq!(body.modules.len(), 2);
    }

    #[tokio::test]
    async fn server_error_is_a_failed_probe() {
        let url = serve(vec![(503, r#"{"status":"starting"}"#)]).await;
        let probe = HttpProbe::new(Duration::from_secs(2)).unwrap();

        let err = probe.probe(&url).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn connection_refused_is_a_failed_probe() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpProbe::new(Duration::from_secs(2)).unwrap();
        assert!(probe.probe(&format!("http://{addr}/health")).await.is_err());
    }
}
