use anyhow::{Result, bail};
use facecall_client::VideoFrame;
use facecall_core::IceCandidate;
use futures::{Stream, StreamExt};
use image::{Rgba, RgbaImage};
use std::time::Duration;
use tracing::Level;

/// Timeout for mock negotiation steps (ms).
pub const STEP_TIMEOUT_MS: u64 = 2000;

/// Timeout for a real ICE connection to establish (ms).
pub const CONNECTION_TIMEOUT_MS: u64 = 20000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Polls `condition` every 10ms until it holds or `timeout_ms` elapses.
pub async fn wait_until(timeout_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Next stream item, failing after `timeout_ms`.
pub async fn next_within<S: Stream + Unpin>(stream: &mut S, timeout_ms: u64) -> Result<Option<S::Item>> {
    match tokio::time::timeout(Duration::from_millis(timeout_ms), stream.next()).await {
        Ok(item) => Ok(item),
        Err(_) => bail!("no stream item within {}ms", timeout_ms),
    }
}

/// Drains `stream` until it ends, failing after `timeout_ms`.
pub async fn collect_within<S: Stream + Unpin>(stream: S, timeout_ms: u64) -> Result<Vec<S::Item>> {
    match tokio::time::timeout(Duration::from_millis(timeout_ms), stream.collect::<Vec<_>>()).await {
        Ok(items) => Ok(items),
        Err(_) => bail!("stream still open after {}ms", timeout_ms),
    }
}

pub fn gray_frame(timestamp_ns: i64) -> VideoFrame {
    VideoFrame::new(RgbaImage::from_pixel(64, 48, Rgba([50, 50, 50, 255])), timestamp_ns)
}

pub fn host_candidate(n: u32) -> IceCandidate {
    IceCandidate {
        sdp: format!("candidate:{n} 1 udp 2122260223 10.0.0.{n} 5{n:04} typ host"),
        sdp_m_line_index: 0,
        sdp_mid: Some("0".to_owned()),
    }
}
