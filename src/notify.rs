use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Receives the canonical URI of every freshly generated token.
///
/// Implementations must not block and must swallow their own failures.
pub trait TokenNotifier: Send + Sync {
    fn notify(&self, uri: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl TokenNotifier for NoopNotifier {
    fn notify(&self, _uri: &str) {}
}

/// Publishes the latest URI on a watch channel; consumers only ever see the newest value.
#[derive(Debug)]
pub struct WatchNotifier {
    tx: watch::Sender<String>,
}

impl WatchNotifier {
    pub fn channel() -> (Self, watch::Receiver<String>) {
        let (tx, rx) = watch::channel(String::new());
        (Self { tx }, rx)
    }
}

impl TokenNotifier for WatchNotifier {
    fn notify(&self, uri: &str) {
        self.tx.send_replace(uri.to_string());
    }
}

pub fn render_qr_svg(uri: &str) -> Result<String> {
    let code = QrCode::with_error_correction_level(uri.as_bytes(), EcLevel::M)
        .map_err(|e| anyhow!("QR generation failed: {}", e))?;

    Ok(code
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#FFFFFF"))
        .build())
}

/// Render `uri` and replace the file at `path` atomically.
pub async fn write_qr(path: &Path, uri: &str) -> Result<()> {
    let svg = render_qr_svg(uri)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, svg)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("moving QR code into {}", path.display()))?;
    Ok(())
}

/// Re-render the QR code whenever a new token URI is published.
///
/// The task ends once every sender of the channel has been dropped.
pub fn spawn_qr_renderer(mut rx: watch::Receiver<String>, path: PathBuf) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(path = %path.display(), "QR renderer started");
        loop {
            let uri = rx.borrow_and_update().clone();
            if !uri.is_empty() {
                match write_qr(&path, &uri).await {
                    Ok(()) => debug!(path = %path.display(), "QR code updated"),
                    Err(e) => warn!(error = %e, "failed to render QR code"),
                }
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
        debug!("QR renderer stopped");
    })
}
