//! Frame server for the browser that drives the projector.
//!
//! # Endpoints
//!
//! - `GET /` - Full-screen page that polls for frames
//! - `GET /info` - `"<sequence_id> <duration_ms>"` of the current frame
//! - `GET /image` - Current frame as PNG
//! - `GET /status` - Controller state as JSON

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use dlprint_control::{FrameStore, PrintState};
use dlprint_slicer::Frame;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Port the frame server listens on by default.
pub const DEFAULT_PORT: u16 = 8090;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub frames: Arc<FrameStore>,
    pub state: watch::Receiver<PrintState>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/info", get(info))
        .route("/image", get(image))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Polls `/info` every 500 ms; a new id swaps in `/image` for the announced
/// number of milliseconds, then the screen goes black again.
const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>dlprint</title>
<style>
  html, body { margin: 0; height: 100%; background: #000; overflow: hidden; }
  img { display: block; width: 100%; height: 100%; object-fit: contain; visibility: hidden; }
</style>
</head>
<body>
<img id="frame" alt="">
<script>
  var frame = document.getElementById("frame");
  var lastId = null;
  var hideTimer = null;

  function show(id, ms) {
    frame.onload = function () {
      frame.style.visibility = "visible";
      clearTimeout(hideTimer);
      hideTimer = setTimeout(function () { frame.style.visibility = "hidden"; }, ms);
    };
    frame.src = "/image?id=" + id;
  }

  function poll() {
    fetch("/info", { cache: "no-store" })
      .then(function (r) { return r.status === 200 ? r.text() : ""; })
      .then(function (text) {
        var parts = text.trim().split(/\s+/);
        if (parts.length !== 2) { return; }
        if (parts[0] !== lastId) {
          lastId = parts[0];
          show(parts[0], parseInt(parts[1], 10));
        }
      })
      .catch(function () {})
      .then(function () { setTimeout(poll, 500); });
  }

  poll();
</script>
</body>
</html>
"#;

/// GET / - Polling page.
async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /info - Current frame id and exposure; 204 before the first frame.
async fn info(State(state): State<AppState>) -> Response {
    match state.frames.info_line() {
        Some(line) => ([(header::CACHE_CONTROL, "no-store")], line).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// GET /image - Current frame as PNG; 404 before the first frame.
async fn image(State(state): State<AppState>) -> Response {
    let Some(frame) = state.frames.fetch_image() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let sequence_id = frame.sequence_id();
    match tokio::task::spawn_blocking(move || encode_png(&frame)).await {
        Ok(Ok(png)) => (
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            png,
        )
            .into_response(),
        Ok(Err(e)) => {
            error!(sequence_id, error = %e, "PNG encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            error!(sequence_id, error = %e, "PNG encoding task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /status - Controller state.
async fn status(State(state): State<AppState>) -> Json<PrintState> {
    Json(state.state.borrow().clone())
}

/// Encode a frame's RGB buffer as PNG, rows in buffer order.
pub fn encode_png(frame: &Frame) -> image::ImageResult<Vec<u8>> {
    let (width, height) = (frame.width() as u32, frame.height() as u32);
    let img = image::RgbImage::from_raw(width, height, frame.rgb().to_vec()).ok_or_else(|| {
        image::ImageError::Parameter(image::error::ParameterError::from_kind(
            image::error::ParameterErrorKind::DimensionMismatch,
        ))
    })?;
    let mut png = Cursor::new(Vec::new());
    img.write_to(&mut png, image::ImageFormat::Png)?;
    Ok(png.into_inner())
}
