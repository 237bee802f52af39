use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use http_range_header::parse_range_header;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::catalog::id::{self, RequestClass};
use crate::catalog::populate::{MIME_JPEG, MIME_MP4};
use crate::catalog::{CatalogEntry, EntryKind};
use crate::http::state::AppState;
use crate::http::thumb;

// DLNA capability hints for the two media types the camera produces.
// DLNA.ORG_OP=01: byte seek supported; DLNA.ORG_CI=0: content not converted.
const CONTENT_FEATURES_MP4: &str =
    "DLNA.ORG_PN=AVC_MP4_BL_CIF15_AAC_520;DLNA.ORG_OP=01;DLNA.ORG_CI=0";
const CONTENT_FEATURES_JPEG: &str = "DLNA.ORG_PN=JPEG_LRG;DLNA.ORG_OP=01;DLNA.ORG_CI=0";
const DLNA_TRANSFER_MODE: &str = "Streaming";

#[derive(Debug, Deserialize)]
pub struct ContentQuery {
    /// `?type=thumb` selects the thumbnail of an entry.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Streaming-oriented header set carried by every media response:
/// range support advertised, not cacheable, plus the DLNA transfer-mode and
/// capability hints for recognized media types.
fn media_headers(mime: &'static str, len: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if !mime.is_empty() {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(mime));
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        HeaderName::from_static("transfermode.dlna.org"),
        HeaderValue::from_static(DLNA_TRANSFER_MODE),
    );
    let features = match mime {
        MIME_MP4 => Some(CONTENT_FEATURES_MP4),
        MIME_JPEG => Some(CONTENT_FEATURES_JPEG),
        _ => None,
    };
    if let Some(features) = features {
        headers.insert(
            HeaderName::from_static("contentfeatures.dlna.org"),
            HeaderValue::from_static(features),
        );
    }
    headers
}

fn not_found(id: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("id [{id}] is not found.")).into_response()
}

/// GET handler for every catalog id. Dispatch, in order: thumbnail selector,
/// pending-correction placeholder, then plain file serving (full or ranged).
pub async fn serve_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ContentQuery>,
    req_headers: HeaderMap,
) -> Response {
    // The wildcard capture drops the leading slash that catalog ids carry.
    let id = format!("/{id}");
    tracing::debug!("GET {id} type:{:?}", query.kind);

    if query.kind.as_deref() == Some("thumb") {
        return serve_thumbnail(&state, &id).await;
    }

    match id::classify(&id) {
        RequestClass::PendingOriginal { source } => serve_placeholder(&state, &id, &source).await,
        _ => serve_file(&state, &id, &req_headers).await,
    }
}

/// Thumbnail for any catalog entry: corrected videos get a frame extracted
/// from the local file, everything else is fetched from the camera's own
/// thumbnail endpoint.
async fn serve_thumbnail(state: &AppState, id: &str) -> Response {
    let Some(entry) = state.catalog.get(id) else {
        tracing::warn!("failed to serve thumbnail. id [{id}] is not found.");
        return not_found(id);
    };

    let jpeg = match id::classify(id) {
        RequestClass::Corrected { .. } => thumb::video_frame_jpeg(&entry.local_path)
            .await
            .map_err(|e| e.to_string()),
        _ => state
            .camera
            .get_thumbnail(&entry.source_uri)
            .await
            .map_err(|e| e.to_string()),
    };

    match jpeg {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, MIME_JPEG)],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("thumbnail for {id} failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// A pending-correction id is never answered with the real file. When the
/// correction has finished, the "done" clip is substituted (the entry
/// already advertises its length); otherwise the "processing" clip is
/// served and a conversion is enqueued, fire-and-forget.
async fn serve_placeholder(state: &AppState, id: &str, source: &str) -> Response {
    if state.catalog.get(id).is_none() {
        tracing::warn!("failed to serve placeholder. id [{id}] is not found.");
        return not_found(id);
    }

    let (path, len) = if state.ledger.is_done(source) {
        (&state.placeholders.done, state.placeholders.done_len)
    } else {
        state.converter.push(source);
        (
            &state.placeholders.processing,
            state.placeholders.processing_len,
        )
    };
    tracing::debug!("placeholder response: {}", path.display());

    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("failed to read placeholder {}: {e}", path.display());
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let headers = media_headers(MIME_MP4, len);
    let body = Body::from_stream(ReaderStream::new(file));
    (StatusCode::OK, headers, body).into_response()
}

/// Serve the file behind a catalog id: whole file, or a partial response per
/// RFC 7233 when the request carries a Range header.
async fn serve_file(state: &AppState, id: &str, req_headers: &HeaderMap) -> Response {
    let Some(entry) = state.catalog.get(id) else {
        tracing::warn!("URI [{id}] is not found.");
        return not_found(id);
    };
    if entry.kind == EntryKind::Container || entry.local_path.as_os_str().is_empty() {
        tracing::warn!("URI [{id}] is not a servable file.");
        return not_found(id);
    }

    // The advertised size may be stale; range math runs on the real file.
    let total_size = match tokio::fs::metadata(&entry.local_path).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::error!("URI [{id}] is not found: {}", entry.local_path.display());
            return not_found(id);
        }
        Err(e) => {
            tracing::error!("can't open URI [{id}]: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Some(range_val) = req_headers.get(header::RANGE) {
        let range_str = match range_val.to_str() {
            Ok(s) => s.to_owned(),
            Err(_) => return range_not_satisfiable(total_size),
        };
        return range_response(&entry, total_size, &range_str).await;
    }

    let file = match tokio::fs::File::open(&entry.local_path).await {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("can't open URI [{id}]: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let headers = media_headers(entry.mime, total_size);
    let body = Body::from_stream(ReaderStream::new(file));
    (StatusCode::OK, headers, body).into_response()
}

fn range_not_satisfiable(total_size: u64) -> Response {
    (
        StatusCode::RANGE_NOT_SATISFIABLE,
        [(header::CONTENT_RANGE, format!("bytes */{total_size}"))],
    )
        .into_response()
}

/// Handle a Range request: 206 with exactly the requested bytes, or 416 when
/// the range cannot be satisfied against the file's size. `N-` means from N
/// to the end, `-N` the last N bytes, `A-B` the closed interval with the end
/// clamped to size-1.
async fn range_response(entry: &CatalogEntry, total_size: u64, range_str: &str) -> Response {
    let parsed = match parse_range_header(range_str) {
        Ok(p) => p,
        Err(_) => return range_not_satisfiable(total_size),
    };
    // validate() resolves suffix ranges, clamps ends, and rejects ranges
    // starting beyond the file.
    let ranges = match parsed.validate(total_size) {
        Ok(r) => r,
        Err(_) => return range_not_satisfiable(total_size),
    };
    // Multi-part ranges: serve the first range only.
    let Some(first) = ranges.into_iter().next() else {
        return range_not_satisfiable(total_size);
    };

    let start = *first.start();
    let end = *first.end(); // inclusive
    let length = end - start + 1;

    let mut file = match tokio::fs::File::open(&entry.local_path).await {
        Ok(f) => f,
        Err(e) => {
            tracing::error!(
                "range response: failed to open {}: {e}",
                entry.local_path.display()
            );
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if let Err(e) = file.seek(std::io::SeekFrom::Start(start)).await {
        tracing::error!(
            "range response: failed to seek in {}: {e}",
            entry.local_path.display()
        );
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let mut headers = media_headers(entry.mime, length);
    let content_range = format!("bytes {start}-{end}/{total_size}");
    headers.insert(
        header::CONTENT_RANGE,
        HeaderValue::from_str(&content_range)
            .unwrap_or_else(|_| HeaderValue::from_static("bytes 0-0/0")),
    );

    let body = Body::from_stream(ReaderStream::new(file.take(length)));
    (StatusCode::PARTIAL_CONTENT, headers, body).into_response()
}
