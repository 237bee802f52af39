use std::borrow::Cow;
use axum::http::{header, StatusCode};

// ── Constants ─────────────────────────────────────────────────────────────────

pub const CDS_NAMESPACE: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";
pub const CMS_NAMESPACE: &str = "urn:schemas-upnp-org:service:ConnectionManager:1";

/// Full protocolInfo strings for the two media types the camera produces,
/// used in DIDL `<res>` elements and in ConnectionManager GetProtocolInfo.
pub const PROTOCOL_INFO_JPEG: &str =
    "http-get:*:image/jpeg:DLNA.ORG_PN=JPEG_LRG;DLNA.ORG_OP=01;DLNA.ORG_CI=0;DLNA.ORG_FLAGS=00D00000000000000000000000000000";
pub const PROTOCOL_INFO_MP4: &str =
    "http-get:*:video/mp4:DLNA.ORG_OP=01;DLNA.ORG_CI=0;DLNA.ORG_FLAGS=01500000000000000000000000000000";

// ── SOAP envelope builder ─────────────────────────────────────────────────────

/// Build a SOAP 1.1 response envelope with an explicit service namespace.
pub fn soap_response_ns(action: &str, inner_xml: &str, namespace: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"
            s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
  <s:Body>
    <u:{action}Response xmlns:u="{ns}">
      {inner_xml}
    </u:{action}Response>
  </s:Body>
</s:Envelope>"#,
        action = action,
        ns = namespace,
        inner_xml = inner_xml,
    )
}

/// Build a complete SOAP 1.1 response envelope wrapping the given inner XML.
/// The service namespace is always CDS_NAMESPACE.
pub fn soap_response(action: &str, inner_xml: &str) -> String {
    soap_response_ns(action, inner_xml, CDS_NAMESPACE)
}

// ── SOAP fault builder ────────────────────────────────────────────────────────

/// Build a UPnP SOAP fault response (HTTP 500 per SOAP 1.1 spec).
///
/// Returns a tuple that callers can return directly from axum handlers
/// (implements IntoResponse).
pub fn soap_fault(
    error_code: u32,
    error_description: &str,
) -> (StatusCode, [(axum::http::HeaderName, &'static str); 1], String) {
    let body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"
            s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
  <s:Body>
    <s:Fault>
      <faultcode>s:Client</faultcode>
      <faultstring>UPnPError</faultstring>
      <detail>
        <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
          <errorCode>{error_code}</errorCode>
          <errorDescription>{error_description}</errorDescription>
        </UPnPError>
      </detail>
    </s:Fault>
  </s:Body>
</s:Envelope>"#,
        error_code = error_code,
        error_description = error_description,
    );
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/xml; charset=\"utf-8\"")],
        body,
    )
}

// ── SOAP parameter extraction ─────────────────────────────────────────────────

/// Extract a single SOAP body parameter by element name using simple string
/// search: finds `<{param}>...</{param}>` and returns the content between
/// the tags. Returns None if the element is absent.
pub fn extract_soap_param<'a>(body: &'a str, param: &str) -> Option<&'a str> {
    let open = format!("<{}>", param);
    let close = format!("</{}>", param);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(&body[start..end])
}

// ── Pagination ────────────────────────────────────────────────────────────────

/// Apply UPnP Browse pagination to a slice.
///
/// - `starting_index` beyond end → empty slice
/// - `requested_count == 0` → ALL items from starting_index onward (UPnP
///   spec: 0 means all)
/// - otherwise → min(requested_count, available) items
pub fn apply_pagination<T>(items: &[T], starting_index: u32, requested_count: u32) -> &[T] {
    let start = (starting_index as usize).min(items.len());
    let slice = &items[start..];
    if requested_count == 0 {
        slice
    } else {
        let count = (requested_count as usize).min(slice.len());
        &slice[..count]
    }
}

// ── dc:date formatting ────────────────────────────────────────────────────────

/// Return an ISO 8601 date string (YYYY-MM-DD) from the file modification
/// time. Falls back to `"1970-01-01"` on any error — some players require
/// dc:date; a fallback beats omission.
pub fn format_dc_date(path: &std::path::Path) -> String {
    (|| -> Option<String> {
        let meta = std::fs::metadata(path).ok()?;
        let mtime = meta.modified().ok()?;
        let dt: chrono::DateTime<chrono::Utc> = mtime.into();
        Some(dt.format("%Y-%m-%d").to_string())
    })()
    .unwrap_or_else(|| "1970-01-01".to_string())
}

// ── res URL builders ──────────────────────────────────────────────────────────

/// Build the streaming URL for a catalog entry's `<res>` element. The id is
/// the HTTP path. Reads the Host header from the request; falls back to
/// `localhost:8888` if absent.
pub fn build_res_url(headers: &axum::http::HeaderMap, entry_id: &str) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost:8888");
    format!("http://{}{}", host, entry_id)
}

/// The thumbnail URL of an entry: its streaming URL plus the thumb selector.
pub fn build_thumb_url(res_url: &str) -> String {
    format!("{res_url}?type=thumb")
}

// ── XML escaping ──────────────────────────────────────────────────────────────

/// Thin wrapper around `quick_xml::escape::escape`.
///
/// Escapes the five XML special characters (`&`, `<`, `>`, `"`, `'`) so that
/// titles and URLs can be safely embedded in XML text nodes and attribute
/// values.
pub fn xml_escape(s: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(s)
}
