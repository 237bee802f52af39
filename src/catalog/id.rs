//! Identifier scheme for catalog entries.
//!
//! Container ids are small fixed tokens. Leaf ids are derived from the
//! camera's own file URIs (the DCF `/NNNxxxxx/stem` tail), so they are stable
//! across restarts as long as the underlying file is unchanged. Two reserved
//! prefixes mark the two phases of a correction: `/ORIGINAL{source}` names the
//! placeholder served while the correction is pending, `/CORRECTED{source}`
//! names the finished output.

/// Root container. Fixed, well known; the catalog is created with it.
pub const ROOT_ID: &str = "0";
pub const VIDEO_ID: &str = "1";
pub const IMAGE_ID: &str = "2";
pub const CORRECTION_ID: &str = "3";
pub const ORIGINAL_VIDEO_ID: &str = "3-1";
pub const CORRECTED_VIDEO_ID: &str = "3-2";

pub const ORIGINAL_PREFIX: &str = "/ORIGINAL";
pub const CORRECTED_PREFIX: &str = "/CORRECTED";

/// What a request path names, decided before any catalog lookup.
///
/// The two marker prefixes are parsed exactly once, here; everything
/// downstream matches on the variant instead of doing its own prefix
/// arithmetic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestClass {
    /// `/ORIGINAL{source}` — a correction placeholder. The real file may not
    /// exist yet; this request must never be answered with it.
    PendingOriginal { source: String },
    /// `/CORRECTED{source}` — a finished correction backed by a local file.
    Corrected { source: String },
    /// A container token or a plain leaf id.
    Plain(String),
}

pub fn classify(id: &str) -> RequestClass {
    if let Some(source) = id.strip_prefix(ORIGINAL_PREFIX) {
        return RequestClass::PendingOriginal {
            source: source.to_string(),
        };
    }
    if let Some(source) = id.strip_prefix(CORRECTED_PREFIX) {
        return RequestClass::Corrected {
            source: source.to_string(),
        };
    }
    RequestClass::Plain(id.to_string())
}

pub fn original_id(source: &str) -> String {
    format!("{ORIGINAL_PREFIX}{source}")
}

pub fn corrected_id(source: &str) -> String {
    format!("{CORRECTED_PREFIX}{source}")
}

/// The DCF tail of a camera file URI: `(directory, file name)` for the last
/// `/NNNxxxxx/name.ext` portion, where the directory segment starts with
/// three digits (DCF numbering). Returns `None` when the URI has no such
/// segment.
pub fn dcf_tail(uri: &str) -> Option<(&str, &str)> {
    let mut segments = uri.split('/').filter(|s| !s.is_empty());
    let mut dir = None;
    let mut file = None;
    while let Some(seg) = segments.next() {
        if is_dcf_directory(seg) {
            dir = Some(seg);
            file = segments.next();
            break;
        }
    }
    match (dir, file) {
        (Some(d), Some(f)) => Some((d, f)),
        _ => None,
    }
}

fn is_dcf_directory(segment: &str) -> bool {
    segment.len() >= 4
        && segment.as_bytes()[..3].iter().all(u8::is_ascii_digit)
        && segment.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Derive a leaf item id from a camera file URI: the DCF tail with the file
/// extension stripped, e.g. `/100CAMERA/R0010015`. Falls back to the full
/// URI when no DCF segment is present (the id is still unique, just opaque).
pub fn item_id(uri: &str) -> String {
    match dcf_tail(uri) {
        Some((dir, file)) => {
            let stem = file.rsplit_once('.').map(|(s, _)| s).unwrap_or(file);
            format!("/{dir}/{stem}")
        }
        None => uri.to_string(),
    }
}

/// The display title of a file: its name without the extension.
pub fn title_of(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name)
}
