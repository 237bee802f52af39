use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    response::Response,
};
use crate::catalog::{CatalogEntry, EntryKind};
use crate::http::soap::{self, apply_pagination, extract_soap_param, soap_fault, soap_response};
use crate::http::state::AppState;

// ── Helper ────────────────────────────────────────────────────────────────────

/// Wrap a SOAP response body string into an HTTP 200 response with correct
/// XML content-type.
fn ok_xml(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml; charset=\"utf-8\"")],
        body,
    )
        .into_response()
}

// ── Main handler ──────────────────────────────────────────────────────────────

/// Main CDS control handler: extracts the SOAP action and dispatches to the
/// appropriate action handler.
pub async fn cds_control(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    // Extract action name from SOAPAction header.
    // axum HeaderMap is case-insensitive, so "soapaction" matches "SOAPAction".
    let action_from_header = headers
        .get("soapaction")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split('#').nth(1))
        .map(|s| s.trim_matches('"').to_string());

    // Fall back to parsing the SOAP body for the action element name if the
    // SOAPAction header is absent or empty.
    let action = match action_from_header {
        Some(ref s) if !s.is_empty() => action_from_header,
        _ => body.find("<u:").map(|pos| {
            let rest = &body[pos + 3..];
            let end = rest.find([' ', '>', '/']).unwrap_or(rest.len());
            rest[..end].to_string()
        }),
    };

    match action.as_deref() {
        Some("Browse") => handle_browse(&state, &headers, &body),
        Some("GetSearchCapabilities") => handle_get_search_capabilities(),
        Some("GetSortCapabilities") => handle_get_sort_capabilities(),
        Some("GetSystemUpdateID") => handle_get_system_update_id(),
        _ => {
            tracing::warn!("Unknown CDS action: {:?}", action);
            soap_fault(402, "InvalidArgs").into_response()
        }
    }
}

// ── Stub actions ──────────────────────────────────────────────────────────────

/// GetSearchCapabilities: this server exposes no search capabilities.
fn handle_get_search_capabilities() -> Response {
    ok_xml(soap_response(
        "GetSearchCapabilities",
        "<SearchCaps></SearchCaps>",
    ))
}

/// GetSortCapabilities: this server exposes no sort capabilities.
fn handle_get_sort_capabilities() -> Response {
    ok_xml(soap_response("GetSortCapabilities", "<SortCaps></SortCaps>"))
}

/// GetSystemUpdateID: returns a fixed counter of 1.
fn handle_get_system_update_id() -> Response {
    ok_xml(soap_response("GetSystemUpdateID", "<Id>1</Id>"))
}

// ── DIDL-Lite generation helpers ──────────────────────────────────────────────

/// Wrap inner XML content in a DIDL-Lite root element with all four required
/// namespaces. Some TVs silently reject responses missing xmlns:dlna.
fn didl_lite_wrap(inner: &str) -> String {
    format!(
        r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns:dlna="urn:schemas-dlna-org:metadata-1-0/">{inner}</DIDL-Lite>"#,
        inner = inner,
    )
}

/// Generate a single DIDL-Lite <container> element.
fn container_element(entry: &CatalogEntry) -> String {
    format!(
        r#"<container id="{id}" parentID="{parent_id}" restricted="1" childCount="{child_count}"><dc:title>{title}</dc:title><upnp:class>object.container.storageFolder</upnp:class></container>"#,
        id = soap::xml_escape(&entry.id),
        parent_id = soap::xml_escape(&entry.parent),
        title = soap::xml_escape(&entry.title),
        child_count = entry.child_count(),
    )
}

/// The title presented to players. Spherical videos carry a `_360` suffix so
/// headset players recognize them; images keep the plain title.
fn player_title(entry: &CatalogEntry) -> String {
    match entry.kind {
        EntryKind::Video => format!("{}_360", entry.title),
        _ => entry.title.clone(),
    }
}

/// Generate a single DIDL-Lite <item> element for a leaf entry.
fn item_element(entry: &CatalogEntry, headers: &HeaderMap) -> String {
    let upnp_class = match entry.kind {
        EntryKind::Video => "object.item.videoItem",
        EntryKind::Image => "object.item.imageItem.photo",
        EntryKind::Container => "object.item",
    };
    let protocol_info = match entry.kind {
        EntryKind::Image => soap::PROTOCOL_INFO_JPEG,
        _ => soap::PROTOCOL_INFO_MP4,
    };
    let dc_date = soap::format_dc_date(&entry.local_path);
    let res_url = soap::build_res_url(headers, &entry.id);
    let thumb_url = soap::build_thumb_url(&res_url);

    let resolution_attr = if entry.width > 0 && entry.height > 0 {
        format!(r#" resolution="{}x{}""#, entry.width, entry.height)
    } else {
        String::new()
    };

    format!(
        r#"<item id="{id}" parentID="{parent_id}" restricted="1"><dc:title>{title}</dc:title><upnp:class>{upnp_class}</upnp:class><dc:date>{dc_date}</dc:date><upnp:albumArtURI>{thumb_url}</upnp:albumArtURI><res protocolInfo="{protocol_info}" size="{size}"{resolution_attr}>{res_url}</res></item>"#,
        id = soap::xml_escape(&entry.id),
        parent_id = soap::xml_escape(&entry.parent),
        title = soap::xml_escape(&player_title(entry)),
        upnp_class = upnp_class,
        dc_date = dc_date,
        thumb_url = soap::xml_escape(&thumb_url),
        protocol_info = protocol_info,
        size = entry.size,
        resolution_attr = resolution_attr,
        res_url = soap::xml_escape(&res_url),
    )
}

fn entry_element(entry: &CatalogEntry, headers: &HeaderMap) -> String {
    match entry.kind {
        EntryKind::Container => container_element(entry),
        _ => item_element(entry, headers),
    }
}

fn browse_result(elements: &str, number_returned: usize, total_matches: usize) -> Response {
    let didl_xml = didl_lite_wrap(elements);
    let inner = format!(
        "<Result>{}</Result><NumberReturned>{}</NumberReturned><TotalMatches>{}</TotalMatches><UpdateID>1</UpdateID>",
        soap::xml_escape(&didl_xml),
        number_returned,
        total_matches,
    );
    ok_xml(soap_response("Browse", &inner))
}

// ── Browse handler ────────────────────────────────────────────────────────────

/// Browse over the catalog tree: BrowseDirectChildren lists a container's
/// children (containers and leaves alike) with pagination, BrowseMetadata
/// describes a single entry. Unknown ObjectIDs fault with 701.
fn handle_browse(state: &AppState, headers: &HeaderMap, body: &str) -> Response {
    let object_id: &str = match extract_soap_param(body, "ObjectID") {
        Some(v) => v,
        None => return soap_fault(402, "InvalidArgs").into_response(),
    };
    let browse_flag: &str = match extract_soap_param(body, "BrowseFlag") {
        Some(v) => v,
        None => return soap_fault(402, "InvalidArgs").into_response(),
    };
    let starting_index: u32 = extract_soap_param(body, "StartingIndex")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let requested_count: u32 = extract_soap_param(body, "RequestedCount")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let Some(entry) = state.catalog.get(object_id) else {
        tracing::debug!("Browse unknown ObjectID: {}", object_id);
        return soap_fault(701, "No such object").into_response();
    };

    match browse_flag {
        "BrowseDirectChildren" => {
            if entry.kind != EntryKind::Container {
                tracing::debug!("BrowseDirectChildren on non-container: {}", object_id);
                return soap_fault(701, "No such object").into_response();
            }
            let children = state.catalog.children_of(object_id);
            let total_matches = children.len();
            let paged = apply_pagination(&children, starting_index, requested_count);
            let number_returned = paged.len();
            let elements: String = paged
                .iter()
                .map(|child| entry_element(child, headers))
                .collect();
            browse_result(&elements, number_returned, total_matches)
        }
        "BrowseMetadata" => {
            let element = entry_element(&entry, headers);
            browse_result(&element, 1, 1)
        }
        _ => {
            tracing::warn!("Unknown BrowseFlag: {}", browse_flag);
            soap_fault(402, "InvalidArgs").into_response()
        }
    }
}
