//! Extraction of a [`PostId`] from the raw query a client submits.
//!
//! The query is a status URL such as `https://x.com/user/status/12345`. Only
//! the path matters and extraction is purely positional: after splitting the
//! path on `/`, segment 2 must be the `status` marker and segment 3 is the id.
//! Scheme-less input (`x.com/user/status/12345`) lines up the same way because
//! the host takes the place of the leading empty segment.

use thiserror::Error;
use url::Url;

use super::entities::PostId;

const STATUS_MARKER: &str = "status";
const MARKER_POSITION: usize = 2;
const ID_POSITION: usize = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("query is empty")]
    Empty,
    #[error("not enough data to retrieve post information from `{path}`")]
    NotEnoughSegments { path: String },
    #[error("expected `status` segment but found `{found}`")]
    MissingStatusMarker { found: String },
    #[error("post id segment is empty")]
    EmptyId,
    #[error("post id `{id}` may only contain ASCII letters, digits and underscores")]
    InvalidId { id: String },
}

/// Extract the post id from a raw status URL.
pub fn extract_post_id(query: &str) -> Result<PostId, ExtractError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ExtractError::Empty);
    }

    let path = query_path(query);
    let segments: Vec<&str> = path.split('/').collect();

    let (Some(marker), Some(id)) = (segments.get(MARKER_POSITION), segments.get(ID_POSITION))
    else {
        return Err(ExtractError::NotEnoughSegments {
            path: path.to_string(),
        });
    };

    if *marker != STATUS_MARKER {
        return Err(ExtractError::MissingStatusMarker {
            found: (*marker).to_string(),
        });
    }

    if id.is_empty() {
        return Err(ExtractError::EmptyId);
    }

    // URL parsing percent-encodes the path while raw input is split as is, so
    // only ids that read the same either way are accepted.
    if !id.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'_') {
        return Err(ExtractError::InvalidId {
            id: (*id).to_string(),
        });
    }

    Ok(PostId::new(*id))
}

fn query_path(query: &str) -> String {
    match Url::parse(query) {
        Ok(url) if url.has_host() => url.path().to_string(),
        _ => {
            let end = query.find(['?', '#']).unwrap_or(query.len());
            query[..end].to_string()
        }
    }
}
