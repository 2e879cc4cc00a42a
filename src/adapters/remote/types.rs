//! Contents API Wire Types
//!
//! Request/response bodies of the hosted repository contents endpoint
//! (`/repos/{owner}/{repo}/contents/{path}`).

use serde::{Deserialize, Serialize};

/// Response of `GET .../contents/{path}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentsResponse {
  /// Blob sha, used as the revision marker.
  pub sha: String,
  /// File body, base64 with embedded line breaks.
  #[serde(default)]
  pub content: String,
  /// `base64`, or `none` for files too large to inline.
  #[serde(default)]
  pub encoding: Option<String>,
}

/// Body of `PUT .../contents/{path}`.
#[derive(Debug, Clone, Serialize)]
pub struct PutContentsRequest<'a> {
  /// Commit message.
  pub message: &'a str,
  /// New file body, base64.
  pub content: String,
  /// Sha of the blob being replaced; omitted when creating the file.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sha: Option<&'a str>,
  /// Target branch.
  pub branch: &'a str,
}

/// Response of `PUT .../contents/{path}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PutContentsResponse {
  /// The written file entry.
  pub content: ContentsEntry,
}

/// File entry nested in write responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentsEntry {
  /// Sha of the newly written blob.
  pub sha: String,
}
