//! Fetching bookmarked images into the media directory.

use std::path::Path;

use sha2::{Digest as _, Sha256};

use crate::error::ApiError;

/// Where a downloaded image landed, relative to the media directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
  pub image_path:   String,
  pub content_hash: String,
}

/// Hex digits of the content hash appended to each stored file name.
const HASH_SUFFIX_LEN: usize = 12;

/// Relative path of a stored image: `images/<slug>-<hash prefix>.<ext>`.
///
/// Files with different content never share a path, so a second bookmark
/// with the same title cannot overwrite the first one's file.
pub fn stored_path(slug: &str, ext: &str, content_hash: &str) -> String {
  let stem = if slug.is_empty() { "image" } else { slug };
  let suffix = content_hash.get(..HASH_SUFFIX_LEN).unwrap_or(content_hash);
  format!("images/{stem}-{suffix}.{ext}")
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String { hex::encode(Sha256::digest(bytes)) }

/// Download `url` and write it under `media_dir`.
pub async fn download_image(
  client: &reqwest::Client,
  media_dir: &Path,
  url: &str,
  slug: &str,
  ext: &str,
) -> Result<Downloaded, ApiError> {
  let bytes = client
    .get(url)
    .send()
    .await
    .and_then(|res| res.error_for_status())
    .map_err(|e| ApiError::BadRequest(format!("could not download image: {e}")))?
    .bytes()
    .await
    .map_err(|e| ApiError::BadRequest(format!("could not download image: {e}")))?;

  let content_hash = content_hash(&bytes);
  let image_path = stored_path(slug, ext, &content_hash);
  let dest = media_dir.join(&image_path);
  if let Some(parent) = dest.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .map_err(|e| ApiError::Internal(format!("creating {parent:?}: {e}")))?;
  }
  tokio::fs::write(&dest, &bytes)
    .await
    .map_err(|e| ApiError::Internal(format!("writing {dest:?}: {e}")))?;

  tracing::info!(url, path = %image_path, bytes = bytes.len(), "downloaded image");
  Ok(Downloaded { image_path, content_hash })
}
