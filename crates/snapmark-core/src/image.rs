//! Bookmarked images, the content items that are liked, viewed and ranked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  action::{self, DedupPolicy, Target, verbs},
  store::SocialStore,
};

/// File extensions accepted for bookmarked image URLs.
pub const VALID_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
  pub image_id:     i64,
  pub owner_id:     i64,
  pub title:        String,
  pub slug:         String,
  /// The remote URL the image was bookmarked from.
  pub url:          String,
  /// Local copy relative to the media directory, if one was downloaded.
  pub image_path:   Option<String>,
  /// SHA-256 hex digest of the downloaded bytes.
  pub content_hash: Option<String>,
  pub description:  String,
  pub created:      DateTime<Utc>,
  pub total_likes:  u64,
}

/// Input to [`SocialStore::create_image`].
#[derive(Debug, Clone, Default)]
pub struct NewImage {
  pub title:        String,
  /// Derived from `title` when absent.
  pub slug:         Option<String>,
  pub url:          String,
  pub description:  String,
  pub image_path:   Option<String>,
  pub content_hash: Option<String>,
}

impl NewImage {
  /// The slug that will be stored for this image.
  pub fn resolved_slug(&self) -> String {
    match self.slug.as_deref() {
      Some(s) if !s.is_empty() => s.to_owned(),
      _ => slugify(&self.title),
    }
  }

  /// Check the title and URL, returning the URL's image extension.
  pub fn validate(&self) -> Result<String> {
    if self.title.trim().is_empty() {
      return Err(Error::EmptyField("title"));
    }
    image_extension(&self.url)
  }
}

/// Lowercase ASCII slug: runs of whitespace and hyphens become a single `-`,
/// other punctuation is dropped.
pub fn slugify(title: &str) -> String {
  let mut slug = String::with_capacity(title.len());
  let mut pending_dash = false;

  for c in title.chars() {
    if c.is_ascii_alphanumeric() || c == '_' {
      if pending_dash && !slug.is_empty() {
        slug.push('-');
      }
      pending_dash = false;
      slug.push(c.to_ascii_lowercase());
    } else if c.is_whitespace() || c == '-' {
      pending_dash = true;
    }
  }
  slug
}

/// Check that `url` is an http(s) URL pointing at an accepted image type and
/// return its lowercase extension.
pub fn image_extension(url: &str) -> Result<String> {
  let lower = url.trim().to_ascii_lowercase();
  if !(lower.starts_with("http://") || lower.starts_with("https://")) {
    return Err(Error::InvalidImageUrl(url.to_owned()));
  }
  let path = lower.split(['?', '#']).next().unwrap_or_default();
  let ext = path
    .rsplit_once('.')
    .map(|(_, ext)| ext)
    .filter(|ext| VALID_EXTENSIONS.contains(ext))
    .ok_or_else(|| Error::InvalidImageUrl(url.to_owned()))?;
  Ok(ext.to_owned())
}

/// Store a new bookmark for `owner_id` and log it.
pub async fn bookmark<S: SocialStore>(
  store: &S,
  owner_id: i64,
  input: NewImage,
  policy: DedupPolicy,
) -> Result<Image> {
  input.validate()?;

  let image = store
    .create_image(owner_id, input, Utc::now())
    .await
    .map_err(Error::store)?;
  tracing::info!(image_id = image.image_id, owner_id, slug = %image.slug, "bookmarked image");

  action::record(store, owner_id, verbs::BOOKMARKED, Some(Target::image(image.image_id)), policy)
    .await?;
  Ok(image)
}
