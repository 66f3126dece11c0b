//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order matches chronological order.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use snapmark_core::{
  action::{Action, Target, TargetKind},
  image::Image,
  user::{Profile, User},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Target ──────────────────────────────────────────────────────────────────

pub fn encode_target(target: Option<Target>) -> (Option<&'static str>, Option<i64>) {
  match target {
    Some(t) => (Some(t.kind.as_str()), Some(t.id)),
    None => (None, None),
  }
}

pub fn decode_target(kind: Option<String>, id: Option<i64>) -> Result<Option<Target>> {
  match (kind, id) {
    (Some(kind), Some(id)) => Ok(Some(Target { kind: kind.parse::<TargetKind>()?, id })),
    (None, None) => Ok(None),
    // The table's CHECK constraint rules this out.
    (kind, id) => Err(Error::Decode(format!("half-populated target: {kind:?} / {id:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawUser::from_row`].
pub const USER_COLUMNS: &str = "u.user_id, u.username, u.email, u.first_name, u.last_name, u.date_joined";

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub user_id:     i64,
  pub username:    String,
  pub email:       String,
  pub first_name:  String,
  pub last_name:   String,
  pub date_joined: String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:     row.get(0)?,
      username:    row.get(1)?,
      email:       row.get(2)?,
      first_name:  row.get(3)?,
      last_name:   row.get(4)?,
      date_joined: row.get(5)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:     self.user_id,
      username:    self.username,
      email:       self.email,
      first_name:  self.first_name,
      last_name:   self.last_name,
      date_joined: decode_dt(&self.date_joined)?,
    })
  }
}

/// Raw values read directly from a `profiles` row.
pub struct RawProfile {
  pub user_id:       i64,
  pub date_of_birth: Option<String>,
  pub photo:         Option<String>,
}

impl RawProfile {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { user_id: row.get(0)?, date_of_birth: row.get(1)?, photo: row.get(2)? })
  }

  pub fn into_profile(self) -> Result<Profile> {
    Ok(Profile {
      user_id:       self.user_id,
      date_of_birth: self.date_of_birth.as_deref().map(decode_date).transpose()?,
      photo:         self.photo,
    })
  }
}

/// Column list matching [`RawImage::from_row`]; `total_likes` is computed.
pub const IMAGE_COLUMNS: &str = "i.image_id, i.owner_id, i.title, i.slug, i.url,
     i.image_path, i.content_hash, i.description, i.created,
     (SELECT COUNT(*) FROM image_likes l WHERE l.image_id = i.image_id) AS total_likes";

/// Raw values read directly from an `images` row.
pub struct RawImage {
  pub image_id:     i64,
  pub owner_id:     i64,
  pub title:        String,
  pub slug:         String,
  pub url:          String,
  pub image_path:   Option<String>,
  pub content_hash: Option<String>,
  pub description:  String,
  pub created:      String,
  pub total_likes:  i64,
}

impl RawImage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      image_id:     row.get(0)?,
      owner_id:     row.get(1)?,
      title:        row.get(2)?,
      slug:         row.get(3)?,
      url:          row.get(4)?,
      image_path:   row.get(5)?,
      content_hash: row.get(6)?,
      description:  row.get(7)?,
      created:      row.get(8)?,
      total_likes:  row.get(9)?,
    })
  }

  pub fn into_image(self) -> Result<Image> {
    Ok(Image {
      image_id:     self.image_id,
      owner_id:     self.owner_id,
      title:        self.title,
      slug:         self.slug,
      url:          self.url,
      image_path:   self.image_path,
      content_hash: self.content_hash,
      description:  self.description,
      created:      decode_dt(&self.created)?,
      total_likes:  self.total_likes.max(0) as u64,
    })
  }
}

/// Column list matching [`RawAction::from_row`].
pub const ACTION_COLUMNS: &str = "a.action_id, a.actor_id, a.verb, a.target_kind, a.target_id, a.created";

/// Raw values read directly from an `actions` row.
pub struct RawAction {
  pub action_id:   i64,
  pub actor_id:    i64,
  pub verb:        String,
  pub target_kind: Option<String>,
  pub target_id:   Option<i64>,
  pub created:     String,
}

impl RawAction {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      action_id:   row.get(0)?,
      actor_id:    row.get(1)?,
      verb:        row.get(2)?,
      target_kind: row.get(3)?,
      target_id:   row.get(4)?,
      created:     row.get(5)?,
    })
  }

  pub fn into_action(self) -> Result<Action> {
    Ok(Action {
      action_id: self.action_id,
      actor_id:  self.actor_id,
      verb:      self.verb,
      target:    decode_target(self.target_kind, self.target_id)?,
      created:   decode_dt(&self.created)?,
    })
  }
}
