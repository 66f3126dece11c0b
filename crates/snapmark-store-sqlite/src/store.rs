//! [`SqliteStore`], the SQLite implementation of [`SocialStore`].

use std::path::Path;

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior, types::Value};

use snapmark_core::{
  action::{Action, ActionQuery, DedupPolicy, NewAction},
  image::{Image, NewImage},
  social::FollowRelation,
  store::SocialStore,
  user::{FollowCounts, NewUser, Profile, ProfileUpdate, User},
};

use crate::{
  Error, Result,
  encode::{
    ACTION_COLUMNS, IMAGE_COLUMNS, RawAction, RawImage, RawProfile, RawUser, USER_COLUMNS,
    decode_dt, encode_date, encode_dt, encode_target,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Snapmark store backed by a single SQLite file.
///
/// Clones share the inner connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Timestamps are stored with microsecond precision; truncate up front so the
/// values we hand back equal the values we read back later.
fn stamp(at: DateTime<Utc>) -> DateTime<Utc> { at.trunc_subsecs(6) }

fn other<E>(err: E) -> tokio_rusqlite::Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  tokio_rusqlite::Error::Other(Box::new(err))
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a `SELECT` over `users u` with the given tail and parameters.
  async fn query_users(&self, tail: &'static str, params: Vec<Value>) -> Result<Vec<User>> {
    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u {tail}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  /// Run a `SELECT` over `images i` with a dynamically-built tail.
  async fn query_images(&self, tail: String, params: Vec<Value>) -> Result<Vec<Image>> {
    let raws: Vec<RawImage> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {IMAGE_COLUMNS} FROM images i {tail}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawImage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawImage::into_image).collect()
  }
}

/// `?, ?, ?` with `n` placeholders.
fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

// ─── SocialStore impl ────────────────────────────────────────────────────────

impl SocialStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<(User, Profile)> {
    let date_joined = stamp(Utc::now());

    let username   = input.username.clone();
    let email      = input.email.clone();
    let first_name = input.first_name.clone();
    let last_name  = input.last_name.clone();
    let hash       = input.password_hash;
    let joined_str = encode_dt(date_joined);

    let user_id: Option<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let taken = tx
          .query_row(
            "SELECT 1 FROM users WHERE username = ?1",
            rusqlite::params![username],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Ok(None);
        }

        tx.execute(
          "INSERT INTO users (username, email, password_hash, first_name, last_name, date_joined)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![username, email, hash, first_name, last_name, joined_str],
        )?;
        let user_id = tx.last_insert_rowid();

        tx.execute("INSERT INTO profiles (user_id) VALUES (?1)", rusqlite::params![user_id])?;
        tx.commit()?;
        Ok(Some(user_id))
      })
      .await?;

    let user_id = user_id.ok_or_else(|| Error::UsernameTaken(input.username.clone()))?;

    let user = User {
      user_id,
      username: input.username,
      email: input.email,
      first_name: input.first_name,
      last_name: input.last_name,
      date_joined,
    };
    let profile = Profile { user_id, date_of_birth: None, photo: None };
    Ok((user, profile))
  }

  async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
    let users = self.query_users("WHERE u.user_id = ?", vec![Value::Integer(user_id)]).await?;
    Ok(users.into_iter().next())
  }

  async fn get_user_by_username(&self, username: String) -> Result<Option<User>> {
    let users = self.query_users("WHERE u.username = ?", vec![Value::Text(username)]).await?;
    Ok(users.into_iter().next())
  }

  async fn get_credentials(&self, username: String) -> Result<Option<(User, String)>> {
    let raw: Option<(RawUser, String)> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {USER_COLUMNS}, u.password_hash FROM users u WHERE u.username = ?1");
        Ok(conn
          .query_row(&sql, rusqlite::params![username], |row| {
            Ok((RawUser::from_row(row)?, row.get(6)?))
          })
          .optional()?)
      })
      .await?;

    raw
      .map(|(user, hash)| user.into_user().map(|user| (user, hash)))
      .transpose()
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    self.query_users("ORDER BY u.username", Vec::new()).await
  }

  async fn get_profile(&self, user_id: i64) -> Result<Option<Profile>> {
    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT user_id, date_of_birth, photo FROM profiles WHERE user_id = ?1",
            rusqlite::params![user_id],
            RawProfile::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  async fn update_profile(
    &self,
    user_id: i64,
    update:  ProfileUpdate,
  ) -> Result<Option<(User, Profile)>> {
    let dob_str = update.date_of_birth.map(encode_date);

    let found: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE users SET
             first_name = COALESCE(?2, first_name),
             last_name  = COALESCE(?3, last_name),
             email      = COALESCE(?4, email)
           WHERE user_id = ?1",
          rusqlite::params![user_id, update.first_name, update.last_name, update.email],
        )?;
        if changed == 0 {
          return Ok(false);
        }
        tx.execute(
          "UPDATE profiles SET
             date_of_birth = COALESCE(?2, date_of_birth),
             photo         = COALESCE(?3, photo)
           WHERE user_id = ?1",
          rusqlite::params![user_id, dob_str, update.photo],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !found {
      return Ok(None);
    }
    let user = self.get_user(user_id).await?.ok_or(Error::UserNotFound(user_id))?;
    let profile = self.get_profile(user_id).await?.ok_or(Error::UserNotFound(user_id))?;
    Ok(Some((user, profile)))
  }

  // ── Social graph ──────────────────────────────────────────────────────────

  async fn follow(
    &self,
    follower_id: i64,
    followed_id: i64,
    at: DateTime<Utc>,
  ) -> Result<Option<FollowRelation>> {
    let created = stamp(at);
    let at_str = encode_dt(created);

    let inserted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO contacts (user_from, user_to, created) VALUES (?1, ?2, ?3)",
          rusqlite::params![follower_id, followed_id, at_str],
        )?)
      })
      .await?;

    Ok((inserted == 1).then_some(FollowRelation { follower_id, followed_id, created }))
  }

  async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
    let deleted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM contacts WHERE user_from = ?1 AND user_to = ?2",
          rusqlite::params![follower_id, followed_id],
        )?)
      })
      .await?;

    Ok(deleted > 0)
  }

  async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
    let found: bool = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT 1 FROM contacts WHERE user_from = ?1 AND user_to = ?2",
            rusqlite::params![follower_id, followed_id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false))
      })
      .await?;

    Ok(found)
  }

  async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>> {
    let ids: Vec<i64> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare("SELECT user_to FROM contacts WHERE user_from = ?1")?;
        let rows = stmt
          .query_map(rusqlite::params![user_id], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(ids)
  }

  async fn follow_counts(&self, user_id: i64) -> Result<FollowCounts> {
    let (followers, following): (i64, i64) = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT
             (SELECT COUNT(*) FROM contacts WHERE user_to   = ?1),
             (SELECT COUNT(*) FROM contacts WHERE user_from = ?1)",
          rusqlite::params![user_id],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?)
      })
      .await?;

    Ok(FollowCounts { followers: followers as u64, following: following as u64 })
  }

  // ── Images ────────────────────────────────────────────────────────────────

  async fn create_image(&self, owner_id: i64, input: NewImage, at: DateTime<Utc>) -> Result<Image> {
    let created = stamp(at);
    let slug    = input.resolved_slug();

    let image = Image {
      image_id: 0,
      owner_id,
      title: input.title,
      slug,
      url: input.url,
      image_path: input.image_path,
      content_hash: input.content_hash,
      description: input.description,
      created,
      total_likes: 0,
    };

    let row = (
      image.owner_id,
      image.title.clone(),
      image.slug.clone(),
      image.url.clone(),
      image.image_path.clone(),
      image.content_hash.clone(),
      image.description.clone(),
      encode_dt(created),
    );

    let image_id: i64 = self
      .conn
      .call(move |conn| {
        let (owner_id, title, slug, url, image_path, content_hash, description, created) = row;
        conn.execute(
          "INSERT INTO images (owner_id, title, slug, url, image_path, content_hash, description, created)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![owner_id, title, slug, url, image_path, content_hash, description, created],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Image { image_id, ..image })
  }

  async fn get_image(&self, image_id: i64) -> Result<Option<Image>> {
    let images = self
      .query_images("WHERE i.image_id = ?".to_owned(), vec![Value::Integer(image_id)])
      .await?;
    Ok(images.into_iter().next())
  }

  async fn get_images_by_ids(&self, image_ids: Vec<i64>) -> Result<Vec<Image>> {
    if image_ids.is_empty() {
      return Ok(Vec::new());
    }
    let tail = format!("WHERE i.image_id IN ({})", placeholders(image_ids.len()));
    let params = image_ids.into_iter().map(Value::Integer).collect();
    self.query_images(tail, params).await
  }

  async fn list_images(&self, limit: usize, offset: usize) -> Result<Vec<Image>> {
    self
      .query_images(
        "ORDER BY i.created DESC, i.image_id DESC LIMIT ? OFFSET ?".to_owned(),
        vec![Value::Integer(limit as i64), Value::Integer(offset as i64)],
      )
      .await
  }

  // ── Likes ─────────────────────────────────────────────────────────────────

  async fn like(&self, user_id: i64, image_id: i64) -> Result<bool> {
    let inserted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO image_likes (image_id, user_id) VALUES (?1, ?2)",
          rusqlite::params![image_id, user_id],
        )?)
      })
      .await?;

    Ok(inserted == 1)
  }

  async fn unlike(&self, user_id: i64, image_id: i64) -> Result<bool> {
    let deleted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM image_likes WHERE image_id = ?1 AND user_id = ?2",
          rusqlite::params![image_id, user_id],
        )?)
      })
      .await?;

    Ok(deleted > 0)
  }

  async fn list_likers(&self, image_id: i64) -> Result<Vec<User>> {
    self
      .query_users(
        "JOIN image_likes l ON l.user_id = u.user_id WHERE l.image_id = ? ORDER BY u.username",
        vec![Value::Integer(image_id)],
      )
      .await
  }

  // ── Actions ───────────────────────────────────────────────────────────────

  async fn record_action(
    &self,
    input:  NewAction,
    policy: DedupPolicy,
    now:    DateTime<Utc>,
  ) -> Result<Option<Action>> {
    let now = stamp(now);
    let (target_kind, target_id) = encode_target(input.target);
    let actor_id = input.actor_id;
    let verb     = input.verb.clone();
    let now_str  = encode_dt(now);
    let lookback = policy.lookback as i64;

    // Check and insert under one IMMEDIATE transaction: the write lock is
    // taken before the read, so identical concurrent requests serialise.
    let inserted: Option<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let recent: Vec<String> = {
          let mut stmt = tx.prepare(
            "SELECT created FROM actions
             WHERE actor_id = ?1
               AND verb = ?2
               AND target_kind IS ?3
               AND target_id IS ?4
             ORDER BY created DESC, action_id DESC
             LIMIT ?5",
          )?;
          stmt
            .query_map(
              rusqlite::params![actor_id, verb, target_kind, target_id, lookback],
              |row| row.get(0),
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let recent = recent
          .iter()
          .map(|s| decode_dt(s))
          .collect::<Result<Vec<_>>>()
          .map_err(other)?;

        if policy.is_duplicate(&recent, now) {
          return Ok(None);
        }

        tx.execute(
          "INSERT INTO actions (actor_id, verb, target_kind, target_id, created)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![actor_id, verb, target_kind, target_id, now_str],
        )?;
        let action_id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Some(action_id))
      })
      .await?;

    Ok(inserted.map(|action_id| Action {
      action_id,
      actor_id: input.actor_id,
      verb: input.verb,
      target: input.target,
      created: now,
    }))
  }

  async fn list_actions(&self, query: &ActionQuery) -> Result<Vec<Action>> {
    let mut conds: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    if let Some(actor_ids) = &query.actor_ids {
      if actor_ids.is_empty() {
        return Ok(Vec::new());
      }
      conds.push(format!("a.actor_id IN ({})", placeholders(actor_ids.len())));
      params.extend(actor_ids.iter().copied().map(Value::Integer));
    }
    if let Some(excluded) = query.exclude_actor {
      conds.push("a.actor_id != ?".to_owned());
      params.push(Value::Integer(excluded));
    }
    if let Some(verb) = &query.verb {
      conds.push("a.verb = ?".to_owned());
      params.push(Value::Text(verb.clone()));
    }

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };
    // SQLite treats a negative LIMIT as "no limit".
    params.push(Value::Integer(query.limit.map_or(-1, |l| l as i64)));

    let raws: Vec<RawAction> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {ACTION_COLUMNS} FROM actions a
           {where_clause}
           ORDER BY a.created DESC, a.action_id DESC
           LIMIT ?"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawAction::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAction::into_action).collect()
  }
}
