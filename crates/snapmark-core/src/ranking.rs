//! Most-viewed images, in counter-store order.

use std::collections::HashMap;

use crate::{
  Error, Result,
  counter::{CounterStore, RANKING_SET},
  image::Image,
  store::SocialStore,
};

/// The `n` most-viewed images, most viewed first.
///
/// The counter store decides the order; the relational store only resolves
/// ids. Ids that no longer resolve are dropped, and an unreachable counter
/// store yields an empty ranking rather than an error.
pub async fn ranked_content<S, C>(store: &S, counters: &C, n: usize) -> Result<Vec<Image>>
where
  S: SocialStore,
  C: CounterStore,
{
  let members = match counters.top_n(RANKING_SET.to_owned(), n).await {
    Ok(members) => members,
    Err(e) => {
      tracing::warn!(error = %e, "ranking unavailable; returning empty list");
      return Ok(Vec::new());
    }
  };

  let ids = parse_member_ids(&members);
  if ids.is_empty() {
    return Ok(Vec::new());
  }

  let images = store.get_images_by_ids(ids.clone()).await.map_err(Error::store)?;
  Ok(order_by_ranking(&ids, images))
}

/// Parse ranking-set members as image ids, skipping anything malformed.
pub fn parse_member_ids(members: &[String]) -> Vec<i64> {
  members
    .iter()
    .filter_map(|m| match m.parse::<i64>() {
      Ok(id) => Some(id),
      Err(_) => {
        tracing::warn!(member = %m, "ignoring non-numeric ranking member");
        None
      }
    })
    .collect()
}

/// Sort `images` by the position of their id in `ranked_ids`, dropping any
/// image whose id is not ranked.
pub fn order_by_ranking(ranked_ids: &[i64], images: Vec<Image>) -> Vec<Image> {
  let mut position = HashMap::with_capacity(ranked_ids.len());
  for (i, id) in ranked_ids.iter().enumerate() {
    position.entry(*id).or_insert(i);
  }

  let mut ranked: Vec<(usize, Image)> = images
    .into_iter()
    .filter_map(|img| position.get(&img.image_id).map(|&p| (p, img)))
    .collect();
  ranked.sort_by_key(|(p, _)| *p);
  ranked.into_iter().map(|(_, img)| img).collect()
}
