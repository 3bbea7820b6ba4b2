// SPDX-License-Identifier: MPL-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A post or favorite record as returned by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Assigned by the data source on creation
    pub id: String,
    pub owner_id: String,
    /// Opaque storage reference, usually a blob URL
    pub payload_ref: String,
    pub caption: String,
    /// Assigned by the data source, never by the client
    pub created_at: DateTime<Utc>,
    /// For favorite records, the id of the favorited post
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
}

impl Item {
    /// Compare two items in feed order (newest first, ties broken by id).
    pub fn feed_order(&self, other: &Item) -> Ordering {
        other
            .created_at
            .cmp(&self.created_at)
            .then_with(|| other.id.cmp(&self.id))
    }

    /// Whether this item sorts strictly before `cursor` in feed order,
    /// i.e. is newer than the boundary the cursor refers to.
    pub fn is_before(&self, cursor: &Cursor) -> bool {
        (&self.created_at, &self.id) > (&cursor.created_at, &cursor.id)
    }
}

/// Pagination token referencing the last item of a fetched page.
///
/// The contents are only meaningful to the data source that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    created_at: DateTime<Utc>,
    id: String,
}

impl Cursor {
    /// Cursor that resumes strictly after `item`
    pub fn after(item: &Item) -> Self {
        Self {
            created_at: item.created_at,
            id: item.id.clone(),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// One page of results from `DataSource::fetch_page`.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Descending by `(created_at, id)`
    pub items: Vec<Item>,
    pub next_cursor: Option<Cursor>,
}

impl Page {
    /// Build a page whose cursor points at its last item
    pub fn from_items(items: Vec<Item>) -> Self {
        let next_cursor = items.last().map(Cursor::after);
        Self { items, next_cursor }
    }
}

/// Backing collection a feed reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Posts,
    Favorites,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Posts => "posts",
            Collection::Favorites => "favorites",
        }
    }
}

/// Identifies one feed: a collection plus an optional owner filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedQuery {
    pub collection: Collection,
    pub owner: Option<String>,
}

impl FeedQuery {
    /// The global home feed (all posts)
    pub fn home() -> Self {
        Self {
            collection: Collection::Posts,
            owner: None,
        }
    }

    /// Posts created by `owner_id`
    pub fn user_posts(owner_id: &str) -> Self {
        Self {
            collection: Collection::Posts,
            owner: Some(owner_id.to_string()),
        }
    }

    /// Favorites recorded by `owner_id`
    pub fn favorites(owner_id: &str) -> Self {
        Self {
            collection: Collection::Favorites,
            owner: Some(owner_id.to_string()),
        }
    }

    /// Whether a record created in `collection` belongs in this feed
    pub fn admits(&self, collection: Collection, item: &Item) -> bool {
        self.collection == collection
            && self
                .owner
                .as_deref()
                .is_none_or(|owner| owner == item.owner_id)
    }
}

impl fmt::Display for FeedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{}/{}", self.collection.as_str(), owner),
            None => f.write_str(self.collection.as_str()),
        }
    }
}

/// Public profile shown on the profile and search screens.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub username: String,
    pub profile_image: String,
}

/// Partial profile update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub profile_image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(id: &str, secs: i64) -> Item {
        Item {
            id: id.to_string(),
            owner_id: "u1".to_string(),
            payload_ref: String::new(),
            caption: String::new(),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            subject_id: None,
        }
    }

    #[test]
    fn feed_order_is_newest_first_with_id_tiebreak() {
        let mut items = vec![item("a", 1), item("c", 5), item("b", 5), item("d", 3)];
        items.sort_by(Item::feed_order);
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["c", "b", "d", "a"]);
    }

    #[test]
    fn is_before_compares_against_cursor_boundary() {
        let cursor = Cursor::after(&item("m", 5));
        assert!(item("z", 5).is_before(&cursor));
        assert!(item("a", 6).is_before(&cursor));
        assert!(!item("m", 5).is_before(&cursor));
        assert!(!item("a", 5).is_before(&cursor));
    }

    #[test]
    fn owner_filter_scopes_admission() {
        let post = item("p", 1);
        assert!(FeedQuery::home().admits(Collection::Posts, &post));
        assert!(FeedQuery::user_posts("u1").admits(Collection::Posts, &post));
        assert!(!FeedQuery::user_posts("u2").admits(Collection::Posts, &post));
        assert!(!FeedQuery::favorites("u1").admits(Collection::Posts, &post));
        assert!(FeedQuery::favorites("u1").admits(Collection::Favorites, &post));
    }

    #[test]
    fn display_names_the_feed() {
        assert_eq!(FeedQuery::home().to_string(), "posts");
        assert_eq!(FeedQuery::favorites("u9").to_string(), "favorites/u9");
    }
}
