//! Resource model for the remote posts API.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Owner id sent with every update.
///
/// The upstream API is treated as single-tenant: `PUT /posts/{id}` always
/// carries `userId: 1`, whatever owner the caller had in mind.
pub const DEFAULT_USER_ID: u64 = 1;

/// Trait implemented by every resource type served by the remote API.
///
/// Ties a type to its REST collection path and to the prefixes of its query
/// keys (`["posts", ...]` for lists, `["post", id]` for single items).
///
/// # Example
///
/// ```
/// use query_kit::entity::{Post, Resource};
///
/// assert_eq!(Post::collection(), "posts");
/// assert_eq!(Post::item_prefix(), "post");
/// ```
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Type of the resource id as it appears in URLs and query keys.
    type Id: Display + Serialize + Clone + Send + Sync + 'static;

    /// Return the resource's id.
    fn id(&self) -> Self::Id;

    /// Collection path segment, also the list query key prefix.
    fn collection() -> &'static str;

    /// Single-item query key prefix.
    fn item_prefix() -> &'static str;
}

/// A post as returned by the remote API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Create responses from the placeholder API omit the owner.
    #[serde(default)]
    pub user_id: u64,
    pub id: u64,
    pub title: String,
    pub body: String,
}

impl Resource for Post {
    type Id = u64;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn collection() -> &'static str {
        "posts"
    }

    fn item_prefix() -> &'static str {
        "post"
    }
}

/// Payload for creating a post, also the editable part of an update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub body: String,
}

impl NewPost {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        NewPost {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Variables for the update mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostUpdate {
    pub id: u64,
    pub data: NewPost,
}

/// Wire body of `PUT /posts/{id}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostBody {
    pub title: String,
    pub body: String,
    pub id: u64,
    pub user_id: u64,
}

impl UpdatePostBody {
    /// Build the full replacement body, pinned to [`DEFAULT_USER_ID`].
    pub fn new(id: u64, data: &NewPost) -> Self {
        UpdatePostBody {
            title: data.title.clone(),
            body: data.body.clone(),
            id,
            user_id: DEFAULT_USER_ID,
        }
    }
}
