use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppResult, Error};

/// Maximum comment length in characters.
pub const MAX_COMMENT_LEN: usize = 1000;

/// Fixed vocabulary of user actions against a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Like,
    Comment,
    View,
    Favorite,
    Share,
}

impl InteractionKind {
    pub const ALL: [InteractionKind; 5] = [
        Self::Like,
        Self::Comment,
        Self::View,
        Self::Favorite,
        Self::Share,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::View => "view",
            Self::Favorite => "favorite",
            Self::Share => "share",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed user action against a post. `user_id` is `None` for anonymous
/// view events. `content` and the author snapshot are only meaningful
/// for comments; the snapshot is captured at creation, never live-joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub post_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub kind: InteractionKind,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_email: Option<String>,
    /// Parent comment for threaded replies. One level of nesting.
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default = "default_approved")]
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

fn default_approved() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct NewInteraction {
    pub post_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub kind: InteractionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub approved: bool,
}

impl NewInteraction {
    /// A contentless interaction: like, favorite or share.
    pub fn of_kind(kind: InteractionKind, post_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            user_id: Some(user_id.into()),
            kind,
            content: None,
            author_name: None,
            author_email: None,
            parent_id: None,
            approved: true,
        }
    }

    /// A view event; anonymous when `user_id` is `None`.
    pub fn view(post_id: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            post_id: post_id.into(),
            user_id,
            kind: InteractionKind::View,
            content: None,
            author_name: None,
            author_email: None,
            parent_id: None,
            approved: true,
        }
    }

    pub fn comment(
        post_id: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
        author_name: impl Into<String>,
        author_email: impl Into<String>,
    ) -> Self {
        Self {
            post_id: post_id.into(),
            user_id: Some(user_id.into()),
            kind: InteractionKind::Comment,
            content: Some(content.into()),
            author_name: Some(author_name.into()),
            author_email: Some(author_email.into()),
            parent_id: None,
            approved: true,
        }
    }

    pub fn reply_to(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        match self.kind {
            InteractionKind::Comment => {
                let content = self.content.as_deref().unwrap_or("");
                if content.trim().is_empty() {
                    return Err(Error::Validation("comment must not be empty".into()));
                }
                if content.chars().count() > MAX_COMMENT_LEN {
                    return Err(Error::Validation(format!(
                        "comment exceeds {} characters",
                        MAX_COMMENT_LEN
                    )));
                }
            }
            _ => {
                if self.content.is_some() {
                    return Err(Error::Validation(format!(
                        "{} interactions carry no content",
                        self.kind
                    )));
                }
            }
        }
        Ok(())
    }
}
