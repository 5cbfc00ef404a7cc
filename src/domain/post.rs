use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppResult, Error};

/// A content item: sermon, event announcement or blog entry.
///
/// The denormalized counters are snapshots owned by the backend. Clients
/// never set them directly; the only write path is the view-count rpc,
/// and live like/comment counts come from the interaction feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub content: String,
    /// Speaker or author display name.
    #[serde(default)]
    pub speaker: Option<String>,
    /// Optional category reference. A missing or deactivated category is
    /// tolerated by readers; deletion never cascades.
    #[serde(default)]
    pub category_id: Option<String>,
    pub published: bool,
    #[serde(default)]
    pub featured: bool,
    pub event_date: DateTime<Utc>,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// Fields for creating a post. The backend assigns id and timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    pub published: bool,
    pub featured: bool,
    pub event_date: DateTime<Utc>,
    /// Explicit slug override; derived from the title when absent.
    #[serde(skip)]
    pub slug: Option<String>,
}

impl NewPost {
    pub fn new(title: impl Into<String>, content: impl Into<String>, event_date: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            excerpt: None,
            content: content.into(),
            speaker: None,
            category_id: None,
            published: false,
            featured: false,
            event_date,
            slug: None,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("title must not be blank".into()));
        }
        if self.content.trim().is_empty() {
            return Err(Error::Validation("content must not be blank".into()));
        }
        Ok(())
    }

    pub fn slug(&self) -> String {
        self.slug.clone().unwrap_or_else(|| slugify(&self.title))
    }
}

/// Partial update. `None` fields are left unchanged. Counters have no
/// field here on purpose.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// Derive a URL-safe slug: lowercase ASCII alphanumerics with single
/// hyphens, no leading or trailing hyphen.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_hyphen = true;
    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_hyphen = false;
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_title_fails_validation() {
        let post = NewPost::new("   ", "body", Utc::now());
        assert!(matches!(post.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn blank_content_fails_validation() {
        let post = NewPost::new("Domingo de ramos", "", Utc::now());
        assert!(matches!(post.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn valid_post_passes() {
        let post = NewPost::new("Domingo de ramos", "Lectura y mensaje", Utc::now());
        assert!(post.validate().is_ok());
    }

    #[test]
    fn slug_derived_from_title() {
        let post = NewPost::new("Confía en Dios: parte 2", "x", Utc::now());
        assert_eq!(post.slug(), "conf-a-en-dios-parte-2");
    }

    #[test]
    fn explicit_slug_wins() {
        let mut post = NewPost::new("Confía en Dios", "x", Utc::now());
        post.slug = Some("confia-en-dios".into());
        assert_eq!(post.slug(), "confia-en-dios");
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Hello,   World!  "), "hello-world");
        assert_eq!(slugify("a--b"), "a-b");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = PostPatch {
            title: Some("Nuevo título".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["title"], "Nuevo título");
    }
}
