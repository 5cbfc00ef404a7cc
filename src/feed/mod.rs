// Feed state containers: UI-facing caches kept in sync with the gateway
// through fetches, optimistic writes and push-event merging.
pub mod interactions;
pub mod posts;

pub use interactions::InteractionFeed;
pub use posts::PostFeed;

/// The signed-in user as seen by a feed. Name and email are snapshotted
/// into comments at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewer {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl Viewer {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }
    }
}

impl From<&crate::domain::User> for Viewer {
    fn from(user: &crate::domain::User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}
