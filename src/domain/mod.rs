// Domain types - pure data, validation, no side effects
pub mod category;
pub mod interaction;
pub mod post;
pub mod user;

pub use category::{Category, CategoryPatch, NewCategory};
pub use interaction::{Interaction, InteractionKind, NewInteraction, MAX_COMMENT_LEN};
pub use post::{slugify, NewPost, Post, PostPatch};
pub use user::{Role, Session, User};
