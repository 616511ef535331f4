//! Drapso data models.
//!
//! Records are fixed structs; backend rows are plain JSON until
//! `row_ext` normalizes them. Tagged enums carry commands and mutations.

pub mod command;
pub mod profile;
pub mod row_ext;
pub mod video;

pub use command::{Mutation, PlayerCommand};
pub use profile::{CachedIdentity, Profile, ProfileUpdate, Theme};
pub use row_ext::RowExt;
pub use video::{Comment, NewProduct, NewVideo, Notification, NotificationKind, Owner, Product, Video};
