//! Hand-authored schema history for the minipress application tables.

mod v0;
mod v1;
mod v2;

pub use v0::CreateVersionTable;
pub use v1::CreatePosts;
pub use v2::CreateUsers;

use super::Migration;

/// The full ordered catalog of application migrations.
pub fn catalog() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(CreateVersionTable),
        Box::new(CreatePosts),
        Box::new(CreateUsers),
    ]
}
