//! Domain layer for data-permission administration.
//!
//! No I/O lives here: the tree builder, permission snapshot, page metadata,
//! screen state and rule compiler are shared by the repository layer, the
//! HTTP service and any client that renders the management screen.

pub mod columns;
pub mod error;
pub mod permissions;
pub mod roles;
pub mod rules;
pub mod screen;
pub mod tree;
pub mod types;
