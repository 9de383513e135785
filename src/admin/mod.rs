//! Client quota management surface.
//!
//! CRUD handlers for the `/clients` routes. Plumbing around the store; the
//! admission core never calls into this module.

pub mod handlers;

pub use handlers::{create_client, delete_client, list_clients, update_client};
