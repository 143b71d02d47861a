//! External collaborators: the remote catalog and the on-disk store.

pub mod catalog;
pub mod gw2;
pub mod store;
