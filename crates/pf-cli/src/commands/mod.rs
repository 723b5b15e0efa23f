//! CLI command implementations

pub(crate) mod catalog;
pub(crate) mod common;
pub(crate) mod drop;
pub(crate) mod dump;
pub(crate) mod export;
pub(crate) mod import;
pub(crate) mod restore;
