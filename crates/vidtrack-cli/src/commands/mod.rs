//! Command handlers.

pub(crate) mod track;
pub(crate) mod upload;
