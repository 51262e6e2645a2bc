//! Shared HTTP constants.

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
/// Multipart field name recognised as the upload even without a filename.
pub(crate) const FILE_FIELD: &str = "file";
pub(crate) const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";
