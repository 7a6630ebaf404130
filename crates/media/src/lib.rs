//! Attachment pipeline: resolve MIME hints, enforce size and type policy, and
//! turn uploads into inline message parts.

pub mod error;
pub mod mime;
pub mod normalize;

pub use {
    error::{Error, Result},
    normalize::{AttachmentPolicy, NormalizeReport, SkipReason, SkippedAttachment, normalize},
};
