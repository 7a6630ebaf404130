//! Attachment normalization.
//!
//! Every upload is checked against the size ceiling and the supported MIME
//! set. Files that fail are skipped with a diagnostic; the rest become
//! [`NormalizedPart::InlineData`] in input order. Nothing here fails the turn.

use std::collections::{BTreeSet, HashMap};

use {
    relay_common::{AttachedFile, NormalizedPart},
    tracing::{debug, warn},
};

use crate::{Error, Result, mime};

/// 20 MiB, the inline request ceiling of the agent engine.
pub const DEFAULT_MAX_BYTES: u64 = 20 * 1024 * 1024;

/// Size and type rules applied to every upload.
#[derive(Debug, Clone)]
pub struct AttachmentPolicy {
    pub max_bytes: u64,
    pub hint_map: HashMap<String, String>,
    pub supported: BTreeSet<String>,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            hint_map: mime::default_hint_map(),
            supported: mime::default_supported(),
        }
    }
}

impl AttachmentPolicy {
    /// Build a policy, falling back to the built-in tables for `None`.
    pub fn new(
        max_bytes: u64,
        hint_map: Option<HashMap<String, String>>,
        supported: Option<Vec<String>>,
    ) -> Result<Self> {
        if max_bytes == 0 {
            return Err(Error::invalid_policy("max_bytes must be greater than zero"));
        }
        let hint_map = match hint_map {
            Some(map) => map
                .into_iter()
                .map(|(hint, mime)| {
                    let key = mime::hint_key(&hint)
                        .ok_or_else(|| Error::invalid_policy(format!("empty hint for {mime}")))?;
                    Ok((key, mime.to_ascii_lowercase()))
                })
                .collect::<Result<HashMap<_, _>>>()?,
            None => mime::default_hint_map(),
        };
        let supported = match supported {
            Some(list) => list
                .into_iter()
                .map(|mime| {
                    if mime.contains('/') {
                        Ok(mime.to_ascii_lowercase())
                    } else {
                        Err(Error::invalid_policy(format!(
                            "supported entry {mime:?} is not a MIME type"
                        )))
                    }
                })
                .collect::<Result<BTreeSet<_>>>()?,
            None => mime::default_supported(),
        };
        Ok(Self {
            max_bytes,
            hint_map,
            supported,
        })
    }

    /// Supported MIME types that no hint resolves to.
    pub fn unreachable_types(&self) -> Vec<&str> {
        self.supported
            .iter()
            .filter(|m| !self.hint_map.values().any(|v| v == *m))
            .map(String::as_str)
            .collect()
    }
}

/// Why an upload was left out of the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TooLarge { size: u64, limit: u64 },
    UnsupportedType { hint: Option<String> },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooLarge { size, limit } => {
                write!(f, "file size {size} bytes exceeds the {limit} byte limit")
            },
            Self::UnsupportedType { hint: Some(hint) } => {
                write!(f, "unsupported file type {hint:?}")
            },
            Self::UnsupportedType { hint: None } => f.write_str("missing file type"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAttachment {
    pub name: String,
    pub reason: SkipReason,
}

/// Output of [`normalize`]: accepted parts plus a diagnostic per skipped file.
#[derive(Debug, Default, Clone)]
pub struct NormalizeReport {
    pub parts: Vec<NormalizedPart>,
    pub skipped: Vec<SkippedAttachment>,
}

/// Normalize uploads against `policy`, consuming them.
pub fn normalize(files: Vec<AttachedFile>, policy: &AttachmentPolicy) -> NormalizeReport {
    let mut report = NormalizeReport::default();

    for file in files {
        match check(&file, policy) {
            Ok(mime_type) => {
                debug!(name = %file.name, mime_type, bytes = file.content.len(), "attachment accepted");
                let mime_type = mime_type.to_string();
                report
                    .parts
                    .push(NormalizedPart::inline(mime_type, file.content));
            },
            Err(reason) => {
                warn!(name = %file.name, %reason, "skipping attachment");
                report.skipped.push(SkippedAttachment {
                    name: file.name,
                    reason,
                });
            },
        }
    }

    report
}

fn check<'p>(
    file: &AttachedFile,
    policy: &'p AttachmentPolicy,
) -> std::result::Result<&'p str, SkipReason> {
    let size = file.effective_size();
    if size > policy.max_bytes {
        return Err(SkipReason::TooLarge {
            size,
            limit: policy.max_bytes,
        });
    }

    let unsupported = || SkipReason::UnsupportedType {
        hint: file.type_hint.clone(),
    };
    let hint = file.type_hint.as_deref().ok_or_else(unsupported)?;
    let mime_type = mime::resolve(hint, &policy.hint_map).ok_or_else(unsupported)?;
    if !policy.supported.contains(mime_type) {
        return Err(unsupported());
    }
    Ok(mime_type)
}
