//! Configuration validation.
//!
//! Detects unknown or misspelled fields, type errors and settings that would
//! make the relay misbehave at runtime.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use {secrecy::ExposeSecret, serde_json::Value};

use crate::{
    env_subst::has_placeholder,
    loader::{ConfigFormat, find_config_file, read_substituted},
    schema::RelayConfig,
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "missing",
    /// "range", "attachments", "env"
    pub category: &'static str,
    /// Dotted path, e.g. "chat.chunk_size"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    /// Dynamic keys whose values have a known shape.
    Map(Box<KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Map, Struct};

    Struct(HashMap::from([
        (
            "agent",
            Struct(HashMap::from([
                ("endpoint", Leaf),
                ("access_token", Leaf),
                ("request_timeout_secs", Leaf),
            ])),
        ),
        (
            "chat",
            Struct(HashMap::from([
                ("placeholder", Leaf),
                ("show_tools", Leaf),
                ("personal_memory", Leaf),
                ("chunk_size", Leaf),
                ("stream_buffer", Leaf),
            ])),
        ),
        (
            "attachments",
            Struct(HashMap::from([
                ("max_bytes", Leaf),
                ("mime_map", Map(Box::new(Leaf))),
                ("supported", Leaf),
            ])),
        ),
        (
            "telegram",
            Struct(HashMap::from([("token", Leaf), ("chunk_size", Leaf)])),
        ),
        (
            "slack",
            Struct(HashMap::from([("bot_token", Leaf), ("app_token", Leaf)])),
        ),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or the discovered one if `path`
/// is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path.map(Path::to_path_buf).or_else(find_config_file);
    let Some(actual_path) = config_path else {
        let mut result = validate_config(&RelayConfig::default());
        result.diagnostics.insert(
            0,
            Diagnostic::new(
                Severity::Info,
                "missing",
                "",
                "no config file found; using defaults",
            ),
        );
        return result;
    };

    let format = match ConfigFormat::from_path(&actual_path) {
        Ok(format) => format,
        Err(e) => return failed(actual_path, e),
    };
    match read_substituted(&actual_path) {
        Ok(raw) => {
            let mut result = validate_str(&raw, format);
            result.config_path = Some(actual_path);
            result
        },
        Err(e) => failed(actual_path, e),
    }
}

fn failed(path: PathBuf, error: crate::Error) -> ValidationResult {
    ValidationResult {
        diagnostics: vec![Diagnostic::new(
            Severity::Error,
            "syntax",
            "",
            error.to_string(),
        )],
        config_path: Some(path),
    }
}

/// Validate already env-substituted config text without touching the
/// file system.
#[must_use]
pub fn validate_str(raw: &str, format: ConfigFormat) -> ValidationResult {
    let mut diagnostics = Vec::new();

    // 1. Syntax
    let tree: Value = match format.parse(raw) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("syntax error: {e}"),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    // 2. Unknown fields
    check_unknown_fields(&tree, &build_schema_map(), "", &mut diagnostics);

    // 3. Types, then semantics on the typed config
    match format.parse::<RelayConfig>(raw) {
        Ok(config) => diagnostics.extend(validate_config(&config).diagnostics),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Semantic checks on a parsed config.
#[must_use]
pub fn validate_config(config: &RelayConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();
    check_agent(config, &mut diagnostics);
    check_chunk_sizes(config, &mut diagnostics);
    check_attachments(config, &mut diagnostics);
    check_telegram(config, &mut diagnostics);
    check_slack(config, &mut diagnostics);
    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Value::Object(table) = value else {
        return;
    };
    for (key, child) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match schema {
            KnownKeys::Struct(fields) => match fields.get(key.as_str()) {
                Some(child_schema) => check_unknown_fields(child, child_schema, &path, diagnostics),
                None => {
                    let known: Vec<&str> = fields.keys().copied().collect();
                    let message = match suggest(key, &known, 3) {
                        Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
                        None => "unknown field".to_string(),
                    };
                    diagnostics.push(Diagnostic::new(
                        Severity::Error,
                        "unknown-field",
                        path,
                        message,
                    ));
                },
            },
            KnownKeys::Map(value_schema) => {
                check_unknown_fields(child, value_schema, &path, diagnostics);
            },
            KnownKeys::Leaf => {},
        }
    }
}

fn check_agent(config: &RelayConfig, diagnostics: &mut Vec<Diagnostic>) {
    match config.agent.endpoint.as_deref().map(str::trim) {
        None | Some("") => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "missing",
            "agent.endpoint",
            "the agent engine endpoint is required",
        )),
        Some(endpoint) if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "range",
                "agent.endpoint",
                "endpoint must be an http(s) URL",
            ));
        },
        Some(endpoint) if !endpoint.contains("/v1/") && !endpoint.contains("/v1beta1/") => {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "range",
                "agent.endpoint",
                "endpoint has no API version segment; memory generation will use the full URL",
            ));
        },
        Some(_) => {},
    }

    match &config.agent.access_token {
        None => diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "missing",
            "agent.access_token",
            "no access token; requests will be unauthenticated",
        )),
        Some(token) if has_placeholder(token.expose_secret()) => {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "env",
                "agent.access_token",
                "environment placeholder was not resolved",
            ));
        },
        Some(_) => {},
    }

    if config.agent.request_timeout_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "range",
            "agent.request_timeout_secs",
            "timeout must be greater than zero",
        ));
    }
}

fn check_chunk_sizes(config: &RelayConfig, diagnostics: &mut Vec<Diagnostic>) {
    for (path, size) in [
        ("chat.chunk_size", config.chat.chunk_size),
        ("telegram.chunk_size", config.telegram.chunk_size),
    ] {
        if size == 0 {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "range",
                path,
                "chunk size must be greater than zero",
            ));
        }
    }
    if config.telegram.chunk_size > 4096 {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "range",
            "telegram.chunk_size",
            "Telegram rejects messages longer than 4096 characters",
        ));
    }
    if config.chat.stream_buffer == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Info,
            "range",
            "chat.stream_buffer",
            "a zero stream buffer is raised to 1",
        ));
    }
}

fn check_attachments(config: &RelayConfig, diagnostics: &mut Vec<Diagnostic>) {
    match config.attachments.policy() {
        Ok(policy) => {
            for mime in policy.unreachable_types() {
                diagnostics.push(Diagnostic::new(
                    Severity::Warning,
                    "attachments",
                    "attachments.supported",
                    format!("\"{mime}\" is supported but no hint maps to it"),
                ));
            }
        },
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "attachments",
            "attachments",
            e.to_string(),
        )),
    }
}

fn check_telegram(config: &RelayConfig, diagnostics: &mut Vec<Diagnostic>) {
    match &config.telegram.token {
        None => diagnostics.push(Diagnostic::new(
            Severity::Info,
            "missing",
            "telegram.token",
            "no bot token; `relay telegram` will not start",
        )),
        Some(token) if has_placeholder(token.expose_secret()) => {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "env",
                "telegram.token",
                "environment placeholder was not resolved",
            ));
        },
        Some(_) => {},
    }
}

/// Slack is optional; only a half-configured or unresolved section is
/// reported.
fn check_slack(config: &RelayConfig, diagnostics: &mut Vec<Diagnostic>) {
    let tokens = [
        ("slack.bot_token", &config.slack.bot_token),
        ("slack.app_token", &config.slack.app_token),
    ];
    if tokens.iter().all(|(_, token)| token.is_none()) {
        return;
    }
    for (path, token) in tokens {
        match token {
            None => diagnostics.push(Diagnostic::new(
                Severity::Error,
                "missing",
                path,
                "Socket Mode needs both slack.bot_token and slack.app_token",
            )),
            Some(token) if has_placeholder(token.expose_secret()) => {
                diagnostics.push(Diagnostic::new(
                    Severity::Warning,
                    "env",
                    path,
                    "environment placeholder was not resolved",
                ));
            },
            Some(_) => {},
        }
    }
}
