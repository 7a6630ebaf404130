use std::{fmt::Write as _, path::Path};

use {anyhow::Result, clap::Subcommand};

use relay_config::{Diagnostic, Severity, ValidationResult, validate};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print where configuration is looked up.
    Path,
}

pub fn handle_config(action: ConfigAction, explicit: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => {
            let result = validate(explicit);
            eprint!("{}", render_report(&result, verbose));
            if result.has_errors() {
                std::process::exit(1);
            }
            Ok(())
        },
        ConfigAction::Path => {
            match explicit
                .map(Path::to_path_buf)
                .or_else(relay_config::find_config_file)
            {
                Some(path) => println!("{}", path.display()),
                None => match relay_config::config_dir() {
                    Some(dir) => println!("no config file; would look in ./ and {}", dir.display()),
                    None => println!("no config file; would look in ./"),
                },
            }
            Ok(())
        },
    }
}

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn color(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "\x1b[31m",
        Severity::Warning => "\x1b[33m",
        Severity::Info => "\x1b[36m",
    }
}

fn render_line(out: &mut String, d: &Diagnostic) {
    let tint = color(d.severity);
    let _ = write!(out, "  {BOLD}{tint}{}{RESET} ", d.severity);
    if !d.path.is_empty() {
        let _ = write!(out, "{}: ", d.path);
    }
    let _ = writeln!(out, "{} [{}]", d.message, d.category);
}

/// Human-readable report for `relay config check`. Info lines only show with
/// `verbose`.
fn render_report(result: &ValidationResult, verbose: bool) -> String {
    let mut out = match &result.config_path {
        Some(path) => format!("Checking {}\n\n", path.display()),
        None => "No config file found; checking defaults.\n\n".to_string(),
    };

    let mut listed = result
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .peekable();
    let any_listed = listed.peek().is_some();
    for d in listed {
        render_line(&mut out, d);
    }
    if any_listed {
        out.push('\n');
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors + warnings == 0 {
        out.push_str("No issues found.\n");
    } else {
        let _ = writeln!(out, "{errors} error(s), {warnings} warning(s)");
    }
    out
}
