use std::backtrace::Backtrace;
use std::panic::PanicHookInfo;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use crate::paths::crash_report_dir;

fn secret_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"AKIA[0-9A-Z]{16}", "[REDACTED]"),
            (r"sk-[a-zA-Z0-9_\-]{20,}", "[REDACTED]"),
            (r"gh[pos]_[a-zA-Z0-9]{20,}", "[REDACTED]"),
            (r"Bearer [a-zA-Z0-9._\-]+", "Bearer [REDACTED]"),
            (
                r"(?i)((?:key|token|secret|password)=)[^\s&]{8,}",
                "${1}[REDACTED]",
            ),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
        .collect()
    })
}

/// Redacts credential-looking substrings.
///
/// Panic messages may quote terminal output, which routinely contains
/// pasted tokens, so everything written to a crash report passes through here.
pub fn sanitize_secrets(input: &str) -> String {
    secret_patterns()
        .iter()
        .fold(input.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

/// Writes a crash report for a panic and returns its path.
///
/// Runs inside the panic hook, so every failure is swallowed and reported
/// as `None`.
pub fn write_crash_report(info: &PanicHookInfo) -> Option<PathBuf> {
    let dir = crash_report_dir().ok()?;
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let path = dir.join(format!("crash_{timestamp}.json"));

    let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };

    let location = info.location().map(|loc| {
        serde_json::json!({
            "file": loc.file(),
            "line": loc.line(),
            "column": loc.column(),
        })
    });

    let report = serde_json::json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "panic_message": sanitize_secrets(&message),
        "location": location,
        "backtrace": sanitize_secrets(&Backtrace::force_capture().to_string()),
    });

    std::fs::create_dir_all(&dir).ok()?;
    std::fs::write(&path, serde_json::to_string_pretty(&report).ok()?).ok()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600));
    }

    Some(path)
}
