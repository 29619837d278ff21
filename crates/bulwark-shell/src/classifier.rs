//! Security classifier — pattern rules that grade a shell command before it runs.
//!
//! Commands are normalized first (quotes, backslashes and `$IFS` tricks removed,
//! whitespace collapsed) so trivially obfuscated variants hit the same rules.
//! This is a cooperative gate, not a parser: a determined command can evade it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// How dangerous a command is judged to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Warn,
    Block,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Warn => "warn",
            Severity::Block => "block",
        }
    }
}

/// The classifier's decision for a single command string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityVerdict {
    pub allowed: bool,
    pub severity: Severity,
    /// Rule category, empty when nothing matched.
    pub category: String,
    /// Source of the matching pattern, empty when nothing matched.
    pub pattern: String,
    pub reason: String,
}

impl SecurityVerdict {
    /// Verdict for a command that matched no rule.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            severity: Severity::None,
            category: String::new(),
            pattern: String::new(),
            reason: String::new(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.severity == Severity::Block
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warn
    }

    fn from_rule(rule: &SecurityRule) -> Self {
        Self {
            allowed: rule.severity != Severity::Block,
            severity: rule.severity,
            category: rule.category.to_string(),
            pattern: rule.pattern.to_string(),
            reason: rule.reason.to_string(),
        }
    }
}

struct SecurityRule {
    category: &'static str,
    severity: Severity,
    pattern: &'static str,
    reason: &'static str,
    regex: Regex,
}

/// Rule table: (category, severity, pattern, reason). Order matters — the
/// first matching block rule wins, otherwise the first warn rule of the
/// highest severity seen.
const RULE_TABLE: &[(&str, Severity, &str, &str)] = &[
    (
        "destructive_filesystem",
        Severity::Block,
        r"\brm\s+(?:-\S+\s+)*(?:-[a-zA-Z]*[rR][a-zA-Z]*|--recursive)\s+(?:-\S+\s+)*(?:/|/\*|~|~/|~/\*|\$HOME|\$HOME/|\$HOME/\*|\$\{HOME\})(?:\s|[;&|)]|$)",
        "Recursive deletion of the root or home directory",
    ),
    (
        "destructive_filesystem",
        Severity::Block,
        r"\brm\b.*--no-preserve-root",
        "Deletion with root protection disabled",
    ),
    (
        "destructive_filesystem",
        Severity::Block,
        r"\bchmod\s+(?:-\S+\s+)*-[a-zA-Z]*R[a-zA-Z]*\s+(?:-\S+\s+)*[0-7]?777\s+/(?:\s|$)",
        "Recursive world-writable permissions on the root directory",
    ),
    (
        "disk_overwrite",
        Severity::Block,
        r"\bmkfs(?:\.[a-z0-9]+)?\b",
        "Filesystem creation destroys existing data",
    ),
    (
        "disk_overwrite",
        Severity::Block,
        r"\bdd\b.*\bof=/dev/(?:sd[a-z]|hd[a-z]|vd[a-z]|xvd[a-z]|nvme\d|mmcblk\d|disk\d)",
        "Raw write to a block device",
    ),
    (
        "disk_overwrite",
        Severity::Block,
        r">\s*/dev/(?:sd[a-z]|hd[a-z]|vd[a-z]|xvd[a-z]|nvme\d|mmcblk\d|disk\d)",
        "Redirect into a block device",
    ),
    (
        "fork_bomb",
        Severity::Block,
        r":\s*\(\s*\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;?\s*:",
        "Fork bomb",
    ),
    (
        "remote_code_execution",
        Severity::Block,
        r"\b(?:curl|wget)\b[^|;&]*\|\s*(?:sudo\s+)?(?:ba|da|k|z)?sh\b",
        "Downloaded content piped straight into a shell",
    ),
    (
        "remote_code_execution",
        Severity::Block,
        r"\b(?:ba|da|k|z)?sh\s+<\(\s*(?:curl|wget)\b",
        "Downloaded content executed through process substitution",
    ),
    (
        "system_power",
        Severity::Block,
        r"(?:^|[;&|(]\s*)(?:sudo\s+)?(?:shutdown|reboot|halt|poweroff|init\s+[06])\b",
        "System power control",
    ),
    (
        "credential_tampering",
        Severity::Block,
        r"(?:>|\btee\s+(?:-a\s+)?)\s*/etc/(?:passwd|shadow|sudoers|group)\b",
        "Overwrite of system credential files",
    ),
    (
        "privilege_escalation",
        Severity::Warn,
        r"(?:^|[;&|(]\s*)(?:sudo|doas)\b",
        "Runs with elevated privileges",
    ),
    (
        "privilege_escalation",
        Severity::Warn,
        r"(?:^|[;&|(]\s*)su(?:\s|$)",
        "Switches user",
    ),
    (
        "network_exfiltration",
        Severity::Warn,
        r"\b(?:nc|ncat|netcat|socat)\b",
        "Raw network socket tool",
    ),
    (
        "network_exfiltration",
        Severity::Warn,
        r"\bcurl\b.*\s(?:-d|--data(?:-[a-z]+)?|-F|--form|-T|--upload-file)(?:\s|=|$)",
        "Uploads data to a remote host",
    ),
    (
        "network_exfiltration",
        Severity::Warn,
        r"\bwget\b.*\s--post-(?:data|file)\b",
        "Uploads data to a remote host",
    ),
    (
        "network_exfiltration",
        Severity::Warn,
        r"\bscp\s",
        "Copies files to or from a remote host",
    ),
    (
        "destructive_vcs",
        Severity::Warn,
        r"\bgit\s+push\b.*\s(?:--force|-f|--force-with-lease)(?:\s|=|$)",
        "Force push rewrites remote history",
    ),
    (
        "destructive_vcs",
        Severity::Warn,
        r"\bgit\s+reset\s+--hard\b",
        "Discards uncommitted changes",
    ),
    (
        "destructive_vcs",
        Severity::Warn,
        r"\bgit\s+clean\s+(?:-\S+\s+)*-[a-zA-Z]*f",
        "Deletes untracked files",
    ),
    (
        "recursive_delete",
        Severity::Warn,
        r"\brm\s+(?:-\S+\s+)*(?:-[a-zA-Z]*[rR][a-zA-Z]*|--recursive)\b",
        "Recursive deletion",
    ),
    (
        "permission_change",
        Severity::Warn,
        r"\bchmod\s+(?:-\S+\s+)*[0-7]?777\b",
        "Makes files world-writable",
    ),
    (
        "permission_change",
        Severity::Warn,
        r"\bchown\s+(?:-\S+\s+)*-[a-zA-Z]*R",
        "Recursive ownership change",
    ),
];

static RULES: LazyLock<Vec<SecurityRule>> = LazyLock::new(|| {
    RULE_TABLE
        .iter()
        .filter_map(|&(category, severity, pattern, reason)| match Regex::new(pattern) {
            Ok(regex) => Some(SecurityRule {
                category,
                severity,
                pattern,
                reason,
                regex,
            }),
            Err(e) => {
                tracing::error!(category, pattern, error = %e, "Invalid security rule pattern");
                None
            }
        })
        .collect()
});

/// Classify a command string.
///
/// Pure and deterministic: the same input always yields the same verdict.
pub fn classify(command: &str) -> SecurityVerdict {
    let normalized = normalize(command);
    let mut strongest: Option<&SecurityRule> = None;

    for rule in RULES.iter() {
        if !rule.regex.is_match(&normalized) {
            continue;
        }
        if rule.severity == Severity::Block {
            return SecurityVerdict::from_rule(rule);
        }
        if strongest.is_none_or(|s| rule.severity > s.severity) {
            strongest = Some(rule);
        }
    }

    strongest
        .map(SecurityVerdict::from_rule)
        .unwrap_or_else(SecurityVerdict::allow)
}

/// Canonical form that rules are matched against.
fn normalize(command: &str) -> String {
    let expanded = command.replace("${IFS}", " ").replace("$IFS", " ");
    let stripped: String = expanded
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | '\\'))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
