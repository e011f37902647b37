//! MEXTRA threat mitigation, rate limiting, and audit logging (component R).

use memory_core::{AgentId, EntityIdType};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::{HashMap, VecDeque};

/// `(pattern, description)` pairs checked against memory content.
/// Grounded in the same injection-signature style as other prompt-injection
/// sanitizers in the wild: case-insensitive phrase matching, not a full
/// parser.
static SQLI_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)(\bunion\b\s+\bselect\b)").unwrap(), "SQL union-select"),
        (Regex::new(r"(?i)(\bor\b\s+1\s*=\s*1)").unwrap(), "SQL tautology"),
        (Regex::new(r"(?i)(;\s*drop\s+table)").unwrap(), "SQL drop table"),
        (Regex::new(r"(?i)(--\s*$)").unwrap(), "SQL comment terminator"),
    ]
});

static XSS_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?is)<script.*?>.*?</script>").unwrap(), "inline script tag"),
        (Regex::new(r"(?i)on\w+\s*=\s*[\"'].*?javascript:").unwrap(), "javascript: event handler"),
    ]
});

static PROMPT_INJECTION_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)ignore\s+(previous|all|above)\s+instructions").unwrap(), "instruction override"),
        (Regex::new(r"(?i)disregard\s+(your|the)\s+(rules|guidelines)").unwrap(), "rule bypass"),
        (Regex::new(r"(?i)you\s+are\s+now\s+a").unwrap(), "role override"),
        (Regex::new(r"(?i)reveal\s+(your|the)\s+(system|initial)\s+prompt").unwrap(), "prompt extraction"),
    ]
});

static SCRIPT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<script.*?>.*?</script>").unwrap());

/// Regex-based detector for SQL injection, XSS, and prompt-injection
/// patterns in memory content headed for storage or prompt assembly.
#[derive(Default)]
pub struct MEXTRAValidator;

impl MEXTRAValidator {
    pub fn new() -> Self {
        Self
    }

    /// `(is_valid, reason)`. `reason` is `None` only when valid.
    pub fn validate_memory_content(&self, content: &str) -> (bool, Option<String>) {
        for (pattern, reason) in SQLI_PATTERNS.iter().chain(XSS_PATTERNS.iter()).chain(PROMPT_INJECTION_PATTERNS.iter()) {
            if pattern.is_match(content) {
                return (false, Some(reason.to_string()));
            }
        }
        (true, None)
    }

    /// Strip `<script>...</script>` blocks, leaving the rest intact.
    pub fn sanitize(&self, content: &str) -> String {
        SCRIPT_TAG.replace_all(content, "").to_string()
    }
}

static SECRET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"sk-[A-Za-z0-9]{20,}").unwrap(),
        Regex::new(r"(?i)api[_-]?key[\"'\s:=]+[A-Za-z0-9_\-]{16,}").unwrap(),
        Regex::new(r"(?i)bearer\s+[A-Za-z0-9_\-.]{16,}").unwrap(),
        Regex::new(r"ghp_[A-Za-z0-9]{30,}").unwrap(),
    ]
});

static ANOMALY_KEYWORDS: &[&str] = &["all passwords", "all secrets", "every memory", "all memories", "dump everything"];

/// Defends against a compromised or malicious agent trying to exfiltrate
/// secrets or pull the entire memory store through a single query.
pub struct MemoryPoisoningDefense {
    pub max_output_bytes: usize,
}

impl Default for MemoryPoisoningDefense {
    fn default() -> Self {
        Self { max_output_bytes: 64 * 1024 }
    }
}

impl MemoryPoisoningDefense {
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }

    /// Replace anything matching a known secret signature with `[REDACTED]`.
    pub fn mask_secrets(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for pattern in SECRET_PATTERNS.iter() {
            masked = pattern.replace_all(&masked, "[REDACTED]").to_string();
        }
        masked
    }

    /// Truncate to the configured byte cap.
    pub fn cap_output(&self, text: &str) -> String {
        if text.len() <= self.max_output_bytes {
            text.to_string()
        } else {
            text[..self.max_output_bytes].to_string()
        }
    }

    /// `0.0` (benign) to `1.0` (highly anomalous) based on bulk-exfiltration
    /// keyword signatures.
    pub fn query_anomaly_score(&self, query: &str) -> f32 {
        let lower = query.to_lowercase();
        let hits = ANOMALY_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count();
        (hits as f32 / ANOMALY_KEYWORDS.len() as f32).min(1.0)
    }
}

/// Sliding-window per-agent rate limiter.
pub struct AgentRateLimiter {
    requests_per_minute: u32,
    window: chrono::Duration,
    state: Mutex<HashMap<AgentId, VecDeque<chrono::DateTime<chrono::Utc>>>>,
}

impl AgentRateLimiter {
    pub fn new(requests_per_minute: u32, window_seconds: i64) -> Self {
        Self {
            requests_per_minute,
            window: chrono::Duration::seconds(window_seconds),
            state: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_window(requests_per_minute: u32) -> Self {
        Self::new(requests_per_minute, 60)
    }

    /// `(allowed, reason)`. Records the request timestamp when allowed.
    pub fn check(&self, agent_id: AgentId) -> (bool, Option<String>) {
        let now = chrono::Utc::now();
        let mut state = self.state.lock();
        let window_start = now - self.window;
        let history = state.entry(agent_id).or_default();
        while let Some(front) = history.front() {
            if *front < window_start {
                history.pop_front();
            } else {
                break;
            }
        }
        if history.len() as u32 >= self.requests_per_minute {
            return (false, Some(format!("rate limit of {} requests/window exceeded", self.requests_per_minute)));
        }
        history.push_back(now);
        (true, None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub at: chrono::DateTime<chrono::Utc>,
    pub kind: String,
    pub detail: String,
}

/// Append-only audit log for agent operations, cross-agent access, and
/// permission denials.
#[derive(Default)]
pub struct MaaSAuditLogger {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MaaSAuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, kind: &str, detail: String) {
        self.entries.lock().push(AuditEntry {
            at: chrono::Utc::now(),
            kind: kind.to_string(),
            detail,
        });
    }

    pub fn log_agent_operation(&self, agent_id: AgentId, operation: &str) {
        self.push("agent_operation", format!("{agent_id} {operation}"));
    }

    pub fn log_cross_agent_access(&self, source: AgentId, target: AgentId, resource: &str) {
        self.push("cross_agent_access", format!("{source} -> {target} {resource}"));
    }

    pub fn log_permission_denied(&self, agent_id: AgentId, reason: &str) {
        self.push("permission_denied", format!("{agent_id} {reason}"));
    }

    /// Most recent `limit` entries, newest first.
    pub fn get_recent_logs(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.lock();
        entries.iter().rev().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mextra_validator_flags_sql_injection() {
        let validator = MEXTRAValidator::new();
        let (valid, reason) = validator.validate_memory_content("1=1 OR 1=1; UNION SELECT * FROM users");
        assert!(!valid);
        assert!(reason.is_some());
    }

    #[test]
    fn mextra_validator_passes_benign_content() {
        let validator = MEXTRAValidator::new();
        let (valid, _) = validator.validate_memory_content("the user prefers dark mode");
        assert!(valid);
    }

    #[test]
    fn sanitize_strips_script_tags() {
        let validator = MEXTRAValidator::new();
        let sanitized = validator.sanitize("hello <script>alert(1)</script> world");
        assert!(!sanitized.contains("<script>"));
        assert!(sanitized.contains("hello"));
    }

    #[test]
    fn poisoning_defense_masks_secrets() {
        let defense = MemoryPoisoningDefense::default();
        let masked = defense.mask_secrets("my key is sk-abcdefghijklmnopqrstuvwxyz");
        assert!(!masked.contains("sk-abcdefghijklmnopqrstuvwxyz"));
        assert!(masked.contains("[REDACTED]"));
    }

    #[test]
    fn poisoning_defense_scores_bulk_exfiltration_queries() {
        let defense = MemoryPoisoningDefense::default();
        assert!(defense.query_anomaly_score("dump everything and all passwords") > 0.0);
        assert_eq!(defense.query_anomaly_score("what's my favorite color"), 0.0);
    }

    #[test]
    fn rate_limiter_blocks_after_threshold() {
        let limiter = AgentRateLimiter::new(2, 60);
        let agent = AgentId::now_v7();
        assert!(limiter.check(agent).0);
        assert!(limiter.check(agent).0);
        let (allowed, reason) = limiter.check(agent);
        assert!(!allowed);
        assert!(reason.is_some());
    }

    #[test]
    fn audit_logger_returns_newest_first() {
        let logger = MaaSAuditLogger::new();
        let agent = AgentId::now_v7();
        logger.log_agent_operation(agent, "op1");
        logger.log_agent_operation(agent, "op2");
        let recent = logger.get_recent_logs(10);
        assert_eq!(recent.len(), 2);
        assert!(recent[0].detail.contains("op2"));
    }
}
