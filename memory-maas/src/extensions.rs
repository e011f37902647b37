//! Process-wide optional extension slots (component S).
//!
//! Each slot is a trait object for a collaborator that lives outside this
//! workspace (tenant resolution, usage tracking, audit sinks, response
//! filtering, chatbot auth/rate-limit/access control). Consumers check for
//! presence and call through; a missing slot degrades per §7's fail-open/
//! fail-closed split (access control fails closed, observers fail open).

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;

pub const TENANT_PROVIDER_VERSION: &str = "1.0.0";
pub const USAGE_TRACKER_VERSION: &str = "1.0.0";
pub const AUDIT_LOGGER_VERSION: &str = "1.1.0";
pub const CHATBOT_AUTH_VERSION: &str = "1.0.0";
pub const CHATBOT_RATE_LIMITER_VERSION: &str = "1.0.0";
pub const CHATBOT_ACCESS_CONTROLLER_VERSION: &str = "1.0.0";
pub const RESPONSE_FILTER_VERSION: &str = "1.0.0";

/// `true` if `version` is a well-formed `major.minor.patch` SemVer string.
/// Shared validation for every `*_VERSION` constant above.
pub fn is_semver(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

/// Resolves a tenant id for the current call context.
pub trait TenantProvider: Send + Sync {
    fn resolve_tenant(&self, agent_id: &str) -> Option<String>;
}

/// Tracks usage for billing/quota purposes. Failures are swallowed
/// (fail-open observer).
pub trait UsageTracker: Send + Sync {
    fn record_usage(&self, tenant_id: &str, operation: &str, units: u64);
}

/// External audit sink. `>= 1.1.0` adds the GDPR export/erasure methods.
pub trait AuditLoggerExt: Send + Sync {
    fn record(&self, kind: &str, detail: &str);
    fn export_for_subject(&self, subject_id: &str) -> Vec<String>;
    fn erase_for_subject(&self, subject_id: &str);
}

/// Filters assembled prompt content before it reaches a model. Fails open:
/// on error, the unfiltered content passes through.
pub trait ResponseFilter: Send + Sync {
    fn filter(&self, content: &str) -> String;
}

/// External memory provider (alternative to the in-crate `InMemoryMemoryProvider`).
pub trait MemoryProviderExt: Send + Sync {
    fn provider_name(&self) -> &str;
}

/// Authenticates chatbot-facing callers. Fails closed: a missing or erroring
/// slot denies the request.
pub trait ChatbotAuth: Send + Sync {
    fn authenticate(&self, token: &str) -> bool;
}

pub trait ChatbotRateLimiter: Send + Sync {
    fn allow(&self, caller_id: &str) -> bool;
}

pub trait ChatbotAccessController: Send + Sync {
    fn authorize(&self, caller_id: &str, resource: &str) -> bool;
}

#[derive(Default)]
struct Slots {
    tenant_provider: Option<Arc<dyn TenantProvider>>,
    usage_tracker: Option<Arc<dyn UsageTracker>>,
    audit_logger: Option<Arc<dyn AuditLoggerExt>>,
    response_filter: Option<Arc<dyn ResponseFilter>>,
    memory_provider: Option<Arc<dyn MemoryProviderExt>>,
    chatbot_auth: Option<Arc<dyn ChatbotAuth>>,
    chatbot_rate_limiter: Option<Arc<dyn ChatbotRateLimiter>>,
    chatbot_access_controller: Option<Arc<dyn ChatbotAccessController>>,
}

static SLOTS: Lazy<RwLock<Slots>> = Lazy::new(|| RwLock::new(Slots::default()));

/// Process-wide extension registry. Double-checked locking is unnecessary
/// with `once_cell::sync::Lazy` (it already guarantees single
/// initialization); the `RwLock` around the slots is what guards concurrent
/// set/get access.
pub struct ExtensionRegistry;

macro_rules! slot_accessors {
    ($set_name:ident, $get_name:ident, $field:ident, $trait:ty) => {
        pub fn $set_name(ext: Arc<$trait>) {
            SLOTS.write().$field = Some(ext);
        }

        pub fn $get_name() -> Option<Arc<$trait>> {
            SLOTS.read().$field.clone()
        }
    };
}

impl ExtensionRegistry {
    slot_accessors!(set_tenant_provider, tenant_provider, tenant_provider, dyn TenantProvider);
    slot_accessors!(set_usage_tracker, usage_tracker, usage_tracker, dyn UsageTracker);
    slot_accessors!(set_audit_logger, audit_logger, audit_logger, dyn AuditLoggerExt);
    slot_accessors!(set_response_filter, response_filter, response_filter, dyn ResponseFilter);
    slot_accessors!(set_memory_provider, memory_provider, memory_provider, dyn MemoryProviderExt);
    slot_accessors!(set_chatbot_auth, chatbot_auth, chatbot_auth, dyn ChatbotAuth);
    slot_accessors!(set_chatbot_rate_limiter, chatbot_rate_limiter, chatbot_rate_limiter, dyn ChatbotRateLimiter);
    slot_accessors!(
        set_chatbot_access_controller,
        chatbot_access_controller,
        chatbot_access_controller,
        dyn ChatbotAccessController
    );

    /// Filter `content` through the response-filter slot if present,
    /// otherwise pass it through unchanged (fail-open).
    pub fn filter_response(content: &str) -> String {
        match Self::response_filter() {
            Some(filter) => filter.filter(content),
            None => content.to_string(),
        }
    }

    /// Authorize a chatbot-facing caller. Fails closed: absent slot or a
    /// denying controller both return `false`.
    pub fn authorize_chatbot_access(caller_id: &str, resource: &str) -> bool {
        match Self::chatbot_access_controller() {
            Some(controller) => controller.authorize(caller_id, resource),
            None => false,
        }
    }

    /// Clear all slots. Test-only.
    pub fn reset() {
        *SLOTS.write() = Slots::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AllowAllFilter;
    impl ResponseFilter for AllowAllFilter {
        fn filter(&self, content: &str) -> String {
            content.replace("secret", "[REDACTED]")
        }
    }

    struct DenyAll;
    impl ChatbotAccessController for DenyAll {
        fn authorize(&self, _caller_id: &str, _resource: &str) -> bool {
            false
        }
    }

    #[test]
    fn version_constants_are_semver() {
        for v in [
            TENANT_PROVIDER_VERSION,
            USAGE_TRACKER_VERSION,
            AUDIT_LOGGER_VERSION,
            CHATBOT_AUTH_VERSION,
            CHATBOT_RATE_LIMITER_VERSION,
            CHATBOT_ACCESS_CONTROLLER_VERSION,
            RESPONSE_FILTER_VERSION,
            memory_core::MEMORY_PROVIDER_VERSION,
        ] {
            assert!(is_semver(v), "{v} is not semver");
        }
    }

    #[test]
    fn response_filter_passes_through_when_absent() {
        ExtensionRegistry::reset();
        assert_eq!(ExtensionRegistry::filter_response("hello"), "hello");
    }

    #[test]
    fn response_filter_applies_when_present() {
        ExtensionRegistry::reset();
        ExtensionRegistry::set_response_filter(Arc::new(AllowAllFilter));
        assert_eq!(ExtensionRegistry::filter_response("a secret"), "a [REDACTED]");
    }

    #[test]
    fn chatbot_access_fails_closed_when_slot_absent() {
        ExtensionRegistry::reset();
        assert!(!ExtensionRegistry::authorize_chatbot_access("caller", "resource"));
    }

    #[test]
    fn chatbot_access_respects_denying_controller() {
        ExtensionRegistry::reset();
        ExtensionRegistry::set_chatbot_access_controller(Arc::new(DenyAll));
        assert!(!ExtensionRegistry::authorize_chatbot_access("caller", "resource"));
    }
}
