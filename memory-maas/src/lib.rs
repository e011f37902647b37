//! Memory Engine MaaS - multi-agent memory sharing core and extension
//! registry.
//!
//! Component R (agent/pool/handoff registries, security suite) and
//! component S (extension registry).

pub mod agent_registry;
pub mod extensions;
pub mod handoff_manager;
pub mod pool_registry;
pub mod security;

pub use agent_registry::AgentRegistry;
pub use extensions::{
    is_semver, AuditLoggerExt, ChatbotAccessController, ChatbotAuth, ChatbotRateLimiter, ExtensionRegistry,
    MemoryProviderExt, ResponseFilter, TenantProvider, UsageTracker, AUDIT_LOGGER_VERSION,
    CHATBOT_ACCESS_CONTROLLER_VERSION, CHATBOT_AUTH_VERSION, CHATBOT_RATE_LIMITER_VERSION, RESPONSE_FILTER_VERSION,
    TENANT_PROVIDER_VERSION, USAGE_TRACKER_VERSION,
};
pub use handoff_manager::HandoffManager;
pub use pool_registry::PoolRegistry;
pub use security::{AgentRateLimiter, AuditEntry, MEXTRAValidator, MaaSAuditLogger, MemoryPoisoningDefense};
