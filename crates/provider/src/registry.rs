//! The closed set of registered provider adapters.

use std::collections::BTreeMap;
use std::sync::Arc;

use fabula_core::canonical;
use fabula_core::operation::OperationType;
use fabula_core::CoreError;

use crate::adapter::ProviderAdapter;

/// Lookup table from provider id to adapter.
///
/// Built once at startup and shared immutably. An operation submitted for
/// an unregistered provider id is rejected at intake, never deferred to
/// dispatch time.
#[derive(Default)]
pub struct ProviderRegistry {
    adapters: BTreeMap<&'static str, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider_id(), adapter);
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider_id).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Registered provider ids, in routing (lexical) order.
    pub fn provider_ids(&self) -> Vec<&'static str> {
        self.adapters.keys().copied().collect()
    }

    /// Registered adapters that declare support for `op`, in stable
    /// (provider id) order.
    pub fn capable_providers(&self, op: OperationType) -> Vec<Arc<dyn ProviderAdapter>> {
        self.adapters
            .values()
            .filter(|a| a.supports(op))
            .cloned()
            .collect()
    }

    /// The adapter a new generation for `op` is routed to.
    ///
    /// Routing is currently first-capable in provider-id order; accounts
    /// and load-based selection live above this layer.
    pub fn adapter_for(&self, op: OperationType) -> Result<Arc<dyn ProviderAdapter>, CoreError> {
        self.capable_providers(op)
            .into_iter()
            .next()
            .ok_or_else(|| {
                CoreError::Internal(format!("no registered provider supports {op}"))
            })
    }
}

/// Startup self-check: every operation type must have a canonicalization
/// rule and at least one capable adapter.
///
/// Collects every gap before failing, so a misconfigured deployment reports
/// all missing pieces in one pass instead of one per restart.
pub fn startup_check(registry: &ProviderRegistry) -> Result<(), CoreError> {
    let mut gaps: Vec<String> = Vec::new();

    if registry.is_empty() {
        gaps.push("no provider adapters registered".to_string());
    }

    for &op in OperationType::ALL {
        if canonical::required_fields(op).is_empty() {
            gaps.push(format!("{op}: no required-field rule"));
        }
        if !registry.is_empty() && registry.capable_providers(op).is_empty() {
            gaps.push(format!("{op}: no capable provider"));
        }
    }

    if gaps.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Internal(format!(
            "startup self-check failed: {}",
            gaps.join("; ")
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
