//! Shared types for the HTTP layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::{ServerConfig, TokenGrant};
use crate::export::{ArtifactRenderer, LayoutOptions, StandardRenderer};
use crate::models::Role;
use crate::range_table::RangeTableStore;
use crate::report::Report;

/// Reports expire from the cache after 30 minutes.
const REPORT_TTL_SECS: u64 = 30 * 60;
const REPORT_CAPACITY: usize = 1000;

// ═══════════════════════════════════════════════════════════
// API context — shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn RangeTableStore>,
    pub gate: Arc<dyn SessionGate>,
    pub reports: Arc<Mutex<ReportCache>>,
    pub renderer: Arc<dyn ArtifactRenderer>,
    pub render_timeout: Duration,
    pub layout: LayoutOptions,
}

impl ApiContext {
    pub fn new(store: Arc<dyn RangeTableStore>, gate: Arc<dyn SessionGate>) -> Self {
        Self {
            store,
            gate,
            reports: Arc::new(Mutex::new(ReportCache::new())),
            renderer: Arc::new(StandardRenderer),
            render_timeout: Duration::from_millis(crate::config::DEFAULT_RENDER_TIMEOUT_MS),
            layout: LayoutOptions::default(),
        }
    }

    pub fn from_config(store: Arc<dyn RangeTableStore>, config: &ServerConfig) -> Self {
        let gate = Arc::new(StaticTokenGate::new(&config.tokens));
        Self {
            render_timeout: config.render_timeout,
            layout: config.layout,
            ..Self::new(store, gate)
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Principal — injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Authenticated caller, injected into request extensions by the auth
/// middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Resolves a bearer token to a principal. Session issuance lives outside
/// this service.
pub trait SessionGate: Send + Sync {
    fn authenticate(&self, token: &str) -> Option<Principal>;
}

/// Gate over a fixed set of configured tokens. Only token hashes are kept.
pub struct StaticTokenGate {
    grants: HashMap<[u8; 32], Principal>,
}

impl StaticTokenGate {
    pub fn new(grants: &[TokenGrant]) -> Self {
        let grants = grants
            .iter()
            .map(|g| {
                (
                    hash_token(&g.token),
                    Principal {
                        subject: g.subject.clone(),
                        role: g.role,
                    },
                )
            })
            .collect();
        Self { grants }
    }
}

impl SessionGate for StaticTokenGate {
    fn authenticate(&self, token: &str) -> Option<Principal> {
        self.grants.get(&hash_token(token)).cloned()
    }
}

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

// ═══════════════════════════════════════════════════════════
// Report cache — composed reports held for export
// ═══════════════════════════════════════════════════════════

struct CachedReport {
    owner: String,
    report: Report,
    stored_at: Instant,
}

/// In-memory report store keyed by report id. Entries belong to the
/// subject that computed them and expire after the TTL; the oldest entry
/// is evicted once capacity is reached.
pub struct ReportCache {
    entries: HashMap<Uuid, CachedReport>,
    ttl: Duration,
    capacity: usize,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::with_limits(Duration::from_secs(REPORT_TTL_SECS), REPORT_CAPACITY)
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn insert(&mut self, owner: &str, report: Report) -> Uuid {
        self.cleanup();
        while self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    self.entries.remove(&id);
                }
                None => break,
            }
        }

        let id = Uuid::new_v4();
        self.entries.insert(
            id,
            CachedReport {
                owner: owner.to_string(),
                report,
                stored_at: Instant::now(),
            },
        );
        id
    }

    /// Fetch a live report owned by `owner`. Reports of other subjects are
    /// indistinguishable from missing ones.
    pub fn get(&self, id: &Uuid, owner: &str) -> Option<Report> {
        let entry = self.entries.get(id)?;
        if entry.owner != owner || entry.stored_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry.report.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn cleanup(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, e| e.stored_at.elapsed() < ttl);
    }
}

impl Default for ReportCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::egfr;
    use crate::models::{Gender, LabInput};
    use crate::report::compose;
    use crate::resolution::resolve;

    fn report(age: f64) -> Report {
        let inputs = LabInput::new(age, 1.0, Gender::Female).unwrap();
        let score = egfr::compute(&inputs);
        compose(inputs, resolve(&score, &[]))
    }

    fn grant(subject: &str, token: &str, role: Role) -> TokenGrant {
        TokenGrant {
            subject: subject.into(),
            token: token.into(),
            role,
        }
    }

    #[test]
    fn hash_token_is_deterministic() {
        assert_eq!(hash_token("test"), hash_token("test"));
        assert_ne!(hash_token("token-a"), hash_token("token-b"));
    }

    #[test]
    fn static_gate_resolves_known_tokens() {
        let gate = StaticTokenGate::new(&[
            grant("admin-1", "a-secret", Role::Admin),
            grant("patient-1", "c-secret", Role::Client),
        ]);

        let admin = gate.authenticate("a-secret").unwrap();
        assert_eq!(admin.subject, "admin-1");
        assert!(admin.is_admin());

        let client = gate.authenticate("c-secret").unwrap();
        assert_eq!(client.role, Role::Client);
        assert!(!client.is_admin());

        assert!(gate.authenticate("unknown").is_none());
        assert!(gate.authenticate("").is_none());
    }

    #[test]
    fn report_cache_returns_report_to_owner_only() {
        let mut cache = ReportCache::new();
        let r = report(40.0);
        let id = cache.insert("patient-1", r.clone());

        assert_eq!(cache.get(&id, "patient-1"), Some(r));
        assert!(cache.get(&id, "patient-2").is_none());
        assert!(cache.get(&Uuid::new_v4(), "patient-1").is_none());
    }

    #[test]
    fn report_cache_expires_entries() {
        let mut cache = ReportCache::with_limits(Duration::ZERO, 10);
        let id = cache.insert("patient-1", report(40.0));
        assert!(cache.get(&id, "patient-1").is_none());
    }

    #[test]
    fn report_cache_evicts_oldest_at_capacity() {
        let mut cache = ReportCache::with_limits(Duration::from_secs(60), 2);
        let first = cache.insert("p", report(30.0));
        std::thread::sleep(Duration::from_millis(2));
        let second = cache.insert("p", report(40.0));
        std::thread::sleep(Duration::from_millis(2));
        let third = cache.insert("p", report(50.0));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&first, "p").is_none());
        assert!(cache.get(&second, "p").is_some());
        assert!(cache.get(&third, "p").is_some());
    }
}
