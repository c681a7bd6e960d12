//! Code system display lookup
//!
//! Each code system implements [`CodeSystemLookup`] once. The [`CodeSystemRegistry`] is
//! assembled at startup and dispatches on the system URL, so adding a code system is a
//! registration, not a code change.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

/// Display lookup for a single code system.
pub trait CodeSystemLookup: Send + Sync {
    /// Canonical URL of the code system.
    fn system(&self) -> &str;

    /// Display text for `code`, if the system defines it.
    fn lookup(&self, code: &str) -> Option<String>;
}

/// Resolved concept
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeDisplay {
    pub system: String,
    pub code: String,
    pub display: String,
}

/// Code system backed by an in-memory concept map.
#[derive(Debug, Clone)]
pub struct StaticCodeSystem {
    system: String,
    concepts: HashMap<String, String>,
}

impl StaticCodeSystem {
    pub fn new<I, C, D>(system: impl Into<String>, concepts: I) -> Self
    where
        I: IntoIterator<Item = (C, D)>,
        C: Into<String>,
        D: Into<String>,
    {
        Self {
            system: system.into(),
            concepts: concepts
                .into_iter()
                .map(|(code, display)| (code.into(), display.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}

impl CodeSystemLookup for StaticCodeSystem {
    fn system(&self) -> &str {
        &self.system
    }

    fn lookup(&self, code: &str) -> Option<String> {
        self.concepts.get(code).cloned()
    }
}

#[derive(Default, Clone)]
pub struct CodeSystemRegistry {
    systems: Vec<Arc<dyn CodeSystemLookup>>,
    by_url: HashMap<String, usize>,
}

impl std::fmt::Debug for CodeSystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeSystemRegistry")
            .field("systems", &self.systems().collect::<Vec<_>>())
            .finish()
    }
}

impl CodeSystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from lookups in registration order. A later lookup for an
    /// already registered system URL replaces the earlier one.
    pub fn from_lookups(lookups: impl IntoIterator<Item = Arc<dyn CodeSystemLookup>>) -> Self {
        let mut registry = Self::new();
        for lookup in lookups {
            registry.register(lookup);
        }
        registry
    }

    pub fn register(&mut self, lookup: Arc<dyn CodeSystemLookup>) {
        let url = lookup.system().to_string();
        match self.by_url.get(&url) {
            Some(&idx) => {
                tracing::warn!(system = %url, "Replacing registered code system");
                self.systems[idx] = lookup;
            }
            None => {
                self.by_url.insert(url, self.systems.len());
                self.systems.push(lookup);
            }
        }
    }

    /// Registered system URLs in registration order.
    pub fn systems(&self) -> impl Iterator<Item = &str> {
        self.systems.iter().map(|s| s.system())
    }

    pub fn lookup(&self, system: &str, code: &str) -> Option<CodeDisplay> {
        let idx = *self.by_url.get(system)?;
        let display = self.systems[idx].lookup(code)?;
        Some(CodeDisplay {
            system: system.to_string(),
            code: code.to_string(),
            display,
        })
    }

    /// First system, in registration order, that defines `code`.
    pub fn lookup_any(&self, code: &str) -> Option<CodeDisplay> {
        self.systems.iter().find_map(|s| {
            s.lookup(code).map(|display| CodeDisplay {
                system: s.system().to_string(),
                code: code.to_string(),
                display,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTCOME: &str = "http://example.org/fhir/CodeSystem/pregnancy-outcome";
    const PRIORITY: &str = "http://example.org/fhir/CodeSystem/surgical-priority";

    fn registry() -> CodeSystemRegistry {
        CodeSystemRegistry::from_lookups([
            Arc::new(StaticCodeSystem::new(
                OUTCOME,
                [("live-birth", "Live birth"), ("stillbirth", "Stillbirth")],
            )) as Arc<dyn CodeSystemLookup>,
            Arc::new(StaticCodeSystem::new(
                PRIORITY,
                [("elective", "Elective"), ("urgent", "Urgent"), ("stillbirth", "n/a")],
            )) as Arc<dyn CodeSystemLookup>,
        ])
    }

    #[test]
    fn lookup_by_system() {
        let registry = registry();
        let display = registry.lookup(OUTCOME, "live-birth").unwrap();
        assert_eq!(display.display, "Live birth");
        assert_eq!(display.system, OUTCOME);

        assert!(registry.lookup(OUTCOME, "urgent").is_none());
        assert!(registry
            .lookup("http://example.org/unknown", "urgent")
            .is_none());
    }

    #[test]
    fn lookup_any_uses_registration_order() {
        let registry = registry();
        assert_eq!(registry.lookup_any("stillbirth").unwrap().system, OUTCOME);
        assert_eq!(registry.lookup_any("urgent").unwrap().display, "Urgent");
        assert!(registry.lookup_any("nope").is_none());
        assert_eq!(registry.systems().collect::<Vec<_>>(), vec![OUTCOME, PRIORITY]);
    }

    #[test]
    fn re_registering_a_system_replaces_it() {
        let mut registry = registry();
        registry.register(Arc::new(StaticCodeSystem::new(
            PRIORITY,
            [("urgent", "Urgent (within 24h)")],
        )));
        assert_eq!(registry.systems().count(), 2);
        assert_eq!(
            registry.lookup(PRIORITY, "urgent").unwrap().display,
            "Urgent (within 24h)"
        );
        assert!(registry.lookup(PRIORITY, "elective").is_none());
    }
}
