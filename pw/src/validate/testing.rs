//! Shared fixtures for validation, repair and workflow tests

use serde_json::{Value, json};

/// A document that passes every check
pub fn valid_document() -> Value {
    json!({
        "request": "Add a response cache to the gateway",
        "feature_groups": [{
            "name": "Caching",
            "description": "Response caching layer",
            "features": [
                {
                    "name": "Cache store",
                    "description": "In-memory LRU store for serialized responses",
                    "complexity_level": 1,
                    "files_affected": ["src/cache/store.rs"],
                    "implementation_steps": [
                        {"step_id": "S1", "description": "Define the store type"},
                        {"step_id": "S2", "description": "Implement eviction"}
                    ],
                    "test_requirements": {
                        "unit_tests": [{
                            "name": "evicts least recently used",
                            "description": "Insert past capacity and check the oldest entry is gone",
                            "target_element": "LruStore",
                            "target_element_id": "E-1-1-1",
                            "step_ref": "S2"
                        }],
                        "integration_tests": [],
                        "property_tests": [],
                        "acceptance_tests": []
                    },
                    "dependencies": {"internal": ["config"], "external": ["lru"], "features": []},
                    "risk_assessment": {
                        "critical_files": ["src/cache/store.rs"],
                        "potential_regressions": ["memory growth"],
                        "mitigations": ["bounded capacity"],
                        "security_concerns": []
                    },
                    "system_design": {
                        "overview": "A bounded map keyed by request fingerprint",
                        "code_elements": [{
                            "element_id": "E-1-1-1",
                            "name": "LruStore",
                            "element_type": "struct",
                            "file_path": "src/cache/store.rs",
                            "purpose": "Holds cached entries"
                        }],
                        "data_flow": ["response -> store"],
                        "key_algorithms": ["LRU eviction"]
                    }
                },
                {
                    "name": "Cache middleware",
                    "description": "Serve cached responses before the handler runs",
                    "complexity_level": 2,
                    "files_affected": ["src/cache/middleware.rs", "src/router.rs"],
                    "implementation_steps": [
                        {"step_id": "S1", "description": "Compute request fingerprint"},
                        {"step_id": "S2", "description": "Look up the store"},
                        {"step_id": "S3", "description": "Populate on miss"}
                    ],
                    "test_requirements": {
                        "unit_tests": [{"name": "hit skips handler", "description": "Second request is served from the store"}],
                        "integration_tests": [{"name": "end to end hit", "description": "Two identical requests"}]
                    },
                    "dependencies": {
                        "internal": [],
                        "external": [],
                        "features": [{"feature": "Cache store", "relation": "requires"}]
                    },
                    "risk_assessment": {
                        "critical_files": ["src/router.rs"],
                        "potential_regressions": ["stale responses"],
                        "mitigations": ["short expiry"],
                        "security_concerns": []
                    },
                    "system_design": {
                        "overview": "Middleware in front of every route",
                        "code_elements": [{
                            "element_id": "E-1-2-1",
                            "name": "CacheLayer",
                            "element_type": "struct",
                            "file_path": "src/cache/middleware.rs",
                            "purpose": "Wraps the inner service"
                        }],
                        "data_flow": ["request -> fingerprint -> store"],
                        "key_algorithms": []
                    }
                }
            ]
        }]
    })
}

/// Pointer-style access to feature `f` of group `g`
pub fn feature_mut(doc: &mut Value, g: usize, f: usize) -> &mut Value {
    &mut doc["feature_groups"][g]["features"][f]
}
