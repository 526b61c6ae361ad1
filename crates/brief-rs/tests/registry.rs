//! Loading extra model profiles from a JSON file.

use std::io::Write;

use brief_rs::{BriefError, ModelRegistry};

#[test]
fn profiles_file_extends_builtin_registry() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[
            {{"id": "llama-3-8b", "max_context_tokens": 8192, "price_in_per_1k": 0.0, "price_out_per_1k": 0.0}},
            {{"id": "mixtral", "max_context_tokens": 32768, "price_in_per_1k": 0.0007, "price_out_per_1k": 0.0007}}
        ]"#
    )
    .unwrap();

    let json = std::fs::read_to_string(file.path()).unwrap();
    let registry = ModelRegistry::builtin().with_profiles_json(&json).unwrap();
    assert_eq!(registry.len(), 6);
    assert_eq!(registry.budget_tokens("mixtral", 1_000).unwrap(), 31_768);
    assert_eq!(registry.resolve("llama-3-8b").unwrap().cost(1_000, 1_000), 0.0);
}

#[test]
fn profiles_file_cannot_shadow_builtin() {
    let json = r#"[{"id": "gpt-4", "max_context_tokens": 1, "price_in_per_1k": 0.0, "price_out_per_1k": 0.0}]"#;
    let err = ModelRegistry::builtin().with_profiles_json(json).unwrap_err();
    assert!(matches!(err, BriefError::InvalidProfile { ref id, .. } if id == "gpt-4"));
}

#[test]
fn malformed_profiles_file_is_rejected() {
    let err = ModelRegistry::builtin()
        .with_profiles_json("{not json")
        .unwrap_err();
    assert!(err.is_structural());
}
