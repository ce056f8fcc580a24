//! Parameter canonicalization.
//!
//! Callers send provider-styled structured parameters: common fields at the
//! top level, with per-provider overrides nested under
//! `providers.<provider_id>`. Canonicalization flattens this into one
//! stable, operation-specific map and validates required fields.
//!
//! Required-field rules are data, not code branches — adding an operation
//! type is a table edit, verified at startup by the registry self-check.

use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::operation::OperationType;

/// Namespace key holding per-provider override objects.
pub const PROVIDER_NAMESPACE: &str = "providers";

/// Canonical parameter map. `BTreeMap` gives stable key ordering, which the
/// content hasher relies on.
pub type CanonicalParams = BTreeMap<String, serde_json::Value>;

/// Expected JSON shape of a required field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// Any non-null scalar or object value.
    Scalar,
    /// A non-empty JSON array.
    List,
}

/// A single required-field rule.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub shape: FieldShape,
}

const fn scalar(name: &'static str) -> FieldRule {
    FieldRule {
        name,
        shape: FieldShape::Scalar,
    }
}

const fn list(name: &'static str) -> FieldRule {
    FieldRule {
        name,
        shape: FieldShape::List,
    }
}

/// Required fields per operation type.
///
/// `original_video_id` on video_extend is accepted and carried through but
/// not required; providers resolve lineage from the URL when it is absent.
pub fn required_fields(op: OperationType) -> &'static [FieldRule] {
    match op {
        OperationType::TextToImage => const { &[scalar("prompt")] },
        OperationType::ImageToImage => const { &[list("image_urls")] },
        OperationType::TextToVideo => const { &[scalar("prompt")] },
        OperationType::ImageToVideo => const { &[scalar("image_url")] },
        OperationType::VideoExtend => const { &[scalar("video_url")] },
        OperationType::VideoTransition => {
            const { &[scalar("first_video_url"), scalar("last_video_url")] }
        }
        OperationType::Fusion => const { &[scalar("prompt"), list("image_urls")] },
    }
}

/// Flatten structured parameters into canonical form and validate required
/// fields for the resolved operation type.
///
/// Pure function: identical input always yields byte-identical output.
/// Fails with [`CoreError::MissingRequiredField`] rather than substituting
/// a default for any absent required key.
pub fn canonicalize(
    op: OperationType,
    structured: &serde_json::Value,
    provider_id: &str,
) -> Result<CanonicalParams, CoreError> {
    let obj = structured.as_object().ok_or_else(|| {
        CoreError::Validation("Structured parameters must be a JSON object".to_string())
    })?;

    let mut canonical = CanonicalParams::new();

    // Common fields first.
    for (key, value) in obj {
        if key == PROVIDER_NAMESPACE || value.is_null() {
            continue;
        }
        canonical.insert(key.clone(), value.clone());
    }

    // Provider-specific overrides win over common fields.
    if let Some(overrides) = obj
        .get(PROVIDER_NAMESPACE)
        .and_then(|ns| ns.get(provider_id))
    {
        let override_obj = overrides.as_object().ok_or_else(|| {
            CoreError::Validation(format!(
                "Provider overrides for \"{provider_id}\" must be a JSON object"
            ))
        })?;
        for (key, value) in override_obj {
            if value.is_null() {
                continue;
            }
            canonical.insert(key.clone(), value.clone());
        }
    }

    validate_required(op, &canonical)?;
    Ok(canonical)
}

/// Check every required field for `op` against the canonical map.
fn validate_required(op: OperationType, params: &CanonicalParams) -> Result<(), CoreError> {
    for rule in required_fields(op) {
        let value = params.get(rule.name).ok_or(CoreError::MissingRequiredField {
            field: rule.name,
            operation: op,
        })?;
        match rule.shape {
            FieldShape::Scalar => {
                if value.is_null() {
                    return Err(CoreError::MissingRequiredField {
                        field: rule.name,
                        operation: op,
                    });
                }
            }
            FieldShape::List => {
                let arr = value.as_array().ok_or_else(|| {
                    CoreError::Validation(format!(
                        "Field \"{}\" for operation {op} must be a list",
                        rule.name
                    ))
                })?;
                if arr.is_empty() {
                    return Err(CoreError::MissingRequiredField {
                        field: rule.name,
                        operation: op,
                    });
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn every_operation_has_a_rule_table() {
        for &op in OperationType::ALL {
            assert!(
                !required_fields(op).is_empty(),
                "{op} has no required-field rules"
            );
        }
    }

    #[test]
    fn canonicalize_is_deterministic() {
        let params = json!({
            "prompt": "a quiet harbor at dusk",
            "aspect_ratio": "16:9",
            "providers": { "mirage": { "style": "cinematic" } }
        });
        let a = canonicalize(OperationType::TextToImage, &params, "mirage").unwrap();
        let b = canonicalize(OperationType::TextToImage, &params, "mirage").unwrap();
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }

    #[test]
    fn provider_override_wins_over_common_field() {
        let params = json!({
            "prompt": "common prompt",
            "providers": { "mirage": { "prompt": "mirage prompt" } }
        });
        let canonical = canonicalize(OperationType::TextToImage, &params, "mirage").unwrap();
        assert_eq!(canonical["prompt"], json!("mirage prompt"));
    }

    #[test]
    fn other_providers_overrides_are_ignored() {
        let params = json!({
            "prompt": "common prompt",
            "providers": { "other": { "prompt": "other prompt" } }
        });
        let canonical = canonicalize(OperationType::TextToImage, &params, "mirage").unwrap();
        assert_eq!(canonical["prompt"], json!("common prompt"));
    }

    #[test]
    fn namespace_key_never_appears_in_output() {
        let params = json!({
            "prompt": "p",
            "providers": { "mirage": { "style": "soft" } }
        });
        let canonical = canonicalize(OperationType::TextToImage, &params, "mirage").unwrap();
        assert!(!canonical.contains_key(PROVIDER_NAMESPACE));
        assert_eq!(canonical["style"], json!("soft"));
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let params = json!({ "aspect_ratio": "1:1" });
        assert_matches!(
            canonicalize(OperationType::TextToImage, &params, "mirage"),
            Err(CoreError::MissingRequiredField { field: "prompt", operation: OperationType::TextToImage })
        );
    }

    #[test]
    fn null_required_field_is_rejected() {
        let params = json!({ "image_url": null });
        assert_matches!(
            canonicalize(OperationType::ImageToVideo, &params, "mirage"),
            Err(CoreError::MissingRequiredField { field: "image_url", .. })
        );
    }

    #[test]
    fn image_to_image_requires_a_list() {
        // Scalar where a list is required: shape error, not silent pass.
        let params = json!({ "image_urls": "https://cdn/x.png" });
        assert_matches!(
            canonicalize(OperationType::ImageToImage, &params, "mirage"),
            Err(CoreError::Validation(_))
        );

        let params = json!({ "image_urls": [] });
        assert_matches!(
            canonicalize(OperationType::ImageToImage, &params, "mirage"),
            Err(CoreError::MissingRequiredField { field: "image_urls", .. })
        );

        let params = json!({ "image_urls": ["https://cdn/x.png"] });
        assert!(canonicalize(OperationType::ImageToImage, &params, "mirage").is_ok());
    }

    #[test]
    fn video_extend_example_scenario_canonicalizes() {
        let params = json!({
            "video_url": "https://x/a.mp4",
            "original_video_id": "123"
        });
        let canonical = canonicalize(OperationType::VideoExtend, &params, "mirage").unwrap();
        assert_eq!(canonical["video_url"], json!("https://x/a.mp4"));
        // Optional field carried through untouched.
        assert_eq!(canonical["original_video_id"], json!("123"));
    }

    #[test]
    fn video_transition_requires_both_endpoints() {
        let params = json!({ "first_video_url": "https://x/a.mp4" });
        assert_matches!(
            canonicalize(OperationType::VideoTransition, &params, "mirage"),
            Err(CoreError::MissingRequiredField { field: "last_video_url", .. })
        );
    }

    #[test]
    fn non_object_params_rejected() {
        assert_matches!(
            canonicalize(OperationType::TextToImage, &json!([1, 2]), "mirage"),
            Err(CoreError::Validation(_))
        );
    }
}
