//! Configuration validation
//!
//! Rules:
//! - field ranges declared on the blueprint structs (`validator` derive)
//! - retry.max_backoff_ms >= retry.initial_backoff_ms when set
//! - a deadline must leave room for at least one backoff

use contracts::{ContractError, PipelineBlueprint};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a PipelineBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_ranges(blueprint)?;
    validate_retry(blueprint)?;
    validate_deadline(blueprint)?;
    Ok(())
}

/// Declarative range checks
fn validate_ranges(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let (field, message) = first_violation(&errors, "")
            .unwrap_or_else(|| ("blueprint".to_string(), errors.to_string()));
        ContractError::config_validation(field, message)
    })
}

/// Walk nested validation errors in field order and report the first one
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(err) = list.first() {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string());
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_violation(inner, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_violation(inner, &format!("{path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// Validate retry policy
fn validate_retry(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let retry = &blueprint.push.retry;

    if retry.max_backoff_ms != 0 && retry.max_backoff_ms < retry.initial_backoff_ms {
        return Err(ContractError::config_validation(
            "push.retry.max_backoff_ms",
            format!(
                "max_backoff_ms ({}) must be >= initial_backoff_ms ({})",
                retry.max_backoff_ms, retry.initial_backoff_ms
            ),
        ));
    }

    if retry.max_backoff_ms != 0 && retry.initial_backoff_ms == 0 {
        return Err(ContractError::config_validation(
            "push.retry.initial_backoff_ms",
            "initial_backoff_ms must be > 0 when max_backoff_ms is set",
        ));
    }

    Ok(())
}

/// Validate the pipeline deadline against the retry policy
fn validate_deadline(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let push = &blueprint.push;

    if let Some(timeout_secs) = push.timeout_secs {
        let timeout_ms = timeout_secs.saturating_mul(1000);
        if push.retry.initial_backoff_ms >= timeout_ms {
            return Err(ContractError::config_validation(
                "push.timeout_secs",
                format!(
                    "timeout ({timeout_ms}ms) must exceed initial_backoff_ms ({})",
                    push.retry.initial_backoff_ms
                ),
            ));
        }
    }

    Ok(())
}
