use crate::entities::{DeleteError, Deleted, ReferencePolicy};
use crate::ipc::error::{err, ok};
use crate::ipc::types::Request;

/// A required, non-blank string param, trimmed. The error is a ready-made
/// `bad_params` response.
pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            format!("{key} must not be empty"),
            None,
        )),
        None => Err(err(&req.id, "bad_params", format!("missing {key}"), None)),
    }
}

/// An optional string field of `patch`; present-but-blank is rejected.
pub fn patch_str(
    req: &Request,
    patch: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<Option<String>, serde_json::Value> {
    match patch.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => match v.as_str().map(str::trim) {
            Some(s) if !s.is_empty() => Ok(Some(s.to_string())),
            _ => Err(err(
                &req.id,
                "bad_params",
                format!("patch.{key} must be a non-empty string"),
                None,
            )),
        },
    }
}

pub fn store_failure(req: &Request, e: impl std::fmt::Display) -> serde_json::Value {
    tracing::error!(method = %req.method, error = %e, "store failure");
    err(
        &req.id,
        "store_failure",
        e.to_string(),
        Some(serde_json::json!({ "retryable": true })),
    )
}

fn delete_error(req: &Request, entity: &str, e: DeleteError) -> serde_json::Value {
    match e {
        DeleteError::NotFound => err(&req.id, "not_found", format!("{entity} not found"), None),
        DeleteError::HasReferences { entry_count } => err(
            &req.id,
            "has_references",
            format!("{entity} is still used by {entry_count} timetable entries"),
            Some(serde_json::json!({ "entryCount": entry_count })),
        ),
        DeleteError::Store(e) => store_failure(req, e),
    }
}

/// The response to `classes.delete` / `teachers.delete`; `key` names the
/// record field.
pub fn delete_response<T: serde::Serialize>(
    req: &Request,
    key: &str,
    policy: ReferencePolicy,
    result: Result<Deleted<T>, DeleteError>,
) -> serde_json::Value {
    match result {
        Ok(deleted) => {
            tracing::info!(
                entity = key,
                policy = policy.as_str(),
                removed_entries = deleted.removed_entries,
                orphaned_entries = deleted.orphaned_entries,
                "record deleted"
            );
            let mut out = serde_json::Map::new();
            out.insert(key.to_string(), serde_json::json!(deleted.record));
            out.insert("removedEntries".to_string(), deleted.removed_entries.into());
            out.insert("orphanedEntries".to_string(), deleted.orphaned_entries.into());
            ok(&req.id, serde_json::Value::Object(out))
        }
        Err(e) => delete_error(req, key, e),
    }
}
