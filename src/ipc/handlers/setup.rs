use crate::db;
use crate::entities::ReferencePolicy;
use crate::ipc::error::{err, no_workspace, ok};
use crate::ipc::helpers::store_failure;
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    References,
}

impl SetupSection {
    const ALL: [SetupSection; 1] = [SetupSection::References];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "references" => Some(Self::References),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::References => "references",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::References => "setup.references",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::References => json!({
            "onDelete": ReferencePolicy::default().as_str()
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::References => match k.as_str() {
                "onDelete" => {
                    let policy = v
                        .as_str()
                        .map(|s| s.trim().to_ascii_lowercase())
                        .and_then(|s| ReferencePolicy::parse(&s))
                        .ok_or_else(|| {
                            "onDelete must be one of: reject, cascade, orphan".to_string()
                        })?;
                    obj.insert(k.clone(), Value::String(policy.as_str().to_string()));
                }
                _ => return Err(format!("unknown references field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // A malformed stored value falls back to the defaults.
            if let Err(msg) = merge_section_patch(section, &mut current, saved_obj) {
                tracing::warn!(section = section.name(), %msg, "ignoring stored setup value");
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

/// The delete policy for classes and teachers that timetable entries still
/// reference.
pub fn reference_policy(conn: &rusqlite::Connection) -> anyhow::Result<ReferencePolicy> {
    let section = load_section(conn, SetupSection::References)?;
    Ok(section
        .get("onDelete")
        .and_then(|v| v.as_str())
        .and_then(ReferencePolicy::parse)
        .unwrap_or_default())
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let mut out = Map::new();
    for section in SetupSection::ALL {
        match load_section(conn, section) {
            Ok(v) => {
                out.insert(section.name().to_string(), v);
            }
            Err(e) => return store_failure(req, e),
        }
    }
    ok(&req.id, Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return store_failure(req, e),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return store_failure(req, e);
    }
    tracing::info!(section = section.name(), value = %current, "setup updated");
    let mut out = Map::new();
    out.insert(section.name().to_string(), current);
    ok(&req.id, Value::Object(out))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn policy_defaults_to_reject() {
        let conn = open_in_memory();
        assert_eq!(reference_policy(&conn).expect("policy"), ReferencePolicy::Reject);
    }

    #[test]
    fn patch_is_normalized_and_validated() {
        let mut current = default_section(SetupSection::References);
        let patch = json!({ "onDelete": " Cascade " });
        merge_section_patch(
            SetupSection::References,
            &mut current,
            patch.as_object().expect("object"),
        )
        .expect("merge");
        assert_eq!(current["onDelete"], "cascade");

        let bad = json!({ "onDelete": "explode" });
        assert!(merge_section_patch(
            SetupSection::References,
            &mut current,
            bad.as_object().expect("object"),
        )
        .is_err());
        let unknown = json!({ "whatever": true });
        assert!(merge_section_patch(
            SetupSection::References,
            &mut current,
            unknown.as_object().expect("object"),
        )
        .is_err());
    }

    #[test]
    fn malformed_stored_value_falls_back_to_default() {
        let conn = open_in_memory();
        db::settings_set_json(&conn, "setup.references", &json!({ "onDelete": 7 }))
            .expect("seed");
        assert_eq!(reference_policy(&conn).expect("policy"), ReferencePolicy::Reject);

        db::settings_set_json(&conn, "setup.references", &json!({ "onDelete": "orphan" }))
            .expect("seed");
        assert_eq!(reference_policy(&conn).expect("policy"), ReferencePolicy::Orphan);
    }

    #[test]
    fn store_failures_are_marked_retryable() {
        let conn = open_in_memory();
        conn.execute_batch("DROP TABLE settings").expect("drop settings");
        let mut state = AppState {
            workspace: None,
            db: Some(conn),
        };

        let get = Request {
            id: "1".to_string(),
            method: "setup.get".to_string(),
            params: json!({}),
        };
        let resp = try_handle(&mut state, &get).expect("handled");
        assert_eq!(resp["ok"], false);
        assert_eq!(resp["error"]["code"], "store_failure");
        assert_eq!(resp["error"]["details"]["retryable"], true);

        let update = Request {
            id: "2".to_string(),
            method: "setup.update".to_string(),
            params: json!({ "section": "references", "patch": { "onDelete": "cascade" } }),
        };
        let resp = try_handle(&mut state, &update).expect("handled");
        assert_eq!(resp["error"]["code"], "store_failure");
        assert_eq!(resp["error"]["details"]["retryable"], true);
    }
}
