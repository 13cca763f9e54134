use crate::entities::{self, ClassPatch};
use crate::ipc::error::{err, no_workspace, ok};
use crate::ipc::handlers::setup::reference_policy;
use crate::ipc::helpers::{delete_response, patch_str, required_str, store_failure};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };
    match entities::list_classes(conn) {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => store_failure(req, e),
    }
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let grade = match required_str(req, "grade") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let section = match required_str(req, "section") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match entities::create_class(conn, &grade, &section) {
        Ok(class) => {
            tracing::info!(class_id = %class.id, %grade, %section, "class created");
            ok(&req.id, json!(class))
        }
        Err(e) => store_failure(req, e),
    }
}

fn handle_classes_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match entities::find_class_by_id(conn, &class_id) {
        Ok(Some(class)) => ok(&req.id, json!(class)),
        Ok(None) => err(&req.id, "not_found", "class not found", None),
        Err(e) => store_failure(req, e),
    }
}

fn handle_classes_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };
    let patch = ClassPatch {
        grade: match patch_str(req, patch_obj, "grade") {
            Ok(v) => v,
            Err(resp) => return resp,
        },
        section: match patch_str(req, patch_obj, "section") {
            Ok(v) => v,
            Err(resp) => return resp,
        },
    };

    match entities::update_class(conn, &class_id, &patch) {
        Ok(Some(class)) => ok(&req.id, json!(class)),
        Ok(None) => err(&req.id, "not_found", "class not found", None),
        Err(e) => store_failure(req, e),
    }
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let policy = match reference_policy(conn) {
        Ok(p) => p,
        Err(e) => return store_failure(req, e),
    };

    let result = entities::delete_class(conn, &class_id, policy);
    delete_response(req, "class", policy, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.get" => Some(handle_classes_get(state, req)),
        "classes.update" => Some(handle_classes_update(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        _ => None,
    }
}
