use crate::entities::{self, TeacherPatch};
use crate::ipc::error::{err, no_workspace, ok};
use crate::ipc::handlers::setup::reference_policy;
use crate::ipc::helpers::{delete_response, patch_str, required_str, store_failure};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_teachers_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "teachers": [] }));
    };
    match entities::list_teachers(conn) {
        Ok(teachers) => ok(&req.id, json!({ "teachers": teachers })),
        Err(e) => store_failure(req, e),
    }
}

fn handle_teachers_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match entities::create_teacher(conn, &name, &email) {
        Ok(teacher) => {
            tracing::info!(teacher_id = %teacher.id, "teacher created");
            ok(&req.id, json!(teacher))
        }
        Err(e) => store_failure(req, e),
    }
}

fn handle_teachers_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match entities::find_teacher_by_id(conn, &teacher_id) {
        Ok(Some(teacher)) => ok(&req.id, json!(teacher)),
        Ok(None) => err(&req.id, "not_found", "teacher not found", None),
        Err(e) => store_failure(req, e),
    }
}

fn handle_teachers_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };
    let patch = TeacherPatch {
        name: match patch_str(req, patch_obj, "name") {
            Ok(v) => v,
            Err(resp) => return resp,
        },
        email: match patch_str(req, patch_obj, "email") {
            Ok(v) => v,
            Err(resp) => return resp,
        },
    };

    match entities::update_teacher(conn, &teacher_id, &patch) {
        Ok(Some(teacher)) => ok(&req.id, json!(teacher)),
        Ok(None) => err(&req.id, "not_found", "teacher not found", None),
        Err(e) => store_failure(req, e),
    }
}

fn handle_teachers_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let policy = match reference_policy(conn) {
        Ok(p) => p,
        Err(e) => return store_failure(req, e),
    };

    let result = entities::delete_teacher(conn, &teacher_id, policy);
    delete_response(req, "teacher", policy, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(handle_teachers_list(state, req)),
        "teachers.create" => Some(handle_teachers_create(state, req)),
        "teachers.get" => Some(handle_teachers_get(state, req)),
        "teachers.update" => Some(handle_teachers_update(state, req)),
        "teachers.delete" => Some(handle_teachers_delete(state, req)),
        _ => None,
    }
}
