use crate::entities;
use crate::ipc::error::{err, no_workspace, ok};
use crate::ipc::helpers::{required_str, store_failure};
use crate::ipc::types::{AppState, Request};
use crate::slots::{DAYS, PERIODS};
use crate::timetable::{self, Proposal, TimetableError};
use serde_json::json;

fn timetable_err(req: &Request, e: &TimetableError) -> serde_json::Value {
    if matches!(e, TimetableError::StoreFailure(_) | TimetableError::CorruptEntry(_)) {
        tracing::error!(method = %req.method, error = %e, "timetable store failure");
    } else {
        tracing::warn!(method = %req.method, code = e.code(), "timetable request rejected");
    }
    err(&req.id, e.code(), e.to_string(), e.details())
}

fn str_param<'a>(req: &'a Request, key: &str) -> &'a str {
    req.params.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

fn handle_timetable_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };

    // Absent ids fall through to the reference check, absent labels to the
    // slot check, so malformed input gets the same codes as wrong input.
    let teacher_id = match req.params.get("teacherId") {
        Some(_) => str_param(req, "teacherId"),
        None => str_param(req, "teacher"),
    };
    let proposal = Proposal {
        class_id: str_param(req, "classId"),
        day: str_param(req, "day"),
        period: str_param(req, "period"),
        teacher_id,
    };

    match timetable::propose_assignment(conn, &proposal) {
        Ok(entry) => ok(&req.id, json!(entry)),
        Err(e) => timetable_err(req, &e),
    }
}

fn handle_timetable_list_for_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let class = match entities::find_class_by_id(conn, &class_id) {
        Ok(v) => v,
        Err(e) => return store_failure(req, e),
    };
    match timetable::weekly_grid(conn, &class_id) {
        Ok(entries) => ok(&req.id, json!({ "class": class, "entries": entries })),
        Err(e) => timetable_err(req, &e),
    }
}

fn handle_timetable_class_grid(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let class = match entities::find_class_by_id(conn, &class_id) {
        Ok(v) => v,
        Err(e) => return store_failure(req, e),
    };
    let entries = match timetable::weekly_grid(conn, &class_id) {
        Ok(v) => v,
        Err(e) => return timetable_err(req, &e),
    };
    let cells = timetable::grid_cells(&entries);
    ok(
        &req.id,
        json!({
            "class": class,
            "days": DAYS.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
            "periods": PERIODS.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            "filled": entries.len(),
            "cells": cells,
        }),
    )
}

fn handle_timetable_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let entry_id = match required_str(req, "entryId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match timetable::remove_assignment(conn, &entry_id) {
        Ok(entry) => ok(&req.id, json!(entry)),
        Err(e) => timetable_err(req, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetable.create" => Some(handle_timetable_create(state, req)),
        "timetable.listForClass" => Some(handle_timetable_list_for_class(state, req)),
        "timetable.classGrid" => Some(handle_timetable_class_grid(state, req)),
        "timetable.delete" => Some(handle_timetable_delete(state, req)),
        _ => None,
    }
}
