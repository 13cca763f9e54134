use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_timetabled");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn timetabled");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn code(value: &serde_json::Value) -> Option<&str> {
    value.pointer("/error/code").and_then(|v| v.as_str())
}

#[test]
fn classes_create_get_update_delete() {
    let workspace = temp_dir("timetabled-classes");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "classes.create",
        json!({ "grade": "7", "section": "  " }),
    );
    assert_eq!(code(&resp), Some("bad_params"));
    let resp = request(
        &mut stdin,
        &mut reader,
        "2b",
        "classes.create",
        json!({ "section": "A" }),
    );
    assert_eq!(code(&resp), Some("bad_params"));

    let b = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "classes.create",
        json!({ "grade": "7", "section": "B" }),
    );
    let a = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "classes.create",
        json!({ "grade": " 7 ", "section": "A" }),
    );
    assert_eq!(a.get("grade").and_then(|v| v.as_str()), Some("7"));
    assert!(a.get("createdAt").and_then(|v| v.as_str()).is_some());
    let a_id = a.get("id").and_then(|v| v.as_str()).expect("id").to_string();
    let b_id = b.get("id").and_then(|v| v.as_str()).expect("id").to_string();

    let listed = request_ok(&mut stdin, &mut reader, "5", "classes.list", json!({}));
    let sections: Vec<&str> = listed
        .get("classes")
        .and_then(|v| v.as_array())
        .expect("classes")
        .iter()
        .filter_map(|c| c.get("section").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(sections, vec!["A", "B"]);

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "classes.update",
        json!({ "classId": b_id, "patch": { "section": "C" } }),
    );
    assert_eq!(updated.get("section").and_then(|v| v.as_str()), Some("C"));
    assert_eq!(updated.get("grade").and_then(|v| v.as_str()), Some("7"));

    let fetched = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "classes.get",
        json!({ "classId": b_id }),
    );
    assert_eq!(fetched.get("section").and_then(|v| v.as_str()), Some("C"));

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "classes.delete",
        json!({ "classId": a_id }),
    );
    assert_eq!(
        deleted.pointer("/class/id").and_then(|v| v.as_str()),
        Some(a_id.as_str())
    );
    let resp = request(
        &mut stdin,
        &mut reader,
        "9",
        "classes.delete",
        json!({ "classId": a_id }),
    );
    assert_eq!(code(&resp), Some("not_found"));
    let resp = request(
        &mut stdin,
        &mut reader,
        "10",
        "classes.get",
        json!({ "classId": a_id }),
    );
    assert_eq!(code(&resp), Some("not_found"));
}

#[test]
fn teachers_create_get_update_delete() {
    let workspace = temp_dir("timetabled-teachers");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "teachers.create",
        json!({ "name": "No Email" }),
    );
    assert_eq!(code(&resp), Some("bad_params"));

    let t = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "teachers.create",
        json!({ "name": "Hypatia", "email": "hypatia@example.org" }),
    );
    let t_id = t.get("id").and_then(|v| v.as_str()).expect("id").to_string();

    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "teachers.update",
        json!({ "teacherId": t_id, "patch": { "email": "" } }),
    );
    assert_eq!(code(&resp), Some("bad_params"));

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "teachers.update",
        json!({ "teacherId": t_id, "patch": { "email": "h@example.org" } }),
    );
    assert_eq!(
        updated.get("email").and_then(|v| v.as_str()),
        Some("h@example.org")
    );
    assert_eq!(updated.get("name").and_then(|v| v.as_str()), Some("Hypatia"));

    let resp = request(
        &mut stdin,
        &mut reader,
        "6",
        "teachers.update",
        json!({ "teacherId": "missing", "patch": { "name": "X" } }),
    );
    assert_eq!(code(&resp), Some("not_found"));

    let listed = request_ok(&mut stdin, &mut reader, "7", "teachers.list", json!({}));
    assert_eq!(
        listed
            .get("teachers")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "teachers.delete",
        json!({ "teacherId": t_id }),
    );
    let resp = request(
        &mut stdin,
        &mut reader,
        "9",
        "teachers.get",
        json!({ "teacherId": t_id }),
    );
    assert_eq!(code(&resp), Some("not_found"));
}
