use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecord {
    pub id: String,
    pub grade: String,
    pub section: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Clone)]
pub struct ClassPatch {
    pub grade: Option<String>,
    pub section: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct TeacherPatch {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// What a class or teacher delete does to entries that still reference it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferencePolicy {
    #[default]
    Reject,
    Cascade,
    Orphan,
}

impl ReferencePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reject" => Some(Self::Reject),
            "cascade" => Some(Self::Cascade),
            "orphan" => Some(Self::Orphan),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Cascade => "cascade",
            Self::Orphan => "orphan",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteError {
    #[error("record not found")]
    NotFound,
    #[error("record is referenced by {entry_count} timetable entries")]
    HasReferences { entry_count: i64 },
    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

#[derive(Debug, Clone)]
pub struct Deleted<T> {
    pub record: T,
    pub removed_entries: usize,
    pub orphaned_entries: usize,
}

pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn class_from_row(r: &Row<'_>) -> rusqlite::Result<ClassRecord> {
    Ok(ClassRecord {
        id: r.get(0)?,
        grade: r.get(1)?,
        section: r.get(2)?,
        created_at: r.get(3)?,
        updated_at: r.get(4)?,
    })
}

fn teacher_from_row(r: &Row<'_>) -> rusqlite::Result<TeacherRecord> {
    Ok(TeacherRecord {
        id: r.get(0)?,
        name: r.get(1)?,
        email: r.get(2)?,
        created_at: r.get(3)?,
        updated_at: r.get(4)?,
    })
}

pub fn find_class_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<ClassRecord>> {
    conn.query_row(
        "SELECT id, grade, section, created_at, updated_at FROM classes WHERE id = ?",
        [id],
        class_from_row,
    )
    .optional()
}

pub fn find_teacher_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<TeacherRecord>> {
    conn.query_row(
        "SELECT id, name, email, created_at, updated_at FROM teachers WHERE id = ?",
        [id],
        teacher_from_row,
    )
    .optional()
}

pub fn list_classes(conn: &Connection) -> rusqlite::Result<Vec<ClassRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, grade, section, created_at, updated_at
         FROM classes
         ORDER BY grade, section, created_at",
    )?;
    let rows = stmt.query_map([], class_from_row)?;
    rows.collect()
}

pub fn list_teachers(conn: &Connection) -> rusqlite::Result<Vec<TeacherRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, created_at, updated_at
         FROM teachers
         ORDER BY name, created_at",
    )?;
    let rows = stmt.query_map([], teacher_from_row)?;
    rows.collect()
}

pub fn create_class(conn: &Connection, grade: &str, section: &str) -> rusqlite::Result<ClassRecord> {
    let now = now_timestamp();
    let rec = ClassRecord {
        id: Uuid::new_v4().to_string(),
        grade: grade.to_string(),
        section: section.to_string(),
        created_at: now.clone(),
        updated_at: now,
    };
    conn.execute(
        "INSERT INTO classes(id, grade, section, created_at, updated_at) VALUES(?, ?, ?, ?, ?)",
        (&rec.id, &rec.grade, &rec.section, &rec.created_at, &rec.updated_at),
    )?;
    Ok(rec)
}

pub fn create_teacher(conn: &Connection, name: &str, email: &str) -> rusqlite::Result<TeacherRecord> {
    let now = now_timestamp();
    let rec = TeacherRecord {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: email.to_string(),
        created_at: now.clone(),
        updated_at: now,
    };
    conn.execute(
        "INSERT INTO teachers(id, name, email, created_at, updated_at) VALUES(?, ?, ?, ?, ?)",
        (&rec.id, &rec.name, &rec.email, &rec.created_at, &rec.updated_at),
    )?;
    Ok(rec)
}

/// Returns `None` when the class does not exist.
pub fn update_class(
    conn: &Connection,
    id: &str,
    patch: &ClassPatch,
) -> rusqlite::Result<Option<ClassRecord>> {
    let Some(mut rec) = find_class_by_id(conn, id)? else {
        return Ok(None);
    };
    if let Some(grade) = &patch.grade {
        rec.grade = grade.clone();
    }
    if let Some(section) = &patch.section {
        rec.section = section.clone();
    }
    rec.updated_at = now_timestamp();
    conn.execute(
        "UPDATE classes SET grade = ?, section = ?, updated_at = ? WHERE id = ?",
        (&rec.grade, &rec.section, &rec.updated_at, &rec.id),
    )?;
    Ok(Some(rec))
}

pub fn update_teacher(
    conn: &Connection,
    id: &str,
    patch: &TeacherPatch,
) -> rusqlite::Result<Option<TeacherRecord>> {
    let Some(mut rec) = find_teacher_by_id(conn, id)? else {
        return Ok(None);
    };
    if let Some(name) = &patch.name {
        rec.name = name.clone();
    }
    if let Some(email) = &patch.email {
        rec.email = email.clone();
    }
    rec.updated_at = now_timestamp();
    conn.execute(
        "UPDATE teachers SET name = ?, email = ?, updated_at = ? WHERE id = ?",
        (&rec.name, &rec.email, &rec.updated_at, &rec.id),
    )?;
    Ok(Some(rec))
}

pub fn delete_class(
    conn: &Connection,
    id: &str,
    policy: ReferencePolicy,
) -> Result<Deleted<ClassRecord>, DeleteError> {
    let tx = rusqlite::Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let record = find_class_by_id(&tx, id)?.ok_or(DeleteError::NotFound)?;
    let (removed_entries, orphaned_entries) = apply_reference_policy(&tx, "class_id", id, policy)?;
    tx.execute("DELETE FROM classes WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(Deleted {
        record,
        removed_entries,
        orphaned_entries,
    })
}

pub fn delete_teacher(
    conn: &Connection,
    id: &str,
    policy: ReferencePolicy,
) -> Result<Deleted<TeacherRecord>, DeleteError> {
    let tx = rusqlite::Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let record = find_teacher_by_id(&tx, id)?.ok_or(DeleteError::NotFound)?;
    let (removed_entries, orphaned_entries) =
        apply_reference_policy(&tx, "teacher_id", id, policy)?;
    tx.execute("DELETE FROM teachers WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(Deleted {
        record,
        removed_entries,
        orphaned_entries,
    })
}

// Returns (removed, orphaned). `column` is always one of our own literals.
fn apply_reference_policy(
    conn: &Connection,
    column: &'static str,
    id: &str,
    policy: ReferencePolicy,
) -> Result<(usize, usize), DeleteError> {
    let count_sql = format!("SELECT COUNT(*) FROM timetable_entries WHERE {column} = ?");
    let entry_count: i64 = conn.query_row(&count_sql, [id], |r| r.get(0))?;
    if entry_count == 0 {
        return Ok((0, 0));
    }
    match policy {
        ReferencePolicy::Reject => Err(DeleteError::HasReferences { entry_count }),
        ReferencePolicy::Cascade => {
            let delete_sql = format!("DELETE FROM timetable_entries WHERE {column} = ?");
            let removed = conn.execute(&delete_sql, [id])?;
            Ok((removed, 0))
        }
        ReferencePolicy::Orphan => Ok((0, entry_count as usize)),
    }
}
