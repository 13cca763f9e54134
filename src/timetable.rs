use crate::entities::{find_class_by_id, find_teacher_by_id};
use crate::slots::{Day, Period, Slot, DAYS, PERIODS};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct Proposal<'a> {
    pub class_id: &'a str,
    pub day: &'a str,
    pub period: &'a str,
    pub teacher_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub class_id: String,
    pub day: Day,
    pub period: Period,
    pub teacher_id: String,
    pub created_at: String,
}

impl Assignment {
    pub fn slot(&self) -> Slot {
        Slot {
            day: self.day,
            period: self.period,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeacherSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

// `teacher` is None only for entries orphaned by a teacher delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridEntry {
    #[serde(flatten)]
    pub entry: Assignment,
    pub teacher: Option<TeacherSummary>,
}

#[derive(Debug, thiserror::Error)]
pub enum TimetableError {
    #[error("invalid day or period: {day:?} / {period:?}")]
    InvalidSlot { day: String, period: String },
    #[error("Invalid class or teacher")]
    UnknownReference {
        class_missing: bool,
        teacher_missing: bool,
    },
    #[error("Teacher is already assigned to another class at this time")]
    TeacherConflict { conflicting_entry_id: Option<String> },
    #[error("This class already has a teacher at this time")]
    ClassConflict { conflicting_entry_id: Option<String> },
    #[error("Timetable entry not found")]
    NotFound { entry_id: String },
    #[error("stored timetable entry is unreadable: {0}")]
    CorruptEntry(#[source] rusqlite::Error),
    #[error("store failure: {0}")]
    StoreFailure(#[source] rusqlite::Error),
}

impl TimetableError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSlot { .. } => "invalid_slot",
            Self::UnknownReference { .. } => "unknown_reference",
            Self::TeacherConflict { .. } => "teacher_conflict",
            Self::ClassConflict { .. } => "class_conflict",
            Self::NotFound { .. } => "not_found",
            Self::CorruptEntry(_) => "corrupt_entry",
            Self::StoreFailure(_) => "store_failure",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreFailure(_))
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::InvalidSlot { day, period } => Some(json!({ "day": day, "period": period })),
            Self::UnknownReference {
                class_missing,
                teacher_missing,
            } => Some(json!({
                "classMissing": class_missing,
                "teacherMissing": teacher_missing,
            })),
            Self::TeacherConflict {
                conflicting_entry_id,
            }
            | Self::ClassConflict {
                conflicting_entry_id,
            } => conflicting_entry_id
                .as_ref()
                .map(|id| json!({ "conflictingEntryId": id })),
            Self::NotFound { entry_id } => Some(json!({ "entryId": entry_id })),
            Self::CorruptEntry(_) => Some(json!({ "retryable": false })),
            Self::StoreFailure(_) => Some(json!({ "retryable": true })),
        }
    }
}

// A UNIQUE violation on timetable_entries is the storage layer rejecting a
// double booking, so it maps to the same conflict the pre-check would report.
impl From<rusqlite::Error> for TimetableError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ffi_err, Some(msg)) = &e {
            if ffi_err.code == ErrorCode::ConstraintViolation {
                if msg.contains("timetable_entries.teacher_id") {
                    return Self::TeacherConflict {
                        conflicting_entry_id: None,
                    };
                }
                if msg.contains("timetable_entries.class_id") {
                    return Self::ClassConflict {
                        conflicting_entry_id: None,
                    };
                }
            }
        }
        // Row decoding failures come from data, not from the store being busy.
        if let rusqlite::Error::FromSqlConversionFailure(..) = e {
            return Self::CorruptEntry(e);
        }
        Self::StoreFailure(e)
    }
}

fn parse_day(r: &Row<'_>, idx: usize) -> rusqlite::Result<Day> {
    let raw: String = r.get(idx)?;
    Day::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, format!("unknown day {raw:?}").into())
    })
}

fn parse_period(r: &Row<'_>, idx: usize) -> rusqlite::Result<Period> {
    let raw: String = r.get(idx)?;
    Period::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown period {raw:?}").into(),
        )
    })
}

fn assignment_from_row(r: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: r.get(0)?,
        class_id: r.get(1)?,
        day: parse_day(r, 2)?,
        period: parse_period(r, 3)?,
        teacher_id: r.get(4)?,
        created_at: r.get(5)?,
    })
}

pub fn find_assignment(conn: &Connection, id: &str) -> rusqlite::Result<Option<Assignment>> {
    conn.query_row(
        "SELECT id, class_id, day, period, teacher_id, created_at
         FROM timetable_entries
         WHERE id = ?",
        [id],
        assignment_from_row,
    )
    .optional()
}

fn entry_in_slot_for_teacher(
    conn: &Connection,
    slot: Slot,
    teacher_id: &str,
) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM timetable_entries WHERE day = ? AND period = ? AND teacher_id = ?",
        (slot.day.as_str(), slot.period.as_str(), teacher_id),
        |r| r.get(0),
    )
    .optional()
}

fn entry_in_slot_for_class(
    conn: &Connection,
    slot: Slot,
    class_id: &str,
) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM timetable_entries WHERE day = ? AND period = ? AND class_id = ?",
        (slot.day.as_str(), slot.period.as_str(), class_id),
        |r| r.get(0),
    )
    .optional()
}

/// Checks run in order and the first failure wins: slot labels, class and
/// teacher existence, teacher busy, class taken.
pub fn propose_assignment(
    conn: &Connection,
    proposal: &Proposal<'_>,
) -> Result<Assignment, TimetableError> {
    let slot = Slot::parse(proposal.day, proposal.period).ok_or_else(|| {
        TimetableError::InvalidSlot {
            day: proposal.day.to_string(),
            period: proposal.period.to_string(),
        }
    })?;

    let tx = rusqlite::Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let class_missing = find_class_by_id(&tx, proposal.class_id)?.is_none();
    let teacher_missing = find_teacher_by_id(&tx, proposal.teacher_id)?.is_none();
    if class_missing || teacher_missing {
        return Err(TimetableError::UnknownReference {
            class_missing,
            teacher_missing,
        });
    }

    if let Some(existing) = entry_in_slot_for_teacher(&tx, slot, proposal.teacher_id)? {
        return Err(TimetableError::TeacherConflict {
            conflicting_entry_id: Some(existing),
        });
    }
    if let Some(existing) = entry_in_slot_for_class(&tx, slot, proposal.class_id)? {
        return Err(TimetableError::ClassConflict {
            conflicting_entry_id: Some(existing),
        });
    }

    let assignment = Assignment {
        id: Uuid::new_v4().to_string(),
        class_id: proposal.class_id.to_string(),
        day: slot.day,
        period: slot.period,
        teacher_id: proposal.teacher_id.to_string(),
        created_at: crate::entities::now_timestamp(),
    };
    tx.execute(
        "INSERT INTO timetable_entries(id, class_id, day, period, teacher_id, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &assignment.id,
            &assignment.class_id,
            assignment.day.as_str(),
            assignment.period.as_str(),
            &assignment.teacher_id,
            &assignment.created_at,
        ),
    )?;
    tx.commit()?;

    tracing::info!(
        entry_id = %assignment.id,
        class_id = %assignment.class_id,
        teacher_id = %assignment.teacher_id,
        slot = %slot,
        "timetable entry created"
    );
    Ok(assignment)
}

pub fn remove_assignment(conn: &Connection, id: &str) -> Result<Assignment, TimetableError> {
    let tx = rusqlite::Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let Some(existing) = find_assignment(&tx, id)? else {
        return Err(TimetableError::NotFound {
            entry_id: id.to_string(),
        });
    };
    tx.execute("DELETE FROM timetable_entries WHERE id = ?", [id])?;
    tx.commit()?;

    tracing::info!(entry_id = %existing.id, slot = %existing.slot(), "timetable entry removed");
    Ok(existing)
}

/// An unknown class id yields an empty list.
pub fn weekly_grid(conn: &Connection, class_id: &str) -> Result<Vec<GridEntry>, TimetableError> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.class_id, e.day, e.period, e.teacher_id, e.created_at,
                t.id, t.name, t.email
         FROM timetable_entries e
         LEFT JOIN teachers t ON t.id = e.teacher_id
         WHERE e.class_id = ?",
    )?;
    let rows = stmt.query_map([class_id], |r| {
        let entry = assignment_from_row(r)?;
        let teacher_id: Option<String> = r.get(6)?;
        let teacher = match teacher_id {
            Some(id) => Some(TeacherSummary {
                id,
                name: r.get(7)?,
                email: r.get(8)?,
            }),
            None => None,
        };
        Ok(GridEntry { entry, teacher })
    })?;
    let mut entries = rows.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|g| g.entry.slot());
    Ok(entries)
}

pub fn entries_by_slot(entries: &[GridEntry]) -> HashMap<Slot, &GridEntry> {
    entries.iter().map(|g| (g.entry.slot(), g)).collect()
}

// cells[day][period]
pub fn grid_cells(entries: &[GridEntry]) -> Vec<Vec<Option<&GridEntry>>> {
    let by_slot = entries_by_slot(entries);
    DAYS.iter()
        .map(|&day| {
            PERIODS
                .iter()
                .map(|&period| by_slot.get(&Slot { day, period }).copied())
                .collect()
        })
        .collect()
}
