use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use strum_macros::{Display, EnumIter};
use utoipa::ToSchema;

/// The six timestamp-setting actions.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum StampKind {
    ClockIn,
    ClockOut,
    BreakIn,
    BreakOut,
    LunchIn,
    LunchOut,
}

impl StampKind {
    /// Column name in the `attendance` table.
    pub fn column(self) -> &'static str {
        match self {
            StampKind::ClockIn => "clock_in",
            StampKind::ClockOut => "clock_out",
            StampKind::BreakIn => "break_in",
            StampKind::BreakOut => "break_out",
            StampKind::LunchIn => "lunch_in",
            StampKind::LunchOut => "lunch_out",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            StampKind::ClockIn => "Clocked in successfully",
            StampKind::ClockOut => "Clocked out successfully",
            StampKind::BreakIn => "Break started",
            StampKind::BreakOut => "Break ended",
            StampKind::LunchIn => "Lunch started",
            StampKind::LunchOut => "Lunch ended",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow, ToSchema)]
pub struct Stamps {
    pub clock_in: Option<DateTime<Utc>>,
    pub clock_out: Option<DateTime<Utc>>,
    pub break_in: Option<DateTime<Utc>>,
    pub break_out: Option<DateTime<Utc>>,
    pub lunch_in: Option<DateTime<Utc>>,
    pub lunch_out: Option<DateTime<Utc>>,
}

impl Stamps {
    pub fn get(&self, kind: StampKind) -> Option<DateTime<Utc>> {
        *self.slot(kind)
    }

    fn slot(&self, kind: StampKind) -> &Option<DateTime<Utc>> {
        match kind {
            StampKind::ClockIn => &self.clock_in,
            StampKind::ClockOut => &self.clock_out,
            StampKind::BreakIn => &self.break_in,
            StampKind::BreakOut => &self.break_out,
            StampKind::LunchIn => &self.lunch_in,
            StampKind::LunchOut => &self.lunch_out,
        }
    }
}

/// One row per employee per calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "employee_ref": 7,
    "date": "2026-01-05",
    "clock_in": "2026-01-05T08:58:12Z",
    "clock_out": null,
    "break_in": null,
    "break_out": null,
    "lunch_in": null,
    "lunch_out": null
}))]
pub struct AttendanceRecord {
    pub employee_ref: u64,
    pub date: NaiveDate,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub stamps: Stamps,
}

/// An employee's record for the day, joined with their name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceEntry {
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub stamps: Stamps,
}

/// Employees grouped by which events they have recorded. Groups are
/// independent, so one employee can appear in several.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct AttendanceSummary {
    pub clockin: Vec<AttendanceEntry>,
    pub clockout: Vec<AttendanceEntry>,
    pub breakin: Vec<AttendanceEntry>,
    pub breakout: Vec<AttendanceEntry>,
    pub lunchin: Vec<AttendanceEntry>,
    pub lunchout: Vec<AttendanceEntry>,
}

impl AttendanceSummary {
    pub fn group(entries: Vec<AttendanceEntry>) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            for kind in <StampKind as strum::IntoEnumIterator>::iter() {
                if entry.stamps.get(kind).is_some() {
                    summary.bucket(kind).push(entry.clone());
                }
            }
        }
        summary
    }

    fn bucket(&mut self, kind: StampKind) -> &mut Vec<AttendanceEntry> {
        match kind {
            StampKind::ClockIn => &mut self.clockin,
            StampKind::ClockOut => &mut self.clockout,
            StampKind::BreakIn => &mut self.breakin,
            StampKind::BreakOut => &mut self.breakout,
            StampKind::LunchIn => &mut self.lunchin,
            StampKind::LunchOut => &mut self.lunchout,
        }
    }
}
