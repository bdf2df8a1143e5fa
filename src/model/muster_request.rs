use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, StrumDisplay, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MusterAction {
    ClockIn,
    ClockOut,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, StrumDisplay, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MusterStatus {
    Pending,
    Approved,
    Rejected,
}

impl MusterStatus {
    /// pending -> approved | rejected | pending, rejected -> pending.
    /// approved is terminal.
    pub fn can_become(self, next: MusterStatus) -> bool {
        match (self, next) {
            (MusterStatus::Approved, _) => false,
            (MusterStatus::Pending, _) => true,
            (MusterStatus::Rejected, MusterStatus::Pending) => true,
            (MusterStatus::Rejected, _) => false,
        }
    }
}

impl TryFrom<String> for MusterAction {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for MusterStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
pub enum TransitionError {
    #[display(fmt = "Approved requests cannot be edited")]
    Immutable,
    #[display(fmt = "Muster request already processed")]
    AlreadyDecided,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 12,
    "employee_id": "E100",
    "action": "clockin",
    "requested_time": "2026-01-05T09:00:00Z",
    "reason": "Forgot to clock in",
    "status": "pending",
    "created_at": "2026-01-05T11:20:31Z",
    "updated_at": "2026-01-05T11:20:31Z"
}))]
pub struct MusterRequest {
    pub id: u64,
    #[serde(skip)]
    pub employee_ref: u64,
    /// The submitter's login id.
    pub employee_id: String,
    #[sqlx(try_from = "String")]
    pub action: MusterAction,
    pub requested_time: DateTime<Utc>,
    pub reason: String,
    #[sqlx(try_from = "String")]
    pub status: MusterStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update submitted by the owner of a request.
#[derive(Debug, Default)]
pub struct MusterEdit {
    pub action: Option<MusterAction>,
    pub requested_time: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl MusterRequest {
    /// Applies the owner's edit and puts the request back in the queue.
    pub fn resubmit(&mut self, edit: MusterEdit, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.status.can_become(MusterStatus::Pending) {
            return Err(TransitionError::Immutable);
        }
        if let Some(action) = edit.action {
            self.action = action;
        }
        if let Some(requested_time) = edit.requested_time {
            self.requested_time = requested_time;
        }
        if let Some(reason) = edit.reason {
            self.reason = reason;
        }
        self.status = MusterStatus::Pending;
        self.updated_at = now;
        Ok(())
    }

    /// Approval or rejection of a pending request.
    pub fn decide(&mut self, decision: MusterStatus, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != MusterStatus::Pending
            || decision == MusterStatus::Pending
            || !self.status.can_become(decision)
        {
            return Err(TransitionError::AlreadyDecided);
        }
        self.status = decision;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn request(status: MusterStatus) -> MusterRequest {
        let created = Utc.with_ymd_and_hms(2026, 1, 5, 11, 0, 0).unwrap();
        MusterRequest {
            id: 1,
            employee_ref: 7,
            employee_id: "E100".into(),
            action: MusterAction::ClockIn,
            requested_time: Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap(),
            reason: "Forgot".into(),
            status,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn wire_names_are_lowercase() {
        assert_eq!(MusterAction::ClockIn.to_string(), "clockin");
        assert_eq!("clockout".parse::<MusterAction>().ok(), Some(MusterAction::ClockOut));
        assert!("clock_in".parse::<MusterAction>().is_err());
        assert_eq!(serde_json::to_value(MusterStatus::Rejected).unwrap(), "rejected");
    }

    #[test]
    fn approved_request_cannot_be_edited() {
        let mut r = request(MusterStatus::Approved);
        let before = r.clone();
        let err = r
            .resubmit(
                MusterEdit {
                    reason: Some("changed".into()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, TransitionError::Immutable);
        assert_eq!(r.reason, before.reason);
        assert_eq!(r.status, MusterStatus::Approved);
    }

    #[test]
    fn editing_rejected_request_resets_to_pending() {
        let mut r = request(MusterStatus::Rejected);
        let now = r.created_at + Duration::hours(1);
        r.resubmit(
            MusterEdit {
                action: Some(MusterAction::ClockOut),
                ..Default::default()
            },
            now,
        )
        .unwrap();
        assert_eq!(r.status, MusterStatus::Pending);
        assert_eq!(r.action, MusterAction::ClockOut);
        assert_eq!(r.reason, "Forgot");
        assert_eq!(r.updated_at, now);
    }

    #[test]
    fn editing_pending_request_stays_pending() {
        let mut r = request(MusterStatus::Pending);
        r.resubmit(
            MusterEdit {
                reason: Some("Badge reader down".into()),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(r.status, MusterStatus::Pending);
        assert_eq!(r.reason, "Badge reader down");
    }

    #[test]
    fn only_pending_requests_can_be_decided() {
        let mut r = request(MusterStatus::Pending);
        r.decide(MusterStatus::Approved, Utc::now()).unwrap();
        assert_eq!(r.status, MusterStatus::Approved);
        assert_eq!(
            r.decide(MusterStatus::Rejected, Utc::now()),
            Err(TransitionError::AlreadyDecided)
        );

        let mut rejected = request(MusterStatus::Rejected);
        assert!(rejected.decide(MusterStatus::Approved, Utc::now()).is_err());

        let mut pending = request(MusterStatus::Pending);
        assert!(pending.decide(MusterStatus::Pending, Utc::now()).is_err());
    }

    #[test]
    fn transition_table() {
        use MusterStatus::*;
        assert!(Pending.can_become(Approved));
        assert!(Pending.can_become(Rejected));
        assert!(Rejected.can_become(Pending));
        assert!(!Rejected.can_become(Approved));
        assert!(!Approved.can_become(Pending));
        assert!(!Approved.can_become(Rejected));
    }
}
