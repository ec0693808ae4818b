use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::model::task::{DateValue, Mark, Status, Task};

/// Hour at which the day rolls over unless configured otherwise
pub const DAY_BOUNDARY_HOUR: u32 = 3;

/// The date "today" refers to: times before the boundary hour still belong
/// to the previous day.
pub fn adjusted_today(now: NaiveDateTime, boundary_hour: u32) -> NaiveDate {
    (now - Duration::hours(boundary_hour.min(23) as i64)).date()
}

/// On-hold value that is still in force. A date on or before `today` has
/// expired; free text never expires.
pub fn active_onhold(task: &Task, today: NaiveDate) -> Option<&DateValue> {
    match task.onhold()? {
        DateValue::Date(d) if *d <= today => None,
        v => Some(v),
    }
}

/// Resolve a task's single status. Precedence:
/// legacy `%` mark, checked with follow-up, checked, follow-up,
/// active on-hold, incomplete.
pub fn task_status(task: &Task, today: NaiveDate) -> Status {
    let followup = task.followup().is_some();
    match task.mark {
        Mark::LegacyFollowUp => Status::FollowUp,
        Mark::Checked if followup => Status::FollowUp,
        Mark::Checked => Status::Done,
        Mark::Unchecked if followup => Status::FollowUp,
        Mark::Unchecked if active_onhold(task, today).is_some() => Status::OnHold,
        Mark::Unchecked => Status::Incomplete,
    }
}
