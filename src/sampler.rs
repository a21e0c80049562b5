use chrono::{Duration, NaiveDate, NaiveTime};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::models::{AttendanceRecord, AttendanceStatus, DaySchedule, TimeWindow};

/// Chance that a student produces no morning scan at all for a given day.
pub const ABSENCE_PROBABILITY: f64 = 0.1;

/// Draw a clock time inside `window`, or `None` for an absence when
/// `allow_absence` is set.
///
/// Times cluster around the middle of the window: the offset is a normal
/// draw with mean at the window midpoint and a standard deviation of a
/// third of that, rounded to whole seconds. Draws landing outside the
/// window are clamped to its bounds rather than resampled, so narrow
/// windows pile up on their edges. Good enough for mock data.
pub fn sample(window: &TimeWindow, allow_absence: bool, rng: &mut StdRng) -> Option<NaiveTime> {
    if allow_absence && rng.gen_bool(ABSENCE_PROBABILITY) {
        return None;
    }

    let duration = window.duration_secs();
    let mean = duration as f64 / 2.0;
    let normal = Normal::new(mean, mean / 3.0).expect("window bounds validated at startup");
    let offset = (normal.sample(rng).round() as i64).clamp(0, duration);
    Some(window.start + Duration::seconds(offset))
}

/// Derive the day's status from the morning scan alone.
pub fn status_for(time_in: Option<NaiveTime>, cutoff: NaiveTime) -> AttendanceStatus {
    match time_in {
        None => AttendanceStatus::Absent,
        Some(time) if time > cutoff => AttendanceStatus::Late,
        Some(_) => AttendanceStatus::OnTime,
    }
}

/// Build one attendance record for a (student, date) pair.
///
/// The morning draw decides absence; the afternoon draw only happens when
/// the student showed up, and never itself produces an absence.
pub fn classify(
    student_id: i64,
    date: NaiveDate,
    schedule: &DaySchedule,
    rng: &mut StdRng,
) -> AttendanceRecord {
    let time_in = sample(&schedule.morning, true, rng);
    let time_out = match time_in {
        Some(_) => sample(&schedule.afternoon, false, rng),
        None => None,
    };

    AttendanceRecord {
        status: status_for(time_in, schedule.cutoff),
        date,
        time_in,
        time_out,
        notes: String::new(),
        student_id,
    }
}
