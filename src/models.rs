use anyhow::{bail, Context};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    OnTime,
    Late,
    Absent,
}

/// One row of the output CSV. Field order matches the target table's
/// column order, so the struct doubles as the serialization schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub status: AttendanceStatus,
    pub date: NaiveDate,
    pub time_in: Option<NaiveTime>,
    pub time_out: Option<NaiveTime>,
    pub notes: String,
    pub student_id: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> anyhow::Result<Self> {
        if end <= start {
            bail!("time window end {end} must be after start {start}");
        }
        Ok(Self { start, end })
    }

    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// The time-of-day layout of a school day: when students arrive, when
/// they leave, and the arrival time past which they count as late.
#[derive(Debug, Clone, Copy)]
pub struct DaySchedule {
    pub morning: TimeWindow,
    pub afternoon: TimeWindow,
    pub cutoff: NaiveTime,
}

/// A contiguous slice of the student population, processed as one unit
/// of work against the full shared date range.
#[derive(Debug, Clone)]
pub struct WorkChunk {
    pub index: usize,
    pub students: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub schedule: DaySchedule,
    pub workers: usize,
    pub chunk_multiplier: f64,
    pub flush_batch: usize,
    pub progress_interval: usize,
    pub seed: Option<u64>,
}

impl GeneratorConfig {
    /// Rejects every configuration the engine cannot run with, before any
    /// work is dispatched or any output is opened.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.end_date < self.start_date {
            bail!(
                "end date {} is before start date {}",
                self.end_date,
                self.start_date
            );
        }
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if !self.chunk_multiplier.is_finite() || self.chunk_multiplier <= 0.0 {
            bail!("chunk multiplier must be a positive number");
        }
        if self.flush_batch == 0 {
            bail!("flush batch must be at least 1");
        }
        if self.progress_interval == 0 {
            bail!("progress interval must be at least 1");
        }
        TimeWindow::new(self.schedule.morning.start, self.schedule.morning.end)
            .context("invalid morning window")?;
        TimeWindow::new(self.schedule.afternoon.start, self.schedule.afternoon.end)
            .context("invalid afternoon window")?;
        Ok(())
    }
}
