use std::io::Write;

use anyhow::Context;

use crate::models::AttendanceRecord;

pub const CSV_HEADER: [&str; 6] = ["status", "date", "time_in", "time_out", "notes", "student_id"];

/// Streams attendance records to a sink as CSV, one chunk at a time.
///
/// The header goes out once, at construction. Each chunk is appended as a
/// contiguous block, so lines from different chunks never interleave, and
/// the sink is flushed every `flush_batch` records to keep buffered output
/// bounded.
pub struct RecordWriter<W: Write> {
    writer: csv::Writer<W>,
    flush_batch: usize,
    unflushed: usize,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(sink: W, flush_batch: usize) -> anyhow::Result<Self> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(sink);
        writer.write_record(CSV_HEADER).context("failed to write CSV header")?;
        Ok(Self {
            writer,
            flush_batch,
            unflushed: 0,
        })
    }

    pub fn write_chunk(&mut self, records: &[AttendanceRecord]) -> anyhow::Result<()> {
        for record in records {
            self.writer.serialize(record).context("failed to write attendance record")?;
            self.unflushed += 1;
            if self.unflushed >= self.flush_batch {
                self.writer.flush().context("failed to flush output")?;
                self.unflushed = 0;
            }
        }
        Ok(())
    }

    pub fn finish(&mut self) -> anyhow::Result<()> {
        self.writer.flush().context("failed to flush output")?;
        Ok(())
    }
}
