use std::sync::mpsc;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::models::{AttendanceRecord, DaySchedule, WorkChunk};
use crate::sampler;

/// Every day in the closed range `[start, end]`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|day| *day <= end).collect()
}

/// Split the student list into contiguous chunks sized for `parallelism`
/// workers. `chunk_multiplier` below 1.0 trades coordination overhead for
/// better load balance; above 1.0 the other way round. The chunk size never
/// drops below one student, and every student lands in exactly one chunk,
/// in the original order.
pub fn partition(students: &[i64], parallelism: usize, chunk_multiplier: f64) -> Vec<WorkChunk> {
    let chunk_size = (students.len() as f64 * chunk_multiplier / parallelism as f64).floor();
    let chunk_size = (chunk_size as usize).max(1);

    students
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, slice)| WorkChunk {
            index,
            students: slice.to_vec(),
        })
        .collect()
}

/// The records produced by one finished chunk, in student-major,
/// date-minor order.
pub struct ChunkOutput {
    pub student_count: usize,
    pub records: Vec<AttendanceRecord>,
}

/// Run the classifier over every (student, date) pair, one rayon task per
/// chunk, and hand each finished chunk to `on_chunk` in completion order.
///
/// Each task owns its chunk and its own RNG; with a fixed run seed, chunk
/// `i` is seeded with `seed + i`, so output is reproducible no matter which
/// chunk finishes first. The channel is bounded by the worker count, which
/// caps how many finished chunks can sit in memory ahead of the consumer.
///
/// An error from `on_chunk` aborts the run: dropping the receiver makes
/// every pending send fail, and the remaining tasks wind down without
/// producing output. Rows already handed to the consumer stay written.
pub fn run_chunks(
    chunks: Vec<WorkChunk>,
    dates: &[NaiveDate],
    schedule: &DaySchedule,
    seed: Option<u64>,
    workers: usize,
    mut on_chunk: impl FnMut(ChunkOutput) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
    let (tx, rx) = mpsc::sync_channel::<ChunkOutput>(workers);

    pool.in_place_scope(move |scope| {
        for chunk in chunks {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(chunk.index as u64)),
                    None => StdRng::from_entropy(),
                };

                let mut records = Vec::with_capacity(chunk.students.len() * dates.len());
                for &student_id in &chunk.students {
                    for &date in dates {
                        records.push(sampler::classify(student_id, date, schedule, &mut rng));
                    }
                }

                // Send only fails when the consumer has hung up, i.e. the
                // run is already aborting.
                let _ = tx.send(ChunkOutput {
                    student_count: chunk.students.len(),
                    records,
                });
            });
        }
        drop(tx);

        for output in rx {
            on_chunk(output)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeWindow;
    use anyhow::bail;
    use chrono::NaiveTime;
    use std::collections::HashSet;

    fn time(s: &str) -> NaiveTime {
        s.parse().unwrap()
    }

    fn schedule() -> DaySchedule {
        DaySchedule {
            morning: TimeWindow {
                start: time("05:00:00"),
                end: time("07:00:00"),
            },
            afternoon: TimeWindow {
                start: time("12:00:00"),
                end: time("18:00:00"),
            },
            cutoff: time("06:00:00"),
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn date_range_is_inclusive() {
        let days = date_range(date("2020-01-01"), date("2020-01-03"));
        assert_eq!(
            days,
            vec![date("2020-01-01"), date("2020-01-02"), date("2020-01-03")]
        );
        assert_eq!(
            date_range(date("2020-01-01"), date("2020-12-31")).len(),
            366
        );
        assert_eq!(date_range(date("2020-06-01"), date("2020-06-01")).len(), 1);
    }

    #[test]
    fn ten_students_across_two_workers_make_two_chunks_of_five() {
        let students: Vec<i64> = (1..=10).collect();
        let chunks = partition(&students, 2, 1.0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].students, (1..=5).collect::<Vec<i64>>());
        assert_eq!(chunks[1].students, (6..=10).collect::<Vec<i64>>());
    }

    #[test]
    fn partition_covers_every_student_exactly_once() {
        let students: Vec<i64> = (100..117).collect();
        for (parallelism, multiplier) in [(1, 1.0), (3, 0.5), (8, 1.0), (4, 2.0)] {
            let chunks = partition(&students, parallelism, multiplier);
            let flattened: Vec<i64> = chunks
                .iter()
                .flat_map(|chunk| chunk.students.iter().copied())
                .collect();
            assert_eq!(flattened, students, "parallelism={parallelism} multiplier={multiplier}");
        }
    }

    #[test]
    fn chunk_size_never_drops_below_one() {
        let students: Vec<i64> = vec![7, 8, 9];
        let chunks = partition(&students, 8, 1.0);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|chunk| chunk.students.len() == 1));
    }

    #[test]
    fn every_student_date_pair_gets_exactly_one_record() {
        let students: Vec<i64> = (1..=10).collect();
        let dates = date_range(date("2022-01-01"), date("2022-01-03"));
        let chunks = partition(&students, 2, 1.0);

        let mut all = Vec::new();
        run_chunks(chunks, &dates, &schedule(), Some(5), 2, |output| {
            all.extend(output.records);
            Ok(())
        })
        .unwrap();

        assert_eq!(all.len(), 30);
        let pairs: HashSet<(i64, NaiveDate)> =
            all.iter().map(|r| (r.student_id, r.date)).collect();
        assert_eq!(pairs.len(), 30);
    }

    #[test]
    fn records_within_a_chunk_are_student_major_date_minor() {
        let students: Vec<i64> = (1..=4).collect();
        let dates = date_range(date("2022-01-01"), date("2022-01-02"));
        let chunks = partition(&students, 1, 1.0);
        assert_eq!(chunks.len(), 1);

        let mut outputs = Vec::new();
        run_chunks(chunks, &dates, &schedule(), Some(1), 1, |output| {
            outputs.push(output);
            Ok(())
        })
        .unwrap();

        let keys: Vec<(i64, NaiveDate)> = outputs[0]
            .records
            .iter()
            .map(|r| (r.student_id, r.date))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let students: Vec<i64> = (1..=20).collect();
        let dates = date_range(date("2023-05-01"), date("2023-05-07"));

        let run = || {
            let chunks = partition(&students, 4, 0.5);
            let mut all = Vec::new();
            run_chunks(chunks, &dates, &schedule(), Some(42), 4, |output| {
                all.extend(output.records);
                Ok(())
            })
            .unwrap();
            all.sort_by_key(|r| (r.student_id, r.date));
            all
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn consumer_error_aborts_the_run() {
        let students: Vec<i64> = (1..=32).collect();
        let dates = date_range(date("2022-01-01"), date("2022-01-05"));
        let chunks = partition(&students, 8, 0.5);
        assert!(chunks.len() > 2);

        let result = run_chunks(chunks, &dates, &schedule(), None, 2, |_| {
            bail!("sink is gone")
        });
        assert!(result.is_err());
    }
}
