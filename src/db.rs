use anyhow::Context;
use sqlx::postgres::PgPoolCopyExt;
use sqlx::{PgPool, Row};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendances (
            id BIGSERIAL PRIMARY KEY,
            status TEXT NOT NULL,
            date DATE NOT NULL,
            time_in TIME,
            time_out TIME,
            notes TEXT,
            student_id BIGINT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create attendances table")?;
    Ok(())
}

/// The student population the generator covers, in whatever order the
/// store returns it. The ids are opaque here; nothing downstream checks
/// them against the students table again.
pub async fn fetch_student_ids(pool: &PgPool) -> anyhow::Result<Vec<i64>> {
    let rows = sqlx::query("SELECT id FROM students")
        .fetch_all(pool)
        .await
        .context("failed to load student ids")?;

    Ok(rows.iter().map(|row| row.get("id")).collect())
}

/// Bulk-load a generated CSV into the attendances table with COPY.
/// Empty time fields in the CSV land as NULLs. Returns the row count.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<u64> {
    let file = tokio::fs::File::open(csv_path)
        .await
        .with_context(|| format!("failed to open {}", csv_path.display()))?;

    let mut copy = pool
        .copy_in_raw(
            "COPY attendances (status, date, time_in, time_out, notes, student_id) \
             FROM STDIN WITH (FORMAT CSV, HEADER true)",
        )
        .await
        .context("failed to start COPY")?;
    copy.read_from(file).await.context("COPY stream failed")?;
    let rows = copy.finish().await.context("failed to finish COPY")?;

    Ok(rows)
}
