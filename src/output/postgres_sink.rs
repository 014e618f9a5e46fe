use sqlx::PgPool;

use crate::error::SinkError;
use crate::output::{EventRecord, EventSink};

/// Writes event batches into a single flat `events` table via `COPY FROM
/// STDIN`, the same text-format protocol the teacher's `db/load.rs` uses.
/// Synchronous from the caller's point of view: each `write_batch` blocks
/// on a small single-threaded Tokio runtime, since [`EventSink`] itself is
/// a synchronous trait (the sequential and parallel drivers are both
/// plain threads, not async tasks).
pub struct PostgresSink {
    pool: PgPool,
    runtime: tokio::runtime::Runtime,
}

impl PostgresSink {
    pub fn connect(database_url: &str) -> Result<Self, SinkError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build tokio runtime");
        let pool = runtime.block_on(async {
            let pool = PgPool::connect(database_url).await?;
            sqlx::raw_sql(include_str!("../../sql/schema.sql")).execute(&pool).await?;
            Ok::<_, sqlx::Error>(pool)
        })?;
        Ok(Self { pool, runtime })
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn opt_str(v: &Option<impl ToString>) -> String {
    match v {
        Some(s) => escape(&s.to_string()),
        None => "\\N".to_string(),
    }
}

impl EventSink for PostgresSink {
    fn write_batch(&mut self, records: &[EventRecord]) -> Result<(), SinkError> {
        let mut buf = String::new();
        for r in records {
            buf.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                escape(r.record_type.name()),
                r.person_id,
                opt_str(&r.lesion_id),
                r.time,
                opt_str(&r.message.map(str::to_string)),
                opt_str(&r.old_state.map(str::to_string)),
                opt_str(&r.new_state.map(str::to_string)),
                opt_str(&r.test_name),
                opt_str(&r.routine_test),
                opt_str(&r.role.map(str::to_string)),
                opt_str(&r.stage),
            ));
        }

        let pool = self.pool.clone();
        self.runtime.block_on(async move {
            let mut conn = pool.acquire().await?;
            let mut copy = conn.copy_in_raw(include_str!("../../sql/copy_events.sql")).await?;
            copy.send(buf.as_bytes()).await?;
            copy.finish().await?;
            Ok::<_, sqlx::Error>(())
        })?;
        Ok(())
    }
}
