use anyhow::{Context, Result, anyhow};
use crossbeam_channel::bounded;
use rayon::prelude::*;
use serde_json::Value as Json;
use std::io::BufRead;

use crate::dsl::Predicate;
use crate::sinks::DataSink;
use crate::utils::ProgressCounter;

#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Lines evaluated together on the thread pool.
    pub batch_size: usize,
    /// Log and drop records that fail to parse or evaluate instead of aborting.
    pub skip_errors: bool,
    /// Print a running count to stderr.
    pub progress: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            batch_size: 1024,
            skip_errors: false,
            progress: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub read: u64,
    pub kept: u64,
    pub skipped: u64,
}

/// Decide whether one JSON line is kept. Line numbers start at 1.
pub fn judge_line(predicate: &Predicate<Json>, line_no: u64, line: &str) -> Result<bool> {
    let record: Json = serde_json::from_str(line)
        .with_context(|| format!("Input: Line {} is not valid JSON", line_no))?;
    predicate
        .test(&record)
        .with_context(|| format!("Pipeline: Failed to evaluate line {}", line_no))
}

/// Split off the line terminator and check the line is UTF-8.
fn decode_line(line_no: u64, raw: &[u8]) -> Result<String> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8(raw.to_vec())
        .with_context(|| format!("Input: Line {} is not valid UTF-8", line_no))
}

/// Stream JSON Lines from `input` into `sink`, keeping the records the
/// predicate accepts. Output order matches input order.
pub fn run_filter<I: BufRead>(
    input: I,
    predicate: &Predicate<Json>,
    sink: Box<dyn DataSink>,
    options: &FilterOptions,
) -> Result<FilterStats> {
    let batch_size = options.batch_size.max(1);
    let (tx, rx) = bounded::<Vec<String>>(16);

    let writer = std::thread::spawn(move || -> Result<u64> {
        let mut sink = sink;
        let mut kept = 0u64;
        for batch in rx {
            for line in batch {
                sink.add_record(&line)?;
                kept += 1;
            }
        }
        sink.finish().context("Pipeline: Failed to finalize sink")?;
        Ok(kept)
    });

    let progress = ProgressCounter::new("Filtering records", 10_000, options.progress);
    let mut stats = FilterStats::default();

    let read_result = (|| -> Result<()> {
        let mut input = input;
        let mut buf = Vec::new();
        let mut line_no = 0u64;

        loop {
            let mut batch = Vec::with_capacity(batch_size);
            let mut exhausted = true;
            loop {
                buf.clear();
                let read = input
                    .read_until(b'\n', &mut buf)
                    .with_context(|| format!("Input: Failed reading line {}", line_no + 1))?;
                if read == 0 {
                    break;
                }
                line_no += 1;
                if buf.trim_ascii().is_empty() {
                    continue;
                }
                batch.push((line_no, decode_line(line_no, &buf)));
                if batch.len() == batch_size {
                    exhausted = false;
                    break;
                }
            }

            let verdicts: Vec<Result<bool>> = batch
                .par_iter()
                .map(|(n, line)| match line {
                    Ok(line) => judge_line(predicate, *n, line),
                    Err(err) => Err(anyhow!("{:#}", err)),
                })
                .collect();
            progress.inc(verdicts.len() as u64);

            let mut kept = Vec::new();
            for ((n, line), verdict) in batch.into_iter().zip(verdicts) {
                match (line, verdict) {
                    (Ok(line), Ok(true)) => kept.push(line),
                    (_, Ok(_)) => {}
                    (_, Err(err)) if options.skip_errors => {
                        tracing::warn!("Skipping line {}: {:#}", n, err);
                        stats.skipped += 1;
                    }
                    (_, Err(err)) => return Err(err),
                }
                stats.read += 1;
            }

            if !kept.is_empty() {
                tx.send(kept)
                    .map_err(|err| anyhow!("Pipeline: Failed to send record batch: {}", err))?;
            }

            if exhausted {
                return Ok(());
            }
        }
    })();

    drop(tx);
    progress.finish();

    // The writer holds the root cause if the channel disconnected early
    let kept = match writer.join() {
        Ok(Ok(kept)) => kept,
        Ok(Err(writer_err)) => {
            return if read_result.is_err() {
                Err(writer_err.context("writer thread failed (caused channel disconnect)"))
            } else {
                Err(writer_err)
            };
        }
        Err(panic_payload) => {
            let panic_msg = panic_payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            return Err(anyhow!("Pipeline: Writer thread panicked: {}", panic_msg));
        }
    };

    read_result?;

    stats.kept = kept;
    Ok(stats)
}
