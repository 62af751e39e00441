// SPDX-License-Identifier: MIT OR Apache-2.0
//! Log Drain (spec.md §4.7 C7).
//!
//! Timestamp extraction is grounded on `tangent`'s
//! `split_timestamp_and_message`: a `once_cell`-cached `regex::Regex`
//! anchored on the container-runtime timestamp shape, splitting each line
//! into `(timestamp, rest)`. Lines that don't match are dropped, matching
//! spec.md §4.7's "lines that don't match are silently dropped".

use chrono::{DateTime, Utc};
use octorunner_core::EventScope;
use octorunner_store::OutputWriter;
use once_cell::sync::Lazy;
use regex::Regex;

static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{9}Z").expect("timestamp regex compiles")
});

/// Scan `line` for the first RFC3339-nanosecond timestamp and split it into
/// `(timestamp, rest)`, dropping everything before the match (the forge or
/// container framing may prepend a few binary bytes) and the single space
/// separating the timestamp from the message body.
#[must_use]
pub fn extract_timestamp(line: &str) -> Option<(DateTime<Utc>, String)> {
    let m = TIMESTAMP_RE.find(line)?;
    let timestamp = DateTime::parse_from_rfc3339(m.as_str())
        .ok()?
        .with_timezone(&Utc);
    let rest = &line[m.end()..];
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    Some((timestamp, rest.to_string()))
}

/// Drain `lines` (one already-decoded log line per item, stdout and stderr
/// interleaved as bollard delivers them) into `writer` until the stream
/// ends or `scope` is cancelled.
///
/// Writer errors are logged and end the drain early; per spec.md §4.7 this
/// never aborts the container itself.
pub async fn drain_logs<S>(mut lines: S, writer: &OutputWriter, scope: &EventScope)
where
    S: futures::Stream<Item = String> + Unpin,
{
    use futures::StreamExt;

    loop {
        let next = scope.race(lines.next()).await;
        let Some(Some(line)) = next else {
            break;
        };

        let Some((timestamp, data)) = extract_timestamp(&line) else {
            continue;
        };

        if let Err(e) = writer.write_line(&data, timestamp).await {
            tracing::warn!(error = %e, job_id = writer.job_id(), "log drain write failed, stopping drain");
            break;
        }
    }
}
