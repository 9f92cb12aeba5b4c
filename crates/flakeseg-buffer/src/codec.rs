//! Compact, versioned persistence format for a [`History`].
//!
//! ```text
//! [version: u8]
//! [verdict count: varint]
//! per verdict:
//!   [commit position delta from previous verdict: varint]
//!   [hour delta from previous verdict, in hours: zig-zag varint]
//!   [flags: u8]           bit0 = simple expected, bit1 = exonerated
//!   unless simple expected:
//!     [run count: varint]
//!     per run:
//!       [(expected << 1) | is_duplicate: varint]
//!       [unexpected: varint]
//! [xxh3-64 of all preceding bytes: u64 little-endian]
//! ```
//!
//! Positions are non-decreasing within a History, so position deltas are
//! never negative. A simple-expected verdict therefore costs three bytes in
//! the common case of small gaps.

use flakeseg_error::{FlakeError, Result};
use flakeseg_types::varint::{put_varint, read_varint, zigzag_decode, zigzag_encode};
use flakeseg_types::{CommitPosition, Hour, PositionVerdict, Run, VerdictDetails};
use tracing::warn;
use xxhash_rust::xxh3::xxh3_64;

use crate::history::History;

/// Format version written by [`encode_history`].
pub const HISTORY_FORMAT_VERSION: u8 = 1;

const FLAG_SIMPLE_EXPECTED: u8 = 0b01;
const FLAG_EXONERATED: u8 = 0b10;
const KNOWN_FLAGS: u8 = FLAG_SIMPLE_EXPECTED | FLAG_EXONERATED;

const CHECKSUM_LEN: usize = 8;
/// Smallest possible encoding of one verdict (delta, hour delta, flags).
const MIN_VERDICT_LEN: usize = 3;

/// Serialize a history.
#[must_use]
pub fn encode_history(history: &History) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + history.len() * 4);
    out.push(HISTORY_FORMAT_VERSION);
    put_varint(&mut out, history.len() as u64);

    let mut prev_position = 0u64;
    let mut prev_hour = 0i64;
    for verdict in history {
        let position = verdict.commit_position.get();
        let hour = verdict.hour.hours_since_epoch();
        put_varint(&mut out, position - prev_position);
        put_varint(&mut out, zigzag_encode(hour.wrapping_sub(prev_hour)));
        prev_position = position;
        prev_hour = hour;

        match &verdict.details {
            None => out.push(FLAG_SIMPLE_EXPECTED),
            Some(details) => {
                out.push(if details.is_exonerated {
                    FLAG_EXONERATED
                } else {
                    0
                });
                put_varint(&mut out, details.runs.len() as u64);
                for run in &details.runs {
                    let packed = (u64::from(run.expected_result_count) << 1)
                        | u64::from(run.is_duplicate);
                    put_varint(&mut out, packed);
                    put_varint(&mut out, u64::from(run.unexpected_result_count));
                }
            }
        }
    }

    let checksum = xxh3_64(&out);
    out.extend_from_slice(&checksum.to_le_bytes());
    out
}

/// Deserialize a history written by [`encode_history`].
pub fn decode_history(bytes: &[u8]) -> Result<History> {
    let Some(&version) = bytes.first() else {
        return Err(FlakeError::corrupt("empty history encoding"));
    };
    if version != HISTORY_FORMAT_VERSION {
        warn!(version, "history encoded with unknown format version");
        return Err(FlakeError::UnsupportedHistoryVersion { version });
    }
    if bytes.len() < 1 + CHECKSUM_LEN {
        return Err(FlakeError::corrupt(format!(
            "history encoding too short: {} bytes",
            bytes.len()
        )));
    }

    let (body, trailer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let mut stored = [0u8; CHECKSUM_LEN];
    stored.copy_from_slice(trailer);
    let stored = u64::from_le_bytes(stored);
    let computed = xxh3_64(body);
    if stored != computed {
        warn!(stored, computed, "history checksum mismatch");
        return Err(FlakeError::HistoryChecksumMismatch { stored, computed });
    }

    let mut reader = Reader { buf: body, pos: 1 };
    let count = reader.varint("verdict count")?;
    let max_plausible = (body.len() - reader.pos) / MIN_VERDICT_LEN;
    let count = usize::try_from(count)
        .ok()
        .filter(|&c| c <= max_plausible)
        .ok_or_else(|| {
            FlakeError::corrupt(format!(
                "verdict count {count} does not fit in {} bytes",
                body.len()
            ))
        })?;

    let mut verdicts = Vec::with_capacity(count);
    let mut prev_position = 0u64;
    let mut prev_hour = 0i64;
    for index in 0..count {
        let delta = reader.varint("position delta")?;
        let position = prev_position.checked_add(delta).ok_or_else(|| {
            FlakeError::corrupt(format!("commit position overflows at verdict {index}"))
        })?;
        let hour = prev_hour.wrapping_add(zigzag_decode(reader.varint("hour delta")?));
        prev_position = position;
        prev_hour = hour;

        let flags = reader.byte("flags")?;
        if flags & !KNOWN_FLAGS != 0 {
            return Err(FlakeError::corrupt(format!(
                "unknown flag bits {flags:#04x} at verdict {index}"
            )));
        }

        let commit_position = CommitPosition::new(position);
        let hour = Hour::from_hours(hour);
        if flags & FLAG_SIMPLE_EXPECTED != 0 {
            if flags & FLAG_EXONERATED != 0 {
                return Err(FlakeError::corrupt(format!(
                    "simple expected verdict {index} is marked exonerated"
                )));
            }
            verdicts.push(PositionVerdict::simple_expected(commit_position, hour));
            continue;
        }

        let run_count = reader.varint("run count")?;
        let run_count = usize::try_from(run_count)
            .ok()
            .filter(|&c| c <= reader.remaining() / 2)
            .ok_or_else(|| {
                FlakeError::corrupt(format!("run count {run_count} at verdict {index}"))
            })?;
        let mut runs = Vec::with_capacity(run_count);
        for _ in 0..run_count {
            let packed = reader.varint("run expected count")?;
            let unexpected = reader.varint("run unexpected count")?;
            runs.push(Run {
                expected_result_count: count_u32(packed >> 1, index)?,
                unexpected_result_count: count_u32(unexpected, index)?,
                is_duplicate: packed & 1 == 1,
            });
        }
        verdicts.push(PositionVerdict::with_details(
            commit_position,
            hour,
            VerdictDetails {
                is_exonerated: flags & FLAG_EXONERATED != 0,
                runs,
            },
        ));
    }

    if reader.remaining() != 0 {
        return Err(FlakeError::corrupt(format!(
            "{} trailing bytes after {count} verdicts",
            reader.remaining()
        )));
    }

    History::from_sorted(verdicts).map_err(|e| FlakeError::corrupt(e.to_string()))
}

fn count_u32(value: u64, index: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        FlakeError::corrupt(format!("result count {value} out of range at verdict {index}"))
    })
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn varint(&mut self, what: &str) -> Result<u64> {
        let (value, consumed) = read_varint(&self.buf[self.pos..]).ok_or_else(|| {
            FlakeError::corrupt(format!("truncated {what} at offset {}", self.pos))
        })?;
        self.pos += consumed;
        Ok(value)
    }

    fn byte(&mut self, what: &str) -> Result<u8> {
        let byte = *self.buf.get(self.pos).ok_or_else(|| {
            FlakeError::corrupt(format!("truncated {what} at offset {}", self.pos))
        })?;
        self.pos += 1;
        Ok(byte)
    }
}
