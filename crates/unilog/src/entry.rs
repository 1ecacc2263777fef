use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use thiserror::Error;

/// Selects which segments a text logging convention writes before the
/// message: a `YYYY/MM/DD ` date, an `HH:MM:SS` time (widened to
/// `HH:MM:SS.ffffff` by `microseconds`, which implies the time segment),
/// UTC vs local civil time, and a `file:line:` location in short or long
/// form. Supplied by the caller, never discovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Format {
    pub date: bool,
    pub time: bool,
    pub microseconds: bool,
    pub utc: bool,
    pub short_file: bool,
    pub long_file: bool,
}

impl Format {
    /// Date and time, the conventional default.
    pub const STD: Format = Format {
        date: true,
        time: true,
        microseconds: false,
        utc: false,
        short_file: false,
        long_file: false,
    };
}

/// A record decoded from one text log line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    /// The expected line prefix, stored verbatim as supplied.
    pub prefix: String,
    pub message: String,
    pub file: String,
    pub line: u32,
    /// Absent when the format declares no timestamp segments.
    pub time: Option<DateTime<Utc>>,
}

/// Non-fatal decoding failures; the entry they accompany is still
/// populated on a best-effort basis.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing prefix in log line: {0:?}")]
    MissingPrefix(String),

    #[error("bad timestamp {0:?}: {1}")]
    BadTimestamp(String, String),

    #[error("bad line number {0:?}")]
    BadLineNumber(String),
}

/// Decode one line produced under the given prefix and format flags.
///
/// Always returns a best-effort entry; the first decoding failure, if
/// any, is reported alongside it and never stops extraction of the
/// remaining segments.
pub fn parse_entry(line: &str, prefix: &str, format: Format) -> (Entry, Option<ParseError>) {
    let mut err = None;
    let mut entry = Entry {
        prefix: prefix.to_string(),
        ..Entry::default()
    };

    let mut s = match line.strip_prefix(prefix) {
        Some(rest) => rest,
        None => {
            err = Some(ParseError::MissingPrefix(prefix.to_string()));
            line.get(prefix.len()..).unwrap_or("")
        }
    };

    if let Some(width) = time_width(format) {
        let end = floor_char_boundary(s, width.min(s.len()));
        let (ts, rest) = s.split_at(end);
        s = rest;
        match parse_timestamp(ts, format) {
            Ok(time) => entry.time = Some(time),
            Err(e) => err = err.or(Some(e)),
        }
    }

    if format.short_file || format.long_file {
        s = skip(s, ' ');
        let (file, rest) = split(s, ':');
        let (line_token, rest) = split(rest, ':');
        s = rest;
        entry.file = file.to_string();
        match line_token.parse() {
            Ok(n) => entry.line = n,
            Err(_) => err = err.or(Some(ParseError::BadLineNumber(line_token.to_string()))),
        }
    }

    let message = skip(s, ' ');
    entry.message = message.strip_suffix('\n').unwrap_or(message).to_string();

    (entry, err)
}

/// Width in characters of the timestamp segment the flags imply, or
/// `None` when no timestamp is expected. The date segment is followed by
/// one space unless it stands alone.
fn time_width(format: Format) -> Option<usize> {
    let mut width = 0;
    if format.date {
        width += 11; // "YYYY/MM/DD "
    }
    if format.microseconds {
        width += 15; // "HH:MM:SS.ffffff"
    } else if format.time {
        width += 8; // "HH:MM:SS"
    } else if width != 0 {
        width -= 1; // date only: no trailing space
    }
    if width == 0 {
        None
    } else {
        Some(width)
    }
}

fn parse_timestamp(ts: &str, format: Format) -> Result<DateTime<Utc>, ParseError> {
    let with_time = format.time || format.microseconds;

    let naive = if format.date && with_time {
        let fmt = if format.microseconds {
            "%Y/%m/%d %H:%M:%S%.f"
        } else {
            "%Y/%m/%d %H:%M:%S"
        };
        NaiveDateTime::parse_from_str(ts, fmt)
    } else if format.date {
        NaiveDate::parse_from_str(ts, "%Y/%m/%d").map(|d| d.and_time(NaiveTime::MIN))
    } else {
        let fmt = if format.microseconds {
            "%H:%M:%S%.f"
        } else {
            "%H:%M:%S"
        };
        // no date segment: attach the default date
        NaiveTime::parse_from_str(ts, fmt).map(|t| NaiveDate::default().and_time(t))
    }
    .map_err(|e| ParseError::BadTimestamp(ts.to_string(), e.to_string()))?;

    if format.utc {
        Ok(naive.and_utc())
    } else {
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
            .ok_or_else(|| {
                ParseError::BadTimestamp(ts.to_string(), "nonexistent local time".to_string())
            })
    }
}

fn skip(s: &str, c: char) -> &str {
    s.strip_prefix(c).unwrap_or(s)
}

fn split(s: &str, c: char) -> (&str, &str) {
    match s.split_once(c) {
        Some(pair) => pair,
        None => (s, ""),
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
