use std::io::{self, Write};

use chrono::{DateTime, Utc};

use crate::entry::{parse_entry, Entry, Format};
use crate::event::Event;
use crate::fields::FieldMap;
use crate::level::Level;
use crate::stream::LineWriter;

/// Writes events to a destination, one JSON object per line.
pub struct Logger<W: Write> {
    output: W,
}

impl<W: Write> Logger<W> {
    pub fn new(output: W) -> Logger<W> {
        Logger { output }
    }

    pub fn log(&mut self, event: &Event) -> io::Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.output.write_all(&line)
    }

    pub fn get_ref(&self) -> &W {
        &self.output
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

/// Opaque caller identifier supplied by adapters (typically a return
/// address), resolved to a source location through the sink's lookup.
pub type CallerId = u64;

/// Injected resolver from caller identifier to source descriptor.
pub type SourceLookup = Box<dyn Fn(CallerId) -> Option<String> + Send + Sync>;

/// One log call as supplied by an adapter. Source severities with no
/// mapping into the named level set arrive as [`Level::None`].
#[derive(Debug, Clone)]
pub struct Record {
    pub level: Level,
    pub time: DateTime<Utc>,
    pub message: String,
    pub fields: FieldMap,
    pub caller: Option<CallerId>,
}

/// The single integration point structured-logger adapters depend on:
/// each log call becomes a [`Record`], each record one encoded event.
pub struct Sink<W: Write> {
    logger: Logger<W>,
    max_field_len: Option<usize>,
    source_lookup: Option<SourceLookup>,
}

impl<W: Write> Sink<W> {
    pub fn new(output: W) -> Sink<W> {
        Sink {
            logger: Logger::new(output),
            max_field_len: None,
            source_lookup: None,
        }
    }

    /// Cap the message and each field at `len` bytes per the event
    /// construction policy.
    pub fn max_field_len(mut self, len: usize) -> Sink<W> {
        self.max_field_len = Some(len);
        self
    }

    /// Resolve caller identifiers to `info.source` strings.
    pub fn source_lookup<F>(mut self, lookup: F) -> Sink<W>
    where
        F: Fn(CallerId) -> Option<String> + Send + Sync + 'static,
    {
        self.source_lookup = Some(Box::new(lookup));
        self
    }

    pub fn emit(&mut self, record: Record) -> io::Result<()> {
        let source = match (&self.source_lookup, record.caller) {
            (Some(lookup), Some(caller)) => lookup(caller),
            _ => None,
        };
        let event = Event::build(
            record.level,
            record.time,
            record.message,
            record.fields,
            self.max_field_len,
            source,
        );
        self.logger.log(&event)
    }

    pub fn get_ref(&self) -> &W {
        self.logger.get_ref()
    }

    pub fn into_inner(self) -> W {
        self.logger.into_inner()
    }
}

/// Receives decoded entries from the text-log pipeline.
pub trait EntryHandler {
    fn handle_entry(&mut self, entry: Entry) -> io::Result<()>;
}

/// Adapter letting a plain closure act as an [`EntryHandler`].
pub struct HandlerFn<F>(pub F);

impl<F> EntryHandler for HandlerFn<F>
where
    F: FnMut(Entry) -> io::Result<()>,
{
    fn handle_entry(&mut self, entry: Entry) -> io::Result<()> {
        (self.0)(entry)
    }
}

/// Decodes each write as one text log line and hands the entry to its
/// handler. Expects complete lines; wrap it in a [`LineWriter`] when the
/// upstream chunks writes arbitrarily.
pub struct EntryWriter<H: EntryHandler> {
    prefix: String,
    format: Format,
    handler: H,
}

impl<H: EntryHandler> EntryWriter<H> {
    pub fn new(prefix: impl Into<String>, format: Format, handler: H) -> EntryWriter<H> {
        EntryWriter {
            prefix: prefix.into(),
            format,
            handler,
        }
    }

    pub fn get_ref(&self) -> &H {
        &self.handler
    }
}

impl<H: EntryHandler> Write for EntryWriter<H> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let line = String::from_utf8_lossy(buf);
        let (entry, parse_err) = parse_entry(&line, &self.prefix, self.format);
        if let Some(error) = parse_err {
            // non-fatal: the best-effort entry is still delivered
            tracing::debug!(%error, "log line parsed with errors");
        }
        self.handler.handle_entry(entry)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Wrap a handler behind line reassembly: the result accepts raw,
/// arbitrarily chunked bytes and delivers one entry per line.
pub fn entry_writer<H: EntryHandler>(
    prefix: impl Into<String>,
    format: Format,
    handler: H,
) -> LineWriter<EntryWriter<H>> {
    LineWriter::new(EntryWriter::new(prefix, format, handler))
}

/// Maps decoded entries to events at a fixed level and logs them.
pub struct EventHandler<W: Write> {
    level: Level,
    logger: Logger<W>,
}

impl<W: Write> EventHandler<W> {
    pub fn new(level: Level, output: W) -> EventHandler<W> {
        EventHandler {
            level,
            logger: Logger::new(output),
        }
    }

    pub fn get_ref(&self) -> &W {
        self.logger.get_ref()
    }
}

impl<W: Write> EntryHandler for EventHandler<W> {
    fn handle_entry(&mut self, entry: Entry) -> io::Result<()> {
        self.logger.log(&make_event(self.level, entry))
    }
}

/// Full text-log path: raw bytes in, one JSON event per line out.
pub fn text_writer<W: Write>(
    level: Level,
    output: W,
    prefix: impl Into<String>,
    format: Format,
) -> LineWriter<EntryWriter<EventHandler<W>>> {
    entry_writer(prefix, format, EventHandler::new(level, output))
}

fn make_event(level: Level, entry: Entry) -> Event {
    let mut fields = FieldMap::new();
    if !entry.prefix.is_empty() {
        fields.insert("prefix", entry.prefix.as_str());
    }

    let source = if entry.file.is_empty() {
        None
    } else {
        Some(format!("{}:{}", entry.file, entry.line))
    };

    Event::build(
        level,
        entry.time.unwrap_or_default(),
        entry.message,
        fields,
        None,
        source,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Value;

    use crate::fields::FieldValue;

    fn time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 7, 7, 12, 6, 25).unwrap()
    }

    fn output_lines(buf: &[u8]) -> Vec<Value> {
        String::from_utf8(buf.to_vec())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_logger_writes_one_line_per_event() {
        let mut logger = Logger::new(Vec::new());
        logger
            .log(&Event::build(
                Level::Info,
                time(),
                "one",
                FieldMap::new(),
                None,
                None,
            ))
            .unwrap();
        logger
            .log(&Event::build(
                Level::Warn,
                time(),
                "two",
                FieldMap::new(),
                None,
                None,
            ))
            .unwrap();

        let out = logger.into_inner();
        assert_eq!(out.iter().filter(|&&b| b == b'\n').count(), 2);
        let lines = output_lines(&out);
        assert_eq!(lines[0]["message"], "one");
        assert_eq!(lines[1]["level"], "WARN");
    }

    #[test]
    fn test_sink_emit_with_source_lookup() {
        let mut sink = Sink::new(Vec::new()).source_lookup(|caller| {
            (caller == 42).then(|| "pkg.Func (file.go:10)".to_string())
        });

        let mut fields = FieldMap::new();
        fields.insert("cause", FieldValue::error("EOF"));
        sink.emit(Record {
            level: Level::Error,
            time: time(),
            message: "boom".to_string(),
            fields,
            caller: Some(42),
        })
        .unwrap();

        let lines = output_lines(sink.get_ref());
        assert_eq!(lines[0]["info"]["source"], "pkg.Func (file.go:10)");
        assert_eq!(lines[0]["info"]["errors"][0]["error"], "EOF");
    }

    #[test]
    fn test_sink_emit_unset_level() {
        let mut sink = Sink::new(Vec::new());
        sink.emit(Record {
            level: Level::None,
            time: time(),
            message: "unmapped severity".to_string(),
            fields: FieldMap::new(),
            caller: None,
        })
        .unwrap();

        let lines = output_lines(sink.get_ref());
        assert_eq!(lines[0]["level"], "NONE");
    }

    #[test]
    fn test_sink_max_field_len() {
        let mut sink = Sink::new(Vec::new()).max_field_len(10);

        let mut fields = FieldMap::new();
        fields.insert("s", "01234567890123456789");
        sink.emit(Record {
            level: Level::Info,
            time: time(),
            message: "abcdefghijklmnopqrstuvwxyz".to_string(),
            fields,
            caller: None,
        })
        .unwrap();

        let lines = output_lines(sink.get_ref());
        assert_eq!(lines[0]["message"], "abcdefghij");
        assert_eq!(lines[0]["data"]["s"], "0123456789");
    }

    #[test]
    fn test_entry_writer_collects_entries() {
        let mut entries = Vec::new();
        {
            let mut w = entry_writer(
                "[12345] ",
                Format {
                    short_file: true,
                    utc: true,
                    ..Format::STD
                },
                HandlerFn(|entry: Entry| -> io::Result<()> {
                    entries.push(entry);
                    Ok(())
                }),
            );

            let content = "\
[12345] 2016/07/07 12:06:25 logger_test.go:21: Hello World!
[12345] 2016/07/07 12:06:26 logger_test.go:42: How are you?
";
            let n = w.write(content.as_bytes()).unwrap();
            assert_eq!(n, content.len());
        }

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "Hello World!");
        assert_eq!(entries[0].file, "logger_test.go");
        assert_eq!(entries[0].line, 21);
        assert_eq!(
            entries[0].time,
            Some(Utc.with_ymd_and_hms(2016, 7, 7, 12, 6, 25).unwrap()),
        );
        assert_eq!(entries[1].line, 42);
        assert_eq!(entries[1].message, "How are you?");
    }

    #[test]
    fn test_text_writer_end_to_end() {
        let mut w = text_writer(
            Level::Info,
            Vec::new(),
            "[p] ",
            Format {
                short_file: true,
                utc: true,
                ..Format::STD
            },
        );

        w.write(b"[p] 2016/07/07 12:06:25 file.go:88: Hello ").unwrap();
        w.write(b"World!\n").unwrap();

        let lines = output_lines(w.get_ref().get_ref().get_ref());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "INFO");
        assert_eq!(lines[0]["time"], "2016-07-07T12:06:25Z");
        assert_eq!(lines[0]["info"]["source"], "file.go:88");
        assert_eq!(lines[0]["data"]["prefix"], "[p] ");
        assert_eq!(lines[0]["message"], "Hello World!");
    }

    #[test]
    fn test_text_writer_best_effort_on_bad_timestamp() {
        let mut w = text_writer(Level::Info, Vec::new(), "", Format::STD);

        // far too short for the expected timestamp layout, still emitted
        w.write(b"oops\n").unwrap();

        let lines = output_lines(w.get_ref().get_ref().get_ref());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["time"], "1970-01-01T00:00:00Z");
    }
}
