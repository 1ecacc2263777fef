// Structured log normalization: heterogeneous log output in, one JSON
// event per line out.

// Core data model
pub mod level;
pub mod fields;
pub mod event;

// Text-log decoding path
pub mod entry;
pub mod stream;

// Output
pub mod sink;

// Re-export commonly used types
pub use entry::{parse_entry, Entry, Format, ParseError};
pub use event::{Event, EventError, EventInfo};
pub use fields::{FieldMap, FieldValue};
pub use level::{Level, ParseLevelError};
pub use sink::{
    entry_writer, text_writer, CallerId, EntryHandler, EntryWriter, EventHandler, HandlerFn,
    Logger, Record, Sink, SourceLookup,
};
pub use stream::LineWriter;

/// Level applied when a caller does not pick one explicitly.
pub const DEFAULT_LEVEL: Level = Level::Info;
