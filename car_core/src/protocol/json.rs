//! JSON text as it appears on the wire.
//!
//! Objects use `": "` / `", "` spacing, matching what the console has always
//! received, and `$` inside strings is written as `\u0024` so it can never be
//! confused with the frame separator.

use std::io;

use serde::Serialize;
use serde_json::ser::Formatter;

struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }
}

pub(crate) fn to_wire_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::with_capacity(64);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;
    let text = String::from_utf8(buf).map_err(<serde_json::Error as serde::ser::Error>::custom)?;
    // `$` can only occur inside string literals in JSON text
    if text.contains('$') {
        Ok(text.replace('$', "\\u0024"))
    } else {
        Ok(text)
    }
}
