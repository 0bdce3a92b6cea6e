//! Forward scanner of commas, quotes and line ends over a [`ByteSource`].
//!
//! Fields are reported as byte ranges into the source and never copied.
//! `'` and `"` are two independent quote toggles, `\` escapes exactly the
//! next byte, and a comma splits fields only outside both quote kinds.

use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::column::{self, ColumnDescriptor};
use crate::cursor::{RowCursor, RowSource};
use crate::error::{Error, Result};
use crate::evidence::{MagnitudeRank, TypeEvidence};
use crate::source::ByteSource;
use crate::type_codec::TypeCodec;
use crate::utf8;
use crate::value::Value;
use crate::window::CharWindow;

/// Field ranges of one line and the offset where the next line may start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub fields: Vec<Range<i64>>,
    pub end: i64,
}

/// Tokenize the line starting at `start`, scanning no further than `end`
/// (`-1` scans to the end of the source).
///
/// Leading `\r`/`\n` bytes are skipped, so blank lines never produce
/// fields. A quote toggle does not protect a line terminator; only an
/// escape does. When `evidence` is given, every content byte of field `i`
/// is pushed into `evidence[i]`, growing the list as needed.
pub fn parse_line<S: ByteSource + ?Sized>(
    source: &S,
    start: i64,
    end: i64,
    mut evidence: Option<&mut Vec<TypeEvidence>>,
) -> Result<ParsedLine> {
    let size = source.len();
    let end = if end < 0 { size } else { end.min(size) };

    let mut x = start.max(0);
    while x < end && matches!(source.get(x), b'\r' | b'\n') {
        x += 1;
    }
    let line_start = x;

    let mut quote = false;
    let mut double_quote = false;
    let mut escape = false;
    let mut since = x;
    let mut fields = Vec::new();
    let mut terminated = false;

    while x < end {
        let b = source.get(x);
        if escape {
            escape = false;
        } else {
            match b {
                b'"' => double_quote = !double_quote,
                b'\'' => quote = !quote,
                b'\\' => escape = true,
                b',' if !quote && !double_quote => {
                    close_field(&mut fields, evidence.as_deref_mut(), since..x);
                    since = x + 1;
                    x += 1;
                    continue;
                }
                b'\r' | b'\n' => {
                    close_field(&mut fields, evidence.as_deref_mut(), since..x);
                    terminated = true;
                    x += 1;
                    break;
                }
                _ => {}
            }
        }
        if let Some(ev) = evidence.as_deref_mut() {
            column_evidence(ev, fields.len()).push(b as char);
        }
        x += 1;
    }

    if !terminated && (x > line_start || !fields.is_empty()) {
        close_field(&mut fields, evidence.as_deref_mut(), since..x);
    }
    if fields.is_empty() {
        return Err(Error::AssertionViolated(format!(
            "no fields in line starting at byte {start}"
        )));
    }
    Ok(ParsedLine { fields, end: x })
}

fn column_evidence(evidence: &mut Vec<TypeEvidence>, ordinal: usize) -> &mut TypeEvidence {
    if evidence.len() <= ordinal {
        evidence.resize_with(ordinal + 1, TypeEvidence::default);
    }
    &mut evidence[ordinal]
}

fn close_field(
    fields: &mut Vec<Range<i64>>,
    evidence: Option<&mut Vec<TypeEvidence>>,
    range: Range<i64>,
) {
    if let Some(ev) = evidence {
        column_evidence(ev, fields.len()).end_field((range.end - range.start) as usize);
    }
    fields.push(range);
}

/// Decode header fields as trimmed UTF-8, dropping one pair of enclosing
/// double quotes.
pub fn header_names<S: ByteSource + ?Sized>(source: &S, fields: &[Range<i64>]) -> Result<Vec<String>> {
    fields
        .iter()
        .map(|range| {
            let chars = utf8::decode_utf8(&source.copy_range(range.clone()))?;
            let mut window = CharWindow::new(chars);
            window.unquote();
            window.trim();
            Ok(window.as_string())
        })
        .collect()
}

/// Split a whole CSV source into rows of text cells.
///
/// The first line names the columns. Every data line must have as many
/// fields as the header, otherwise the whole scan fails. Cells are `Chars`
/// values whose descriptors carry the field's byte range within its line.
/// With `evidence`, per-column evidence is accumulated over all data lines
/// and each descriptor gets a deduced, positioned child column.
pub fn parse_segments<S>(source: S, evidence: Option<&mut Vec<TypeEvidence>>) -> Result<RowCursor>
where
    S: ByteSource + Send + Sync + 'static,
{
    let bytes: Arc<dyn ByteSource + Send + Sync> = Arc::new(source);
    let segments = scan_segments(bytes, evidence)?;
    Ok(RowCursor::new(Arc::new(segments)))
}

fn scan_segments(
    bytes: Arc<dyn ByteSource + Send + Sync>,
    mut evidence: Option<&mut Vec<TypeEvidence>>,
) -> Result<SegmentSource> {
    let header = parse_line(&*bytes, 0, -1, None)?;
    let names = header_names(&*bytes, &header.fields)?;
    debug!(columns = names.len(), ?names, "csv header");

    // Trailing whitespace after the last line is not a row.
    let mut content_end = bytes.len();
    while content_end > header.end && bytes.get(content_end - 1).is_ascii_whitespace() {
        content_end -= 1;
    }

    let mut lines = Vec::new();
    let mut at = header.end;
    while at < content_end {
        let mut line_evidence = evidence.as_ref().map(|_| Vec::new());
        let parsed = parse_line(&*bytes, at, -1, line_evidence.as_mut())?;
        if parsed.fields.len() != names.len() {
            debug!(row = lines.len(), offset = at, fields = parsed.fields.len(), "bad line");
            return Err(Error::ColumnCountMismatch {
                row: lines.len(),
                offset: at,
                expected: names.len(),
                found: parsed.fields.len(),
            });
        }
        if let (Some(file), Some(line)) = (evidence.as_deref_mut(), line_evidence) {
            TypeEvidence::merge_all(file, &line);
        }
        trace!(row = lines.len(), offset = at, "line");
        lines.push(parsed.fields);
        at = parsed.end;
    }
    debug!(rows = lines.len(), bytes = bytes.len(), "csv scanned");

    let children = match evidence {
        Some(ev) => {
            ev.resize_with(names.len(), TypeEvidence::default);
            Some(deduced_layout(&names, ev)?)
        }
        None => None,
    };

    Ok(SegmentSource {
        bytes,
        names,
        lines,
        children,
    })
}

fn deduced_layout(names: &[String], evidence: &[TypeEvidence]) -> Result<Vec<ColumnDescriptor>> {
    let deduced = names.iter().zip(evidence).map(|(name, ev)| {
        let d = ev.deduce();
        if ev.magnitude == MagnitudeRank::Overflow && d.codec == TypeCodec::String {
            warn!(column = %name, "integers exceed 64 bits, stored as string");
        }
        debug!(column = %name, codec = %d.codec, width = d.width, "deduced");
        (name.clone(), d.codec, d.width as usize)
    });
    column::layout(deduced)
}

/// Reinterpret the text cells of a CSV source through typed columns.
///
/// `columns` supplies the target codecs; without it they are deduced from
/// evidence (collected into `evidence` when given, or a scratch list).
/// Conversion happens lazily per cell and failures name the row, column and
/// byte range of the offending field.
pub fn parse_conformant<S>(
    source: S,
    columns: Option<Vec<ColumnDescriptor>>,
    evidence: Option<&mut Vec<TypeEvidence>>,
) -> Result<RowCursor>
where
    S: ByteSource + Send + Sync + 'static,
{
    let mut scratch = Vec::new();
    let evidence = match evidence {
        Some(ev) => Some(ev),
        None if columns.is_none() => Some(&mut scratch),
        None => None,
    };
    let bytes: Arc<dyn ByteSource + Send + Sync> = Arc::new(source);
    let segments = scan_segments(bytes, evidence)?;

    let targets = match columns {
        Some(cols) => {
            if cols.len() != segments.names.len() {
                return Err(Error::ColumnCountMismatch {
                    row: 0,
                    offset: 0,
                    expected: segments.names.len(),
                    found: cols.len(),
                });
            }
            cols
        }
        None => segments.children.clone().unwrap_or_default(),
    };
    let codecs: Vec<&str> = targets.iter().map(|c| c.codec.name()).collect();
    debug!(?codecs, "conformant columns");
    Ok(RowCursor::new(Arc::new(ConformantSource {
        segments,
        targets,
    })))
}

/// All-string cursor over pre-split lines. The first line is the header;
/// fields split on bare commas with no quoting.
pub fn simple_csv_cursor(lines: &[&str]) -> Result<RowCursor> {
    let Some((header, body)) = lines.split_first() else {
        return RowCursor::from_rows(Vec::new(), Vec::new());
    };
    let columns: Vec<ColumnDescriptor> = header
        .split(',')
        .map(|name| ColumnDescriptor::new(name.trim(), TypeCodec::String))
        .collect();
    let rows = body
        .iter()
        .map(|line| line.split(',').map(Value::from).collect())
        .collect();
    RowCursor::from_rows(columns, rows)
}

struct SegmentSource {
    bytes: Arc<dyn ByteSource + Send + Sync>,
    names: Vec<String>,
    lines: Vec<Vec<Range<i64>>>,
    children: Option<Vec<ColumnDescriptor>>,
}

impl SegmentSource {
    fn chars(&self, row: usize, column: usize) -> Result<CharWindow> {
        let range = self.lines[row][column].clone();
        utf8::decode_utf8(&self.bytes.copy_range(range.clone()))
            .map(CharWindow::new)
            .map_err(|e| self.cell_error(row, column, e))
    }

    fn cell_error(&self, row: usize, column: usize, source: Error) -> Error {
        let range = &self.lines[row][column];
        Error::Cell {
            row,
            column,
            name: self.names[column].clone(),
            begin: range.start,
            end: range.end,
            source: Box::new(source),
        }
    }
}

impl RowSource for SegmentSource {
    fn len(&self) -> usize {
        self.lines.len()
    }

    fn width(&self) -> usize {
        self.names.len()
    }

    fn value(&self, row: usize, column: usize) -> Result<Value> {
        self.chars(row, column).map(Value::Chars)
    }

    fn column(&self, column: usize) -> ColumnDescriptor {
        let desc = ColumnDescriptor::new(self.names[column].clone(), TypeCodec::Chars);
        match self.children.as_ref().and_then(|c| c.get(column)) {
            Some(child) => desc.with_child(child.clone()),
            None => desc,
        }
    }

    /// Byte range of the field relative to the start of its line.
    fn descriptor(&self, row: usize, column: usize) -> ColumnDescriptor {
        let line = &self.lines[row];
        let line_start = line.first().map_or(0, |f| f.start);
        let field = &line[column];
        let mut desc = self.column(column);
        desc.begin = (field.start - line_start) as i32;
        desc.end = (field.end - line_start) as i32;
        desc
    }
}

struct ConformantSource {
    segments: SegmentSource,
    targets: Vec<ColumnDescriptor>,
}

impl RowSource for ConformantSource {
    fn len(&self) -> usize {
        self.segments.len()
    }

    fn width(&self) -> usize {
        self.targets.len()
    }

    fn value(&self, row: usize, column: usize) -> Result<Value> {
        let chars = self.segments.chars(row, column)?;
        self.targets[column]
            .codec
            .parse_text(chars.as_slice())
            .map_err(|e| self.segments.cell_error(row, column, e))
    }

    fn column(&self, column: usize) -> ColumnDescriptor {
        self.targets[column].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(text: &str) -> Vec<String> {
        let line = parse_line(text.as_bytes(), 0, -1, None).unwrap();
        line.fields
            .iter()
            .map(|r| text[r.start as usize..r.end as usize].to_string())
            .collect()
    }

    #[test]
    fn splits_plain_and_quoted() {
        assert_eq!(fields("a,b,c\n"), ["a", "b", "c"]);
        assert_eq!(fields("a,\"b,c\",d\n"), ["a", "\"b,c\"", "d"]);
        assert_eq!(fields("a,'b,c',d"), ["a", "'b,c'", "d"]);
    }

    #[test]
    fn escaped_delimiter_is_literal() {
        assert_eq!(fields("a\\,b,c\n"), ["a\\,b", "c"]);
    }

    #[test]
    fn trailing_comma_yields_empty_field() {
        assert_eq!(fields("a,b,"), ["a", "b", ""]);
    }

    #[test]
    fn blank_input_has_no_fields() {
        assert!(matches!(
            parse_line(b"\r\n".as_slice(), 0, -1, None),
            Err(Error::AssertionViolated(_))
        ));
    }

    #[test]
    fn end_bounds_the_scan() {
        let line = parse_line(b"abc,def".as_slice(), 0, 5, None).unwrap();
        assert_eq!(line.fields, vec![0..3, 4..5]);
        assert_eq!(line.end, 5);
    }
}
