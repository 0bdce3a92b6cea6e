//! Row-addressable views joining cell values to their column metadata.

use std::ops::Range;
use std::sync::Arc;

use crate::column::{self, ColumnDescriptor};
use crate::endian::EndianCodec;
use crate::error::{Error, Result};
use crate::type_codec::TypeCodec;
use crate::value::Value;

/// Anything that can answer "value and descriptor of cell (row, column)".
///
/// Implementations are pure functions of their indices: calling any method
/// twice with the same arguments returns the same result. Callers keep
/// `row < len()` and `column < width()`; [`RowCursor`] checks this before
/// delegating.
pub trait RowSource: Send + Sync {
    fn len(&self) -> usize;

    fn width(&self) -> usize;

    fn value(&self, row: usize, column: usize) -> Result<Value>;

    /// Schema-level descriptor of `column`.
    fn column(&self, column: usize) -> ColumnDescriptor;

    /// Descriptor of one cell. Sources whose cells carry their own byte
    /// ranges (CSV segments) override this.
    fn descriptor(&self, _row: usize, column: usize) -> ColumnDescriptor {
        self.column(column)
    }
}

/// A sequence of rows over a shared [`RowSource`], seen through a column
/// mapping. Projections only rebuild the mapping; no cell is copied.
#[derive(Clone)]
pub struct RowCursor {
    source: Arc<dyn RowSource>,
    columns: Arc<[usize]>,
}

impl std::fmt::Debug for RowCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowCursor")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

impl RowCursor {
    pub fn new(source: Arc<dyn RowSource>) -> Self {
        let columns = (0..source.width()).collect();
        Self { source, columns }
    }

    /// In-memory rows checked against `columns`.
    pub fn from_rows(columns: Vec<ColumnDescriptor>, rows: Vec<Vec<Value>>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(Error::ColumnCountMismatch {
                    row: i,
                    offset: -1,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self::new(Arc::new(MemorySource { columns, rows })))
    }

    /// Fixed-layout binary records in the platform byte order.
    pub fn from_binary(
        bytes: impl Into<Arc<[u8]>>,
        row_len: usize,
        layout: Vec<ColumnDescriptor>,
    ) -> Result<Self> {
        Self::from_binary_with(bytes, row_len, layout, *EndianCodec::platform())
    }

    /// Row count is inferred from `bytes.len() / row_len`; zero-width rows
    /// carry no count of their own, use
    /// [`from_binary_rows`](RowCursor::from_binary_rows) for those.
    pub fn from_binary_with(
        bytes: impl Into<Arc<[u8]>>,
        row_len: usize,
        layout: Vec<ColumnDescriptor>,
        endian: EndianCodec,
    ) -> Result<Self> {
        let bytes = bytes.into();
        let rows = if row_len == 0 { 0 } else { bytes.len() / row_len };
        if rows * row_len != bytes.len() {
            return Err(Error::ShortBuffer {
                codec: "row",
                expected: (rows + 1) * row_len,
                found: bytes.len(),
            });
        }
        Self::from_binary_rows(bytes, row_len, rows, layout, endian)
    }

    /// Exactly `rows` records of `row_len` bytes.
    pub fn from_binary_rows(
        bytes: impl Into<Arc<[u8]>>,
        row_len: usize,
        rows: usize,
        layout: Vec<ColumnDescriptor>,
        endian: EndianCodec,
    ) -> Result<Self> {
        let bytes = bytes.into();
        for desc in &layout {
            desc.validate()?;
            let range = desc
                .range()
                .ok_or_else(|| Error::Unpositioned(desc.name.clone()))?;
            if range.end > row_len {
                return Err(Error::InvalidDescriptor {
                    name: desc.name.clone(),
                    reason: format!("slot {range:?} exceeds row length {row_len}"),
                });
            }
        }
        let expected = rows.checked_mul(row_len).unwrap_or(usize::MAX);
        if expected != bytes.len() {
            return Err(Error::ShortBuffer {
                codec: "row",
                expected,
                found: bytes.len(),
            });
        }
        Ok(Self::new(Arc::new(BinarySource {
            bytes,
            row_len,
            rows,
            layout,
            endian,
        })))
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of visible columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn row(&self, index: usize) -> Result<Row<'_>> {
        if index >= self.len() {
            return Err(Error::RowIndex {
                index,
                rows: self.len(),
            });
        }
        Ok(Row {
            cursor: self,
            index,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        (0..self.len()).map(move |index| Row {
            cursor: self,
            index,
        })
    }

    pub fn value(&self, row: usize, column: usize) -> Result<Value> {
        self.row(row)?.value(column)
    }

    fn source_column(&self, column: usize) -> Result<usize> {
        self.columns.get(column).copied().ok_or(Error::ColumnIndex {
            index: column,
            width: self.width(),
        })
    }

    /// Schema of the visible columns.
    pub fn meta(&self) -> Vec<ColumnDescriptor> {
        self.columns.iter().map(|&c| self.source.column(c)).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|&c| self.source.column(c).name)
            .collect()
    }

    /// Resolve names to visible column indices, case-sensitively.
    pub fn column_indices(&self, names: &[&str]) -> Result<Vec<usize>> {
        let meta = self.meta();
        names
            .iter()
            .map(|name| {
                column::index_of(&meta, name).ok_or_else(|| Error::UnknownColumn(name.to_string()))
            })
            .collect()
    }

    /// True when every visible column ends up in a numeric codec.
    pub fn is_numerical(&self) -> bool {
        self.meta().iter().all(|c| c.effective_codec().is_numeric())
    }

    /// True when every visible column ends up in the same codec.
    pub fn is_homogeneous(&self) -> bool {
        let meta = self.meta();
        meta.windows(2)
            .all(|w| w[0].effective_codec() == w[1].effective_codec())
    }

    pub fn select_range(&self, range: Range<usize>) -> Result<Self> {
        let indices: Vec<usize> = range.collect();
        self.select(&indices)
    }

    /// Keep `indices`, in the given order.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        let columns = indices
            .iter()
            .map(|&i| self.source_column(i))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.remap(columns))
    }

    pub fn select_names(&self, names: &[&str]) -> Result<Self> {
        let indices = self.column_indices(names)?;
        self.select(&indices)
    }

    /// Drop `indices`; out-of-range indices are ignored.
    pub fn exclude(&self, indices: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| !indices.contains(i))
            .map(|(_, &c)| c)
            .collect();
        self.remap(columns)
    }

    pub fn exclude_names(&self, names: &[&str]) -> Result<Self> {
        let indices = self.column_indices(names)?;
        Ok(self.exclude(&indices))
    }

    fn remap(&self, columns: Vec<usize>) -> Self {
        Self {
            source: Arc::clone(&self.source),
            columns: columns.into(),
        }
    }
}

/// One row of a [`RowCursor`].
#[derive(Clone, Copy)]
pub struct Row<'a> {
    cursor: &'a RowCursor,
    index: usize,
}

impl Row<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.cursor.width()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn value(&self, column: usize) -> Result<Value> {
        let c = self.cursor.source_column(column)?;
        self.cursor.source.value(self.index, c)
    }

    pub fn descriptor(&self, column: usize) -> Result<ColumnDescriptor> {
        let c = self.cursor.source_column(column)?;
        Ok(self.cursor.source.descriptor(self.index, c))
    }

    /// Value of the column called `name`.
    pub fn get(&self, name: &str) -> Result<Value> {
        let index = self.cursor.column_indices(&[name])?[0];
        self.value(index)
    }

    pub fn values(&self) -> Result<Vec<Value>> {
        (0..self.len()).map(|c| self.value(c)).collect()
    }

    /// Encode this row into `buf` following `layout`.
    pub fn write_to(&self, buf: &mut [u8], layout: &[ColumnDescriptor]) -> Result<()> {
        let values = self.values()?;
        write_to_buffer(&values, buf, layout)
    }
}

/// Write `values` into `buf` at each descriptor's slot, in the platform byte
/// order. See [`write_to_buffer_with`].
pub fn write_to_buffer(values: &[Value], buf: &mut [u8], layout: &[ColumnDescriptor]) -> Result<()> {
    write_to_buffer_with(EndianCodec::platform(), values, buf, layout)
}

/// Values whose codec differs from the slot's are converted first and
/// `Nothing` zero-fills its slot. Variable-width values shorter than their slot get one zero byte after
/// them; nothing is ever truncated.
pub fn write_to_buffer_with(
    endian: &EndianCodec,
    values: &[Value],
    buf: &mut [u8],
    layout: &[ColumnDescriptor],
) -> Result<()> {
    if values.len() != layout.len() {
        return Err(Error::ColumnCountMismatch {
            row: 0,
            offset: -1,
            expected: layout.len(),
            found: values.len(),
        });
    }
    let needed = column::row_len(layout);
    if buf.len() < needed {
        return Err(Error::ShortBuffer {
            codec: "row",
            expected: needed,
            found: buf.len(),
        });
    }
    for (value, desc) in values.iter().zip(layout) {
        let range = desc
            .range()
            .ok_or_else(|| Error::Unpositioned(desc.name.clone()))?;
        if matches!(value, Value::Nothing) {
            buf[range].fill(0);
            continue;
        }
        let encoded = if value.codec() == desc.codec {
            desc.codec.encode_with(endian, value)?
        } else {
            desc.codec
                .encode_with(endian, &TypeCodec::convert(value, desc.codec)?)?
        };
        let slot = range.len();
        if encoded.len() > slot {
            return Err(Error::SlotOverflow {
                name: desc.name.clone(),
                needed: encoded.len(),
                slot,
            });
        }
        buf[range.start..range.start + encoded.len()].copy_from_slice(&encoded);
        if desc.codec.network_size().is_none() && encoded.len() < slot {
            buf[range.start + encoded.len()] = 0;
        }
    }
    Ok(())
}

pub fn read_from_buffer(buf: &[u8], layout: &[ColumnDescriptor]) -> Result<Vec<Value>> {
    read_from_buffer_with(EndianCodec::platform(), buf, layout)
}

/// Inverse of [`write_to_buffer_with`]: fixed-width slots decode exactly
/// their bytes, variable-width slots decode up to the first zero byte.
pub fn read_from_buffer_with(
    endian: &EndianCodec,
    buf: &[u8],
    layout: &[ColumnDescriptor],
) -> Result<Vec<Value>> {
    layout
        .iter()
        .map(|desc| read_slot(endian, buf, desc))
        .collect()
}

fn read_slot(endian: &EndianCodec, buf: &[u8], desc: &ColumnDescriptor) -> Result<Value> {
    let range = desc
        .range()
        .ok_or_else(|| Error::Unpositioned(desc.name.clone()))?;
    let slot = buf.get(range.clone()).ok_or(Error::ShortBuffer {
        codec: "row",
        expected: range.end,
        found: buf.len(),
    })?;
    let bytes = match desc.codec.network_size() {
        Some(_) => slot,
        None => {
            let len = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
            &slot[..len]
        }
    };
    desc.codec.decode_with(endian, bytes)
}

struct MemorySource {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Vec<Value>>,
}

impl RowSource for MemorySource {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn width(&self) -> usize {
        self.columns.len()
    }

    fn value(&self, row: usize, column: usize) -> Result<Value> {
        Ok(self.rows[row][column].clone())
    }

    fn column(&self, column: usize) -> ColumnDescriptor {
        self.columns[column].clone()
    }
}

struct BinarySource {
    bytes: Arc<[u8]>,
    row_len: usize,
    rows: usize,
    layout: Vec<ColumnDescriptor>,
    endian: EndianCodec,
}

impl RowSource for BinarySource {
    fn len(&self) -> usize {
        self.rows
    }

    fn width(&self) -> usize {
        self.layout.len()
    }

    fn value(&self, row: usize, column: usize) -> Result<Value> {
        let start = row * self.row_len;
        let buf = &self.bytes[start..start + self.row_len];
        let desc = &self.layout[column];
        read_slot(&self.endian, buf, desc).map_err(|e| Error::Cell {
            row,
            column,
            name: desc.name.clone(),
            begin: (start as i64) + desc.begin as i64,
            end: (start as i64) + desc.end as i64,
            source: Box::new(e),
        })
    }

    fn column(&self, column: usize) -> ColumnDescriptor {
        self.layout[column].clone()
    }
}
