use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{bail, Context};
use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

use crate::codec::{BlockCodec, BlockMeta};
use crate::column::{self, ColumnDescriptor};
use crate::cursor::{self, RowCursor};
use crate::endian::EndianCodec;
use crate::format::{
    encode_schema, BlockEntry, RowFileHeader, BLOCK_ENTRY_SIZE, FLAG_HAS_CHECKSUM, HEADER_SIZE,
    VERSION,
};
use crate::value::Value;

/// Streaming writer for RPAK1 row files.
///
/// # Write contract
/// Call [`write_row`](RowWriter::write_row) or
/// [`write_cursor`](RowWriter::write_cursor) any number of times. Rows are
/// encoded into the fixed layout and buffered; every `rows_per_block` rows
/// become one independently compressed block. Call
/// [`finish`](RowWriter::finish) to flush the last partial block, append the
/// block index and footer, and write back the final header.
///
/// # Format layout written
/// ```text
/// [HEADER: 64 bytes placeholder]
/// [SCHEMA: schema_len bytes]
/// [BLOCK 0] [BLOCK 1] ... [BLOCK N-1]      ← [sidecar_len:u16][sidecar][payload]
/// [BLOCK INDEX: 32 bytes × N]
/// [FOOTER: 8 bytes, u64 LE offset of block index]
/// ← seek back to 0, overwrite header with real values
/// ```
pub struct RowWriter {
    file: BufWriter<File>,
    codec: Box<dyn BlockCodec>,
    layout: Vec<ColumnDescriptor>,
    row_len: usize,
    rows_per_block: u32,
    schema_len: u32,
    endian: EndianCodec,
    /// Encoded rows not yet flushed into a block.
    pending: Vec<u8>,
    pending_rows: u32,
    /// Scratch buffer for one row.
    row_buf: Vec<u8>,
    entries: Vec<BlockEntry>,
    rows_written: u64,
    /// Current write position in the file (mirrors the file cursor).
    current_offset: u64,
}

impl RowWriter {
    /// Create a new row file at `path`, overwriting any existing file.
    ///
    /// Every column of `layout` must be positioned. Use
    /// [`DEFAULT_ROWS_PER_BLOCK`](crate::format::DEFAULT_ROWS_PER_BLOCK) if
    /// unsure about the block size.
    pub fn create(
        path: impl AsRef<Path>,
        layout: Vec<ColumnDescriptor>,
        codec: Box<dyn BlockCodec>,
        rows_per_block: u32,
    ) -> anyhow::Result<Self> {
        if rows_per_block == 0 {
            bail!("rows_per_block must be at least 1");
        }
        if layout.len() > u16::MAX as usize {
            bail!("{} columns exceed the format limit of {}", layout.len(), u16::MAX);
        }
        for col in &layout {
            col.validate()?;
            if !col.is_positioned() {
                bail!("column {:?} has no binary position", col.name);
            }
        }
        let row_len = column::row_len(&layout);
        u32::try_from(row_len).context("row layout is too wide")?;

        let path = path.as_ref();
        let schema = encode_schema(&layout)?;
        let schema_len = u32::try_from(schema.len()).context("schema is too large")?;

        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let mut file = BufWriter::new(file);
        // Placeholder header, overwritten in finish()
        file.write_all(&[0u8; HEADER_SIZE as usize])?;
        file.write_all(&schema)?;

        debug!(
            path = %path.display(),
            columns = layout.len(),
            row_len,
            codec = codec.name(),
            "row file created"
        );
        Ok(Self {
            file,
            codec,
            layout,
            row_len,
            rows_per_block,
            schema_len,
            endian: *EndianCodec::platform(),
            pending: Vec::with_capacity(row_len * rows_per_block as usize),
            pending_rows: 0,
            row_buf: vec![0u8; row_len],
            entries: Vec::new(),
            rows_written: 0,
            current_offset: HEADER_SIZE + schema.len() as u64,
        })
    }

    pub fn layout(&self) -> &[ColumnDescriptor] {
        &self.layout
    }

    /// Encode one row and flush a block when it fills up.
    pub fn write_row(&mut self, values: &[Value]) -> anyhow::Result<()> {
        self.row_buf.fill(0);
        cursor::write_to_buffer_with(&self.endian, values, &mut self.row_buf, &self.layout)
            .with_context(|| format!("encode row {}", self.rows_written))?;
        self.pending.extend_from_slice(&self.row_buf);
        self.pending_rows += 1;
        self.rows_written += 1;
        if self.pending_rows == self.rows_per_block {
            self.flush_block()?;
        }
        Ok(())
    }

    /// Write every row of `rows`. Its columns are matched to the layout by
    /// position and converted to the layout's codecs.
    pub fn write_cursor(&mut self, rows: &RowCursor) -> anyhow::Result<u64> {
        if rows.width() != self.layout.len() {
            bail!(
                "cursor has {} columns but the layout has {}",
                rows.width(),
                self.layout.len()
            );
        }
        let mut written = 0;
        for row in rows.rows() {
            self.write_row(&row.values()?)?;
            written += 1;
        }
        Ok(written)
    }

    /// Compress the pending rows as a single block and write it out.
    fn flush_block(&mut self) -> anyhow::Result<()> {
        if self.pending_rows == 0 {
            return Ok(());
        }
        let raw = std::mem::take(&mut self.pending);
        let mut meta = BlockMeta::for_rows(self.row_len as u32);
        let compressed = self.codec.compress_block(&raw, &mut meta)?;
        let checksum = xxh3_64(&compressed);

        let sidecar_len = u16::try_from(meta.sidecar.len()).context("block sidecar is too large")?;
        let block_offset = self.current_offset;
        self.file.write_all(&sidecar_len.to_le_bytes())?;
        self.file.write_all(&meta.sidecar)?;
        self.file.write_all(&compressed)?;
        self.current_offset += 2 + meta.sidecar.len() as u64 + compressed.len() as u64;

        let first_row = self.rows_written - self.pending_rows as u64;
        self.entries.push(BlockEntry {
            offset: block_offset,
            first_row,
            compressed_len: u32::try_from(compressed.len()).context("compressed block too large")?,
            raw_len: u32::try_from(raw.len()).context("block too large")?,
            checksum,
        });
        debug!(
            block = self.entries.len() - 1,
            first_row,
            raw = raw.len(),
            compressed = compressed.len(),
            "block flushed"
        );

        self.pending = raw;
        self.pending.clear();
        self.pending_rows = 0;
        Ok(())
    }

    /// Flush remaining rows, write the block index and footer, and seal the
    /// file by writing the final header.
    ///
    /// Returns the number of rows written.
    pub fn finish(mut self) -> anyhow::Result<u64> {
        self.flush_block()?;

        // ── Block index ────────────────────────────────────────────────────
        let index_offset = self.current_offset;
        for entry in &self.entries {
            self.file.write_all(&entry.to_bytes())?;
        }
        self.current_offset += self.entries.len() as u64 * BLOCK_ENTRY_SIZE;

        // ── Footer: 8-byte u64 LE offset of block index start ──────────────
        self.file.write_all(&index_offset.to_le_bytes())?;

        // ── Seek back to 0 and write the real header ────────────────────────
        let header = RowFileHeader {
            version: VERSION,
            codec_id: self.codec.id(),
            byte_order: self.endian.order(),
            row_len: self.row_len as u32,
            rows_per_block: self.rows_per_block,
            block_count: self.entries.len() as u64,
            row_count: self.rows_written,
            flags: FLAG_HAS_CHECKSUM,
            schema_len: self.schema_len,
            column_count: self.layout.len() as u16,
        };
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header.to_bytes())?;
        self.file.flush()?;

        info!(
            rows = self.rows_written,
            blocks = header.block_count,
            "row file finished"
        );
        Ok(self.rows_written)
    }
}
