use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use crate::codec::{BlockCodec, BlockMeta};
use crate::column::ColumnDescriptor;
use crate::cursor::{self, RowCursor};
use crate::endian::EndianCodec;
use crate::format::{
    decode_schema, BlockEntry, RowFileHeader, BLOCK_ENTRY_SIZE, FLAG_HAS_CHECKSUM, FOOTER_SIZE,
    HEADER_SIZE, VERSION,
};
use crate::value::Value;

/// Random-access reader for RPAK1 row files.
///
/// # Open sequence
/// 1. Read the 64-byte header (magic, version, codec id, row geometry).
/// 2. Read the schema that follows it into a row layout.
/// 3. Seek to `file_end - 8`, read the `index_offset` u64.
/// 4. Seek to `index_offset`, load the block index into RAM.
///
/// # Access pattern
/// [`read_row`](RowReader::read_row) maps a row number to its block with
/// one division, decodes only that block and slices the row out of it.
pub struct RowReader {
    file: File,
    pub header: RowFileHeader,
    layout: Vec<ColumnDescriptor>,
    entries: Vec<BlockEntry>,
    codec: Arc<dyn BlockCodec>,
    endian: EndianCodec,
}

impl RowReader {
    /// Read only the header of the file at `path`, e.g. to pick a codec.
    pub fn peek_header(path: impl AsRef<Path>) -> anyhow::Result<RowFileHeader> {
        let path = path.as_ref();
        let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut header_buf = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header_buf)
            .context("file is shorter than an RPAK1 header")?;
        RowFileHeader::from_bytes(&header_buf)
    }

    /// Open a row file. `codec` must match the codec id in the header; use
    /// `rowpack_codecs::codec_by_id(RowReader::peek_header(path)?.codec_id)`
    /// when it is not known up front.
    pub fn open(path: impl AsRef<Path>, codec: Arc<dyn BlockCodec>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;

        // ── Read and validate header ────────────────────────────────────────
        let mut header_buf = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header_buf)
            .context("file is shorter than an RPAK1 header")?;
        let header = RowFileHeader::from_bytes(&header_buf)?;

        if header.version != VERSION {
            bail!(
                "unsupported RPAK version {} (only version {} is supported)",
                header.version,
                VERSION
            );
        }
        if header.codec_id != codec.id() {
            bail!(
                "codec mismatch: file uses codec {} but provided codec has id {}",
                header.codec_id,
                codec.id()
            );
        }

        // ── Schema ──────────────────────────────────────────────────────────
        let mut schema = vec![0u8; header.schema_len as usize];
        file.read_exact(&mut schema).context("schema truncated")?;
        let layout = decode_schema(&schema, header.column_count)?;

        // ── Read footer → index offset ──────────────────────────────────────
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer_buf = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer_buf)?;
        let index_offset = u64::from_le_bytes(footer_buf);

        // ── Load block index ────────────────────────────────────────────────
        file.seek(SeekFrom::Start(index_offset))?;
        let mut entries = Vec::with_capacity(header.block_count as usize);
        let mut entry_buf = [0u8; BLOCK_ENTRY_SIZE as usize];
        for _ in 0..header.block_count {
            file.read_exact(&mut entry_buf)
                .context("block index truncated")?;
            entries.push(BlockEntry::from_bytes(&entry_buf)?);
        }

        let endian = EndianCodec::new(header.byte_order);
        if endian.order() != EndianCodec::platform().order() {
            debug!(order = ?header.byte_order, "rows use a foreign byte order");
        }
        debug!(
            path = %path.display(),
            rows = header.row_count,
            blocks = header.block_count,
            codec = codec.name(),
            "row file opened"
        );

        Ok(Self {
            file,
            header,
            layout,
            entries,
            codec,
            endian,
        })
    }

    pub fn layout(&self) -> &[ColumnDescriptor] {
        &self.layout
    }

    #[inline]
    pub fn row_count(&self) -> u64 {
        self.header.row_count
    }

    #[inline]
    pub fn block_count(&self) -> u64 {
        self.header.block_count
    }

    #[inline]
    pub fn row_len(&self) -> usize {
        self.header.row_len as usize
    }

    /// Total uncompressed size of all blocks in bytes.
    pub fn raw_size(&self) -> u64 {
        self.entries.iter().map(|e| e.raw_len as u64).sum()
    }

    /// Total compressed size of all blocks in bytes (excluding index/header).
    pub fn compressed_size(&self) -> u64 {
        self.entries.iter().map(|e| e.compressed_len as u64).sum()
    }

    /// Compression ratio (raw / compressed).
    pub fn ratio(&self) -> f64 {
        let compressed = self.compressed_size();
        if compressed == 0 {
            return 1.0;
        }
        self.raw_size() as f64 / compressed as f64
    }

    pub fn entries(&self) -> &[BlockEntry] {
        &self.entries
    }

    /// Decompress and return the raw rows of block `idx`.
    pub fn read_block(&mut self, idx: u64) -> anyhow::Result<Vec<u8>> {
        let entry = self
            .entries
            .get(idx as usize)
            .ok_or_else(|| {
                anyhow!(
                    "block index {} out of range (total {})",
                    idx,
                    self.header.block_count
                )
            })?
            .clone();

        self.file.seek(SeekFrom::Start(entry.offset))?;

        // [sidecar_len:u16][sidecar][payload]
        let mut len_buf = [0u8; 2];
        self.file.read_exact(&mut len_buf)?;
        let mut sidecar = vec![0u8; u16::from_le_bytes(len_buf) as usize];
        self.file.read_exact(&mut sidecar)?;
        let meta = BlockMeta {
            sidecar,
            row_len: self.header.row_len,
        };

        let mut compressed = vec![0u8; entry.compressed_len as usize];
        self.file.read_exact(&mut compressed)?;

        if self.header.has_flag(FLAG_HAS_CHECKSUM) {
            let computed = xxh3_64(&compressed);
            if computed != entry.checksum {
                bail!(
                    "block {} checksum mismatch: expected {:016x}, got {:016x}",
                    idx,
                    entry.checksum,
                    computed
                );
            }
        }

        let raw = self
            .codec
            .decompress_block(&compressed, entry.raw_len as usize, &meta)
            .with_context(|| format!("decompress block {idx}"))?;
        if raw.len() != entry.raw_len as usize {
            bail!(
                "block {} decompressed to {} bytes but index says {}",
                idx,
                raw.len(),
                entry.raw_len
            );
        }
        Ok(raw)
    }

    /// Decode row `index`, touching only the block that holds it.
    pub fn read_row(&mut self, index: u64) -> anyhow::Result<Vec<Value>> {
        if index >= self.header.row_count {
            bail!(
                "row {} out of range (file has {} rows)",
                index,
                self.header.row_count
            );
        }
        let block = index / self.header.rows_per_block as u64;
        let first_row = self
            .entries
            .get(block as usize)
            .map(|e| e.first_row)
            .with_context(|| format!("no block holds row {index}"))?;
        let raw = self.read_block(block)?;
        let row_len = self.row_len();
        let start = (index - first_row) as usize * row_len;
        let row = raw
            .get(start..start + row_len)
            .with_context(|| format!("block {block} is too short for row {index}"))?;
        let values = cursor::read_from_buffer_with(&self.endian, row, &self.layout)
            .with_context(|| format!("decode row {index}"))?;
        Ok(values)
    }

    /// Decompress every block into one in-memory binary cursor.
    pub fn into_cursor(mut self) -> anyhow::Result<RowCursor> {
        let mut rows = Vec::with_capacity(self.raw_size() as usize);
        for idx in 0..self.block_count() {
            rows.extend_from_slice(&self.read_block(idx)?);
        }
        let row_count = usize::try_from(self.row_count()).context("row count exceeds memory")?;
        let cursor =
            RowCursor::from_binary_rows(rows, self.row_len(), row_count, self.layout, self.endian)?;
        Ok(cursor)
    }
}
