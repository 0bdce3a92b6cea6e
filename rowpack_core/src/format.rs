use anyhow::{bail, Context};

use crate::column::ColumnDescriptor;
use crate::endian::ByteOrder;
use crate::type_codec::TypeCodec;

/// Magic bytes for RPAK version 1 files: "RPAK1\n" padded to 14 bytes.
pub const MAGIC: &[u8; 14] = b"RPAK1\n\x00\x00\x00\x00\x00\x00\x00\x00";

pub const VERSION: u16 = 1;

/// Fixed size of the RPAK1 header in bytes.
///   magic[14] + version:u16 + codec_id:u16 + byte_order:u8 + pad:u8
///   + row_len:u32 + rows_per_block:u32 + block_count:u64 + row_count:u64
///   + flags:u64 + schema_len:u32 + column_count:u16 + reserved[6]
///   = 14 + 2 + 2 + 1 + 1 + 4 + 4 + 8 + 8 + 8 + 4 + 2 + 6 = 64
pub const HEADER_SIZE: u64 = 64;

/// Size of each BlockEntry in the block index, in bytes.
///   offset:u64 + first_row:u64 + compressed_len:u32 + raw_len:u32
///   + checksum:u64 = 32
pub const BLOCK_ENTRY_SIZE: u64 = 32;

/// Size of the index footer (single u64 offset) in bytes.
pub const FOOTER_SIZE: u64 = 8;

pub const DEFAULT_ROWS_PER_BLOCK: u32 = 4096;

// ── Flags ──────────────────────────────────────────────────────────────────

/// Each block carries an xxhash3-64 checksum of its payload.
pub const FLAG_HAS_CHECKSUM: u64 = 1 << 0;

// ── Codec IDs ──────────────────────────────────────────────────────────────

pub const CODEC_PASSTHROUGH: u16 = 0;
pub const CODEC_ZSTD: u16 = 1;
pub const CODEC_LZ4: u16 = 2;
pub const CODEC_SHUFFLE_ZSTD: u16 = 3;

// ── Header ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFileHeader {
    pub version: u16,
    pub codec_id: u16,
    /// Byte order of the fixed-width values inside rows.
    pub byte_order: ByteOrder,
    pub row_len: u32,
    pub rows_per_block: u32,
    pub block_count: u64,
    pub row_count: u64,
    pub flags: u64,
    /// Bytes of schema that follow the header.
    pub schema_len: u32,
    pub column_count: u16,
}

impl RowFileHeader {
    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[..14].copy_from_slice(MAGIC);
        buf[14..16].copy_from_slice(&self.version.to_le_bytes());
        buf[16..18].copy_from_slice(&self.codec_id.to_le_bytes());
        buf[18] = self.byte_order.id();
        // buf[19] pad
        buf[20..24].copy_from_slice(&self.row_len.to_le_bytes());
        buf[24..28].copy_from_slice(&self.rows_per_block.to_le_bytes());
        buf[28..36].copy_from_slice(&self.block_count.to_le_bytes());
        buf[36..44].copy_from_slice(&self.row_count.to_le_bytes());
        buf[44..52].copy_from_slice(&self.flags.to_le_bytes());
        buf[52..56].copy_from_slice(&self.schema_len.to_le_bytes());
        buf[56..58].copy_from_slice(&self.column_count.to_le_bytes());
        // reserved[6] stays zero
        buf
    }

    /// Deserialize from `HEADER_SIZE` bytes, checking the magic.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE as usize]) -> anyhow::Result<Self> {
        if &buf[..14] != MAGIC {
            bail!("invalid RPAK magic bytes, not an RPAK1 file");
        }
        let byte_order = ByteOrder::from_id(buf[18])
            .with_context(|| format!("unknown byte order id {}", buf[18]))?;
        Ok(Self {
            version: u16::from_le_bytes(buf[14..16].try_into()?),
            codec_id: u16::from_le_bytes(buf[16..18].try_into()?),
            byte_order,
            row_len: u32::from_le_bytes(buf[20..24].try_into()?),
            rows_per_block: u32::from_le_bytes(buf[24..28].try_into()?),
            block_count: u64::from_le_bytes(buf[28..36].try_into()?),
            row_count: u64::from_le_bytes(buf[36..44].try_into()?),
            flags: u64::from_le_bytes(buf[44..52].try_into()?),
            schema_len: u32::from_le_bytes(buf[52..56].try_into()?),
            column_count: u16::from_le_bytes(buf[56..58].try_into()?),
        })
    }

    pub fn has_flag(&self, flag: u64) -> bool {
        self.flags & flag != 0
    }
}

// ── Schema ─────────────────────────────────────────────────────────────────

/// Per column: name_len:u16, name (UTF-8), codec_id:u8, begin:i32, end:i32.
pub fn encode_schema(layout: &[ColumnDescriptor]) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    for col in layout {
        let name = col.name.as_bytes();
        let name_len = u16::try_from(name.len())
            .with_context(|| format!("column name {:?} is too long", col.name))?;
        buf.extend_from_slice(&name_len.to_le_bytes());
        buf.extend_from_slice(name);
        buf.push(col.codec.id());
        buf.extend_from_slice(&col.begin.to_le_bytes());
        buf.extend_from_slice(&col.end.to_le_bytes());
    }
    Ok(buf)
}

pub fn decode_schema(buf: &[u8], column_count: u16) -> anyhow::Result<Vec<ColumnDescriptor>> {
    let mut at = 0usize;
    let mut layout = Vec::with_capacity(column_count as usize);
    for _ in 0..column_count {
        let name_len = u16::from_le_bytes(take(buf, &mut at, 2)?.try_into()?) as usize;
        let name = String::from_utf8(take(buf, &mut at, name_len)?.to_vec())
            .context("column name is not UTF-8")?;
        let codec_id = take(buf, &mut at, 1)?[0];
        let codec = TypeCodec::from_id(codec_id)
            .with_context(|| format!("column {name:?} has unknown codec id {codec_id}"))?;
        let begin = i32::from_le_bytes(take(buf, &mut at, 4)?.try_into()?);
        let end = i32::from_le_bytes(take(buf, &mut at, 4)?.try_into()?);
        layout.push(ColumnDescriptor::positioned(name, codec, begin, end)?);
    }
    Ok(layout)
}

fn take<'a>(buf: &'a [u8], at: &mut usize, n: usize) -> anyhow::Result<&'a [u8]> {
    let bytes = buf
        .get(*at..*at + n)
        .with_context(|| format!("schema truncated at byte {at}"))?;
    *at += n;
    Ok(bytes)
}

// ── Block index entry ───────────────────────────────────────────────────────

/// One entry in the block index: locates and describes a single block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockEntry {
    /// Byte offset of the block (its sidecar length prefix) in the file.
    pub offset: u64,
    /// Index of the block's first row.
    pub first_row: u64,
    /// Bytes of compressed payload, excluding the sidecar prefix.
    pub compressed_len: u32,
    pub raw_len: u32,
    /// xxhash3-64 of the compressed payload.
    pub checksum: u64,
}

impl BlockEntry {
    pub fn to_bytes(&self) -> [u8; BLOCK_ENTRY_SIZE as usize] {
        let mut buf = [0u8; BLOCK_ENTRY_SIZE as usize];
        buf[0..8].copy_from_slice(&self.offset.to_le_bytes());
        buf[8..16].copy_from_slice(&self.first_row.to_le_bytes());
        buf[16..20].copy_from_slice(&self.compressed_len.to_le_bytes());
        buf[20..24].copy_from_slice(&self.raw_len.to_le_bytes());
        buf[24..32].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; BLOCK_ENTRY_SIZE as usize]) -> anyhow::Result<Self> {
        Ok(Self {
            offset: u64::from_le_bytes(buf[0..8].try_into()?),
            first_row: u64::from_le_bytes(buf[8..16].try_into()?),
            compressed_len: u32::from_le_bytes(buf[16..20].try_into()?),
            raw_len: u32::from_le_bytes(buf[20..24].try_into()?),
            checksum: u64::from_le_bytes(buf[24..32].try_into()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column;

    #[test]
    fn header_fields_survive_bytes() {
        let header = RowFileHeader {
            version: VERSION,
            codec_id: CODEC_LZ4,
            byte_order: ByteOrder::Big,
            row_len: 22,
            rows_per_block: 100,
            block_count: 3,
            row_count: 250,
            flags: FLAG_HAS_CHECKSUM,
            schema_len: 40,
            column_count: 3,
        };
        let back = RowFileHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(back, header);
    }

    #[test]
    fn schema_survives_bytes() {
        let layout = column::layout([("id", TypeCodec::Long, 0), ("név", TypeCodec::String, 12)]).unwrap();
        let bytes = encode_schema(&layout).unwrap();
        assert_eq!(decode_schema(&bytes, 2).unwrap(), layout);
        assert!(decode_schema(&bytes[..bytes.len() - 1], 2).is_err());
    }
}
