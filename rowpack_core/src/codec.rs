/// Per-block sidecar metadata written and read by a block codec.
///
/// `row_len` is filled in by the writer before compression so codecs that
/// reorganize rows (byte shuffling) know the record width. `sidecar` is
/// stored in front of the compressed payload and handed back verbatim.
#[derive(Default, Debug, Clone)]
pub struct BlockMeta {
    pub sidecar: Vec<u8>,
    pub row_len: u32,
}

impl BlockMeta {
    pub fn for_rows(row_len: u32) -> Self {
        Self {
            sidecar: Vec::new(),
            row_len,
        }
    }
}

/// Block compression used by the row file.
///
/// Each implementation:
/// - Is identified by a stable numeric `id()` stored in the RPAK1 header.
/// - Compresses and decompresses blocks independently; no cross-block
///   state, so any row can be reached by decoding a single block.
pub trait BlockCodec: Send + Sync {
    /// Stable codec id stored in the RPAK1 header.
    fn id(&self) -> u16;

    fn name(&self) -> &'static str;

    fn compress_block(&self, raw: &[u8], meta: &mut BlockMeta) -> anyhow::Result<Vec<u8>>;

    /// `raw_len` is the uncompressed size recorded in the block index.
    fn decompress_block(
        &self,
        compressed: &[u8],
        raw_len: usize,
        meta: &BlockMeta,
    ) -> anyhow::Result<Vec<u8>>;
}
