use rowpack_core::codec::{BlockCodec, BlockMeta};
use rowpack_core::format::CODEC_ZSTD;

/// Zstandard block codec; each block is an independent zstd frame.
pub struct ZstdCodec {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl BlockCodec for ZstdCodec {
    fn id(&self) -> u16 {
        CODEC_ZSTD
    }

    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress_block(&self, raw: &[u8], _meta: &mut BlockMeta) -> anyhow::Result<Vec<u8>> {
        Ok(zstd::bulk::compress(raw, self.level)?)
    }

    fn decompress_block(
        &self,
        compressed: &[u8],
        raw_len: usize,
        _meta: &BlockMeta,
    ) -> anyhow::Result<Vec<u8>> {
        Ok(zstd::bulk::decompress(compressed, raw_len)?)
    }
}
