use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use rowpack_core::codec::{BlockCodec, BlockMeta};
use rowpack_core::format::CODEC_LZ4;

/// LZ4 block codec: fastest decode of the bundled codecs, for files that
/// are read row-by-row more often than they are stored.
pub struct Lz4Codec;

impl BlockCodec for Lz4Codec {
    fn id(&self) -> u16 {
        CODEC_LZ4
    }

    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress_block(&self, raw: &[u8], _meta: &mut BlockMeta) -> anyhow::Result<Vec<u8>> {
        Ok(compress_prepend_size(raw))
    }

    fn decompress_block(
        &self,
        compressed: &[u8],
        _raw_len: usize,
        _meta: &BlockMeta,
    ) -> anyhow::Result<Vec<u8>> {
        decompress_size_prepended(compressed)
            .map_err(|e| anyhow::anyhow!("lz4 decompress error: {}", e))
    }
}
