use rowpack_core::codec::{BlockCodec, BlockMeta};
use rowpack_core::format::CODEC_PASSTHROUGH;

/// Stores row blocks verbatim.
///
/// Handy for checking the file layout independently of compression, and
/// for rows that are already high-entropy.
pub struct PassThroughCodec;

impl BlockCodec for PassThroughCodec {
    fn id(&self) -> u16 {
        CODEC_PASSTHROUGH
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn compress_block(&self, raw: &[u8], _meta: &mut BlockMeta) -> anyhow::Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress_block(
        &self,
        compressed: &[u8],
        _raw_len: usize,
        _meta: &BlockMeta,
    ) -> anyhow::Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}
