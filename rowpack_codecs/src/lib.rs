mod lz4_codec;
mod passthrough;
mod shuffle;
mod zstd_codec;

pub use lz4_codec::Lz4Codec;
pub use passthrough::PassThroughCodec;
pub use shuffle::ShuffleZstdCodec;
pub use zstd_codec::ZstdCodec;

use std::sync::Arc;

use rowpack_core::format::{CODEC_LZ4, CODEC_PASSTHROUGH, CODEC_SHUFFLE_ZSTD, CODEC_ZSTD};
use rowpack_core::BlockCodec;

/// Resolve a codec from its on-disk `codec_id`, so a reader can be opened
/// on any existing RPAK1 file.
pub fn codec_by_id(id: u16) -> anyhow::Result<Arc<dyn BlockCodec>> {
    match id {
        CODEC_PASSTHROUGH => Ok(Arc::new(PassThroughCodec)),
        CODEC_ZSTD => Ok(Arc::new(ZstdCodec::default())),
        CODEC_LZ4 => Ok(Arc::new(Lz4Codec)),
        CODEC_SHUFFLE_ZSTD => Ok(Arc::new(ShuffleZstdCodec::default())),
        _ => anyhow::bail!(
            "unknown codec id {}; supported: 0 (passthrough), 1 (zstd), 2 (lz4), 3 (shuffle-zstd)",
            id
        ),
    }
}

/// Resolve a codec from its CLI name.
pub fn codec_by_name(name: &str, zstd_level: i32) -> anyhow::Result<Box<dyn BlockCodec>> {
    match name {
        "passthrough" | "none" => Ok(Box::new(PassThroughCodec)),
        "zstd" => Ok(Box::new(ZstdCodec::new(zstd_level))),
        "lz4" => Ok(Box::new(Lz4Codec)),
        "shuffle-zstd" | "shuffle" => Ok(Box::new(ShuffleZstdCodec::new(zstd_level))),
        other => anyhow::bail!(
            "unknown codec {:?}; expected passthrough, zstd, lz4 or shuffle-zstd",
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowpack_core::BlockMeta;

    fn rows(count: usize, row_len: usize) -> Vec<u8> {
        (0..count * row_len)
            .map(|i| ((i / row_len) as u8).wrapping_mul(7) ^ (i % row_len) as u8)
            .collect()
    }

    #[test]
    fn every_codec_restores_its_block() {
        let raw = rows(300, 13);
        for id in 0..4 {
            let codec = codec_by_id(id).unwrap();
            assert_eq!(codec.id(), id);
            let mut meta = BlockMeta::for_rows(13);
            let packed = codec.compress_block(&raw, &mut meta).unwrap();
            let back = codec.decompress_block(&packed, raw.len(), &meta).unwrap();
            assert_eq!(back, raw, "codec {} round trip", codec.name());
        }
    }

    #[test]
    fn unknown_ids_and_names_are_rejected() {
        assert!(codec_by_id(9).is_err());
        assert!(codec_by_name("brotli", 3).is_err());
        assert_eq!(codec_by_name("shuffle", 5).unwrap().id(), CODEC_SHUFFLE_ZSTD);
    }
}
