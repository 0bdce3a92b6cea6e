use anyhow::Context;
use rowpack_core::codec::{BlockCodec, BlockMeta};
use rowpack_core::format::CODEC_SHUFFLE_ZSTD;

/// Byte-shuffle then zstd.
///
/// Rows are transposed so byte `k` of every row sits together: equal
/// column bytes (high bytes of small integers, string padding) form long
/// runs before zstd sees them. The row width travels in the sidecar as a
/// u32 LE.
pub struct ShuffleZstdCodec {
    pub level: i32,
}

impl Default for ShuffleZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ShuffleZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

/// Row width to shuffle by; blocks that are not whole rows are left as is.
fn stride(raw_len: usize, row_len: usize) -> usize {
    if row_len > 1 && raw_len % row_len == 0 {
        row_len
    } else {
        1
    }
}

fn shuffle(raw: &[u8], width: usize) -> Vec<u8> {
    let rows = raw.len() / width;
    let mut out = vec![0u8; raw.len()];
    for (r, row) in raw.chunks_exact(width).enumerate() {
        for (k, &b) in row.iter().enumerate() {
            out[k * rows + r] = b;
        }
    }
    out
}

fn unshuffle(planes: &[u8], width: usize) -> Vec<u8> {
    let rows = planes.len() / width;
    let mut out = vec![0u8; planes.len()];
    for (k, plane) in planes.chunks_exact(rows.max(1)).enumerate().take(width) {
        for (r, &b) in plane.iter().enumerate() {
            out[r * width + k] = b;
        }
    }
    out
}

impl BlockCodec for ShuffleZstdCodec {
    fn id(&self) -> u16 {
        CODEC_SHUFFLE_ZSTD
    }

    fn name(&self) -> &'static str {
        "shuffle-zstd"
    }

    fn compress_block(&self, raw: &[u8], meta: &mut BlockMeta) -> anyhow::Result<Vec<u8>> {
        let width = stride(raw.len(), meta.row_len as usize);
        meta.sidecar = (width as u32).to_le_bytes().to_vec();
        let planes = if width > 1 { shuffle(raw, width) } else { raw.to_vec() };
        Ok(zstd::bulk::compress(&planes, self.level)?)
    }

    fn decompress_block(
        &self,
        compressed: &[u8],
        raw_len: usize,
        meta: &BlockMeta,
    ) -> anyhow::Result<Vec<u8>> {
        let width: [u8; 4] = meta
            .sidecar
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .context("shuffle sidecar is missing the row width")?;
        let width = u32::from_le_bytes(width) as usize;
        let planes = zstd::bulk::decompress(compressed, raw_len)?;
        if width > 1 && planes.len() % width != 0 {
            anyhow::bail!(
                "shuffled block of {} bytes is not a multiple of row width {}",
                planes.len(),
                width
            );
        }
        Ok(if width > 1 { unshuffle(&planes, width) } else { planes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffle_groups_byte_planes() {
        let raw = [1, 2, 3, 4, 5, 6];
        assert_eq!(shuffle(&raw, 3), vec![1, 4, 2, 5, 3, 6]);
        assert_eq!(unshuffle(&shuffle(&raw, 3), 3), raw);
    }

    #[test]
    fn ragged_block_is_not_shuffled() {
        assert_eq!(stride(10, 3), 1);
        assert_eq!(stride(9, 3), 3);
        assert_eq!(stride(9, 0), 1);
    }
}
