//! Partitioning slides into generation chunks.

use crate::types::{Chunk, ChunkRole, SlideRecord};

/// Split `slides` into contiguous chunks of at most `chunk_size` slides.
///
/// The last chunk may be shorter. A chunk size of zero is treated as one.
/// Roles: the first chunk is `Head`, the last is `End`, the rest are `Body`;
/// a deck that fits in one chunk is a single `End` chunk.
pub fn plan(slides: &[SlideRecord], chunk_size: usize) -> Vec<Chunk<'_>> {
    let size = chunk_size.max(1);
    let count = slides.len().div_ceil(size);

    slides
        .chunks(size)
        .enumerate()
        .map(|(position, group)| Chunk {
            number: position + 1,
            start_index: group[0].index,
            end_index: group[group.len() - 1].index,
            role: ChunkRole::for_position(position, count),
            slides: group,
        })
        .collect()
}
