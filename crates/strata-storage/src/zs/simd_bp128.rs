//! SIMD-BP128 vectors.
//!
//! Values are consumed in blocks of 128; four blocks form a meta-block. Each
//! meta-block is prefixed by a 128-bit header carrying the four block bit
//! widths, followed by each block packed at the minimum width that fits all
//! of its values. Trailing input is zero-padded to a full meta-block; the
//! logical element count is kept in the vector's metadata so iteration stops
//! at the final element.
//!
//! The packing kernel here is scalar and bit-identical to a 128-bit SIMD
//! kernel operating on the same layout.

/// Values per block.
const BLOCK_SIZE: usize = 128;

/// Blocks per meta-block.
const BLOCKS_PER_META_BLOCK: usize = 4;

/// Values per meta-block.
const META_BLOCK_SIZE: usize = BLOCK_SIZE * BLOCKS_PER_META_BLOCK;

/// A `u32` sequence packed with SIMD-BP128.
#[derive(Debug, Clone, Default)]
pub struct SimdBp128Vector {
    /// Packed stream: per meta-block, a 4-word header then 4 packed blocks.
    data: Vec<u32>,
    /// Logical element count (excludes padding).
    size: usize,
}

impl SimdBp128Vector {
    pub fn encode(values: &[u32]) -> Self {
        let size = values.len();
        let meta_block_count = size.div_ceil(META_BLOCK_SIZE);
        let mut data = Vec::new();

        let mut block = [0u32; BLOCK_SIZE];
        for meta_block_index in 0..meta_block_count {
            let meta_start = meta_block_index * META_BLOCK_SIZE;

            let header_offset = data.len();
            data.extend_from_slice(&[0u32; BLOCKS_PER_META_BLOCK]);

            for block_index in 0..BLOCKS_PER_META_BLOCK {
                let start = meta_start + block_index * BLOCK_SIZE;
                for (i, slot) in block.iter_mut().enumerate() {
                    *slot = values.get(start + i).copied().unwrap_or(0);
                }

                let width = block.iter().map(|&v| bit_width(v)).max().unwrap_or(0);
                data[header_offset + block_index] = width as u32;
                pack_block(&block, width, &mut data);
            }
        }

        Self { data, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn data_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<u32>()
    }

    /// Random access. Walks meta-block headers from the front; use a decoder
    /// or iterator when reading more than a handful of values.
    pub fn get(&self, index: usize) -> u32 {
        debug_assert!(index < self.size, "index {} out of bounds", index);

        let mut offset = 0;
        for _ in 0..index / META_BLOCK_SIZE {
            offset += meta_block_words(&self.data[offset..]);
        }

        let header = &self.data[offset..offset + BLOCKS_PER_META_BLOCK];
        let block_index = (index % META_BLOCK_SIZE) / BLOCK_SIZE;
        let mut block_offset = offset + BLOCKS_PER_META_BLOCK;
        for &width in header.iter().take(block_index) {
            block_offset += packed_block_words(width as usize);
        }

        extract(
            &self.data[block_offset..],
            header[block_index] as usize,
            index % BLOCK_SIZE,
        )
    }

    pub fn create_decoder(&self) -> SimdBp128Decoder<'_> {
        SimdBp128Decoder {
            vector: self,
            meta_block_offsets: vec![0],
            cached_block: None,
            cache: [0; BLOCK_SIZE],
        }
    }

    pub fn iter(&self) -> SimdBp128Iter<'_> {
        SimdBp128Iter {
            decoder: self.create_decoder(),
            position: 0,
        }
    }

    pub fn decode(&self) -> Vec<u32> {
        let mut decoded = Vec::with_capacity(self.size);
        let mut block = [0u32; BLOCK_SIZE];
        let mut offset = 0;

        while decoded.len() < self.size {
            let header_end = offset + BLOCKS_PER_META_BLOCK;
            let header: Vec<u32> = self.data[offset..header_end].to_vec();
            offset = header_end;

            for &width in &header {
                unpack_block(&self.data[offset..], width as usize, &mut block);
                offset += packed_block_words(width as usize);

                let remaining = self.size - decoded.len();
                decoded.extend_from_slice(&block[..remaining.min(BLOCK_SIZE)]);
                if decoded.len() == self.size {
                    break;
                }
            }
        }

        decoded
    }
}

/// Stateful decoder over a [`SimdBp128Vector`].
///
/// Keeps a cursor of meta-block offsets (extended lazily on first access)
/// and caches the most recently unpacked block, so sequential and
/// nearly-sequential access unpack each block once.
pub struct SimdBp128Decoder<'a> {
    vector: &'a SimdBp128Vector,
    /// Word offsets of the meta-blocks resolved so far; `[0]` up front.
    meta_block_offsets: Vec<usize>,
    /// Global index of the block currently held in `cache`.
    cached_block: Option<usize>,
    cache: [u32; BLOCK_SIZE],
}

impl SimdBp128Decoder<'_> {
    pub fn get(&mut self, index: usize) -> u32 {
        debug_assert!(index < self.vector.size, "index {} out of bounds", index);

        let block_index = index / BLOCK_SIZE;
        if self.cached_block != Some(block_index) {
            self.unpack(block_index);
        }
        self.cache[index % BLOCK_SIZE]
    }

    fn unpack(&mut self, block_index: usize) {
        let meta_block_index = block_index / BLOCKS_PER_META_BLOCK;

        while self.meta_block_offsets.len() <= meta_block_index {
            let last = *self.meta_block_offsets.last().unwrap();
            self.meta_block_offsets
                .push(last + meta_block_words(&self.vector.data[last..]));
        }

        let meta_offset = self.meta_block_offsets[meta_block_index];
        let header =
            &self.vector.data[meta_offset..meta_offset + BLOCKS_PER_META_BLOCK];

        let mut block_offset = meta_offset + BLOCKS_PER_META_BLOCK;
        let block_in_meta = block_index % BLOCKS_PER_META_BLOCK;
        for &width in header.iter().take(block_in_meta) {
            block_offset += packed_block_words(width as usize);
        }

        unpack_block(
            &self.vector.data[block_offset..],
            header[block_in_meta] as usize,
            &mut self.cache,
        );
        self.cached_block = Some(block_index);
    }
}

/// Forward iterator over a [`SimdBp128Vector`].
pub struct SimdBp128Iter<'a> {
    decoder: SimdBp128Decoder<'a>,
    position: usize,
}

impl Iterator for SimdBp128Iter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.position >= self.decoder.vector.size {
            return None;
        }
        let value = self.decoder.get(self.position);
        self.position += 1;
        Some(value)
    }
}

/// Number of bits needed to represent `value`.
fn bit_width(value: u32) -> usize {
    (32 - value.leading_zeros()) as usize
}

/// Packed size of one block at `width` bits per value.
fn packed_block_words(width: usize) -> usize {
    // 128 * width bits is always a whole number of 32-bit words
    BLOCK_SIZE * width / 32
}

/// Total words of the meta-block starting at `words[0]`, header included.
fn meta_block_words(words: &[u32]) -> usize {
    let packed: usize = words[..BLOCKS_PER_META_BLOCK]
        .iter()
        .map(|&w| packed_block_words(w as usize))
        .sum();
    BLOCKS_PER_META_BLOCK + packed
}

fn value_mask(width: usize) -> u64 {
    (1u64 << width) - 1
}

/// Pack 128 values at `width` bits each, appending whole words to `out`.
fn pack_block(block: &[u32; BLOCK_SIZE], width: usize, out: &mut Vec<u32>) {
    if width == 0 {
        return;
    }

    let mask = value_mask(width);
    let mut buffer = 0u64;
    let mut bits_in_buffer = 0;

    for &value in block {
        buffer |= (value as u64 & mask) << bits_in_buffer;
        bits_in_buffer += width;
        while bits_in_buffer >= 32 {
            out.push(buffer as u32);
            buffer >>= 32;
            bits_in_buffer -= 32;
        }
    }
    debug_assert_eq!(bits_in_buffer, 0);
}

/// Unpack one block of `width`-bit values from the front of `words`.
fn unpack_block(words: &[u32], width: usize, out: &mut [u32; BLOCK_SIZE]) {
    if width == 0 {
        out.fill(0);
        return;
    }

    let mask = value_mask(width);
    let mut buffer = 0u64;
    let mut bits_in_buffer = 0;
    let mut word_index = 0;

    for slot in out.iter_mut() {
        while bits_in_buffer < width {
            buffer |= (words[word_index] as u64) << bits_in_buffer;
            word_index += 1;
            bits_in_buffer += 32;
        }
        *slot = (buffer & mask) as u32;
        buffer >>= width;
        bits_in_buffer -= width;
    }
}

/// Extract the value at block position `position` without unpacking the
/// whole block.
fn extract(words: &[u32], width: usize, position: usize) -> u32 {
    if width == 0 {
        return 0;
    }

    let bit_position = position * width;
    let word_index = bit_position / 32;
    let shift = bit_position % 32;

    let mut value = (words[word_index] >> shift) as u64;
    if shift + width > 32 {
        value |= (words[word_index + 1] as u64) << (32 - shift);
    }
    (value & value_mask(width)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A `count`-element sequence cycling through `[2^(w-1), 2^w - 1]`.
    fn generate_sequence(bit_size: u32, count: usize) -> Vec<u32> {
        let min = 1u64 << (bit_size - 1);
        let max = (1u64 << bit_size) - 1;

        let mut value = min;
        (0..count)
            .map(|_| {
                let current = value as u32;
                value += 1;
                if value > max {
                    value = min;
                }
                current
            })
            .collect()
    }

    #[test]
    fn test_decode_sequence_using_iterator() {
        for bit_size in 1..=32 {
            let sequence = generate_sequence(bit_size, 4_200);
            let encoded = SimdBp128Vector::encode(&sequence);
            assert_eq!(encoded.size(), sequence.len());

            let decoded: Vec<u32> = encoded.iter().collect();
            assert_eq!(decoded, sequence, "bit size {}", bit_size);
        }
    }

    #[test]
    fn test_decode_sequence_using_decoder() {
        for bit_size in 1..=32 {
            let sequence = generate_sequence(bit_size, 4_200);
            let encoded = SimdBp128Vector::encode(&sequence);

            let mut decoder = encoded.create_decoder();
            for (i, &expected) in sequence.iter().enumerate() {
                assert_eq!(decoder.get(i), expected, "bit size {} index {}", bit_size, i);
            }
        }
    }

    #[test]
    fn test_decode_sequence_using_decode_method() {
        for bit_size in 1..=32 {
            let sequence = generate_sequence(bit_size, 4_200);
            let encoded = SimdBp128Vector::encode(&sequence);
            assert_eq!(encoded.decode(), sequence, "bit size {}", bit_size);
        }
    }

    #[test]
    fn test_random_access() {
        let sequence = generate_sequence(17, 4_200);
        let encoded = SimdBp128Vector::encode(&sequence);

        // Probe positions across meta-block boundaries in both directions.
        for &index in &[0, 127, 128, 511, 512, 513, 1024, 4_199, 3, 600] {
            assert_eq!(encoded.get(index), sequence[index], "index {}", index);
        }
    }

    #[test]
    fn test_backwards_decoder_access() {
        let sequence = generate_sequence(9, 2_000);
        let encoded = SimdBp128Vector::encode(&sequence);

        let mut decoder = encoded.create_decoder();
        for i in (0..sequence.len()).rev() {
            assert_eq!(decoder.get(i), sequence[i]);
        }
    }

    #[test]
    fn test_zero_width_blocks() {
        let sequence = vec![0u32; 1_000];
        let encoded = SimdBp128Vector::encode(&sequence);
        // Headers only: two meta-blocks of four zero-width blocks.
        assert_eq!(encoded.data_size(), 2 * 4 * 4);
        assert_eq!(encoded.decode(), sequence);
    }

    #[test]
    fn test_partial_meta_block_size() {
        let sequence: Vec<u32> = (0..130).collect();
        let encoded = SimdBp128Vector::encode(&sequence);
        assert_eq!(encoded.size(), 130);
        assert_eq!(encoded.decode(), sequence);
        assert_eq!(encoded.iter().count(), 130);
    }

    #[test]
    fn test_mixed_widths_across_blocks() {
        let mut sequence = Vec::new();
        sequence.extend(std::iter::repeat(3u32).take(128));
        sequence.extend(std::iter::repeat(70_000u32).take(128));
        sequence.extend(std::iter::repeat(0u32).take(128));
        sequence.extend(std::iter::repeat(u32::MAX).take(128));
        sequence.extend(std::iter::repeat(1u32).take(37));

        let encoded = SimdBp128Vector::encode(&sequence);
        assert_eq!(encoded.decode(), sequence);

        let mut decoder = encoded.create_decoder();
        for (i, &expected) in sequence.iter().enumerate() {
            assert_eq!(decoder.get(i), expected);
        }
    }
}
