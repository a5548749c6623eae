//! Zero-suppression vectors.
//!
//! Compressed sequences of `u32` with a uniform decode surface:
//! - Fixed-size byte-aligned codecs (1/2/4 bytes per element)
//! - SIMD-BP128 (128-integer blocks packed at per-block bit widths)
//!
//! Callers pick a codec with [`fixed_size_type_for`] based on the maximum
//! value they need to store, or request [`ZsType::SimdBp128`] directly.

mod fixed_size;
mod simd_bp128;

pub use fixed_size::{FixedSizeIter, FixedSizeVector};
pub use simd_bp128::{SimdBp128Decoder, SimdBp128Iter, SimdBp128Vector};

/// Identifies the physical form of a zero-suppression vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZsType {
    FixedSize1,
    FixedSize2,
    FixedSize4,
    SimdBp128,
}

/// Smallest fixed-size byte-aligned codec whose maximum value is >= `max`.
pub fn fixed_size_type_for(max: u32) -> ZsType {
    if max <= u8::MAX as u32 {
        ZsType::FixedSize1
    } else if max <= u16::MAX as u32 {
        ZsType::FixedSize2
    } else {
        ZsType::FixedSize4
    }
}

/// Encode `values` with the requested codec.
pub fn encode_by_zs_type(zs_type: ZsType, values: &[u32]) -> ZsVector {
    match zs_type {
        ZsType::FixedSize1 => ZsVector::FixedSize1(FixedSizeVector::<u8>::encode(values)),
        ZsType::FixedSize2 => ZsVector::FixedSize2(FixedSizeVector::<u16>::encode(values)),
        ZsType::FixedSize4 => ZsVector::FixedSize4(FixedSizeVector::<u32>::encode(values)),
        ZsType::SimdBp128 => ZsVector::SimdBp128(SimdBp128Vector::encode(values)),
    }
}

/// A compressed `u32` sequence.
///
/// All physical forms share this surface: `size`, random `get`, forward
/// iteration, a stateful decoder for sequential access, and a bulk `decode`.
#[derive(Debug, Clone)]
pub enum ZsVector {
    FixedSize1(FixedSizeVector<u8>),
    FixedSize2(FixedSizeVector<u16>),
    FixedSize4(FixedSizeVector<u32>),
    SimdBp128(SimdBp128Vector),
}

impl ZsVector {
    pub fn zs_type(&self) -> ZsType {
        match self {
            ZsVector::FixedSize1(_) => ZsType::FixedSize1,
            ZsVector::FixedSize2(_) => ZsType::FixedSize2,
            ZsVector::FixedSize4(_) => ZsType::FixedSize4,
            ZsVector::SimdBp128(_) => ZsType::SimdBp128,
        }
    }

    /// Number of logical elements.
    pub fn size(&self) -> usize {
        match self {
            ZsVector::FixedSize1(v) => v.size(),
            ZsVector::FixedSize2(v) => v.size(),
            ZsVector::FixedSize4(v) => v.size(),
            ZsVector::SimdBp128(v) => v.size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Size of the packed representation in bytes.
    pub fn data_size(&self) -> usize {
        match self {
            ZsVector::FixedSize1(v) => v.data_size(),
            ZsVector::FixedSize2(v) => v.data_size(),
            ZsVector::FixedSize4(v) => v.data_size(),
            ZsVector::SimdBp128(v) => v.data_size(),
        }
    }

    /// Random access; prefer a decoder or iterator for sequential reads.
    pub fn get(&self, index: usize) -> u32 {
        match self {
            ZsVector::FixedSize1(v) => v.get(index),
            ZsVector::FixedSize2(v) => v.get(index),
            ZsVector::FixedSize4(v) => v.get(index),
            ZsVector::SimdBp128(v) => v.get(index),
        }
    }

    /// Stateful decoder; cheaper than `get` for sequential access.
    pub fn create_decoder(&self) -> ZsDecoder<'_> {
        match self {
            ZsVector::FixedSize1(v) => ZsDecoder::FixedSize1(v.iter()),
            ZsVector::FixedSize2(v) => ZsDecoder::FixedSize2(v.iter()),
            ZsVector::FixedSize4(v) => ZsDecoder::FixedSize4(v.iter()),
            ZsVector::SimdBp128(v) => ZsDecoder::SimdBp128(v.create_decoder()),
        }
    }

    pub fn iter(&self) -> ZsIter<'_> {
        match self {
            ZsVector::FixedSize1(v) => ZsIter::FixedSize1(v.iter()),
            ZsVector::FixedSize2(v) => ZsIter::FixedSize2(v.iter()),
            ZsVector::FixedSize4(v) => ZsIter::FixedSize4(v.iter()),
            ZsVector::SimdBp128(v) => ZsIter::SimdBp128(v.iter()),
        }
    }

    /// Materialize the whole sequence.
    pub fn decode(&self) -> Vec<u32> {
        match self {
            ZsVector::FixedSize1(v) => v.decode(),
            ZsVector::FixedSize2(v) => v.decode(),
            ZsVector::FixedSize4(v) => v.decode(),
            ZsVector::SimdBp128(v) => v.decode(),
        }
    }
}

/// Stateful decoder over a [`ZsVector`].
///
/// `get` is cheap for monotonically increasing indices; arbitrary indices are
/// supported by reconstructing block offsets lazily.
pub enum ZsDecoder<'a> {
    FixedSize1(fixed_size::FixedSizeIter<'a, u8>),
    FixedSize2(fixed_size::FixedSizeIter<'a, u16>),
    FixedSize4(fixed_size::FixedSizeIter<'a, u32>),
    SimdBp128(SimdBp128Decoder<'a>),
}

impl ZsDecoder<'_> {
    pub fn get(&mut self, index: usize) -> u32 {
        match self {
            ZsDecoder::FixedSize1(it) => it.get(index),
            ZsDecoder::FixedSize2(it) => it.get(index),
            ZsDecoder::FixedSize4(it) => it.get(index),
            ZsDecoder::SimdBp128(dec) => dec.get(index),
        }
    }
}

/// Forward iterator over a [`ZsVector`], yielding `u32`.
pub enum ZsIter<'a> {
    FixedSize1(fixed_size::FixedSizeIter<'a, u8>),
    FixedSize2(fixed_size::FixedSizeIter<'a, u16>),
    FixedSize4(fixed_size::FixedSizeIter<'a, u32>),
    SimdBp128(simd_bp128::SimdBp128Iter<'a>),
}

impl Iterator for ZsIter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        match self {
            ZsIter::FixedSize1(it) => it.next(),
            ZsIter::FixedSize2(it) => it.next(),
            ZsIter::FixedSize4(it) => it.next(),
            ZsIter::SimdBp128(it) => it.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TYPES: [ZsType; 4] = [
        ZsType::FixedSize1,
        ZsType::FixedSize2,
        ZsType::FixedSize4,
        ZsType::SimdBp128,
    ];

    fn round_trip(zs_type: ZsType, values: &[u32]) {
        let encoded = encode_by_zs_type(zs_type, values);
        assert_eq!(encoded.size(), values.len());
        assert_eq!(encoded.decode(), values);
        assert_eq!(encoded.iter().collect::<Vec<_>>(), values);

        let mut decoder = encoded.create_decoder();
        for (i, &expected) in values.iter().enumerate() {
            assert_eq!(decoder.get(i), expected);
            assert_eq!(encoded.get(i), expected);
        }
    }

    #[test]
    fn test_fixed_size_type_for() {
        assert_eq!(fixed_size_type_for(0), ZsType::FixedSize1);
        assert_eq!(fixed_size_type_for(255), ZsType::FixedSize1);
        assert_eq!(fixed_size_type_for(256), ZsType::FixedSize2);
        assert_eq!(fixed_size_type_for(65_535), ZsType::FixedSize2);
        assert_eq!(fixed_size_type_for(65_536), ZsType::FixedSize4);
        assert_eq!(fixed_size_type_for(u32::MAX), ZsType::FixedSize4);
    }

    #[test]
    fn test_round_trip_small_values() {
        let values: Vec<u32> = (0..300).map(|i| i % 200).collect();
        for zs_type in ALL_TYPES {
            round_trip(zs_type, &values);
        }
    }

    #[test]
    fn test_round_trip_empty() {
        for zs_type in ALL_TYPES {
            round_trip(zs_type, &[]);
        }
    }

    #[test]
    fn test_round_trip_all_zeros() {
        let values = vec![0u32; 1000];
        for zs_type in ALL_TYPES {
            round_trip(zs_type, &values);
        }
    }

    #[test]
    fn test_round_trip_large_values() {
        let values: Vec<u32> = (0..700).map(|i| u32::MAX - i).collect();
        round_trip(ZsType::FixedSize4, &values);
        round_trip(ZsType::SimdBp128, &values);
    }
}
