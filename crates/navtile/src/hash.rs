//! A streaming 32-bit content hash, used to detect whether a tile's inputs changed since the last build.

use glam::{Affine3A, Quat, Vec3};

/// Incremental hash over a sequence of 32-bit words.
///
/// Follows the block and finalization steps of MurmurHash3 (x86, 32-bit).
/// The result depends on the order in which values are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashComputer {
    hash: u32,
    len: u32,
}

impl Default for HashComputer {
    fn default() -> Self {
        Self::new(0)
    }
}

impl HashComputer {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    /// Creates a hasher starting from `seed`.
    #[inline]
    pub fn new(seed: u32) -> Self {
        Self { hash: seed, len: 0 }
    }

    /// Folds a single word into the hash.
    #[inline]
    pub fn add_u32(&mut self, value: u32) {
        let mut k = value.wrapping_mul(Self::C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(Self::C2);

        self.hash ^= k;
        self.hash = self.hash.rotate_left(13);
        self.hash = self.hash.wrapping_mul(5).wrapping_add(0xe654_6b64);
        self.len = self.len.wrapping_add(4);
    }

    /// Folds the bit pattern of a float into the hash.
    #[inline]
    pub fn add_f32(&mut self, value: f32) {
        self.add_u32(value.to_bits());
    }

    /// Folds the three components of a vector into the hash.
    #[inline]
    pub fn add_vec3(&mut self, value: Vec3) {
        self.add_f32(value.x);
        self.add_f32(value.y);
        self.add_f32(value.z);
    }

    /// Folds a rotation into the hash, scalar part first.
    #[inline]
    pub fn add_quat(&mut self, value: Quat) {
        self.add_f32(value.w);
        self.add_f32(value.x);
        self.add_f32(value.y);
        self.add_f32(value.z);
    }

    /// Folds a 3x4 transform into the hash, row by row.
    pub fn add_affine(&mut self, value: &Affine3A) {
        let m = value.matrix3;
        let t = value.translation;
        for (row, translation) in [(m.row(0), t.x), (m.row(1), t.y), (m.row(2), t.z)] {
            self.add_f32(row.x);
            self.add_f32(row.y);
            self.add_f32(row.z);
            self.add_f32(translation);
        }
    }

    /// Mixes in the total length and applies the final avalanche.
    /// Adding more values afterwards continues from the finalized state.
    pub fn complete(&mut self) {
        let mut h = self.hash ^ self.len;
        h ^= h >> 16;
        h = h.wrapping_mul(0x85eb_ca6b);
        h ^= h >> 13;
        h = h.wrapping_mul(0xc2b2_ae35);
        h ^= h >> 16;
        self.hash = h;
    }

    /// The current hash value. Call [`HashComputer::complete`] first to get a well-mixed result.
    #[inline]
    pub fn value(&self) -> u32 {
        self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_words(words: &[u32]) -> u32 {
        let mut hasher = HashComputer::default();
        for word in words {
            hasher.add_u32(*word);
        }
        hasher.complete();
        hasher.value()
    }

    #[test]
    fn matches_murmur3_reference_values() {
        // MurmurHash3_x86_32 with seed 0: "" -> 0, [0u8; 4] -> 0x2362f9de
        assert_eq!(hash_words(&[]), 0);
        assert_eq!(hash_words(&[0]), 0x2362_f9de);
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(hash_words(&[1, 2, 3]), hash_words(&[1, 2, 3]));
    }

    #[test]
    fn is_sensitive_to_single_value_changes() {
        let base = hash_words(&[10, 20, 30]);
        assert_ne!(base, hash_words(&[10, 21, 30]));
        assert_ne!(base, hash_words(&[10, 20, 30, 0]));
    }

    #[test]
    fn is_order_sensitive() {
        assert_ne!(hash_words(&[7, 9]), hash_words(&[9, 7]));
    }

    #[test]
    fn seed_changes_the_result() {
        let mut a = HashComputer::new(0);
        let mut b = HashComputer::new(0xf007_b00b);
        a.add_u32(5);
        b.add_u32(5);
        a.complete();
        b.complete();
        assert_ne!(a.value(), b.value());
    }

    #[test]
    fn float_overloads_hash_bit_patterns() {
        let mut vector = HashComputer::default();
        vector.add_vec3(Vec3::new(1.0, 2.0, 3.0));
        let mut floats = HashComputer::default();
        floats.add_f32(1.0);
        floats.add_f32(2.0);
        floats.add_f32(3.0);
        assert_eq!(vector, floats);

        let mut positive = HashComputer::default();
        positive.add_f32(0.0);
        let mut negative = HashComputer::default();
        negative.add_f32(-0.0);
        assert_ne!(positive, negative);
    }

    #[test]
    fn transform_hash_covers_translation() {
        let mut a = HashComputer::default();
        a.add_affine(&Affine3A::from_translation(Vec3::X));
        let mut b = HashComputer::default();
        b.add_affine(&Affine3A::from_translation(Vec3::Y));
        assert_ne!(a.value(), b.value());
    }
}
