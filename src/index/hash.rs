use crate::record::Field;

/// Default number of primary bucket pages in a hash index
pub const DEFAULT_BUCKETS: usize = 97;

/// Multiplier of the bucket hash (the millionth prime)
pub const HASH_MULTIPLIER: i64 = 15_485_863;

/// Multiplicative hash `(multiplier * value) mod modulus`.
///
/// Integers hash by value, strings by the sum of their UTF-16 code units.
/// Not resistant to adversarial keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashScheme {
    multiplier: i64,
    modulus: i64,
}

impl HashScheme {
    pub const fn new(multiplier: i64, modulus: i64) -> Self {
        Self {
            multiplier,
            modulus,
        }
    }

    /// Scheme whose modulus equals the bucket count
    pub fn for_buckets(bucket_count: usize) -> Self {
        Self::new(HASH_MULTIPLIER, bucket_count.max(1) as i64)
    }

    pub fn modulus(&self) -> i64 {
        self.modulus
    }

    /// Hash value in `0..modulus`
    pub fn hash(&self, field: &Field) -> usize {
        let value = match field {
            Field::Int(v) => *v as i128,
            Field::Str(s) => s.encode_utf16().map(|u| u as i128).sum(),
        };
        (self.multiplier as i128 * value).rem_euclid(self.modulus as i128) as usize
    }

    /// Primary bucket for a key
    pub fn bucket(&self, field: &Field, bucket_count: usize) -> usize {
        self.hash(field) % bucket_count.max(1)
    }
}

impl Default for HashScheme {
    fn default() -> Self {
        Self::for_buckets(DEFAULT_BUCKETS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_hash() {
        let scheme = HashScheme::default();
        // 15485863 mod 97 == 7
        assert_eq!(scheme.hash(&Field::Int(1)), 7);
        assert_eq!(scheme.hash(&Field::Int(2)), 14);
        assert_eq!(scheme.hash(&Field::Int(14)), 1);
        assert_eq!(scheme.hash(&Field::Int(0)), 0);
        assert_eq!(scheme.hash(&Field::Int(97 * 5)), 0);
    }

    #[test]
    fn test_negative_keys_stay_in_range() {
        let scheme = HashScheme::default();
        for v in [-1, -97, -1000, i32::MIN, i32::MAX] {
            assert!(scheme.hash(&Field::Int(v)) < 97);
        }
        assert_eq!(scheme.hash(&Field::Int(-1)), 90);
    }

    #[test]
    fn test_string_hash_sums_chars() {
        let scheme = HashScheme::default();
        // 'a' + 'b' == 195 == 'b' + 'a'
        let ab = scheme.hash(&Field::Str("ab".to_string()));
        assert_eq!(ab, scheme.hash(&Field::Str("ba".to_string())));
        assert_eq!(ab, scheme.hash(&Field::Int(195)));
        assert_eq!(scheme.hash(&Field::Str(String::new())), 0);
    }

    #[test]
    fn test_string_hash_sums_utf16_units() {
        let scheme = HashScheme::default();
        // U+1F600 encodes as the surrogate pair 0xD83D 0xDE00
        let smiley = scheme.hash(&Field::Str("\u{1F600}".to_string()));
        assert_eq!(smiley, scheme.hash(&Field::Int(0xD83D + 0xDE00)));
        assert_ne!(smiley, scheme.hash(&Field::Int(0x1F600)));

        let accented = scheme.hash(&Field::Str("\u{e9}".to_string()));
        assert_eq!(accented, scheme.hash(&Field::Int(0xE9)));
    }

    #[test]
    fn test_hash_is_deterministic() {
        let scheme = HashScheme::default();
        let key = Field::Str("bucket".to_string());
        let first = scheme.bucket(&key, DEFAULT_BUCKETS);
        for _ in 0..10 {
            assert_eq!(scheme.bucket(&key, DEFAULT_BUCKETS), first);
        }
    }

    #[test]
    fn test_custom_bucket_count() {
        let scheme = HashScheme::for_buckets(13);
        for v in 0..100 {
            assert!(scheme.bucket(&Field::Int(v), 13) < 13);
        }
    }
}
