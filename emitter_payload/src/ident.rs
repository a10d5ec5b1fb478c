//! Random identifiers.
//!
//! Identifiers are version 4 UUIDs built from the caller's RNG so that seeded
//! runs produce the same identifiers.

use rand::Rng;
use uuid::{Builder, Uuid};

pub(crate) fn uuid<R>(rng: &mut R) -> Uuid
where
    R: Rng + ?Sized,
{
    Builder::from_random_bytes(rng.random()).into_uuid()
}

/// A lowercase hex string of `len` characters, at most 32.
pub(crate) fn hex<R>(rng: &mut R, len: usize) -> String
where
    R: Rng + ?Sized,
{
    let mut hex = uuid(rng).simple().to_string();
    hex.truncate(len);
    hex
}

#[cfg(test)]
mod test {
    use rand::{SeedableRng, rngs::SmallRng};

    use super::{hex, uuid};

    #[test]
    fn hex_has_requested_length() {
        let mut rng = SmallRng::seed_from_u64(5);
        for len in [8, 10, 12, 32] {
            let id = hex(&mut rng, len);
            assert_eq!(id.len(), len);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn seeded_identifiers_repeat() {
        let first = hex(&mut SmallRng::seed_from_u64(9), 32);
        let second = hex(&mut SmallRng::seed_from_u64(9), 32);
        assert_eq!(first, second);
    }

    #[test]
    fn uuids_are_random_version_four() {
        let id = uuid(&mut SmallRng::seed_from_u64(3));
        assert_eq!(id.get_version_num(), 4);
        let text = id.hyphenated().to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(text.matches('-').count(), 4);
    }
}
