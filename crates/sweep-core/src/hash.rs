//! Hash functions for AdSweep
//!
//! Dynamic network rules need an integer id per paused domain. The id is
//! derived from a Murmur3 32-bit hash of the lowercased domain so the
//! background context can compute it again when the domain is removed,
//! without storing a domain → id mapping.
//!
//! # Collisions
//!
//! Two domains hashing to the same id share one rule slot: registering the
//! second replaces the first. Collisions are not detected.

/// First id available to derived (per-domain) rules.
/// Ids below this are reserved for the static ruleset.
pub const RULE_ID_BASE: i32 = 1000;

const SEED_RULE_ID: u32 = 0x9e3779b9; // Golden ratio

/// Murmur3 32-bit hash implementation.
/// Optimized for short strings (typical domain lengths).
#[inline]
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let len = data.len();
    let mut h = seed;
    let mut i = 0;

    // Process 4-byte chunks
    let chunks = (len >> 2) << 2;
    while i < chunks {
        let k = u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);

        let k = k.wrapping_mul(0xcc9e2d51);
        let k = k.rotate_left(15);
        let k = k.wrapping_mul(0x1b873593);

        h ^= k;
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe6546b64);

        i += 4;
    }

    // Process remaining bytes
    let mut k: u32 = 0;
    let remainder = len & 3;
    if remainder >= 3 {
        k ^= (data[i + 2] as u32) << 16;
    }
    if remainder >= 2 {
        k ^= (data[i + 1] as u32) << 8;
    }
    if remainder >= 1 {
        k ^= data[i] as u32;
        let k = k.wrapping_mul(0xcc9e2d51);
        let k = k.rotate_left(15);
        let k = k.wrapping_mul(0x1b873593);
        h ^= k;
    }

    // Finalization
    h ^= len as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;

    h
}

/// Hash a domain string, lowercasing ASCII first for case-insensitive ids.
#[inline]
pub fn hash_domain(domain: &str) -> u32 {
    let lowered: Vec<u8> = domain.bytes().map(|b| b.to_ascii_lowercase()).collect();
    murmur3_32(&lowered, SEED_RULE_ID)
}

/// Derive the dynamic rule id for a domain.
///
/// Total over all strings (the empty string included) and always in
/// `RULE_ID_BASE..=i32::MAX`, which is the positive range the browser
/// accepts for rule ids.
#[inline]
pub fn compute_rule_id(domain: &str) -> i32 {
    let span = (i32::MAX - RULE_ID_BASE) as u32 + 1;
    RULE_ID_BASE + (hash_domain(domain) % span) as i32
}
