use xxhash_rust::xxh3::xxh3_64_with_seed;

const XXH3_SEED: u64 = 0x8b5ad4a0c7d8e9f1;

/// Seeded xxh3 used for container segment and blob checksums.
pub(crate) fn checksum(bytes: &[u8]) -> u64 {
    xxh3_64_with_seed(bytes, XXH3_SEED)
}
