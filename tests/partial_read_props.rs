//! Property tests: any sub-range read of a packed file equals the matching
//! slice of the original bytes, for arbitrary content and arbitrary ranges.

use proptest::prelude::*;
use tempfile::TempDir;

use blockpak::{PackageBuilder, PackageReader};

proptest! {
    // Each case builds a real archive on disk; keep the case count modest.
    #![proptest_config(ProptestConfig { cases: 24, ..ProptestConfig::default() })]

    #[test]
    fn partial_reads_match_slices(
        content in proptest::collection::vec(any::<u8>(), 0..40_000),
        ranges in proptest::collection::vec((0u64..48_000, 0usize..20_000), 1..6),
        level in 0u8..=9,
    ) {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("input.bin");
        std::fs::write(&input, &content).unwrap();

        let mut builder = PackageBuilder::new();
        builder.set_compression_level(level);
        builder.add_file(&input, "input.bin");
        let out = tmp.path().join("prop.bpak");
        builder.build(&out).unwrap();

        let reader = PackageReader::open(&out).unwrap();
        let entry = reader.find("input.bin").unwrap();
        prop_assert_eq!(entry.uncompressed_size as usize, content.len());
        prop_assert_eq!(reader.read_all(entry).unwrap(), content.clone());

        for (offset, length) in ranges {
            let got = reader.read(entry, offset, length).unwrap();
            let start = (offset as usize).min(content.len());
            let end = (start + length).min(content.len());
            prop_assert_eq!(got, content[start..end].to_vec());
        }
    }
}
