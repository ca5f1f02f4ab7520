#![no_main]

use libfuzzer_sys::fuzz_target;
use chunkdex::{ChunkConfig, Chunker, Pol};

fuzz_target!(|data: Vec<u8>| {
    // Test with various chunk configurations
    let configs = vec![
        // Smallest allowed chunks
        ChunkConfig::new(64, 128, 256).unwrap(),
        // Medium chunks
        ChunkConfig::new(256, 1024, 4096).unwrap(),
        // Salted polynomial
        ChunkConfig::new(256, 1024, 4096)
            .unwrap()
            .with_polynomial(Pol::from_salt(b"fuzz").unwrap()),
    ];

    for config in configs {
        let chunker = Chunker::new(config).unwrap();
        let chunks = chunker.chunk_bytes(data.clone());

        // Verify: all chunks are within min/max bounds
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(!chunk.is_empty());
            assert!(chunk.len() <= config.max_size());
            // Only enforce min_size for chunks that are not the last one
            if i < chunks.len() - 1 {
                assert!(chunk.len() >= config.min_size());
                assert!(chunk.cut & (config.avg_size() as u64 - 1) == 0 || chunk.len() == config.max_size());
            }
        }

        // Verify: offsets are contiguous and cover the input
        let mut expected_offset = 0u64;
        for chunk in &chunks {
            assert_eq!(chunk.start, expected_offset);
            assert_eq!(&chunk.data[..], &data[expected_offset as usize..][..chunk.len()]);
            expected_offset += chunk.len() as u64;
        }
        assert_eq!(expected_offset, data.len() as u64);

        // Verify: determinism - same input produces same chunks
        let chunks2 = chunker.clone().chunk_bytes(data.clone());
        assert_eq!(chunks, chunks2);
    }
});
