#![no_main]

use std::io::{self, Read};

use libfuzzer_sys::fuzz_target;
use chunkdex::{BufferPool, ChunkConfig, Chunker, Pipeline, PipelineConfig, composite_hash};

/// Reader that returns the input in pieces sized by the input itself.
struct Uneven<'a> {
    data: &'a [u8],
    step: usize,
}

impl Read for Uneven<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.step.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        self.step = self.step % 97 + 1;
        Ok(n)
    }
}

fuzz_target!(|data: Vec<u8>| {
    let config = ChunkConfig::new(64, 256, 1024).unwrap();
    let chunker = Chunker::new(config).unwrap();
    let pool = BufferPool::new(64, 4);

    // Verify: read sizes do not move boundaries
    let step = data.first().map_or(1, |&b| b as usize + 1);
    let streamed: Vec<_> = chunker
        .chunk(Uneven { data: &data, step }, &pool)
        .map(|c| c.unwrap().offsets())
        .collect();
    let sliced: Vec<_> = chunker
        .chunk_bytes(data.clone())
        .iter()
        .map(|s| s.offsets())
        .collect();
    assert_eq!(streamed, sliced);

    // Verify: pipeline agrees with the chunker and the composite rule
    let pipeline = Pipeline::new_with_pool(config, pool.clone())
        .unwrap()
        .with_config(PipelineConfig::new(3, 2).unwrap());
    let file = pipeline.file_chunks(&data[..]).unwrap();
    let offsets: Vec<_> = file.records.iter().map(|r| r.offsets()).collect();
    assert_eq!(offsets, sliced);
    assert_eq!(file.composite, composite_hash(file.ids()));
    assert!(file.index.len() <= file.len());

    // Verify: every buffer came back
    let stats = pool.stats();
    assert_eq!(stats.hits + stats.misses, stats.returned + stats.discarded);
});
