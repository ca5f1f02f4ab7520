//! File indexing example.
//!
//! Run with:
//!     cargo run --example file_index -- /path/to/file [salt]
//!
//! Set `RUST_LOG=chunkdex=debug` to see pipeline logs.

use std::env;
use std::fs::File;

use chunkdex::{BufferPool, ChunkConfig, Pipeline, PipelineConfig, Pol};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "Cargo.toml".to_string());
    let salt = args.next();

    println!("Indexing file: {}\n", path);

    let file = File::open(&path)?;
    let metadata = file.metadata()?;
    println!("File size: {} bytes", metadata.len());

    // Smaller chunks than the defaults so small files still split
    let mut config = ChunkConfig::new(
        16 * 1024,  // min: 16 KiB
        64 * 1024,  // avg: 64 KiB
        256 * 1024, // max: 256 KiB
    )?;
    if let Some(salt) = salt {
        let pol = Pol::from_salt(salt.as_bytes())?;
        println!("Polynomial:   {} (from salt)", pol);
        config = config.with_polynomial(pol);
    }
    println!();

    let pool = BufferPool::new(config.min_size(), 32);
    let pipeline = Pipeline::new_with_pool(config, pool.clone())?
        .with_config(PipelineConfig::default());

    let chunks = pipeline.file_chunks(file)?;

    for (i, record) in chunks.records.iter().enumerate() {
        println!(
            "Chunk {:>4}: offset={:>10}, len={:>8}, id={}",
            i + 1,
            record.start,
            record.length,
            record.id
        );
    }

    println!("\nTotal: {} chunks, {} bytes", chunks.len(), chunks.total_len());
    println!("Unique: {} chunks", chunks.index.len());
    if !chunks.is_empty() {
        println!("Average chunk size: {} bytes", chunks.total_len() / chunks.len() as u64);
    }
    println!("Composite: {}", chunks.composite_hex());

    let stats = pool.stats();
    println!(
        "\nBuffer pool: {} hits, {} misses, {} idle",
        stats.hits, stats.misses, stats.idle
    );

    Ok(())
}
