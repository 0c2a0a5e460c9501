use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::LoadError;
use crate::record::Dataset;

/// Write a parsed dataset as a gzip-compressed bincode snapshot (`.bin.gz`).
///
/// Reloading a snapshot skips text decoding and date parsing entirely.
pub fn save_dataset(dataset: &Dataset, filename: impl AsRef<Path>) -> std::io::Result<()> {
    let file = File::create(filename)?;
    write_snapshot(dataset, file)
}

pub fn dataset_to_bytes(dataset: &Dataset) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_snapshot(dataset, &mut buffer)?;
    Ok(buffer)
}

fn write_snapshot<W: Write>(dataset: &Dataset, sink: W) -> std::io::Result<()> {
    let encoder = GzEncoder::new(sink, Compression::default());
    let mut writer = BufWriter::new(encoder);

    serialize_into(&mut writer, dataset)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    let encoder = writer.into_inner().map_err(|e| e.into_error())?;
    encoder.finish()?;
    Ok(())
}

pub fn load_snapshot(filename: impl AsRef<Path>) -> Result<Dataset, LoadError> {
    let file = File::open(filename)?;
    read_snapshot(file)
}

pub fn dataset_from_bytes(bytes: &[u8]) -> Result<Dataset, LoadError> {
    read_snapshot(bytes)
}

fn read_snapshot<R: std::io::Read>(source: R) -> Result<Dataset, LoadError> {
    let decoder = GzDecoder::new(source);
    let mut reader = BufReader::new(decoder);

    deserialize_from(&mut reader).map_err(|e| LoadError::Snapshot(e.to_string()))
}
