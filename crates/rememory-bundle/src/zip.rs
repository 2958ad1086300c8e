//! Bundle ZIP read/write helpers.
//!
//! All entries use Deflate and carry the seal instant as their
//! modification time, so bundle bytes are stable given stable inputs.

use std::io::{Cursor, Read, Write};

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// A file to be placed in (or read from) a bundle ZIP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub name: String,
    pub data: Vec<u8>,
}

/// Build a ZIP from entries, stamping every entry with `modified`.
pub fn write_zip(entries: &[ZipEntry], modified: DateTime<Utc>) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = ZipWriter::new(&mut cursor);

    let mtime = zip::DateTime::from_date_and_time(
        modified.year().clamp(1980, 2107) as u16,
        modified.month() as u8,
        modified.day() as u8,
        modified.hour() as u8,
        modified.minute() as u8,
        modified.second() as u8,
    )
    .map_err(|e| anyhow::anyhow!("zip timestamp out of range: {e}"))?;

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(mtime);

    for entry in entries {
        writer
            .start_file(entry.name.as_str(), options)
            .with_context(|| format!("creating zip entry {}", entry.name))?;
        writer
            .write_all(&entry.data)
            .with_context(|| format!("writing zip entry {}", entry.name))?;
    }

    writer.finish().context("finalizing zip")?;
    Ok(cursor.into_inner())
}

/// Read all regular-file entries from a ZIP.
pub fn read_zip(bytes: &[u8]) -> Result<Vec<ZipEntry>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("opening zip")?;
    let mut entries = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).context("reading zip entry")?;
        if !file.is_file() {
            continue;
        }
        let name = file.name().to_owned();
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)
            .with_context(|| format!("reading zip entry {name}"))?;
        entries.push(ZipEntry { name, data });
    }

    Ok(entries)
}

/// Find a single entry by exact name.
pub fn find_entry<'a>(entries: &'a [ZipEntry], name: &str) -> Option<&'a ZipEntry> {
    entries.iter().find(|e| e.name == name)
}
