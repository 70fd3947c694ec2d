//! # Lookup Table Export
//!
//! Writes CRC lookup tables as comma-delimited text for inspection and
//! regeneration tooling. Entries are hex (`0x..`), 16 per row for 4- and
//! 8-bit tables and 8 per row for 32-bit tables.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use super::engine::{CrcTable, CRC32_TABLE, CRC4_TABLE, CRC8_TABLE};
use crate::error::Result;

/// Number of entries per row for a table of the given width
pub fn columns_for_width(width: u32) -> usize {
    if width > 8 {
        8
    } else {
        16
    }
}

/// Write a table as delimited text
pub fn write_table<W: Write>(table: &CrcTable, mut out: W) -> std::io::Result<()> {
    let columns = columns_for_width(table.params().width());

    for row in table.entries().chunks(columns) {
        let line = row
            .iter()
            .map(|entry| format!("{:#x}", entry))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(out, "{}", line)?;
    }

    out.flush()
}

/// Write the CRC-4, CRC-8 and CRC-32 tables into `dir`
///
/// # Returns
///
/// * `Result<Vec<PathBuf>>` - Paths of the files written
pub fn export_standard_tables<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(3);
    for (name, table) in [
        ("CRC4_LUT.csv", &CRC4_TABLE),
        ("CRC8_LUT.csv", &CRC8_TABLE),
        ("CRC32_LUT.csv", &CRC32_TABLE),
    ] {
        let path = dir.join(name);
        write_table(table, BufWriter::new(File::create(&path)?))?;
        info!("Wrote {}", path.display());
        written.push(path);
    }

    Ok(written)
}
