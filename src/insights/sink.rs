use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use tracing::debug;

use crate::error::Error;

/// Where the insights go. The aggregator only talks to this, never to the filesystem.
pub trait OutputSink {
    fn write_document(&mut self, name: &str, doc: &serde_json::Value) -> Result<(), Error>;
    fn write_table(&mut self, name: &str, header: &[&str], rows: &[Vec<String>]) -> Result<(), Error>;
    fn write_image(&mut self, name: &str, image: &RgbImage) -> Result<(), Error>;
}

/// Writes every artifact as a file under one directory, created on first write.
#[derive(Debug, Clone)]
pub struct FsSink {
    dir: PathBuf,
}

impl FsSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> Result<PathBuf, Error> {
        fs::create_dir_all(&self.dir)?;
        Ok(self.dir.join(name))
    }
}

impl OutputSink for FsSink {
    fn write_document(&mut self, name: &str, doc: &serde_json::Value) -> Result<(), Error> {
        let path = self.path(name)?;
        let file = fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, doc)?;
        debug!("wrote {}", path.display());
        Ok(())
    }

    fn write_table(&mut self, name: &str, header: &[&str], rows: &[Vec<String>]) -> Result<(), Error> {
        let path = self.path(name)?;
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(header)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        debug!("wrote {} ({} rows)", path.display(), rows.len());
        Ok(())
    }

    fn write_image(&mut self, name: &str, image: &RgbImage) -> Result<(), Error> {
        let path = self.path(name)?;
        image.save_with_format(&path, ImageFormat::Png)?;
        debug!("wrote {}", path.display());
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub documents: BTreeMap<String, serde_json::Value>,
    pub tables: BTreeMap<String, Table>,
    pub images: BTreeMap<String, RgbImage>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for MemorySink {
    fn write_document(&mut self, name: &str, doc: &serde_json::Value) -> Result<(), Error> {
        self.documents.insert(name.to_string(), doc.clone());
        Ok(())
    }

    fn write_table(&mut self, name: &str, header: &[&str], rows: &[Vec<String>]) -> Result<(), Error> {
        let table = Table {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: rows.to_vec(),
        };

        self.tables.insert(name.to_string(), table);
        Ok(())
    }

    fn write_image(&mut self, name: &str, image: &RgbImage) -> Result<(), Error> {
        self.images.insert(name.to_string(), image.clone());
        Ok(())
    }
}
