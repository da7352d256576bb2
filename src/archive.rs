// archive.rs - In-memory zip bundle for multi-file batches

use std::io::{Cursor, Write};

use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;

/// Entries in insertion order. A repeated name replaces the earlier entry
/// in place, so colliding output names keep the last payload.
#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => {
                debug!(%name, "replacing archive entry with the same name");
                entry.1 = data;
            }
            None => self.entries.push((name, data)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, data) in &self.entries {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(data)?;
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn duplicate_names_keep_last_payload() {
        let mut archive = ArchiveBuilder::new();
        archive.insert("a-opt.png", vec![1]);
        archive.insert("b-opt.png", vec![2]);
        archive.insert("a-opt.png", vec![3, 3]);

        assert_eq!(archive.len(), 2);
        assert_eq!(archive.names().collect::<Vec<_>>(), ["a-opt.png", "b-opt.png"]);

        let bytes = archive.finish().unwrap();
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(zip.len(), 2);

        let mut contents = Vec::new();
        zip.by_name("a-opt.png").unwrap().read_to_end(&mut contents).unwrap();
        assert_eq!(contents, [3, 3]);
    }

    #[test]
    fn empty_archive_is_still_valid() {
        let bytes = ArchiveBuilder::new().finish().unwrap();
        let zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(zip.len(), 0);
    }
}
