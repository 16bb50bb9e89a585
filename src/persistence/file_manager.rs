use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::term::ShardId;

/// Handle for one named artifact. Opening creates parent directories on
/// demand; `open_for_write` truncates.
pub struct FileDescriptor {
    path: PathBuf,
}

impl FileDescriptor {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn open_for_write(&self) -> Result<BufWriter<File>> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(BufWriter::new(File::create(&self.path)?))
    }

    pub fn open_for_read(&self) -> Result<BufReader<File>> {
        Ok(BufReader::new(File::open(&self.path)?))
    }

    pub fn delete(&self) -> Result<()> {
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

/// Generates parameterized artifact names under the configured
/// directories.
pub struct FileManager {
    intermediate_dir: PathBuf,
    index_dir: PathBuf,
}

impl FileManager {
    pub fn new(intermediate_dir: impl Into<PathBuf>, index_dir: impl Into<PathBuf>) -> Self {
        Self {
            intermediate_dir: intermediate_dir.into(),
            index_dir: index_dir.into(),
        }
    }

    /// Per-index posting-count histogram, binary.
    pub fn document_length_histogram(&self) -> FileDescriptor {
        FileDescriptor::new(self.intermediate_dir.join("DocumentLengthHistogram.bin"))
    }

    /// Per-shard cumulative term count curve, CSV.
    pub fn cumulative_term_counts(&self, shard: ShardId) -> FileDescriptor {
        FileDescriptor::new(
            self.intermediate_dir
                .join(format!("CumulativeTermCounts-{shard}.csv")),
        )
    }

    /// Per-shard document frequency table, CSV.
    pub fn doc_freq_table(&self, shard: ShardId) -> FileDescriptor {
        FileDescriptor::new(self.index_dir.join(format!("DocFreqTable-{shard}.csv")))
    }

    /// Per-shard indexed IDF table, binary.
    pub fn indexed_idf_table(&self, shard: ShardId) -> FileDescriptor {
        FileDescriptor::new(self.index_dir.join(format!("IndexedIdfTable-{shard}.bin")))
    }
}
