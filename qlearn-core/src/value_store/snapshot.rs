//! On-disk format of [`ValueStore`](super::ValueStore).
//!
//! A snapshot is a bincode-encoded header (magic bytes and format version)
//! followed by the entries sorted by key.
use crate::error::QlError;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fs::{self, File},
    io::{BufReader, BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};

const MAGIC: [u8; 4] = *b"QLVS";
const VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Header {
    magic: [u8; 4],
    version: u32,
}

pub(super) struct Snapshot;

impl Snapshot {
    pub(super) fn read(file: File, path: &Path) -> Result<HashMap<String, f64>, QlError> {
        let corrupt = |source| QlError::CorruptStore {
            path: path.to_path_buf(),
            source,
        };
        // A short read is a truncated file; other I/O errors are not about the content.
        let decode = |e: bincode::Error| match *e {
            bincode::ErrorKind::Io(source) if source.kind() != ErrorKind::UnexpectedEof => {
                QlError::StoreIo {
                    path: path.to_path_buf(),
                    source,
                }
            }
            other => corrupt(Box::new(other)),
        };
        let mut rdr = BufReader::new(file);
        let header: Header = bincode::deserialize_from(&mut rdr).map_err(decode)?;
        if header.magic != MAGIC {
            return Err(corrupt(Box::new(bincode::ErrorKind::Custom(
                "missing value store magic bytes".to_string(),
            ))));
        }
        if header.version != VERSION {
            return Err(QlError::UnsupportedStoreVersion {
                path: path.to_path_buf(),
                version: header.version,
            });
        }
        let entries: BTreeMap<String, f64> =
            bincode::deserialize_from(&mut rdr).map_err(decode)?;
        Ok(entries.into_iter().collect())
    }

    /// Writes to a sibling temporary file, then renames it over `path`.
    pub(super) fn write(table: &HashMap<String, f64>, path: &Path) -> Result<(), QlError> {
        let io = |source| QlError::StoreIo {
            path: path.to_path_buf(),
            source,
        };
        let tmp = tmp_path(path);
        let entries: BTreeMap<&str, f64> = table.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        let header = Header {
            magic: MAGIC,
            version: VERSION,
        };

        let file = File::create(&tmp).map_err(io)?;
        let mut wtr = BufWriter::new(file);
        let encode = |e: bincode::Error| match *e {
            bincode::ErrorKind::Io(source) => io(source),
            other => QlError::CorruptStore {
                path: path.to_path_buf(),
                source: Box::new(other),
            },
        };
        bincode::serialize_into(&mut wtr, &header).map_err(encode)?;
        bincode::serialize_into(&mut wtr, &entries).map_err(encode)?;
        wtr.flush().map_err(io)?;
        let file = wtr.into_inner().map_err(|e| io(e.into_error()))?;
        file.sync_all().map_err(io)?;
        drop(file);

        fs::rename(&tmp, path).map_err(io)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
