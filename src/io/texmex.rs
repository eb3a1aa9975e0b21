//! Readers for the TEXMEX benchmark's little-endian vector formats
//! (`.fvecs`, `.ivecs`, `.bvecs`), used to load training/base/query sets
//! and ground-truth neighbor ids.
//!
//! Every record is a 4-byte little-endian signed int giving the record's
//! dimension, followed by that many components. The dimension must be
//! constant across a file; a mismatch is [`ErrorCode::MalformedFile`].

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, ErrorCode, Result};
use crate::vector::Vector;

/// The three TEXMEX container variants, distinguished by component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    /// 32-bit IEEE-754 float components.
    Fvecs,
    /// 32-bit signed int components (used for ground-truth neighbor ids).
    Ivecs,
    /// 8-bit unsigned byte components.
    Bvecs,
}

/// Determines the dataset format from a file's extension.
pub fn format_from_extension(path: &Path) -> Result<DatasetFormat> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("fvecs") => Ok(DatasetFormat::Fvecs),
        Some("ivecs") => Ok(DatasetFormat::Ivecs),
        Some("bvecs") => Ok(DatasetFormat::Bvecs),
        _ => Err(Error::new(
            ErrorCode::MalformedFile,
            format!("unrecognized dataset extension: {}", path.display()),
        )),
    }
}

/// Reads a `.fvecs` or `.bvecs` file (whichever the extension names) into
/// dense float vectors, suitable for training sets, base sets, and query
/// sets.
pub fn read_vector_dataset(path: impl AsRef<Path>) -> Result<Vec<Vector>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    match format_from_extension(path)? {
        DatasetFormat::Fvecs => read_fvecs(&mut reader),
        DatasetFormat::Bvecs => read_bvecs(&mut reader),
        DatasetFormat::Ivecs => Err(Error::new(
            ErrorCode::MalformedFile,
            ".ivecs files hold integer ground-truth ids, not vectors",
        )),
    }
}

/// Reads a `.ivecs` file into per-query ground-truth neighbor id lists.
pub fn read_ground_truth(path: impl AsRef<Path>) -> Result<Vec<Vec<i32>>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    match format_from_extension(path)? {
        DatasetFormat::Ivecs => read_ivecs(&mut reader),
        _ => Err(Error::new(
            ErrorCode::MalformedFile,
            "ground truth must be read from a .ivecs file",
        )),
    }
}

fn read_fvecs<R: Read>(reader: &mut R) -> Result<Vec<Vector>> {
    let mut vectors = Vec::new();
    let mut dimension = None;

    while let Some(d) = read_dimension_prefix(reader)? {
        check_dimension(&mut dimension, d)?;

        let mut components = Vec::with_capacity(d);
        for _ in 0..d {
            components.push(reader.read_f32::<LittleEndian>()?);
        }
        vectors.push(Vector(components));
    }

    Ok(vectors)
}

fn read_bvecs<R: Read>(reader: &mut R) -> Result<Vec<Vector>> {
    let mut vectors = Vec::new();
    let mut dimension = None;

    while let Some(d) = read_dimension_prefix(reader)? {
        check_dimension(&mut dimension, d)?;

        let mut components = Vec::with_capacity(d);
        for _ in 0..d {
            components.push(reader.read_u8()? as f32);
        }
        vectors.push(Vector(components));
    }

    Ok(vectors)
}

fn read_ivecs<R: Read>(reader: &mut R) -> Result<Vec<Vec<i32>>> {
    let mut rows = Vec::new();
    let mut dimension = None;

    while let Some(d) = read_dimension_prefix(reader)? {
        check_dimension(&mut dimension, d)?;

        let mut components = Vec::with_capacity(d);
        for _ in 0..d {
            components.push(reader.read_i32::<LittleEndian>()?);
        }
        rows.push(components);
    }

    Ok(rows)
}

/// Reads the 4-byte dimension prefix of the next record, or `None` at a
/// clean end of file (no bytes left before the prefix).
fn read_dimension_prefix<R: Read>(reader: &mut R) -> Result<Option<usize>> {
    match reader.read_i32::<LittleEndian>() {
        Ok(d) => Ok(Some(d as usize)),
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn check_dimension(expected: &mut Option<usize>, actual: usize) -> Result<()> {
    match expected {
        Some(d) if *d != actual => Err(Error::new(
            ErrorCode::MalformedFile,
            format!("record dimension {actual} does not match file dimension {d}"),
        )),
        Some(_) => Ok(()),
        None => {
            *expected = Some(actual);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn fvecs_bytes(rows: &[Vec<f32>]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for row in rows {
            bytes.extend_from_slice(&(row.len() as i32).to_le_bytes());
            for value in row {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        bytes
    }

    #[test]
    fn reads_fvecs_records() {
        let bytes = fvecs_bytes(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let mut cursor = Cursor::new(bytes);
        let vectors = read_fvecs(&mut cursor).unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].as_slice(), &[1.0, 2.0, 3.0]);
        assert_eq!(vectors[1].as_slice(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn rejects_inconsistent_dimension() {
        let bytes = fvecs_bytes(&[vec![1.0, 2.0], vec![3.0, 4.0, 5.0]]);
        let mut cursor = Cursor::new(bytes);
        assert!(read_fvecs(&mut cursor).is_err());
    }

    #[test]
    fn reads_bvecs_records_as_floats() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.push(10);
        bytes.push(20);

        let mut cursor = Cursor::new(bytes);
        let vectors = read_bvecs(&mut cursor).unwrap();
        assert_eq!(vectors[0].as_slice(), &[10.0, 20.0]);
    }

    #[test]
    fn reads_ivecs_ground_truth_rows() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&3i32.to_le_bytes());
        for value in [7i32, 2, 9] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        let mut cursor = Cursor::new(bytes);
        let rows = read_ivecs(&mut cursor).unwrap();
        assert_eq!(rows, vec![vec![7, 2, 9]]);
    }

    #[test]
    fn format_from_extension_dispatches_by_suffix() {
        assert_eq!(format_from_extension(Path::new("x.fvecs")).unwrap(), DatasetFormat::Fvecs);
        assert_eq!(format_from_extension(Path::new("x.ivecs")).unwrap(), DatasetFormat::Ivecs);
        assert_eq!(format_from_extension(Path::new("x.bvecs")).unwrap(), DatasetFormat::Bvecs);
        assert!(format_from_extension(Path::new("x.txt")).is_err());
    }

    #[test]
    fn reads_a_real_fvecs_file_from_disk() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.fvecs");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&fvecs_bytes(&[vec![1.0, 2.0], vec![3.0, 4.0]])).unwrap();
        drop(file);

        let vectors = read_vector_dataset(&path).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1].as_slice(), &[3.0, 4.0]);
    }
}
