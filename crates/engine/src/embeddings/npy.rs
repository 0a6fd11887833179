//! Reader for the `.npy` float32 matrices shipped with the embedding assets.
//!
//! Only the subset produced by the offline export is accepted: format
//! versions 1 through 3, `'<f4'` little-endian floats, C order, 2-D shape.

use smartfind_core::LoadError;
use std::path::Path;

const MAGIC: &[u8] = b"\x93NUMPY";

/// Dense row-major `f32` matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Build a matrix from a flat row-major buffer.
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, LoadError> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(LoadError::Corrupt(format!(
                "matrix buffer of {} values does not match shape ({}, {})",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a matrix from rows that must all share one length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, LoadError> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let count = rows.len();
        let mut data = Vec::with_capacity(count * cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != cols {
                return Err(LoadError::Corrupt(format!(
                    "row {} has dimension {}, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
            data.extend(row);
        }
        Self::new(count, cols, data)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Borrow row `index`, if in range.
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.cols;
        Some(&self.data[start..start + self.cols])
    }

    /// Iterate rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        (0..self.rows).filter_map(move |i| self.row(i))
    }
}

/// Read a `.npy` file into a [`Matrix`].
pub fn read_matrix(path: &Path) -> Result<Matrix, LoadError> {
    if !path.is_file() {
        return Err(LoadError::MissingAsset {
            path: path.to_path_buf(),
        });
    }

    let bytes = std::fs::read(path)
        .map_err(|e| LoadError::Corrupt(format!("failed to read {:?}: {}", path, e)))?;

    parse_matrix(&bytes).map_err(|e| match e {
        LoadError::Corrupt(msg) => LoadError::Corrupt(format!("{:?}: {}", path, msg)),
        other => other,
    })
}

/// Parse `.npy` bytes into a [`Matrix`].
pub fn parse_matrix(bytes: &[u8]) -> Result<Matrix, LoadError> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(LoadError::Corrupt("not an .npy file".to_string()));
    }

    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(LoadError::Corrupt("truncated .npy header".to_string()));
            }
            (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            )
        }
        v => {
            return Err(LoadError::Corrupt(format!(
                "unsupported .npy format version {}",
                v
            )))
        }
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(LoadError::Corrupt("truncated .npy header".to_string()));
    }

    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| LoadError::Corrupt("non-text .npy header".to_string()))?;

    let descr = header_value(header, "descr")
        .and_then(quoted)
        .ok_or_else(|| LoadError::Corrupt("missing 'descr' in .npy header".to_string()))?;
    if descr != "<f4" {
        return Err(LoadError::Corrupt(format!(
            "unsupported dtype '{}', expected '<f4'",
            descr
        )));
    }

    let fortran = header_value(header, "fortran_order")
        .ok_or_else(|| LoadError::Corrupt("missing 'fortran_order' in .npy header".to_string()))?;
    if fortran.starts_with("True") {
        return Err(LoadError::Corrupt(
            "Fortran-ordered matrices are not supported".to_string(),
        ));
    }

    let shape = header_value(header, "shape")
        .and_then(parse_shape)
        .ok_or_else(|| LoadError::Corrupt("missing or invalid 'shape' in .npy header".to_string()))?;
    let (rows, cols) = match shape.as_slice() {
        [rows, cols] => (*rows, *cols),
        other => {
            return Err(LoadError::Corrupt(format!(
                "expected a 2-D matrix, found {} dimensions",
                other.len()
            )))
        }
    };

    let payload = &bytes[data_start..];
    let expected = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| LoadError::Corrupt("matrix shape overflows".to_string()))?;
    if payload.len() != expected {
        return Err(LoadError::Corrupt(format!(
            "payload is {} bytes, shape ({}, {}) needs {}",
            payload.len(),
            rows,
            cols,
            expected
        )));
    }

    let data = payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Matrix::new(rows, cols, data)
}

/// Encode a matrix as a version 1.0 `.npy` file.
#[cfg(test)]
pub(crate) fn encode_matrix(matrix: &Matrix) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        matrix.rows, matrix.cols
    );
    // Magic + version + length prefix + header + newline is padded to 64 bytes
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let mut bytes = Vec::with_capacity(unpadded + padding + matrix.data.len() * 4);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&[1, 0]);
    bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    for value in &matrix.data {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Return the raw text following `'key':` in a Python dict literal.
fn header_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("'{}'", key);
    let start = header.find(&needle)? + needle.len();
    let rest = header[start..].trim_start();
    let rest = rest.strip_prefix(':')?;
    Some(rest.trim_start())
}

fn quoted(value: &str) -> Option<&str> {
    let quote = value.chars().next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let inner = &value[1..];
    let end = inner.find(quote)?;
    Some(&inner[..end])
}

fn parse_shape(value: &str) -> Option<Vec<usize>> {
    let inner = value.strip_prefix('(')?;
    let end = inner.find(')')?;
    inner[..end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('L').parse::<usize>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_encode_then_parse() {
        let matrix = Matrix::from_rows(vec![vec![1.0, 2.0, 3.0], vec![-1.5, 0.0, 4.25]]).unwrap();
        let bytes = encode_matrix(&matrix);

        // Header block is aligned so the payload starts on a 64-byte boundary
        assert_eq!((bytes.len() - 6 * 4) % 64, 0);

        let parsed = parse_matrix(&bytes).unwrap();
        assert_eq!(parsed.rows(), 2);
        assert_eq!(parsed.cols(), 3);
        assert_eq!(parsed.row(1), Some(&[-1.5, 0.0, 4.25][..]));
    }

    #[test]
    fn test_rejects_float64() {
        let matrix = Matrix::from_rows(vec![vec![1.0, 2.0]]).unwrap();
        let mut bytes = encode_matrix(&matrix);
        let pos = bytes.windows(3).position(|w| w == b"<f4").unwrap();
        bytes[pos + 2] = b'8';

        match parse_matrix(&bytes) {
            Err(LoadError::Corrupt(msg)) => assert!(msg.contains("<f8")),
            other => panic!("expected dtype rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_truncated_payload() {
        let matrix = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let mut bytes = encode_matrix(&matrix);
        bytes.truncate(bytes.len() - 4);
        assert!(matches!(parse_matrix(&bytes), Err(LoadError::Corrupt(_))));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            parse_matrix(b"definitely not numpy"),
            Err(LoadError::Corrupt(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = read_matrix(&temp.path().join("word_vectors.npy"));
        assert!(matches!(result, Err(LoadError::MissingAsset { .. })));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(result, Err(LoadError::Corrupt(_))));
    }

    #[test]
    fn test_parse_shape() {
        assert_eq!(parse_shape("(3, 50), }"), Some(vec![3, 50]));
        assert_eq!(parse_shape("(7,), }"), Some(vec![7]));
        assert_eq!(parse_shape("nope"), None);
    }
}
