/// Minimal NumPy `.npy` codec for little-endian `float32` matrices
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

const MAGIC: &[u8] = b"\x93NUMPY";
/// Magic, version and header length field of a v1.0 file
const PREAMBLE_LEN: usize = 10;
const ALIGNMENT: usize = 64;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NpyError {
    #[error("not an .npy file")]
    BadMagic,

    #[error("unsupported .npy version {0}.{1}")]
    UnsupportedVersion(u8, u8),

    #[error("malformed header: {0}")]
    Header(String),

    #[error("unsupported dtype {0}, expected <f4")]
    Dtype(String),

    #[error("Fortran-ordered arrays are not supported")]
    FortranOrder,

    #[error("data section holds {actual} bytes, shape needs {expected}")]
    Truncated { expected: usize, actual: usize },
}

/// A decoded row-major matrix
#[derive(Debug, Clone, PartialEq)]
pub struct NpyMatrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

struct HeaderPatterns {
    descr: Regex,
    fortran_order: Regex,
    shape: Regex,
}

impl HeaderPatterns {
    fn instance() -> &'static Self {
        static INSTANCE: OnceLock<HeaderPatterns> = OnceLock::new();
        INSTANCE.get_or_init(|| HeaderPatterns {
            descr: Regex::new(r"'descr'\s*:\s*'([^']*)'").expect("descr pattern is valid"),
            fortran_order: Regex::new(r"'fortran_order'\s*:\s*(True|False)")
                .expect("fortran_order pattern is valid"),
            shape: Regex::new(r"'shape'\s*:\s*\(\s*(\d+)\s*,\s*(\d+)\s*,?\s*\)")
                .expect("shape pattern is valid"),
        })
    }
}

/// Encode an `rows x cols` matrix as a v1.0 `.npy` file
pub fn encode(rows: usize, cols: usize, data: &[f32]) -> Vec<u8> {
    let dict = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        rows, cols
    );
    // pad with spaces so the data starts on an aligned offset; the header ends in '\n'
    let unpadded = PREAMBLE_LEN + dict.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    let header_len = dict.len() + padding + 1;

    let mut bytes = Vec::with_capacity(PREAMBLE_LEN + header_len + data.len() * 4);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&[1, 0]);
    bytes.extend_from_slice(&(header_len as u16).to_le_bytes());
    bytes.extend_from_slice(dict.as_bytes());
    bytes.extend(std::iter::repeat(b' ').take(padding));
    bytes.push(b'\n');
    for value in data {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode a 2-D `<f4` C-ordered `.npy` file (versions 1.0 and 2.0)
pub fn decode(bytes: &[u8]) -> Result<NpyMatrix, NpyError> {
    if bytes.len() < PREAMBLE_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(NpyError::BadMagic);
    }

    let (major, minor) = (bytes[6], bytes[7]);
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 if bytes.len() >= 12 => (
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            12,
        ),
        _ => return Err(NpyError::UnsupportedVersion(major, minor)),
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(NpyError::Header("header extends past end of file".to_string()));
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|e| NpyError::Header(e.to_string()))?;

    let patterns = HeaderPatterns::instance();
    let descr = patterns
        .descr
        .captures(header)
        .map(|c| c[1].to_string())
        .ok_or_else(|| NpyError::Header("missing descr".to_string()))?;
    if descr != "<f4" {
        return Err(NpyError::Dtype(descr));
    }

    let fortran = patterns
        .fortran_order
        .captures(header)
        .map(|c| &c[1] == "True")
        .ok_or_else(|| NpyError::Header("missing fortran_order".to_string()))?;
    if fortran {
        return Err(NpyError::FortranOrder);
    }

    let shape = patterns
        .shape
        .captures(header)
        .ok_or_else(|| NpyError::Header("shape is not two-dimensional".to_string()))?;
    let parse_dim = |i: usize| {
        shape[i]
            .parse::<usize>()
            .map_err(|e| NpyError::Header(e.to_string()))
    };
    let (rows, cols) = (parse_dim(1)?, parse_dim(2)?);

    let payload = &bytes[data_start..];
    let expected = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| NpyError::Header("shape overflows".to_string()))?;
    if payload.len() != expected {
        return Err(NpyError::Truncated {
            expected,
            actual: payload.len(),
        });
    }

    let data = payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok(NpyMatrix { rows, cols, data })
}
