//! Blob names and little-endian array codecs.

use crate::error::StorageError;

pub const HOWFS_PROBES: &str = "howfs_probes";
pub const HOWFS_RMATRIX0: &str = "howfs_rmatrix0";
pub const HOWFS_RMATRIX1: &str = "howfs_rmatrix1";
pub const HOWFS_IMATRIX0: &str = "howfs_imatrix0";
pub const HOWFS_IMATRIX1: &str = "howfs_imatrix1";
pub const EFC_MATRIX: &str = "efc_matrix";
pub const EFC_ACTIVE2FULL: &str = "efc_active2full";
pub const DM_CAL_A: &str = "dm_cal_a";
pub const DM_CAL_B: &str = "dm_cal_b";
pub const DM_FLAT: &str = "dm_flat";
pub const SCI_REFMAX: &str = "sci_refmax";

/// Decode exactly `len` little-endian `f64` values.
pub fn decode_f64(name: &str, bytes: &[u8], len: usize) -> Result<Vec<f64>, StorageError> {
    check_size(name, bytes, len * 8)?;
    let words: Vec<u64> = bytemuck::pod_collect_to_vec(bytes);
    Ok(words
        .into_iter()
        .map(|w| f64::from_bits(u64::from_le(w)))
        .collect())
}

/// Decode exactly `len` little-endian `u32` values.
pub fn decode_u32(name: &str, bytes: &[u8], len: usize) -> Result<Vec<u32>, StorageError> {
    check_size(name, bytes, len * 4)?;
    let words: Vec<u32> = bytemuck::pod_collect_to_vec(bytes);
    Ok(words.into_iter().map(u32::from_le).collect())
}

pub fn encode_f64(values: &[f64]) -> Vec<u8> {
    let words: Vec<u64> = values.iter().map(|v| v.to_bits().to_le()).collect();
    bytemuck::cast_slice(&words).to_vec()
}

pub fn encode_u32(values: &[u32]) -> Vec<u8> {
    let words: Vec<u32> = values.iter().map(|v| v.to_le()).collect();
    bytemuck::cast_slice(&words).to_vec()
}

fn check_size(name: &str, bytes: &[u8], expected: usize) -> Result<(), StorageError> {
    if bytes.len() != expected {
        return Err(StorageError::SizeMismatch {
            name: name.to_string(),
            expected,
            found: bytes.len(),
        });
    }
    Ok(())
}
