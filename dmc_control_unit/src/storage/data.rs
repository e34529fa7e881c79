//! Calibration data loaded once at startup.
//!
//! Every blob that is absent or has the wrong size is replaced by zeros
//! and recorded in [`CalibrationData::missing`]; loading itself never
//! fails. A zero response matrix makes the estimator emit zero fields and a
//! zero control matrix makes EFC a no-op, so the loop keeps running with
//! whatever was available.

use dmc_common::consts::{DEFAULT_INTENSITY_SCALE, NPROBE};
use dmc_common::dm::ActuatorCommand;
use ndarray::Array2;
use tracing::{info, warn};

use super::CalibrationStorage;
use super::blob::{self, decode_f64, decode_u32};
use crate::config::Dims;
use crate::error::{CalibrationDataMissing, StartupError, StorageError};
use crate::model::ActuatorModel;

/// Intensity normalization for one band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandScale {
    pub scale: f64,
    /// True when taken from the measured reference maximum.
    pub measured: bool,
}

/// All calibration inputs of the dark-hole loop.
#[derive(Debug)]
pub struct CalibrationData {
    pub dims: Dims,
    /// `NPROBE` length-delta patterns, `nact` entries each.
    pub probes: Vec<Vec<f64>>,
    /// Real-part response matrices, `[npix][nband]` row-major.
    pub rmatrix: [Vec<f64>; 2],
    /// Imaginary-part response matrices, `[npix][nband]` row-major.
    pub imatrix: [Vec<f64>; 2],
    /// `[2·npix·nband][nactive]` control matrix.
    pub efc_matrix: Array2<f64>,
    /// Full actuator index of each active actuator; `None` when unmapped.
    pub active2full: Vec<Option<usize>>,
    pub model: ActuatorModel,
    /// Persisted flat, if one was stored.
    pub flat: Option<ActuatorCommand>,
    /// Per-band normalization.
    pub scales: Vec<BandScale>,
    /// Blobs that were replaced by zeros.
    pub missing: Vec<CalibrationDataMissing>,
}

impl CalibrationData {
    /// Load every blob for `dims`.
    pub fn load(storage: &dyn CalibrationStorage, dims: Dims) -> Self {
        let mut missing = Vec::new();
        let mut fetch_f64 = |name: &'static str, len: usize| -> Option<Vec<f64>> {
            match storage
                .read_blob(name)
                .and_then(|bytes| decode_f64(name, &bytes, len))
            {
                Ok(values) => Some(values),
                Err(reason) => {
                    warn!(blob = name, error = %reason, "CalibrationDataMissing: using zeros");
                    missing.push(CalibrationDataMissing { blob: name, reason });
                    None
                }
            }
        };

        let nact = dims.nact;
        let rm_len = dims.npix * dims.nband;

        let probes_flat = fetch_f64(blob::HOWFS_PROBES, NPROBE * nact)
            .unwrap_or_else(|| vec![0.0; NPROBE * nact]);
        let probes = probes_flat.chunks(nact).map(<[f64]>::to_vec).collect();

        let mut matrix = |name| fetch_f64(name, rm_len).unwrap_or_else(|| vec![0.0; rm_len]);
        let rmatrix = [matrix(blob::HOWFS_RMATRIX0), matrix(blob::HOWFS_RMATRIX1)];
        let imatrix = [matrix(blob::HOWFS_IMATRIX0), matrix(blob::HOWFS_IMATRIX1)];

        let efc_len = dims.field_len() * dims.nactive;
        let efc_matrix = fetch_f64(blob::EFC_MATRIX, efc_len)
            .and_then(|v| Array2::from_shape_vec((dims.field_len(), dims.nactive), v).ok())
            .unwrap_or_else(|| Array2::zeros((dims.field_len(), dims.nactive)));

        let cal_a = fetch_f64(blob::DM_CAL_A, nact).unwrap_or_else(|| vec![0.0; nact]);
        let cal_b = fetch_f64(blob::DM_CAL_B, nact).unwrap_or_else(|| vec![0.0; nact]);
        let model = ActuatorModel::new(cal_a, cal_b);

        let flat = fetch_f64(blob::DM_FLAT, nact).map(|values| {
            let mut cmd = ActuatorCommand::zeroed();
            cmd.act[..nact].copy_from_slice(&values);
            cmd
        });

        let refmax = fetch_f64(blob::SCI_REFMAX, dims.nband);
        let scales = (0..dims.nband)
            .map(|b| match refmax.as_ref().map(|r| r[b]) {
                Some(s) if s > 0.0 && s.is_finite() => BandScale {
                    scale: s,
                    measured: true,
                },
                _ => BandScale {
                    scale: DEFAULT_INTENSITY_SCALE,
                    measured: false,
                },
            })
            .collect::<Vec<_>>();
        for (band, s) in scales.iter().enumerate() {
            info!(
                band,
                scale = s.scale,
                source = if s.measured { "sci_refmax" } else { "default" },
                "intensity scale"
            );
        }

        let active2full = match storage
            .read_blob(blob::EFC_ACTIVE2FULL)
            .and_then(|bytes| decode_u32(blob::EFC_ACTIVE2FULL, &bytes, dims.nactive))
        {
            Ok(map) => map
                .into_iter()
                .enumerate()
                .map(|(active, full)| {
                    let full = full as usize;
                    if full < nact {
                        Some(full)
                    } else {
                        warn!(active, full, nact, "active actuator maps outside the mirror; dropped");
                        None
                    }
                })
                .collect(),
            Err(reason) => {
                warn!(blob = blob::EFC_ACTIVE2FULL, error = %reason, "CalibrationDataMissing: no active actuators mapped");
                missing.push(CalibrationDataMissing {
                    blob: blob::EFC_ACTIVE2FULL,
                    reason,
                });
                vec![None; dims.nactive]
            }
        };

        if missing.is_empty() {
            info!("calibration data complete");
        } else {
            warn!(missing = missing.len(), "calibration data incomplete");
        }

        Self {
            dims,
            probes,
            rmatrix,
            imatrix,
            efc_matrix,
            active2full,
            model,
            flat,
            scales,
            missing,
        }
    }

    /// Returns true when `blob` was replaced by zeros.
    pub fn is_missing(&self, blob: &str) -> bool {
        self.missing.iter().any(|m| m.blob == blob)
    }
}

/// Reject calibration that can never match the configured dimensions.
///
/// A control matrix whose byte length is not a whole number of
/// `nactive`-wide rows was built for a different actuator set. Absent
/// blobs pass; they are handled at load time.
pub fn validate_structure(storage: &dyn CalibrationStorage, dims: Dims) -> Result<(), StartupError> {
    match storage.read_blob(blob::EFC_MATRIX) {
        Ok(bytes) => {
            let row_bytes = dims.nactive * 8;
            if bytes.is_empty() || bytes.len() % row_bytes != 0 {
                return Err(StartupError::Structure(format!(
                    "{} has {} bytes, not a multiple of nactive ({}) columns",
                    blob::EFC_MATRIX,
                    bytes.len(),
                    dims.nactive
                )));
            }
            Ok(())
        }
        Err(StorageError::NotFound { .. }) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn dims() -> Dims {
        Dims {
            nact: 6,
            npix: 2,
            nband: 1,
            nactive: 3,
        }
    }

    #[test]
    fn empty_storage_loads_zeros() {
        let data = CalibrationData::load(&MemoryStorage::new(), dims());
        assert_eq!(data.probes.len(), NPROBE);
        assert!(data.probes.iter().all(|p| p.iter().all(|v| *v == 0.0)));
        assert_eq!(data.efc_matrix.dim(), (4, 3));
        assert!(data.flat.is_none());
        assert_eq!(data.active2full, vec![None; 3]);
        assert_eq!(data.scales[0].scale, DEFAULT_INTENSITY_SCALE);
        assert!(!data.scales[0].measured);
        assert!(data.is_missing(blob::EFC_MATRIX));
        assert!(data.is_missing(blob::DM_FLAT));
    }

    #[test]
    fn size_mismatch_is_zeroed() {
        let mut storage = MemoryStorage::new();
        storage.insert_f64(blob::DM_CAL_B, &[1.0; 5]);
        let data = CalibrationData::load(&storage, dims());
        assert!(data.is_missing(blob::DM_CAL_B));
        assert_eq!(data.model.voltage_after(0, 1.0, 1.0), None);
    }

    #[test]
    fn measured_scale_preferred() {
        let mut storage = MemoryStorage::new();
        storage.insert_f64(blob::SCI_REFMAX, &[2500.0]);
        let data = CalibrationData::load(&storage, dims());
        assert_eq!(
            data.scales[0],
            BandScale {
                scale: 2500.0,
                measured: true
            }
        );
    }

    #[test]
    fn out_of_range_map_entries_are_dropped() {
        let mut storage = MemoryStorage::new();
        storage.insert_u32(blob::EFC_ACTIVE2FULL, &[0, 5, 6]);
        let data = CalibrationData::load(&storage, dims());
        assert_eq!(data.active2full, vec![Some(0), Some(5), None]);
    }

    #[test]
    fn flat_and_matrix_load() {
        let mut storage = MemoryStorage::new();
        storage.insert_f64(blob::DM_FLAT, &[10.0, 20.0, 30.0, 40.0, 50.0, 60.0]);
        let m: Vec<f64> = (0..12).map(f64::from).collect();
        storage.insert_f64(blob::EFC_MATRIX, &m);
        let data = CalibrationData::load(&storage, dims());
        let flat = data.flat.unwrap();
        assert_eq!(flat.act[5], 60.0);
        assert_eq!(flat.act[6], 0.0);
        assert_eq!(data.efc_matrix[[1, 2]], 5.0);
    }

    #[test]
    fn structural_check() {
        let mut storage = MemoryStorage::new();
        assert!(validate_structure(&storage, dims()).is_ok());
        storage.insert_f64(blob::EFC_MATRIX, &[0.0; 7]);
        assert!(matches!(
            validate_structure(&storage, dims()),
            Err(StartupError::Structure(_))
        ));
        storage.insert_f64(blob::EFC_MATRIX, &[0.0; 9]);
        assert!(validate_structure(&storage, dims()).is_ok());
    }
}
