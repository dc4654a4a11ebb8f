//! Persistence of calibrated intrinsics.
//!
//! The document is JSON with four stable keys:
//!
//! ```json
//! {
//!   "image_width": 640,
//!   "image_height": 480,
//!   "camera_matrix": { "rows": 3, "cols": 3, "data": [fx, 0, cx, 0, fy, cy, 0, 0, 1] },
//!   "distortion_coefficients": { "rows": 1, "cols": 5, "data": [k1, k2, p1, p2, k3] }
//! }
//! ```
//!
//! Matrix data is row-major.

use crate::CalibError;
use lenscal_core::{IntrinsicModel, ModelError};
use log::info;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Relative tolerance of the read-back check.
const VERIFY_TOLERANCE: f64 = 1e-12;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("intrinsics file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{key} must be a {expected} matrix (got {rows}x{cols} with {len} values)")]
    Shape {
        key: &'static str,
        expected: &'static str,
        rows: usize,
        cols: usize,
        len: usize,
    },
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MatrixNode {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IntrinsicsDocument {
    image_width: u32,
    image_height: u32,
    camera_matrix: MatrixNode,
    distortion_coefficients: MatrixNode,
}

impl From<&IntrinsicModel> for IntrinsicsDocument {
    fn from(model: &IntrinsicModel) -> Self {
        let k = model.camera_matrix();
        let coeffs = model.distortion_coeffs().to_vec();
        Self {
            image_width: model.image_width(),
            image_height: model.image_height(),
            camera_matrix: MatrixNode {
                rows: 3,
                cols: 3,
                data: (0..3).flat_map(|r| (0..3).map(move |c| k[(r, c)])).collect(),
            },
            distortion_coefficients: MatrixNode {
                rows: 1,
                cols: coeffs.len(),
                data: coeffs,
            },
        }
    }
}

impl TryFrom<IntrinsicsDocument> for IntrinsicModel {
    type Error = StoreError;

    fn try_from(doc: IntrinsicsDocument) -> Result<Self, Self::Error> {
        let k = &doc.camera_matrix;
        if k.rows != 3 || k.cols != 3 || k.data.len() != 9 {
            return Err(StoreError::Shape {
                key: "camera_matrix",
                expected: "3x3",
                rows: k.rows,
                cols: k.cols,
                len: k.data.len(),
            });
        }
        let d = &doc.distortion_coefficients;
        // Row and column vectors are both accepted.
        if d.rows.min(d.cols) != 1 || d.rows * d.cols != d.data.len() {
            return Err(StoreError::Shape {
                key: "distortion_coefficients",
                expected: "1xN",
                rows: d.rows,
                cols: d.cols,
                len: d.data.len(),
            });
        }
        let camera_matrix = Matrix3::from_row_slice(&k.data);
        Ok(IntrinsicModel::new(
            doc.image_width,
            doc.image_height,
            camera_matrix,
            doc.distortion_coefficients.data,
        )?)
    }
}

/// Reads and writes an [`IntrinsicModel`] at a fixed path.
#[derive(Debug, Clone)]
pub struct IntrinsicsStore {
    path: PathBuf,
}

impl IntrinsicsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, model: &IntrinsicModel) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&IntrinsicsDocument::from(model))?;
        fs::write(&self.path, json).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn read(&self) -> Result<IntrinsicModel, StoreError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        let doc: IntrinsicsDocument = serde_json::from_str(&raw)?;
        IntrinsicModel::try_from(doc)
    }

    /// Write `model`, read it back and return the read-back copy.
    ///
    /// A read-back that does not reproduce `model` is a
    /// [`CalibError::SerializationMismatch`].
    pub fn write_verified(&self, model: &IntrinsicModel) -> Result<IntrinsicModel, CalibError> {
        self.write(model)?;
        let loaded = self.read()?;
        if !loaded.approx_eq(model, VERIFY_TOLERANCE) {
            return Err(CalibError::SerializationMismatch {
                path: self.path.clone(),
            });
        }
        info!(
            "read back {}: image {}x{}",
            self.path.display(),
            loaded.image_width(),
            loaded.image_height()
        );
        info!("camera matrix: {:?}", row_major(loaded.camera_matrix()));
        info!("distortion coefficients: {:?}", loaded.distortion_coeffs());
        Ok(loaded)
    }
}

fn row_major(k: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [k[(0, 0)], k[(0, 1)], k[(0, 2)]],
        [k[(1, 0)], k[(1, 1)], k[(1, 2)]],
        [k[(2, 0)], k[(2, 1)], k[(2, 2)]],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> IntrinsicModel {
        let k = Matrix3::new(812.25, 0.0, 319.5, 0.0, 809.125, 239.5, 0.0, 0.0, 1.0);
        IntrinsicModel::new(640, 480, k, vec![-0.2134, 0.0571, 0.0, 0.0, -0.0123]).unwrap()
    }

    #[test]
    fn document_uses_stable_keys() {
        let json = serde_json::to_value(IntrinsicsDocument::from(&model())).unwrap();
        assert_eq!(json["image_width"], 640);
        assert_eq!(json["image_height"], 480);
        assert_eq!(json["camera_matrix"]["rows"], 3);
        assert_eq!(json["camera_matrix"]["data"][2], 319.5);
        assert_eq!(json["camera_matrix"]["data"][4], 809.125);
        assert_eq!(json["distortion_coefficients"]["cols"], 5);
    }

    #[test]
    fn column_vector_distortion_is_accepted() {
        let doc = IntrinsicsDocument {
            distortion_coefficients: MatrixNode {
                rows: 5,
                cols: 1,
                data: vec![-0.2, 0.05, 0.0, 0.0, 0.0],
            },
            ..IntrinsicsDocument::from(&model())
        };
        let m = IntrinsicModel::try_from(doc).unwrap();
        assert_eq!(m.distortion_coeffs().len(), 5);
    }

    #[test]
    fn malformed_matrices_are_rejected() {
        let mut doc = IntrinsicsDocument::from(&model());
        doc.camera_matrix.data.pop();
        assert!(matches!(
            IntrinsicModel::try_from(doc),
            Err(StoreError::Shape { key: "camera_matrix", .. })
        ));

        let mut doc = IntrinsicsDocument::from(&model());
        doc.distortion_coefficients.rows = 2;
        assert!(matches!(
            IntrinsicModel::try_from(doc),
            Err(StoreError::Shape { key: "distortion_coefficients", .. })
        ));

        let mut doc = IntrinsicsDocument::from(&model());
        doc.camera_matrix.data[3] = 1.0;
        assert!(matches!(IntrinsicModel::try_from(doc), Err(StoreError::Model(_))));
    }

    #[test]
    fn verified_write_returns_read_back_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntrinsicsStore::new(dir.path().join("intrinsics.json"));
        let loaded = store.write_verified(&model()).unwrap();
        assert!(loaded.approx_eq(&model(), 1e-12));
        assert!(store.path().is_file());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntrinsicsStore::new(dir.path().join("absent.json"));
        assert!(matches!(store.read(), Err(StoreError::Io { .. })));
    }
}
