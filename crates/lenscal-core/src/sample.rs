use crate::BoardGeometry;
use nalgebra::{Point2, Point3};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    #[error("object/image point count mismatch (object={object}, image={image})")]
    LengthMismatch { object: usize, image: usize },
    #[error("calibration sample has no points")]
    Empty,
}

/// One accepted board observation: index-aligned object and image points.
///
/// Point `k` of `image_points` is the projection of point `k` of
/// `object_points`. Samples are immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationSample {
    object_points: Vec<Point3<f64>>,
    image_points: Vec<Point2<f64>>,
}

impl CalibrationSample {
    pub fn new(
        object_points: Vec<Point3<f64>>,
        image_points: Vec<Point2<f64>>,
    ) -> Result<Self, SampleError> {
        if object_points.len() != image_points.len() {
            return Err(SampleError::LengthMismatch {
                object: object_points.len(),
                image: image_points.len(),
            });
        }
        if object_points.is_empty() {
            return Err(SampleError::Empty);
        }
        Ok(Self {
            object_points,
            image_points,
        })
    }

    /// Pair `image_points` with the fixed object points of `board`.
    pub fn for_board(
        board: &BoardGeometry,
        image_points: Vec<Point2<f64>>,
    ) -> Result<Self, SampleError> {
        Self::new(board.object_points(), image_points)
    }

    pub fn object_points(&self) -> &[Point3<f64>] {
        &self.object_points
    }

    pub fn image_points(&self) -> &[Point2<f64>] {
        &self.image_points
    }

    pub fn len(&self) -> usize {
        self.object_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_points.is_empty()
    }

    /// Iterate `(object, image)` correspondences in order.
    pub fn correspondences(&self) -> impl Iterator<Item = (&Point3<f64>, &Point2<f64>)> + '_ {
        self.object_points.iter().zip(self.image_points.iter())
    }
}

/// Ordered collection of accepted samples.
///
/// Insertion order does not matter to the solver but is kept for logging
/// and per-sample diagnostics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleSet {
    samples: Vec<CalibrationSample>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: CalibrationSample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `true` once exactly `target` samples have been collected.
    pub fn is_complete(&self, target: usize) -> bool {
        self.samples.len() == target
    }

    /// Total number of correspondences over all samples.
    pub fn total_points(&self) -> usize {
        self.samples.iter().map(CalibrationSample::len).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CalibrationSample> {
        self.samples.iter()
    }

    pub fn as_slice(&self) -> &[CalibrationSample] {
        &self.samples
    }

    pub fn into_vec(self) -> Vec<CalibrationSample> {
        self.samples
    }
}

impl FromIterator<CalibrationSample> for SampleSet {
    fn from_iter<I: IntoIterator<Item = CalibrationSample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for SampleSet {
    type Item = CalibrationSample;
    type IntoIter = std::vec::IntoIter<CalibrationSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.into_iter()
    }
}

impl<'a> IntoIterator for &'a SampleSet {
    type Item = &'a CalibrationSample;
    type IntoIter = std::slice::Iter<'a, CalibrationSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
