use std::fmt;
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub use crate::basic::FileType;

/**
 * Fiber data model
 */

/// Error type describing inconsistent fiber dataset buffers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The number of point coordinates is not divisible by three.
    PointsNotTriples(usize),
    /// Start index and length arrays have different sizes.
    FiberCountMismatch { starts: usize, lengths: usize },
    /// The sum of fiber lengths or the size of the point to fiber mapping disagrees with the
    /// number of points.
    PointCountMismatch { expected: usize, actual: usize },
    /// A fiber references points outside of the point pool.
    FiberOutOfBounds(usize),
    /// The point to fiber mapping does not match the fiber layout at the given point.
    MappingMismatch(usize),
    /// A requested fiber does not exist.
    FiberIndexOutOfRange(usize),
    /// A per fiber mask has the wrong size.
    MaskSizeMismatch { expected: usize, actual: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::PointsNotTriples(n) => {
                write!(f, "Number of coordinates ({}) is not divisible by three", n)
            }
            Error::FiberCountMismatch { starts, lengths } => write!(
                f,
                "Got {} fiber start indices but {} fiber lengths",
                starts, lengths
            ),
            Error::PointCountMismatch { expected, actual } => write!(
                f,
                "Expected {} points but fiber layout accounts for {}",
                expected, actual
            ),
            Error::FiberOutOfBounds(i) => write!(f, "Fiber {} exceeds the point pool", i),
            Error::MappingMismatch(i) => {
                write!(f, "Point {} is mapped to the wrong fiber", i)
            }
            Error::FiberIndexOutOfRange(i) => write!(f, "No fiber with index {}", i),
            Error::MaskSizeMismatch { expected, actual } => write!(
                f,
                "Fiber mask has {} entries but dataset has {} fibers",
                actual, expected
            ),
        }
    }
}

impl std::error::Error for Error {}

/// Version number (e.g. `3.0 => Version { major: 3, minor: 0 }`)
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub fn new(pair: (u8, u8)) -> Self {
        Version {
            major: pair.0,
            minor: pair.1,
        }
    }
}

impl From<(u8, u8)> for Version {
    fn from(pair: (u8, u8)) -> Self {
        Version::new(pair)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// The four leading text lines of a legacy VTK file.
#[derive(Clone, PartialEq, Debug)]
pub struct Header {
    /// Parsed version, `None` if the first line is not a recognizable version string.
    pub version: Option<Version>,
    /// Free form description (second line).
    pub description: String,
    pub file_type: FileType,
    /// Data set type token, e.g. `POLYDATA`.
    pub data_set: String,
}

/// A single 3D point.
pub type Point = [f32; 3];

/// A polyline given by its points.
pub type Fiber = Vec<Point>;

/// Axis aligned box enclosing all points of a dataset.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    /// Construct a degenerate box containing a single point.
    pub fn new(p: Point) -> Self {
        BoundingBox { min: p, max: p }
    }

    pub fn expand_by(&mut self, p: Point) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        (0..3).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
    }

    /// Compute the bounding box of a flat `x, y, z` coordinate buffer.
    pub fn from_coords(coords: &[f32]) -> Option<Self> {
        let mut points = coords.chunks_exact(3).map(|c| [c[0], c[1], c[2]]);
        let mut bb = BoundingBox::new(points.next()?);
        points.for_each(|p| bb.expand_by(p));
        Some(bb)
    }
}

/// A set of fibers sharing one flat point pool.
///
/// Fibers are stored as consecutive runs of points. `fiber_start_indices` and
/// `fiber_lengths` are given in points, not coordinates. The dataset can't be modified once
/// built; derived datasets like [`FiberDataset::subset`] are new copies.
#[derive(Clone, Debug, Default)]
pub struct FiberDataset {
    points: Vec<f32>,
    fiber_start_indices: Vec<usize>,
    fiber_lengths: Vec<usize>,
    point_fiber_mapping: Vec<usize>,
    bounding_box: Option<BoundingBox>,
    file_path: Option<PathBuf>,
}

/// Datasets compare equal if their geometry and topology are equal. Metadata is ignored.
impl PartialEq for FiberDataset {
    fn eq(&self, other: &Self) -> bool {
        self.points == other.points
            && self.fiber_start_indices == other.fiber_start_indices
            && self.fiber_lengths == other.fiber_lengths
            && self.point_fiber_mapping == other.point_fiber_mapping
    }
}

impl FiberDataset {
    /// Construct a dataset from its raw buffers, checking that they are consistent.
    pub fn new(
        points: Vec<f32>,
        fiber_start_indices: Vec<usize>,
        fiber_lengths: Vec<usize>,
        point_fiber_mapping: Vec<usize>,
    ) -> Result<Self, Error> {
        if points.len() % 3 != 0 {
            return Err(Error::PointsNotTriples(points.len()));
        }
        if fiber_start_indices.len() != fiber_lengths.len() {
            return Err(Error::FiberCountMismatch {
                starts: fiber_start_indices.len(),
                lengths: fiber_lengths.len(),
            });
        }
        let num_points = points.len() / 3;
        let total: usize = fiber_lengths.iter().sum();
        if total != num_points {
            return Err(Error::PointCountMismatch {
                expected: num_points,
                actual: total,
            });
        }
        if point_fiber_mapping.len() != num_points {
            return Err(Error::PointCountMismatch {
                expected: num_points,
                actual: point_fiber_mapping.len(),
            });
        }
        for (fiber, (&start, &len)) in fiber_start_indices.iter().zip(&fiber_lengths).enumerate() {
            let end = start
                .checked_add(len)
                .filter(|&end| end <= num_points)
                .ok_or(Error::FiberOutOfBounds(fiber))?;
            if let Some(offset) = point_fiber_mapping[start..end]
                .iter()
                .position(|&f| f != fiber)
            {
                return Err(Error::MappingMismatch(start + offset));
            }
        }

        Ok(Self::new_unchecked(
            points,
            fiber_start_indices,
            fiber_lengths,
            point_fiber_mapping,
        ))
    }

    fn new_unchecked(
        points: Vec<f32>,
        fiber_start_indices: Vec<usize>,
        fiber_lengths: Vec<usize>,
        point_fiber_mapping: Vec<usize>,
    ) -> Self {
        let bounding_box = BoundingBox::from_coords(&points);
        FiberDataset {
            points,
            fiber_start_indices,
            fiber_lengths,
            point_fiber_mapping,
            bounding_box,
            file_path: None,
        }
    }

    /// Build a dataset from a list of polylines. Points are pooled in fiber order.
    pub fn from_fibers(fibers: &[Fiber]) -> Self {
        let num_points: usize = fibers.iter().map(|f| f.len()).sum();
        let mut points = Vec::with_capacity(3 * num_points);
        let mut starts = Vec::with_capacity(fibers.len());
        let mut lengths = Vec::with_capacity(fibers.len());
        let mut mapping = Vec::with_capacity(num_points);
        for (i, fiber) in fibers.iter().enumerate() {
            starts.push(mapping.len());
            lengths.push(fiber.len());
            for p in fiber {
                points.extend_from_slice(p);
                mapping.push(i);
            }
        }
        Self::new_unchecked(points, starts, lengths, mapping)
    }

    /// Attach the path of the file this dataset was loaded from.
    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Number of fibers.
    pub fn len(&self) -> usize {
        self.fiber_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fiber_lengths.is_empty()
    }

    pub fn num_points(&self) -> usize {
        self.points.len() / 3
    }

    /// Flat `x, y, z` coordinates of all points.
    pub fn points(&self) -> &[f32] {
        &self.points
    }

    pub fn fiber_start_indices(&self) -> &[usize] {
        &self.fiber_start_indices
    }

    pub fn fiber_lengths(&self) -> &[usize] {
        &self.fiber_lengths
    }

    pub fn point_fiber_mapping(&self) -> &[usize] {
        &self.point_fiber_mapping
    }

    /// Bounding box of all points, `None` if there are no points.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bounding_box
    }

    /// Flat coordinates of a single fiber.
    pub fn fiber_coords(&self, fiber: usize) -> Option<&[f32]> {
        let start = *self.fiber_start_indices.get(fiber)?;
        let len = self.fiber_lengths[fiber];
        self.points.get(3 * start..3 * (start + len))
    }

    /// Iterate over the flat coordinates of every fiber.
    pub fn fibers(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.len()).filter_map(move |i| self.fiber_coords(i))
    }

    /// Copy out the points of a single fiber.
    pub fn fiber(&self, fiber: usize) -> Option<Fiber> {
        self.fiber_coords(fiber)
            .map(|c| c.chunks_exact(3).map(|p| [p[0], p[1], p[2]]).collect())
    }

    /// Copy out all fibers as polylines.
    pub fn to_fibers(&self) -> Vec<Fiber> {
        (0..self.len()).filter_map(|i| self.fiber(i)).collect()
    }

    /// Position of the `vertex`-th point of `fiber`.
    pub fn position(&self, fiber: usize, vertex: usize) -> Option<Point> {
        let coords = self.fiber_coords(fiber)?;
        let p = coords.get(3 * vertex..3 * vertex + 3)?;
        Some([p[0], p[1], p[2]])
    }

    /// Normalized tangent at the `vertex`-th point of `fiber`.
    pub fn tangent(&self, fiber: usize, vertex: usize) -> Option<Point> {
        let coords = self.fiber_coords(fiber)?;
        if vertex >= coords.len() / 3 {
            return None;
        }
        Some(tangent_at(coords, vertex))
    }

    /// Tangents for all points, laid out like [`FiberDataset::points`].
    pub fn tangents(&self) -> Vec<f32> {
        #[cfg(feature = "parallel")]
        let per_fiber: Vec<Vec<f32>> = (0..self.len())
            .into_par_iter()
            .map(|f| self.fiber_tangents(f))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let per_fiber: Vec<Vec<f32>> = (0..self.len()).map(|f| self.fiber_tangents(f)).collect();

        let mut out = vec![0.0; self.points.len()];
        for (t, &start) in per_fiber.iter().zip(&self.fiber_start_indices) {
            out[3 * start..3 * start + t.len()].copy_from_slice(t);
        }
        out
    }

    fn fiber_tangents(&self, fiber: usize) -> Vec<f32> {
        let coords = self.fiber_coords(fiber).unwrap_or(&[]);
        (0..coords.len() / 3)
            .flat_map(|v| tangent_at(coords, v))
            .collect()
    }

    /// Build a new dataset from the given fibers, in the given order.
    pub fn subset(&self, fibers: &[usize]) -> Result<FiberDataset, Error> {
        let selected = fibers
            .iter()
            .map(|&i| self.fiber(i).ok_or(Error::FiberIndexOutOfRange(i)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FiberDataset::from_fibers(&selected))
    }

    /// Build a new dataset keeping only the fibers not flagged in `unused`.
    pub fn without_unused(&self, unused: &[bool]) -> Result<FiberDataset, Error> {
        if unused.len() != self.len() {
            return Err(Error::MaskSizeMismatch {
                expected: self.len(),
                actual: unused.len(),
            });
        }
        let keep: Vec<usize> = unused
            .iter()
            .enumerate()
            .filter_map(|(i, &u)| if u { None } else { Some(i) })
            .collect();
        self.subset(&keep)
    }
}

fn tangent_at(coords: &[f32], vertex: usize) -> Point {
    let n = coords.len() / 3;
    if n < 2 {
        return [0.0; 3];
    }
    let p = |i: usize| [coords[3 * i], coords[3 * i + 1], coords[3 * i + 2]];
    let (a, b) = if vertex == 0 {
        (p(0), p(1))
    } else if vertex == n - 1 {
        (p(vertex - 1), p(vertex))
    } else {
        (p(vertex - 1), p(vertex + 1))
    };
    let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    let norm = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
    if norm > 0.0 {
        [d[0] / norm, d[1] / norm, d[2] / norm]
    } else {
        [0.0; 3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_fibers() -> FiberDataset {
        FiberDataset::from_fibers(&[
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            vec![[0.0, 1.0, 0.0]],
        ])
    }

    #[test]
    fn from_fibers_layout() {
        let ds = two_fibers();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.num_points(), 3);
        assert_eq!(ds.points(), &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(ds.fiber_start_indices(), &[0, 2]);
        assert_eq!(ds.fiber_lengths(), &[2, 1]);
        assert_eq!(ds.point_fiber_mapping(), &[0, 0, 1]);
        assert_eq!(ds.to_fibers()[1], vec![[0.0, 1.0, 0.0]]);
    }

    #[test]
    fn new_validates_buffers() {
        let pts = vec![0.0; 9];
        assert!(FiberDataset::new(pts.clone(), vec![0, 2], vec![2, 1], vec![0, 0, 1]).is_ok());
        assert_eq!(
            FiberDataset::new(vec![0.0; 8], vec![], vec![], vec![]),
            Err(Error::PointsNotTriples(8))
        );
        assert_eq!(
            FiberDataset::new(pts.clone(), vec![0], vec![2, 1], vec![0, 0, 1]),
            Err(Error::FiberCountMismatch { starts: 1, lengths: 2 })
        );
        assert_eq!(
            FiberDataset::new(pts.clone(), vec![0, 2], vec![2, 2], vec![0, 0, 1]),
            Err(Error::PointCountMismatch { expected: 3, actual: 4 })
        );
        assert_eq!(
            FiberDataset::new(pts.clone(), vec![0, 2], vec![2, 1], vec![0, 1, 1]),
            Err(Error::MappingMismatch(1))
        );
        assert_eq!(
            FiberDataset::new(pts, vec![0, 3], vec![2, 1], vec![0, 0, 1]),
            Err(Error::FiberOutOfBounds(1))
        );
    }

    #[test]
    fn positions_and_bounds() {
        let ds = two_fibers();
        assert_eq!(ds.position(0, 1), Some([1.0, 0.0, 0.0]));
        assert_eq!(ds.position(1, 0), Some([0.0, 1.0, 0.0]));
        assert_eq!(ds.position(1, 1), None);
        assert_eq!(ds.position(2, 0), None);
        let bb = ds.bounding_box().unwrap();
        assert_eq!(bb.min, [0.0, 0.0, 0.0]);
        assert_eq!(bb.max, [1.0, 1.0, 0.0]);
        assert!(bb.contains([0.5, 0.5, 0.0]));
        assert!(FiberDataset::default().bounding_box().is_none());
    }

    #[test]
    fn tangents_use_neighbours() {
        let ds = FiberDataset::from_fibers(&[
            vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 2.0, 0.0]],
            vec![[5.0, 5.0, 5.0]],
        ]);
        assert_eq!(ds.tangent(0, 0), Some([-1.0, 0.0, 0.0]));
        let mid = ds.tangent(0, 1).unwrap();
        let s = std::f32::consts::FRAC_1_SQRT_2;
        assert!((mid[0] + s).abs() < 1e-6 && (mid[1] + s).abs() < 1e-6);
        assert_eq!(ds.tangent(0, 2), Some([0.0, -1.0, 0.0]));
        assert_eq!(ds.tangent(1, 0), Some([0.0, 0.0, 0.0]));
        assert_eq!(ds.tangent(0, 3), None);

        let all = ds.tangents();
        assert_eq!(all.len(), ds.points().len());
        assert_eq!(&all[0..3], &[-1.0, 0.0, 0.0]);
        assert_eq!(&all[9..12], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn derived_datasets_are_copies() {
        let ds = two_fibers();
        let sub = ds.subset(&[1, 0]).unwrap();
        assert_eq!(sub.fiber_lengths(), &[1, 2]);
        assert_eq!(sub.points(), &[0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(sub.point_fiber_mapping(), &[0, 1, 1]);
        assert_eq!(ds.subset(&[3]), Err(Error::FiberIndexOutOfRange(3)));

        let kept = ds.without_unused(&[true, false]).unwrap();
        assert_eq!(kept, FiberDataset::from_fibers(&[vec![[0.0, 1.0, 0.0]]]));
        assert!(ds.without_unused(&[true]).is_err());
        // Original untouched.
        assert_eq!(ds, two_fibers());
    }
}
