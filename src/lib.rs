//! Import and export of fiber tracts stored as binary legacy VTK poly data.
//!
//! A fiber file holds a pool of points followed by a list of polylines indexing into that
//! pool. Only the `BINARY` encoding of the `POLYDATA` dataset is supported.
//!
//! # Examples
//!
//! Load a file, inspect it and write it back to disk:
//!
//! ```no_run
//! let fibers = fiber_vtk::import("tracts.vtk").expect("Failed to load fibers");
//! println!("{} fibers with {} points", fibers.len(), fibers.num_points());
//! fiber_vtk::export(&fibers, "tracts_copy.vtk", true).expect("Failed to write fibers");
//! ```

pub mod basic;
pub mod byte_order;
pub mod diagnostics;
pub mod model;
pub mod parser;
pub mod writer;

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, LittleEndian};

pub use crate::diagnostics::{CollectDiagnostics, Diagnostics, LogDiagnostics};
pub use crate::model::FiberDataset;
pub use crate::parser::{ParseError, ParseErrorKind};

/// Error type for Import/Export operations.
#[derive(Debug)]
pub enum Error {
    /// The file to read does not exist.
    FileNotFound(PathBuf),
    IO(io::Error),
    Parse(ParseError),
    /// The file type line names something other than `BINARY`.
    UnsupportedFormat(String),
    /// The dataset line names something other than `POLYDATA`.
    UnsupportedDataset(String),
    Write(writer::Error),
    Model(model::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::FileNotFound(path) => write!(f, "File not found: {}", path.display()),
            Error::IO(source) => write!(f, "IO error: {}", source),
            Error::Parse(source) => write!(f, "Parse error: {}", source),
            Error::UnsupportedFormat(ft) => {
                write!(f, "Unsupported file type: {:?}, only BINARY is supported", ft)
            }
            Error::UnsupportedDataset(ds) => {
                write!(f, "Unsupported dataset: {:?}, only POLYDATA is supported", ds)
            }
            Error::Write(source) => write!(f, "Write error: {}", source),
            Error::Model(source) => write!(f, "Invalid fiber data: {}", source),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IO(source) => Some(source),
            Error::Parse(source) => Some(source),
            Error::Write(source) => Some(source),
            Error::Model(source) => Some(source),
            Error::FileNotFound(_) | Error::UnsupportedFormat(_) | Error::UnsupportedDataset(_) => {
                None
            }
        }
    }
}

/// Convert `std::io` error into `fiber_vtk` error.
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::IO(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Error {
        Error::Parse(e)
    }
}

impl From<writer::Error> for Error {
    fn from(e: writer::Error) -> Error {
        Error::Write(e)
    }
}

impl From<model::Error> for Error {
    fn from(e: model::Error) -> Error {
        Error::Model(e)
    }
}

/// Convert `fiber_vtk` error into `std::io` error.
impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::IO(e) => e,
            Error::FileNotFound(_) => io::Error::new(io::ErrorKind::NotFound, err.to_string()),
            _ => io::Error::new(io::ErrorKind::Other, err.to_string()),
        }
    }
}

/// Helper function that implements the actual importing routine for fiber files.
fn import_fibers<BO: ByteOrder>(
    file_path: &Path,
    diagnostics: &mut dyn Diagnostics,
) -> Result<FiberDataset, Error> {
    let file = File::open(file_path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::FileNotFound(file_path.to_path_buf()),
        _ => Error::IO(e),
    })?;
    log::debug!("Reading fibers from {}", file_path.display());
    let mut reader = BufReader::new(file);
    let data = parser::FiberParser::<BO>::parse(&mut reader, diagnostics)?;
    Ok(data.with_file_path(file_path))
}

/// Import a fiber file at the specified path.
///
/// Binary blocks are interpreted in big-endian format, the byte order VTK prescribes for
/// legacy files. Warnings about the header are sent to the `log` facade.
///
/// # Examples
///
/// The following example imports a file called `tracts.vtk`, and panics with an
/// appropriate error message if the file fails to load.
///
/// ```should_panic
/// use std::path::PathBuf;
///
/// let file_path = PathBuf::from("tracts.vtk");
///
/// let fibers = fiber_vtk::import(&file_path)
///     .expect(&format!("Failed to load file: {:?}", file_path));
/// ```
pub fn import(file_path: impl AsRef<Path>) -> Result<FiberDataset, Error> {
    import_fibers::<BigEndian>(file_path.as_ref(), &mut LogDiagnostics)
}

/// Import a fiber file at the specified path, reporting header warnings to `diagnostics`.
///
/// # Examples
///
/// ```no_run
/// use fiber_vtk::CollectDiagnostics;
///
/// let mut diagnostics = CollectDiagnostics::new();
/// let fibers = fiber_vtk::import_with("tracts.vtk", &mut diagnostics).unwrap();
/// for warning in &diagnostics.warnings {
///     eprintln!("{}", warning);
/// }
/// ```
pub fn import_with(
    file_path: impl AsRef<Path>,
    diagnostics: &mut dyn Diagnostics,
) -> Result<FiberDataset, Error> {
    import_fibers::<BigEndian>(file_path.as_ref(), diagnostics)
}

/// Import a fiber file at the specified path.
///
/// Binary blocks are interpreted in little-endian format.
/// For the default byte order used by `.vtk` files use [`import`].
pub fn import_le(file_path: impl AsRef<Path>) -> Result<FiberDataset, Error> {
    import_fibers::<LittleEndian>(file_path.as_ref(), &mut LogDiagnostics)
}

/// Helper function that implements the actual exporting routine for fiber files.
fn export_fibers<BO: ByteOrder>(
    data: &FiberDataset,
    file_path: &Path,
    overwrite: bool,
    description: &str,
) -> Result<(), Error> {
    // Reject the dataset before an existing file is truncated.
    writer::check_writable(data, description)?;
    let file = if overwrite {
        File::create(file_path)?
    } else {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(file_path)?
    };
    log::debug!("Writing fibers to {}", file_path.display());
    let mut out = BufWriter::new(file);
    writer::write_fibers::<BO, _>(&mut out, data, description)?;
    out.flush()?;
    Ok(())
}

/// Export fibers to the specified file in big-endian binary format.
///
/// If `overwrite` is `false` and the file exists, an [`Error::IO`] with kind
/// [`io::ErrorKind::AlreadyExists`] is returned and the file is left untouched.
/// A dataset that can't be written is rejected before the file is opened.
///
/// Failures while opening or flushing the file are reported as [`Error::IO`]. Failures
/// while writing the header or a data block arrive as [`Error::Write`], which names the
/// failing part of the file and keeps the [`io::ErrorKind`].
///
/// # Examples
///
/// ```no_run
/// use fiber_vtk::FiberDataset;
///
/// let fibers = FiberDataset::from_fibers(&[
///     vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
///     vec![[0.0, 1.0, 0.0]],
/// ]);
/// fiber_vtk::export(&fibers, "tracts.vtk", false).unwrap();
/// ```
pub fn export(
    data: &FiberDataset,
    file_path: impl AsRef<Path>,
    overwrite: bool,
) -> Result<(), Error> {
    export_fibers::<BigEndian>(data, file_path.as_ref(), overwrite, writer::DEFAULT_DESCRIPTION)
}

/// Export fibers to the specified file in little-endian binary format.
///
/// Files written this way must be read back with [`import_le`].
pub fn export_le(
    data: &FiberDataset,
    file_path: impl AsRef<Path>,
    overwrite: bool,
) -> Result<(), Error> {
    export_fibers::<LittleEndian>(data, file_path.as_ref(), overwrite, writer::DEFAULT_DESCRIPTION)
}

/// Export fibers in big-endian binary format with a custom description line.
///
/// The description must fit on a single line.
pub fn export_with_description(
    data: &FiberDataset,
    file_path: impl AsRef<Path>,
    overwrite: bool,
    description: &str,
) -> Result<(), Error> {
    export_fibers::<BigEndian>(data, file_path.as_ref(), overwrite, description)
}
