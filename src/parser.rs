//! Reader for fiber tracts stored as binary legacy VTK `POLYDATA`.
//!
//! The file is read strictly in order: four header lines, the `POINTS` declaration followed
//! by a binary coordinate block, then the `LINES` declaration followed by a binary topology
//! block. Each binary block is terminated by a single `\n`.

use std::fmt;
use std::io::{self, BufRead, Read};
use std::marker::PhantomData;

use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};
use num_traits::Zero;
use trim_in_place::TrimInPlace;

use crate::basic::{self, count, to_lower, to_upper, tokens, FileType, WHITESPACE};
use crate::byte_order::{self, SwitchByteOrder};
use crate::diagnostics::Diagnostics;
use crate::model::*;
use crate::Error;

/// First line of every supported file.
pub const VERSION_LINE: &str = "# vtk DataFile Version 3.0";

/// Descriptions longer than this are accepted, but reported.
pub const MAX_DESCRIPTION_LEN: usize = 256;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The file ended before an expected line or block was complete.
    UnexpectedEof,
    /// A `POINTS` or `LINES` declaration does not have the expected form.
    InvalidDeclaration,
    /// A count in a declaration is not an unsigned integer.
    InvalidCount,
    /// Characters found after a binary block where only a newline was expected.
    TrailingCharacters,
    /// The line topology contradicts the declared sizes.
    InvalidTopology,
    /// A text line is not valid UTF-8.
    InvalidUtf8,
}

/// Content of the file doesn't follow the expected grammar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub context: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, context: impl Into<String>) -> Self {
        ParseError {
            kind,
            context: context.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for ParseError {}

fn parse_error(kind: ParseErrorKind, context: impl Into<String>) -> Error {
    Error::Parse(ParseError::new(kind, context))
}

/**
 * Fiber data parsing.
 */
pub struct FiberParser<BO: ByteOrder = BigEndian>(PhantomData<BO>);

impl<BO: ByteOrder> FiberParser<BO> {
    /// Parse an entire fiber file.
    pub fn parse<R: BufRead>(
        input: &mut R,
        diagnostics: &mut dyn Diagnostics,
    ) -> Result<FiberDataset, Error> {
        Self::parse_with_header(input, diagnostics).map(|(_, data)| data)
    }

    /// Parse an entire fiber file and also return its header lines.
    pub fn parse_with_header<R: BufRead>(
        input: &mut R,
        diagnostics: &mut dyn Diagnostics,
    ) -> Result<(Header, FiberDataset), Error> {
        let header = Self::header(input, diagnostics)?;
        let points = Self::points(input)?;
        let num_points = points.len() / 3;
        let (starts, lengths, mapping) = Self::lines(input, num_points, diagnostics)?;
        log::debug!("Read {} fibers with {} points", lengths.len(), num_points);
        let data = FiberDataset::new(points, starts, lengths, mapping)?;
        Ok((header, data))
    }

    /// Read the four header lines and check that this is a binary poly data file.
    pub fn header<R: BufRead>(
        input: &mut R,
        diagnostics: &mut dyn Diagnostics,
    ) -> Result<Header, Error> {
        let version_line = line(input, "reading the version line")?;
        let mut description = line(input, "reading the description line")?;
        let file_type_line = line(input, "reading the file type line")?;
        let data_set_line = line(input, "reading the DATASET line")?;

        if version_line != VERSION_LINE {
            diagnostics.warn(&format!(
                "Unsupported format version string in VTK fiber file: {}",
                version_line
            ));
        }
        let version = basic::version(&version_line).ok().map(|(_, v)| v);

        if description.len() > MAX_DESCRIPTION_LEN {
            diagnostics.warn(&format!(
                "Invalid header size of VTK fiber file, max. {} but got: {}",
                MAX_DESCRIPTION_LEN,
                description.len()
            ));
        }
        description.trim_end_in_place();

        let file_type = match FileType::from_token(&file_type_line) {
            Some(FileType::Binary) => FileType::Binary,
            _ => {
                return Err(Error::UnsupportedFormat(
                    basic::trim(&file_type_line, WHITESPACE).to_string(),
                ))
            }
        };

        let data_set_tokens = tokens(&data_set_line);
        let data_set = match data_set_tokens.as_slice() {
            [tag, kind, ..] if to_upper(kind) == "POLYDATA" => {
                if to_upper(tag) != "DATASET" {
                    diagnostics.warn(&format!(
                        "Expected DATASET keyword but found: {}",
                        tag
                    ));
                }
                to_upper(kind)
            }
            _ => return Err(Error::UnsupportedDataset(data_set_line.clone())),
        };

        Ok(Header {
            version,
            description,
            file_type,
            data_set,
        })
    }

    /// Read the `POINTS <n> float` declaration and the following coordinate block.
    pub fn points<R: BufRead>(input: &mut R) -> Result<Vec<f32>, Error> {
        let decl = line(input, "reading POINTS declaration")?;
        let toks = tokens(&decl);
        if toks.len() != 3 || to_upper(toks[0]) != "POINTS" || to_lower(toks[2]) != "float" {
            return Err(parse_error(
                ParseErrorKind::InvalidDeclaration,
                format!("Invalid POINTS declaration: {}, expected float.", decl),
            ));
        }
        let num_points: usize = count(toks[1]).ok_or_else(|| {
            parse_error(
                ParseErrorKind::InvalidCount,
                format!("Invalid number of points: {}", toks[1]),
            )
        })?;
        let num_coords = num_points.checked_mul(3).ok_or_else(|| {
            parse_error(
                ParseErrorKind::InvalidCount,
                format!("Too many points: {}", num_points),
            )
        })?;

        let points = Self::block::<_, f32>(input, num_coords, "reading point coordinates")?;
        end_of_block(input, "points")?;
        Ok(points)
    }

    /// Read the `LINES <n> <size>` declaration and the topology block and turn it into
    /// fiber start indices, fiber lengths and the point to fiber mapping.
    pub fn lines<R: BufRead>(
        input: &mut R,
        num_points: usize,
        diagnostics: &mut dyn Diagnostics,
    ) -> Result<(Vec<usize>, Vec<usize>, Vec<usize>), Error> {
        let decl = line(input, "reading LINES declaration")?;
        let toks = tokens(&decl);
        if toks.len() != 3 || to_upper(toks[0]) != "LINES" {
            return Err(parse_error(
                ParseErrorKind::InvalidDeclaration,
                format!("Invalid VTK LINES declaration: {}", decl),
            ));
        }
        let num_lines: usize = count(toks[1]).ok_or_else(|| {
            parse_error(
                ParseErrorKind::InvalidCount,
                format!("Invalid number of lines in LINES declaration: {}", toks[1]),
            )
        })?;
        let size: usize = count(toks[2]).ok_or_else(|| {
            parse_error(
                ParseErrorKind::InvalidCount,
                format!("Invalid size of lines in LINES declaration: {}", toks[2]),
            )
        })?;

        let data = Self::block::<_, u32>(input, size, "reading line topology")?;

        let topology_error = |msg: String| parse_error(ParseErrorKind::InvalidTopology, msg);

        // The block size bounds the number of lines, so a bogus count can't trigger a huge
        // allocation.
        let mut starts = Vec::with_capacity(num_lines.min(size));
        let mut lengths = Vec::with_capacity(num_lines.min(size));
        let mut mapping = Vec::with_capacity(num_points);
        let mut pos = 0;
        let mut num_empty = 0;
        let mut sequential = true;
        for fiber in 0..num_lines {
            let len = *data.get(pos).ok_or_else(|| {
                topology_error(format!(
                    "LINES block ends before line {} of {}",
                    fiber, num_lines
                ))
            })? as usize;
            pos += 1;
            let indices = data.get(pos..pos + len).ok_or_else(|| {
                topology_error(format!(
                    "Line {} with {} points exceeds the LINES block",
                    fiber, len
                ))
            })?;
            let start = mapping.len();
            if start + len > num_points {
                return Err(topology_error(format!(
                    "Lines reference more than the {} declared points",
                    num_points
                )));
            }
            for (k, &idx) in indices.iter().enumerate() {
                let idx = idx as usize;
                if idx >= num_points {
                    return Err(topology_error(format!(
                        "Point index {} out of range in line {}",
                        idx, fiber
                    )));
                }
                sequential &= idx == start + k;
            }
            if len == 0 {
                num_empty += 1;
            }

            starts.push(start);
            lengths.push(len);
            mapping.extend(std::iter::repeat(fiber).take(len));
            pos += len;
        }

        if mapping.len() != num_points {
            return Err(topology_error(format!(
                "Lines cover {} points but {} were declared",
                mapping.len(),
                num_points
            )));
        }
        if pos < data.len() {
            diagnostics.warn(&format!(
                "Ignoring {} unused values at the end of the LINES block",
                data.len() - pos
            ));
        }
        if num_empty > 0 {
            diagnostics.warn(&format!("Found {} fibers without points", num_empty));
        }
        if !sequential {
            diagnostics.warn("Point indices in LINES are not sequential, using the point order");
        }

        end_of_block(input, "lines")?;
        Ok((starts, lengths, mapping))
    }

    /// Read `n` binary values stored in byte order `BO` and convert them to native order.
    fn block<R: Read, T: SwitchByteOrder + Zero>(
        input: &mut R,
        n: usize,
        desc: &str,
    ) -> Result<Vec<T>, Error> {
        let eof = || {
            parse_error(
                ParseErrorKind::UnexpectedEof,
                format!("Unexpected end of VTK fiber file while {}", desc),
            )
        };
        let num_bytes = n.checked_mul(std::mem::size_of::<T>()).ok_or_else(eof)?;

        // Read bytes first so that a truncated file doesn't allocate the declared size upfront.
        let mut bytes = Vec::new();
        input.by_ref().take(num_bytes as u64).read_to_end(&mut bytes)?;
        if bytes.len() != num_bytes {
            return Err(eof());
        }

        let mut data = vec![T::zero(); n];
        bytemuck::cast_slice_mut::<T, u8>(&mut data).copy_from_slice(&bytes);
        byte_order::to_native::<BO, T>(&mut data);
        Ok(data)
    }
}

/// Read one `\n` terminated line. A trailing `\r` is dropped.
fn line<R: BufRead>(input: &mut R, desc: &str) -> Result<String, Error> {
    let mut buf = Vec::new();
    input.read_until(b'\n', &mut buf).map_err(|e| {
        Error::IO(io::Error::new(
            e.kind(),
            format!("IO error while {} of VTK fiber file: {}", desc, e),
        ))
    })?;
    if buf.pop() != Some(b'\n') {
        return Err(parse_error(
            ParseErrorKind::UnexpectedEof,
            format!("Unexpected end of VTK fiber file while {}", desc),
        ));
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|e| {
        parse_error(
            ParseErrorKind::InvalidUtf8,
            format!("Invalid UTF-8 while {}: {}", desc, e),
        )
    })
}

/// Eat the newline following a binary block.
fn end_of_block<R: BufRead>(input: &mut R, block: &str) -> Result<(), Error> {
    let rest = line(input, &format!("reading the newline after the {} block", block))?;
    if !rest.is_empty() {
        return Err(parse_error(
            ParseErrorKind::TrailingCharacters,
            format!(
                "Found characters after the {} block where nothing was expected: {:?}",
                block, rest
            ),
        ));
    }
    Ok(())
}

/// Parse a fiber file using native endian byte order.
pub fn parse_ne<R: BufRead>(
    input: &mut R,
    diagnostics: &mut dyn Diagnostics,
) -> Result<FiberDataset, Error> {
    FiberParser::<NativeEndian>::parse(input, diagnostics)
}

/// Parse a fiber file using little endian byte order.
pub fn parse_le<R: BufRead>(
    input: &mut R,
    diagnostics: &mut dyn Diagnostics,
) -> Result<FiberDataset, Error> {
    FiberParser::<LittleEndian>::parse(input, diagnostics)
}

/// Parse a fiber file using big endian byte order.
///
/// This is the default VTK byte order.
pub fn parse_be<R: BufRead>(
    input: &mut R,
    diagnostics: &mut dyn Diagnostics,
) -> Result<FiberDataset, Error> {
    FiberParser::<BigEndian>::parse(input, diagnostics)
}
