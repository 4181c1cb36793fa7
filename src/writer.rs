use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};
use std::io::Write;

use crate::byte_order;
use crate::model::FiberDataset;
use crate::parser::VERSION_LINE;

/// Description line written when none is given.
pub const DEFAULT_DESCRIPTION: &str = "fiber tracts";

mod write_fibers_impl {
    use super::{byte_order, ByteOrder, FiberDataset, Write, VERSION_LINE};
    use num_traits::cast;

    pub mod error {
        use std::fmt;

        #[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub enum EntryPart {
            /// The declaration line with the keyword and sizes.
            Header,
            /// The binary block following the declaration.
            /// This reports any IO errors when writing data.
            Data(Option<std::io::ErrorKind>),
        }

        #[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub enum Header {
            Version,
            /// The description is missing or would span multiple lines.
            Description,
            /// Binary or ASCII.
            FileType,
            DataSet,
        }

        #[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub enum Error {
            Header(Header),
            Points(EntryPart),
            Lines(EntryPart),
            NewLine,

            /// Point counts and indices must fit into 32 bits.
            TooManyPoints(usize),
        }

        impl fmt::Display for Error {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match self {
                    Error::Header(part) => write!(f, "Failed to write header ({:?})", part),
                    Error::Points(part) => write!(f, "Failed to write points ({:?})", part),
                    Error::Lines(part) => write!(f, "Failed to write lines ({:?})", part),
                    Error::NewLine => write!(f, "Failed to write new line"),
                    Error::TooManyPoints(n) => write!(
                        f,
                        "Cannot store {} points with 32 bit indices",
                        n
                    ),
                }
            }
        }

        impl std::error::Error for Error {}
    }

    pub use self::error::Error;
    use self::error::{EntryPart, Header};

    /// A typical result of a write operation.
    type Result = std::result::Result<(), Error>;

    /// Check that `data` can be written with the given description without touching any
    /// output.
    pub fn check_writable(data: &FiberDataset, description: &str) -> Result {
        if description.contains('\n') {
            return Err(Error::Header(Header::Description));
        }
        let num_points = data.num_points();
        if cast::<usize, u32>(num_points + data.len()).is_none() {
            return Err(Error::TooManyPoints(num_points));
        }
        Ok(())
    }

    /// Write `data` as binary legacy VTK poly data lines with byte order `BO`.
    pub fn write_fibers<BO: ByteOrder, W: Write + ?Sized>(
        out: &mut W,
        data: &FiberDataset,
        description: &str,
    ) -> Result {
        check_writable(data, description)?;

        let num_points = data.num_points();
        let num_lines = data.len();

        // Points are pooled in fiber order.
        let mut points: Vec<f32> = Vec::with_capacity(3 * num_points);
        for coords in data.fibers() {
            points.extend_from_slice(coords);
        }

        // Each line is its point count followed by global point indices.
        let mut lines: Vec<u32> = Vec::with_capacity(num_points + num_lines);
        let mut next: u32 = 0;
        for &len in data.fiber_lengths() {
            lines.push(len as u32);
            lines.extend(next..next + len as u32);
            next += len as u32;
        }

        write!(out, "{}\n", VERSION_LINE).map_err(|_| Error::Header(Header::Version))?;
        write!(out, "{}\n", description).map_err(|_| Error::Header(Header::Description))?;
        write!(out, "BINARY\n").map_err(|_| Error::Header(Header::FileType))?;
        write!(out, "DATASET POLYDATA\n").map_err(|_| Error::Header(Header::DataSet))?;

        write!(out, "POINTS {} float\n", num_points)
            .map_err(|_| Error::Points(EntryPart::Header))?;
        write_block::<BO, _, _>(out, points).map_err(|e| Error::Points(EntryPart::Data(e)))?;
        write!(out, "\n").map_err(|_| Error::NewLine)?;

        write!(out, "LINES {} {}\n", num_lines, lines.len())
            .map_err(|_| Error::Lines(EntryPart::Header))?;
        write_block::<BO, _, _>(out, lines).map_err(|e| Error::Lines(EntryPart::Data(e)))?;
        write!(out, "\n").map_err(|_| Error::NewLine)?;

        log::debug!("Wrote {} fibers with {} points", num_lines, num_points);
        Ok(())
    }

    /// Dump a native buffer verbatim after converting it to byte order `BO`.
    fn write_block<BO, W, T>(
        out: &mut W,
        mut data: Vec<T>,
    ) -> std::result::Result<(), Option<std::io::ErrorKind>>
    where
        BO: ByteOrder,
        W: Write + ?Sized,
        T: byte_order::SwitchByteOrder,
    {
        byte_order::from_native::<BO, T>(&mut data);
        out.write_all(bytemuck::cast_slice(&data))
            .map_err(|e| Some(e.kind()))
    }
}

pub use self::write_fibers_impl::{check_writable, write_fibers, Error};
pub use self::write_fibers_impl::error::{EntryPart, Header as HeaderPart};

/// Serialize fiber datasets into any [`Write`] sink.
pub trait WriteFibers: Write {
    /// Write with the default big endian byte order used by VTK.
    fn write_fibers(&mut self, data: &FiberDataset) -> Result<&mut Self, Error> {
        self.write_fibers_be(data)
    }
    fn write_fibers_with_description(
        &mut self,
        data: &FiberDataset,
        description: &str,
    ) -> Result<&mut Self, Error> {
        write_fibers_impl::write_fibers::<BigEndian, _>(self, data, description)?;
        Ok(self)
    }
    fn write_fibers_ne(&mut self, data: &FiberDataset) -> Result<&mut Self, Error> {
        write_fibers_impl::write_fibers::<NativeEndian, _>(self, data, DEFAULT_DESCRIPTION)?;
        Ok(self)
    }
    fn write_fibers_le(&mut self, data: &FiberDataset) -> Result<&mut Self, Error> {
        write_fibers_impl::write_fibers::<LittleEndian, _>(self, data, DEFAULT_DESCRIPTION)?;
        Ok(self)
    }
    fn write_fibers_be(&mut self, data: &FiberDataset) -> Result<&mut Self, Error> {
        write_fibers_impl::write_fibers::<BigEndian, _>(self, data, DEFAULT_DESCRIPTION)?;
        Ok(self)
    }
}

impl<W: Write + ?Sized> WriteFibers for W {}

#[cfg(test)]
mod tests {
    use super::*;

    /// A sink that fails after accepting a fixed number of bytes.
    struct Limited(usize);

    impl Write for Limited {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.0 == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "full"));
            }
            let n = buf.len().min(self.0);
            self.0 -= n;
            Ok(n)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn rejects_multiline_description() {
        let data = FiberDataset::from_fibers(&[vec![[0.0; 3]]]);
        let res = Vec::<u8>::new().write_fibers_with_description(&data, "a\nb").map(|_| ());
        assert_eq!(res, Err(Error::Header(HeaderPart::Description)));
    }

    #[test]
    fn reports_failing_part() {
        let data = FiberDataset::from_fibers(&[vec![[0.0; 3], [1.0; 3]]]);
        // Header is 64 bytes, the POINTS line 15; fail inside the point block.
        let res = Limited(64 + 15 + 4).write_fibers(&data).map(|_| ());
        assert_eq!(
            res,
            Err(Error::Points(EntryPart::Data(Some(std::io::ErrorKind::Other))))
        );
        let res = Limited(30).write_fibers(&data).map(|_| ());
        assert_eq!(res, Err(Error::Header(HeaderPart::Description)));
    }

    #[test]
    fn check_writable_needs_no_output() {
        let data = FiberDataset::from_fibers(&[vec![[0.0; 3]]]);
        assert_eq!(check_writable(&data, "tracts"), Ok(()));
        assert_eq!(
            check_writable(&data, "a\nb"),
            Err(Error::Header(HeaderPart::Description))
        );
    }

    #[test]
    fn empty_dataset() {
        let mut out = Vec::new();
        out.write_fibers(&FiberDataset::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("POINTS 0 float\n\nLINES 0 0\n\n"));
    }
}
