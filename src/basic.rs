use nom::bytes::complete::{tag, tag_no_case};
use nom::character::complete::{digit1, space0, space1};
use nom::combinator::{all_consuming, map_res};
use nom::sequence::{separated_pair, tuple};
use nom::IResult;
use std::fmt;
use std::str::FromStr;

use crate::model::Version;

/// Default delimiters used to split header lines into tokens.
pub const WHITESPACE: &str = " \t\r\n";

/// This enum indicates if bulk data is saved in binary.
/// NOTE: VTK files are saved in ASCII format with bulk data optionally saved in
/// Binary among ASCII type keywords.  Binary data must be placed into the file
/// immediately after the "newline" (`\n`) character from the previous ASCII
/// keyword and parameter sequence.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum FileType {
    Binary,
    ASCII,
}

impl FileType {
    /// Interpret a header token like `BINARY` or `ascii`.
    pub fn from_token(token: &str) -> Option<FileType> {
        match to_upper(trim(token, WHITESPACE)).as_str() {
            "BINARY" => Some(FileType::Binary),
            "ASCII" => Some(FileType::ASCII),
            _ => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FileType::Binary => write!(f, "BINARY"),
            FileType::ASCII => write!(f, "ASCII"),
        }
    }
}

/*
 * String utilities
 */

/// Split `source` on any of the characters in `delimiters`.
///
/// With `collapse_repeats` set, runs of delimiters act as a single separator and no empty
/// tokens are produced. Otherwise every delimiter separates two (possibly empty) tokens.
/// An empty `source` always yields no tokens.
pub fn tokenize<'a>(source: &'a str, collapse_repeats: bool, delimiters: &str) -> Vec<&'a str> {
    if source.is_empty() {
        return Vec::new();
    }
    let split = source.split(|c: char| delimiters.contains(c));
    if collapse_repeats {
        split.filter(|t| !t.is_empty()).collect()
    } else {
        split.collect()
    }
}

/// Split `source` on whitespace, dropping empty tokens.
pub fn tokens(source: &str) -> Vec<&str> {
    tokenize(source, true, WHITESPACE)
}

/// Strip leading and trailing characters contained in `charset`.
pub fn trim<'a>(source: &'a str, charset: &str) -> &'a str {
    source.trim_matches(|c: char| charset.contains(c))
}

/// Strip leading characters contained in `charset`.
pub fn left_trim<'a>(source: &'a str, charset: &str) -> &'a str {
    source.trim_start_matches(|c: char| charset.contains(c))
}

/// Strip trailing characters contained in `charset`.
pub fn right_trim<'a>(source: &'a str, charset: &str) -> &'a str {
    source.trim_end_matches(|c: char| charset.contains(c))
}

pub fn to_upper(source: &str) -> String {
    source.to_uppercase()
}

pub fn to_lower(source: &str) -> String {
    source.to_lowercase()
}

/*
 * Parsing routines
 */

/// Parse a formatted unsigned integer.
pub fn unsigned<T>(input: &str) -> IResult<&str, T>
where
    T: FromStr,
{
    map_res(digit1, |s: &str| s.parse::<T>())(input)
}

/// Parse a whole token as an unsigned count. Returns `None` if anything but digits is present
/// or the value does not fit.
pub fn count<T: FromStr>(token: &str) -> Option<T> {
    all_consuming(unsigned::<T>)(token).ok().map(|(_, n)| n)
}

/// Parse the version line, e.g. `# vtk DataFile Version 3.0`.
pub fn version(input: &str) -> IResult<&str, Version> {
    let (input, _) = tuple((
        space0,
        tag("#"),
        space0,
        tag_no_case("vtk"),
        space1,
        tag_no_case("DataFile"),
        space1,
        tag_no_case("Version"),
        space1,
    ))(input)?;
    let (input, (major, minor)) = separated_pair(unsigned::<u8>, tag("."), unsigned::<u8>)(input)?;
    let (input, _) = space0(input)?;
    Ok((input, Version::new((major, minor))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_collapses_runs() {
        assert_eq!(tokenize("a  b\tc", true, WHITESPACE), vec!["a", "b", "c"]);
        assert_eq!(tokens("  POINTS 3\tfloat\r"), vec!["POINTS", "3", "float"]);
        assert!(tokenize("", true, WHITESPACE).is_empty());
        assert!(tokenize(" \t \n", true, WHITESPACE).is_empty());
    }

    #[test]
    fn tokenize_keeps_empty_tokens() {
        assert_eq!(tokenize("a  b", false, WHITESPACE), vec!["a", "", "b"]);
        assert_eq!(tokenize(",a,", false, ","), vec!["", "a", ""]);
        assert!(tokenize("", false, WHITESPACE).is_empty());
    }

    #[test]
    fn trimming() {
        assert_eq!(trim("  BINARY \r", WHITESPACE), "BINARY");
        assert_eq!(left_trim("xxabcxx", "x"), "abcxx");
        assert_eq!(right_trim("xxabcxx", "x"), "xxabc");
        assert_eq!(trim("", WHITESPACE), "");
        for s in &["", " a ", "\t\tb c\n", "xyz", "   "] {
            let once = trim(s, WHITESPACE);
            assert_eq!(trim(once, WHITESPACE), once);
        }
    }

    #[test]
    fn case_folding() {
        assert_eq!(to_upper("binary"), "BINARY");
        assert_eq!(to_lower("FLOAT"), "float");
        assert_eq!(FileType::from_token(" binary\r"), Some(FileType::Binary));
        assert_eq!(FileType::from_token("Ascii"), Some(FileType::ASCII));
        assert_eq!(FileType::from_token("hex"), None);
    }

    #[test]
    fn can_parse_counts() {
        assert_eq!(count::<usize>("42"), Some(42));
        assert_eq!(count::<u32>("0"), Some(0));
        assert_eq!(count::<usize>("4x"), None);
        assert_eq!(count::<usize>("-1"), None);
        assert_eq!(count::<usize>(""), None);
        assert_eq!(count::<u8>("256"), None);
    }

    #[test]
    fn version_test() {
        let f = version("# vtk DataFile Version 3.0");
        assert_eq!(f, Ok(("", Version::new((3, 0)))));
        let f = version("#  vtk DataFile Version 2.0  title");
        assert_eq!(f, Ok(("title", Version::new((2, 0)))));
        assert!(version("vtk DataFile Version 3.0").is_err());
        assert!(version("# vtk DataFile Version three").is_err());
    }
}
