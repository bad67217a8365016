//! Sample datatype descriptors.
//!
//! A SigMF datatype string such as `cf32_le` or `ru8` fully describes how one
//! sample is laid out on disk: real or complex, component format, component
//! width and byte order.

use std::fmt;
use std::str::FromStr;

use crate::util::{Error, Result};

/// Component storage format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ComponentFormat {
    /// IEEE 754 floating point
    Float = 0,
    /// Two's complement signed integer
    Signed = 1,
    /// Unsigned integer
    Unsigned = 2,
}

impl ComponentFormat {
    #[inline]
    const fn prefix(self) -> char {
        match self {
            Self::Float => 'f',
            Self::Signed => 'i',
            Self::Unsigned => 'u',
        }
    }
}

/// Byte order of multi-byte components.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// Parsed SigMF datatype.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DataType {
    pub format: ComponentFormat,
    /// Width of one component in bits.
    pub bits: u8,
    pub complex: bool,
    pub endianness: Endianness,
}

impl DataType {
    /// Create a datatype, checking that the width is legal for the format.
    pub fn new(format: ComponentFormat, bits: u8, complex: bool, endianness: Endianness) -> Result<Self> {
        let legal = match format {
            ComponentFormat::Float => matches!(bits, 32 | 64),
            ComponentFormat::Signed | ComponentFormat::Unsigned => matches!(bits, 8 | 16 | 32),
        };
        if !legal {
            return Err(Error::InvalidDatatype(format!(
                "{}{} is not a supported component type",
                format.prefix(),
                bits
            )));
        }
        Ok(Self { format, bits, complex, endianness })
    }

    /// Parse a SigMF datatype string.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidDatatype(s.to_string());

        let mut chars = s.chars();
        let complex = match chars.next() {
            Some('r') => false,
            Some('c') => true,
            _ => return Err(invalid()),
        };
        let format = match chars.next() {
            Some('f') => ComponentFormat::Float,
            Some('i') => ComponentFormat::Signed,
            Some('u') => ComponentFormat::Unsigned,
            _ => return Err(invalid()),
        };

        let rest = chars.as_str();
        let (width, endianness) = match rest.split_once('_') {
            Some((w, "le")) => (w, Endianness::Little),
            Some((w, "be")) => (w, Endianness::Big),
            Some(_) => return Err(invalid()),
            None => (rest, Endianness::Little),
        };
        let bits: u8 = width.parse().map_err(|_| invalid())?;

        Self::new(format, bits, complex, endianness).map_err(|_| invalid())
    }

    /// Size of one component in bytes.
    #[inline]
    pub const fn component_bytes(&self) -> usize {
        self.bits as usize / 8
    }

    /// Size of one (single channel) sample in bytes: two components if complex.
    #[inline]
    pub const fn sample_bytes(&self) -> usize {
        self.component_bytes() * if self.complex { 2 } else { 1 }
    }

    /// Number of components per sample.
    #[inline]
    pub const fn components(&self) -> usize {
        if self.complex {
            2
        } else {
            1
        }
    }

    /// Returns true for integer encodings.
    #[inline]
    pub const fn is_fixed_point(&self) -> bool {
        !matches!(self.format, ComponentFormat::Float)
    }

    /// Returns true for signed integer encodings.
    #[inline]
    pub const fn is_signed(&self) -> bool {
        matches!(self.format, ComponentFormat::Signed)
    }

    /// Returns true for unsigned integer encodings.
    #[inline]
    pub const fn is_unsigned(&self) -> bool {
        matches!(self.format, ComponentFormat::Unsigned)
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.complex { 'c' } else { 'r' },
            self.format.prefix(),
            self.bits
        )?;
        if self.bits > 8 {
            match self.endianness {
                Endianness::Little => f.write_str("_le")?,
                Endianness::Big => f.write_str("_be")?,
            }
        }
        Ok(())
    }
}
