//! Sample decoder: raw dataset bytes to logical samples.
//!
//! Decoding is a pure function of the byte slice and the descriptor. Complex
//! components are paired into one sample first; the resulting samples are then
//! de-interleaved round-robin across channels into a `(sample, channel)` array.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use ndarray::{Array1, ArrayD, IxDyn};
use num_complex::Complex64;

use super::datatype::{ComponentFormat, DataType, Endianness};
use crate::util::{Error, Result};

/// Options controlling how samples are returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleOptions {
    /// Scale fixed-point samples into [-1.0, 1.0).
    pub autoscale: bool,
    /// Return raw component values: no complex pairing, no scaling.
    pub raw_components: bool,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            autoscale: true,
            raw_components: false,
        }
    }
}

impl SampleOptions {
    /// Raw magnitudes, complex samples still paired.
    pub fn unscaled() -> Self {
        Self {
            autoscale: false,
            raw_components: false,
        }
    }

    /// Raw component values.
    pub fn raw() -> Self {
        Self {
            autoscale: false,
            raw_components: true,
        }
    }
}

/// Decoded samples.
///
/// One channel yields a 1-D array; more channels yield a 2-D
/// `(sample, channel)` array.
#[derive(Clone, Debug, PartialEq)]
pub enum Samples {
    Real(ArrayD<f64>),
    Complex(ArrayD<Complex64>),
}

impl Samples {
    /// Number of samples (first axis).
    pub fn len(&self) -> usize {
        self.shape().first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Real(a) => a.shape(),
            Self::Complex(a) => a.shape(),
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, Self::Complex(_))
    }

    pub fn as_real(&self) -> Option<&ArrayD<f64>> {
        match self {
            Self::Real(a) => Some(a),
            Self::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&ArrayD<Complex64>> {
        match self {
            Self::Complex(a) => Some(a),
            Self::Real(_) => None,
        }
    }
}

type ComponentReader = fn(&[u8]) -> f64;

fn component_reader(dt: &DataType) -> Result<ComponentReader> {
    use ComponentFormat::*;
    use Endianness::*;

    let reader: ComponentReader = match (dt.format, dt.bits, dt.endianness) {
        (Float, 32, Little) => |b: &[u8]| LittleEndian::read_f32(b) as f64,
        (Float, 32, Big) => |b: &[u8]| BigEndian::read_f32(b) as f64,
        (Float, 64, Little) => LittleEndian::read_f64,
        (Float, 64, Big) => BigEndian::read_f64,
        (Signed, 8, _) => |b: &[u8]| b[0] as i8 as f64,
        (Unsigned, 8, _) => |b: &[u8]| b[0] as f64,
        (Signed, 16, Little) => |b: &[u8]| LittleEndian::read_i16(b) as f64,
        (Signed, 16, Big) => |b: &[u8]| BigEndian::read_i16(b) as f64,
        (Unsigned, 16, Little) => |b: &[u8]| LittleEndian::read_u16(b) as f64,
        (Unsigned, 16, Big) => |b: &[u8]| BigEndian::read_u16(b) as f64,
        (Signed, 32, Little) => |b: &[u8]| LittleEndian::read_i32(b) as f64,
        (Signed, 32, Big) => |b: &[u8]| BigEndian::read_i32(b) as f64,
        (Unsigned, 32, Little) => |b: &[u8]| LittleEndian::read_u32(b) as f64,
        (Unsigned, 32, Big) => |b: &[u8]| BigEndian::read_u32(b) as f64,
        _ => return Err(Error::InvalidDatatype(dt.to_string())),
    };
    Ok(reader)
}

/// Map a fixed-point component onto [-1.0, 1.0).
#[inline]
fn scale(value: f64, dt: &DataType) -> f64 {
    let half = (1u64 << (dt.bits - 1)) as f64;
    match dt.format {
        ComponentFormat::Unsigned => (value - half) / half,
        ComponentFormat::Signed => value / half,
        ComponentFormat::Float => value,
    }
}

fn shaped<T>(values: Vec<T>, rows: usize, cols: usize) -> Result<ArrayD<T>> {
    if cols == 1 {
        return Ok(Array1::from_vec(values).into_dyn());
    }
    ArrayD::from_shape_vec(IxDyn(&[rows, cols]), values).map_err(|e| Error::Decode(e.to_string()))
}

/// Decode `bytes` as samples of `dt` interleaved over `num_channels`.
///
/// A trailing partial sample group is ignored.
pub fn decode(bytes: &[u8], dt: &DataType, num_channels: usize, opts: SampleOptions) -> Result<Samples> {
    if num_channels == 0 {
        return Err(Error::Decode("channel count must be at least 1".into()));
    }
    let read = component_reader(dt)?;
    let width = dt.component_bytes();
    let per_row = dt.components() * num_channels;
    let rows = bytes.len() / width / per_row;
    let used = &bytes[..rows * per_row * width];

    let components = used.chunks_exact(width).map(read);

    if opts.raw_components {
        let values: Vec<f64> = components.collect();
        if num_channels == 1 {
            return Ok(Samples::Real(Array1::from_vec(values).into_dyn()));
        }
        return Ok(Samples::Real(shaped(values, rows, per_row)?));
    }

    let scaled: Vec<f64> = if opts.autoscale && dt.is_fixed_point() {
        components.map(|v| scale(v, dt)).collect()
    } else {
        components.collect()
    };

    if dt.complex {
        let values: Vec<Complex64> = scaled.chunks_exact(2).map(|c| Complex64::new(c[0], c[1])).collect();
        Ok(Samples::Complex(shaped(values, rows, num_channels)?))
    } else {
        Ok(Samples::Real(shaped(scaled, rows, num_channels)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::s;

    fn u16_le(values: impl IntoIterator<Item = u16>) -> Vec<u8> {
        values.into_iter().flat_map(u16::to_le_bytes).collect()
    }

    #[test]
    fn test_real_u8_unscaled() {
        let bytes: Vec<u8> = (0..16).collect();
        let dt = DataType::parse("ru8").unwrap();
        let samples = decode(&bytes, &dt, 1, SampleOptions::unscaled()).unwrap();
        assert_eq!(samples.ndim(), 1);
        assert_eq!(samples.len(), 16);
        assert_eq!(samples.as_real().unwrap()[[5]], 5.0);
    }

    #[test]
    fn test_autoscale_ranges() {
        let dt = DataType::parse("ru8").unwrap();
        let s = decode(&[0, 128, 255], &dt, 1, SampleOptions::default()).unwrap();
        let a = s.as_real().unwrap();
        assert_eq!(a[[0]], -1.0);
        assert_eq!(a[[1]], 0.0);
        assert!(a[[2]] < 1.0 && a[[2]] > 0.99);

        let dt = DataType::parse("ri16_be").unwrap();
        let bytes: Vec<u8> = [i16::MIN, 0, 16384].iter().flat_map(|v| v.to_be_bytes()).collect();
        let s = decode(&bytes, &dt, 1, SampleOptions::default()).unwrap();
        let a = s.as_real().unwrap();
        assert_eq!(a[[0]], -1.0);
        assert_eq!(a[[1]], 0.0);
        assert_eq!(a[[2]], 0.5);
    }

    #[test]
    fn test_float_not_scaled() {
        let dt = DataType::parse("rf32_le").unwrap();
        let bytes: Vec<u8> = [3.5f32, -100.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        let s = decode(&bytes, &dt, 1, SampleOptions::default()).unwrap();
        assert_eq!(s.as_real().unwrap().as_slice().unwrap(), &[3.5, -100.0]);
    }

    #[test]
    fn test_complex_multichannel_layout() {
        // 18 u16 components: 9 complex samples over 3 channels.
        let bytes = u16_le(0..18);
        let dt = DataType::parse("cu16_le").unwrap();
        let s = decode(&bytes, &dt, 3, SampleOptions::unscaled()).unwrap();
        assert!(s.is_complex());
        assert_eq!(s.shape(), &[3, 3]);
        let a = s.as_complex().unwrap();
        assert_eq!(a[[1, 0]], Complex64::new(6.0, 7.0));
        assert_eq!(a[[2, 0]], Complex64::new(12.0, 13.0));
        assert_eq!(a[[0, 2]], Complex64::new(4.0, 5.0));
        let ch0: Vec<Complex64> = a.slice(s![.., 0]).iter().copied().collect();
        assert_eq!(ch0.len(), 3);
    }

    #[test]
    fn test_raw_components() {
        let bytes = u16_le(0..8);
        let dt = DataType::parse("ci16_le").unwrap();
        let s = decode(&bytes, &dt, 1, SampleOptions::raw()).unwrap();
        assert!(!s.is_complex());
        assert_eq!(s.len(), 8);

        let s = decode(&bytes, &dt, 2, SampleOptions::raw()).unwrap();
        assert_eq!(s.shape(), &[2, 4]);
    }

    #[test]
    fn test_partial_group_ignored() {
        let dt = DataType::parse("ri16_le").unwrap();
        let s = decode(&[1, 0, 2, 0, 3], &dt, 2, SampleOptions::unscaled()).unwrap();
        assert_eq!(s.shape(), &[1, 2]);
        assert!(decode(&[], &dt, 2, SampleOptions::unscaled()).unwrap().is_empty());
    }
}
