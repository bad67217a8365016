//! Capture index: maps logical sample indices onto dataset byte ranges.
//!
//! ## Dataset layout
//!
//! ```text
//! +-----------+----------+-----------+----------+-----+----------+
//! | header 0  | capture 0| header 1  | capture 1| ... | trailing |
//! +-----------+----------+-----------+----------+-----+----------+
//! ```
//!
//! Captures are walked in start order. Each capture's data begins after its
//! own `core:header_bytes`; a non-final capture owns
//! `(next_start - start) * sample_width` bytes, the final capture owns the
//! rest of the dataset up to the global trailing padding. A sample width here
//! is one sample across all channels.

use std::ops::Range;

use super::metadata::Capture;
use crate::util::{Error, Result};

/// Contiguous run of samples stored back to back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Segment {
    first_sample: u64,
    byte_start: u64,
    byte_end: u64,
}

/// Read-only view of a capture list against a dataset of known length.
#[derive(Clone, Copy, Debug)]
pub struct CaptureIndex<'a> {
    captures: &'a [Capture],
    sample_width: u64,
    data_len: u64,
    trailing_bytes: u64,
}

impl<'a> CaptureIndex<'a> {
    /// `sample_width` is the byte size of one sample across all channels.
    pub fn new(captures: &'a [Capture], sample_width: u64, data_len: u64, trailing_bytes: u64) -> Self {
        Self {
            captures,
            sample_width,
            data_len,
            trailing_bytes,
        }
    }

    /// Number of captures.
    #[inline]
    pub fn len(&self) -> usize {
        self.captures.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    /// Sum of all capture header padding.
    pub fn header_bytes(&self) -> u64 {
        self.captures
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(c.header_bytes()))
    }

    /// End of sample data: dataset length minus trailing padding.
    #[inline]
    pub fn data_end(&self) -> u64 {
        self.data_len.saturating_sub(self.trailing_bytes)
    }

    /// Bytes holding samples once every header and the trailer are removed.
    pub fn usable_bytes(&self) -> u64 {
        self.data_end().saturating_sub(self.header_bytes())
    }

    /// Number of whole samples in the dataset.
    pub fn count_samples(&self) -> u64 {
        if self.sample_width == 0 {
            return 0;
        }
        let usable = self.usable_bytes();
        if usable % self.sample_width != 0 {
            tracing::warn!(
                usable,
                sample_width = self.sample_width,
                "dataset is not a whole number of samples, trailing partial sample ignored"
            );
        }
        usable / self.sample_width
    }

    /// No padding anywhere: sample `i` lives at byte `i * sample_width`.
    pub fn is_conforming(&self) -> bool {
        self.trailing_bytes == 0 && self.captures.iter().all(|c| c.header_bytes() == 0)
    }

    /// Byte boundaries of every capture, in capture order.
    ///
    /// Boundaries are clamped to the end of sample data, so a capture that
    /// starts past the dataset is empty.
    pub fn all_boundaries(&self) -> Vec<(u64, u64)> {
        let data_end = self.data_end();
        let mut out = Vec::with_capacity(self.captures.len());
        let mut start = 0u64;
        let mut prev_sample = 0u64;

        for (i, capture) in self.captures.iter().enumerate() {
            start = start
                .saturating_add(capture.header_bytes())
                .saturating_add(self.span_bytes(prev_sample, capture.sample_start));
            prev_sample = capture.sample_start;

            let end = match self.captures.get(i + 1) {
                Some(next) => start.saturating_add(self.span_bytes(capture.sample_start, next.sample_start)),
                None => data_end,
            };
            let start = start.min(data_end);
            out.push((start, end.min(data_end).max(start)));
        }
        out
    }

    /// Bytes between two sample starts, saturating.
    #[inline]
    fn span_bytes(&self, from: u64, to: u64) -> u64 {
        to.saturating_sub(from).saturating_mul(self.sample_width)
    }

    /// Half-open byte range `(start, end)` owned by capture `index`.
    pub fn byte_boundaries(&self, index: usize) -> Result<(u64, u64)> {
        if index >= self.captures.len() {
            return Err(Error::CaptureOutOfBounds {
                index,
                count: self.captures.len(),
            });
        }
        Ok(self.all_boundaries()[index])
    }

    /// Byte range for `count` samples starting `relative_start` samples into
    /// capture `index`. Truncated at the end of the capture.
    pub fn capture_range(&self, index: usize, relative_start: u64, count: Option<u64>) -> Result<Range<u64>> {
        let (start, end) = self.byte_boundaries(index)?;
        if self.sample_width == 0 {
            return Ok(start..start);
        }
        let span = end - start;
        if span % self.sample_width != 0 {
            tracing::warn!(index, span, "capture is not a whole number of samples");
        }
        let available = span / self.sample_width;
        let first = relative_start.min(available);
        let n = count.unwrap_or(available).min(available - first);
        let lo = start + first * self.sample_width;
        Ok(lo..lo + n * self.sample_width)
    }

    fn segments(&self) -> Vec<Segment> {
        let data_end = self.data_end();
        let Some(first) = self.captures.first() else {
            return vec![Segment {
                first_sample: 0,
                byte_start: 0,
                byte_end: data_end,
            }];
        };

        let mut segments = Vec::with_capacity(self.captures.len() + 1);
        if first.sample_start > 0 {
            segments.push(Segment {
                first_sample: 0,
                byte_start: 0,
                byte_end: self.span_bytes(0, first.sample_start).min(data_end),
            });
        }
        for (capture, (byte_start, byte_end)) in self.captures.iter().zip(self.all_boundaries()) {
            segments.push(Segment {
                first_sample: capture.sample_start,
                byte_start,
                byte_end,
            });
        }
        segments
    }

    /// Byte ranges holding logical samples `[start, start + count)`.
    ///
    /// Header padding between captures is skipped; adjacent ranges are merged.
    pub fn locate(&self, start: u64, count: u64) -> Result<Vec<Range<u64>>> {
        let total = self.count_samples();
        let end = start.checked_add(count).ok_or(Error::SampleOutOfBounds {
            start,
            end: u64::MAX,
            count: total,
        })?;
        if end > total {
            return Err(Error::SampleOutOfBounds { start, end, count: total });
        }
        if count == 0 || self.sample_width == 0 {
            return Ok(Vec::new());
        }

        let w = self.sample_width;
        let mut pieces: Vec<Range<u64>> = Vec::new();
        let mut covered = 0u64;

        for seg in self.segments() {
            let seg_samples = (seg.byte_end - seg.byte_start) / w;
            let lo = start.max(seg.first_sample);
            let hi = end.min(seg.first_sample.saturating_add(seg_samples));
            if lo >= hi {
                continue;
            }
            let range = seg.byte_start + (lo - seg.first_sample) * w..seg.byte_start + (hi - seg.first_sample) * w;
            covered += hi - lo;
            match pieces.last_mut() {
                Some(last) if last.end == range.start => last.end = range.end,
                _ => pieces.push(range),
            }
        }

        if covered != count {
            return Err(Error::SampleOutOfBounds { start, end, count: covered });
        }
        Ok(pieces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(layout: &[(u64, u64)]) -> Vec<Capture> {
        layout.iter().map(|&(s, h)| Capture::with_header_bytes(s, h)).collect()
    }

    #[test]
    fn test_duplicate_start_captures() {
        // Two captures at 0 over a 256 byte ru8 dataset.
        let captures = caps(&[(0, 0), (0, 0)]);
        let index = CaptureIndex::new(&captures, 1, 256, 0);
        assert_eq!(index.count_samples(), 256);
        assert!(index.is_conforming());
        assert_eq!(index.byte_boundaries(0).unwrap(), (0, 0));
        assert_eq!(index.byte_boundaries(1).unwrap(), (0, 256));
        assert_eq!(index.capture_range(0, 0, None).unwrap(), 0..0);
        assert_eq!(index.locate(0, 256).unwrap(), vec![0..256]);
    }

    #[test]
    fn test_header_and_trailer() {
        // 32 header + 192 samples + 32 trailing.
        let captures = vec![Capture::with_header_bytes(0, 32), Capture::new(128)];
        let index = CaptureIndex::new(&captures, 1, 256, 32);
        assert_eq!(index.count_samples(), 192);
        assert!(!index.is_conforming());
        assert_eq!(index.byte_boundaries(0).unwrap(), (32, 160));
        assert_eq!(index.byte_boundaries(1).unwrap(), (160, 224));
        assert_eq!(index.locate(100, 50).unwrap(), vec![132..182]);
    }

    #[test]
    fn test_header_between_captures() {
        // 32 header + 128 samples + 16 header + 64 samples + 16 trailing.
        let captures = caps(&[(0, 32), (128, 16)]);
        let index = CaptureIndex::new(&captures, 1, 256, 16);
        assert_eq!(index.count_samples(), 192);
        assert_eq!(index.byte_boundaries(0).unwrap(), (32, 160));
        assert_eq!(index.byte_boundaries(1).unwrap(), (176, 240));
        // A read spanning both captures skips the second header.
        assert_eq!(index.locate(120, 16).unwrap(), vec![152..160, 176..184]);
    }

    #[test]
    fn test_three_captures() {
        let captures = vec![
            Capture::with_header_bytes(0, 32),
            Capture::new(32),
            Capture::with_header_bytes(128, 32),
        ];
        let index = CaptureIndex::new(&captures, 1, 256, 0);
        assert_eq!(index.count_samples(), 192);
        assert_eq!(index.byte_boundaries(0).unwrap(), (32, 64));
        assert_eq!(index.byte_boundaries(1).unwrap(), (64, 160));
        assert_eq!(index.byte_boundaries(2).unwrap(), (192, 256));
    }

    #[test]
    fn test_two_channels() {
        let captures = vec![Capture::with_header_bytes(0, 32), Capture::new(64)];
        let index = CaptureIndex::new(&captures, 2, 256, 32);
        assert_eq!(index.count_samples(), 96);
        assert_eq!(index.byte_boundaries(0).unwrap(), (32, 160));
        assert_eq!(index.byte_boundaries(1).unwrap(), (160, 224));
    }

    #[test]
    fn test_capture_range_truncates() {
        let captures = vec![Capture::with_header_bytes(0, 32), Capture::new(128)];
        let index = CaptureIndex::new(&captures, 1, 256, 32);
        assert_eq!(index.capture_range(0, 120, Some(50)).unwrap(), 152..160);
        assert_eq!(index.capture_range(0, 500, None).unwrap(), 160..160);
        assert_eq!(index.capture_range(1, 0, None).unwrap(), 160..224);
    }

    #[test]
    fn test_out_of_bounds() {
        let captures = caps(&[(0, 0)]);
        let index = CaptureIndex::new(&captures, 4, 64, 0);
        assert!(matches!(
            index.byte_boundaries(1),
            Err(Error::CaptureOutOfBounds { index: 1, count: 1 })
        ));
        assert!(matches!(index.locate(10, 10), Err(Error::SampleOutOfBounds { .. })));
        assert_eq!(index.locate(16, 0).unwrap(), Vec::<Range<u64>>::new());
    }

    #[test]
    fn test_no_captures_covers_everything() {
        let index = CaptureIndex::new(&[], 8, 80, 0);
        assert_eq!(index.count_samples(), 10);
        assert_eq!(index.locate(2, 3).unwrap(), vec![16..40]);
    }

    #[test]
    fn test_huge_sample_start_is_clamped() {
        // 10 cf64 samples; the second capture starts far past the dataset.
        let captures = vec![Capture::new(0), Capture::new(1 << 62)];
        let index = CaptureIndex::new(&captures, 16, 160, 0);
        assert_eq!(index.byte_boundaries(0).unwrap(), (0, 160));
        assert_eq!(index.byte_boundaries(1).unwrap(), (160, 160));
        assert_eq!(index.capture_range(1, 0, None).unwrap(), 160..160);
        assert_eq!(index.count_samples(), 10);
        assert_eq!(index.locate(0, 10).unwrap(), vec![0..160]);

        let captures = vec![Capture::with_header_bytes(u64::MAX, u64::MAX)];
        let index = CaptureIndex::new(&captures, 16, 160, 0);
        assert_eq!(index.byte_boundaries(0).unwrap(), (160, 160));
        assert_eq!(index.count_samples(), 0);
        assert!(index.locate(0, 1).is_err());
    }
}
