//! LAS public header block
//!
//! Only the fields needed to locate, decode and place point records are read.
//! Multi-byte fields are little-endian and sit at fixed offsets from
//! [`HEADER_BASE`].

use crate::format::PointFormat;
use byteorder::{ByteOrder, LittleEndian};
use lidarlod_core::{resolve_color, Aabb, Error, LodPoint, Point3d, PointRecord, Result};
use serde::{Deserialize, Serialize};

/// Byte offset the header fields are measured from
pub const HEADER_BASE: usize = 32 * 3;

/// Highest `major * 10 + minor` version accepted
pub const MAX_SUPPORTED_VERSION: u16 = 13;

/// Length of the fixed header block covered by [`LasHeader`]
pub const HEADER_LEN: usize = HEADER_BASE + BOUNDS_FIELD + 6 * 8;

const SIGNATURE: &[u8; 4] = b"LASF";
const VERSION_MAJOR_AT: usize = 24;
const VERSION_MINOR_AT: usize = 25;

const POINT_OFFSET_FIELD: usize = 0;
const FORMAT_ID_FIELD: usize = 8;
const STRIDE_FIELD: usize = 9;
const POINT_COUNT_FIELD: usize = 11;
const SCALE_FIELD: usize = 35;
const OFFSET_FIELD: usize = 59;
const BOUNDS_FIELD: usize = 83;

/// Absolute byte offset of the point count field
pub const POINT_COUNT_AT: usize = HEADER_BASE + POINT_COUNT_FIELD;

/// File format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LasVersion {
    pub major: u8,
    pub minor: u8,
}

impl LasVersion {
    /// Combined `major * 10 + minor` form used for the support check
    pub fn combined(&self) -> u16 {
        self.major as u16 * 10 + self.minor as u16
    }
}

impl Default for LasVersion {
    fn default() -> Self {
        Self { major: 1, minor: 2 }
    }
}

/// Decoded header fields.
///
/// Serializes with the field names used by the `headers` protocol event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LasHeader {
    /// Byte offset of the first point record
    pub point_offset: u32,
    pub format_id: u8,
    /// Record stride in bytes
    pub struct_size: u16,
    pub point_count: u32,
    pub scale: [f64; 3],
    pub offset: [f64; 3],
    pub maximum_bounds: [f64; 3],
    pub minimum_bounds: [f64; 3],
    #[serde(skip)]
    pub version: LasVersion,
}

impl LasHeader {
    /// Parse the header from the start of a LAS buffer.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::InvalidData(format!(
                "buffer of {} bytes is shorter than the {} byte header",
                bytes.len(),
                HEADER_LEN
            )));
        }

        let version = LasVersion {
            major: bytes[VERSION_MAJOR_AT],
            minor: bytes[VERSION_MINOR_AT],
        };
        if version.combined() > MAX_SUPPORTED_VERSION {
            return Err(Error::UnsupportedVersion {
                version: version.combined(),
                max: MAX_SUPPORTED_VERSION,
            });
        }

        let format_id = bytes[HEADER_BASE + FORMAT_ID_FIELD];
        PointFormat::from_id(format_id)?;

        let bounds = read_f64s::<6>(bytes, HEADER_BASE + BOUNDS_FIELD);
        let header = Self {
            point_offset: LittleEndian::read_u32(&bytes[HEADER_BASE + POINT_OFFSET_FIELD..]),
            format_id,
            struct_size: LittleEndian::read_u16(&bytes[HEADER_BASE + STRIDE_FIELD..]),
            point_count: LittleEndian::read_u32(&bytes[HEADER_BASE + POINT_COUNT_FIELD..]),
            scale: read_f64s::<3>(bytes, HEADER_BASE + SCALE_FIELD),
            offset: read_f64s::<3>(bytes, HEADER_BASE + OFFSET_FIELD),
            maximum_bounds: [bounds[0], bounds[2], bounds[4]],
            minimum_bounds: [bounds[1], bounds[3], bounds[5]],
            version,
        };

        header.bounds()?;
        Ok(header)
    }

    /// Write the fields back at their documented offsets.
    ///
    /// Bytes outside the covered fields are left untouched, so this can patch
    /// a copied header in place.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < HEADER_LEN {
            return Err(Error::InvalidData(format!(
                "header buffer of {} bytes is shorter than {}",
                buf.len(),
                HEADER_LEN
            )));
        }

        buf[VERSION_MAJOR_AT] = self.version.major;
        buf[VERSION_MINOR_AT] = self.version.minor;
        LittleEndian::write_u32(&mut buf[HEADER_BASE + POINT_OFFSET_FIELD..], self.point_offset);
        buf[HEADER_BASE + FORMAT_ID_FIELD] = self.format_id;
        LittleEndian::write_u16(&mut buf[HEADER_BASE + STRIDE_FIELD..], self.struct_size);
        LittleEndian::write_u32(&mut buf[HEADER_BASE + POINT_COUNT_FIELD..], self.point_count);
        write_f64s(buf, HEADER_BASE + SCALE_FIELD, &self.scale);
        write_f64s(buf, HEADER_BASE + OFFSET_FIELD, &self.offset);

        let (max, min) = (self.maximum_bounds, self.minimum_bounds);
        write_f64s(
            buf,
            HEADER_BASE + BOUNDS_FIELD,
            &[max[0], min[0], max[1], min[1], max[2], min[2]],
        );
        Ok(())
    }

    /// Encode into a fresh header block with the `LASF` signature
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; HEADER_LEN];
        buf[..4].copy_from_slice(SIGNATURE);
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    pub fn point_format(&self) -> Result<PointFormat> {
        PointFormat::from_id(self.format_id)
    }

    /// Raw bounding box, validated to have `max >= min` on every axis
    pub fn bounds(&self) -> Result<Aabb> {
        Aabb::from_min_max(self.minimum_bounds, self.maximum_bounds)
    }

    /// Per-axis extent of the bounds
    pub fn extent(&self) -> [f64; 3] {
        [
            self.maximum_bounds[0] - self.minimum_bounds[0],
            self.maximum_bounds[1] - self.minimum_bounds[1],
            self.maximum_bounds[2] - self.minimum_bounds[2],
        ]
    }
}

fn read_f64s<const N: usize>(bytes: &[u8], at: usize) -> [f64; N] {
    let mut out = [0.0; N];
    LittleEndian::read_f64_into(&bytes[at..at + N * 8], &mut out);
    out
}

fn write_f64s(buf: &mut [u8], at: usize, values: &[f64]) {
    LittleEndian::write_f64_into(values, &mut buf[at..at + values.len() * 8]);
}

/// Maps raw record positions into a center-justified world frame.
///
/// `world = (raw * scale - min) - (max - min) / 2` per axis, so the data set
/// is centered on the origin. The minimum is subtracted before the half
/// extent so a record sitting exactly on either header bound lands exactly on
/// the matching face of [`WorldTransform::world_bounds`]. With
/// [`WorldTransform::with_header_offset`] the header offset is added to the
/// scaled position first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldTransform {
    scale: [f64; 3],
    offset: [f64; 3],
    min: [f64; 3],
    half_extent: [f64; 3],
}

impl WorldTransform {
    pub fn from_header(header: &LasHeader) -> Self {
        let extent = header.extent();
        Self {
            scale: header.scale,
            offset: [0.0; 3],
            min: header.minimum_bounds,
            half_extent: [extent[0] / 2.0, extent[1] / 2.0, extent[2] / 2.0],
        }
    }

    /// Also add the header offset, for files whose bounds are stored in
    /// offset-applied coordinates
    pub fn with_header_offset(mut self, header: &LasHeader) -> Self {
        self.offset = header.offset;
        self
    }

    /// World position of a decoded record
    pub fn apply(&self, record: &PointRecord) -> Point3d {
        let scaled = record.scaled_position(&self.scale);
        let p = [scaled.x, scaled.y, scaled.z];
        let mut world = [0.0; 3];
        for axis in 0..3 {
            world[axis] = (p[axis] + self.offset[axis] - self.min[axis]) - self.half_extent[axis];
        }
        Point3d::new(world[0], world[1], world[2])
    }

    /// Inverse of [`WorldTransform::apply`], rounded to the nearest raw unit
    pub fn to_raw(&self, position: &Point3d) -> [i32; 3] {
        let p = [position.x, position.y, position.z];
        let mut raw = [0i32; 3];
        for axis in 0..3 {
            let scaled = (p[axis] + self.half_extent[axis]) + self.min[axis] - self.offset[axis];
            raw[axis] = (scaled / self.scale[axis]).round() as i32;
        }
        raw
    }

    /// The header bounds expressed in the world frame
    pub fn world_bounds(&self) -> Aabb {
        let h = self.half_extent;
        Aabb::new(-h[0], h[0], -h[1], h[1], -h[2], h[2])
    }

    /// Renderable tuple for a record: world position, resolved color and the
    /// raw intensity as alpha
    pub fn lod_point(&self, record: &PointRecord) -> LodPoint {
        LodPoint::new(
            self.apply(record),
            resolve_color(record.color, record.classification),
            record.intensity as f64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn sample_header() -> LasHeader {
        LasHeader {
            point_offset: 227,
            format_id: 2,
            struct_size: 26,
            point_count: 4,
            scale: [0.01, 0.01, 0.01],
            offset: [0.0, 0.0, 0.0],
            maximum_bounds: [10.0, 20.0, 5.0],
            minimum_bounds: [0.0, 0.0, -5.0],
            version: LasVersion { major: 1, minor: 2 },
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let header = sample_header();
        let bytes = header.to_bytes().unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(&bytes[..4], b"LASF");

        let parsed = LasHeader::parse(&bytes).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_bounds_are_interleaved_max_min() {
        let bytes = sample_header().to_bytes().unwrap();
        let at = HEADER_BASE + BOUNDS_FIELD;
        assert_eq!(LittleEndian::read_f64(&bytes[at..]), 10.0);
        assert_eq!(LittleEndian::read_f64(&bytes[at + 8..]), 0.0);
        assert_eq!(LittleEndian::read_f64(&bytes[at + 16..]), 20.0);
        assert_eq!(LittleEndian::read_f64(&bytes[at + 40..]), -5.0);
    }

    #[test]
    fn test_rejects_newer_version() {
        let mut header = sample_header();
        header.version = LasVersion { major: 1, minor: 4 };
        let bytes = header.to_bytes().unwrap();

        match LasHeader::parse(&bytes) {
            Err(Error::UnsupportedVersion { version, max }) => {
                assert_eq!(version, 14);
                assert_eq!(max, 13);
            }
            other => panic!("expected UnsupportedVersion, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_format() {
        let mut header = sample_header();
        header.format_id = 6;
        let bytes = header.to_bytes().unwrap();
        assert!(matches!(LasHeader::parse(&bytes), Err(Error::UnsupportedFormat(6))));
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let mut header = sample_header();
        header.maximum_bounds[1] = -1.0;
        let bytes = header.to_bytes().unwrap();
        assert!(matches!(LasHeader::parse(&bytes), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_rejects_short_buffer() {
        assert!(LasHeader::parse(&[0u8; 100]).is_err());
    }

    #[test]
    fn test_world_transform_centers_bounds() {
        let header = sample_header();
        let t = WorldTransform::from_header(&header);

        let bounds = t.world_bounds();
        assert_eq!(bounds, Aabb::new(-5.0, 5.0, -10.0, 10.0, -5.0, 5.0));

        let record = PointRecord {
            position: [1000, 0, -500],
            intensity: 7,
            classification: 2,
            color: None,
        };
        let p = t.apply(&record);
        assert_relative_eq!(p.x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, -10.0, epsilon = 1e-9);
        assert_relative_eq!(p.z, -5.0, epsilon = 1e-9);

        assert_eq!(t.to_raw(&p), record.position);

        let lod = t.lod_point(&record);
        assert_eq!(lod.alpha, 7.0);
        assert_relative_eq!(lod.r, 161.0 / 255.0);
    }

    #[test]
    fn test_records_on_header_bounds_stay_inside_world_box() {
        let scale = 0.01;
        for lo in 0..60i32 {
            for hi in (lo + 1)..(lo + 60) {
                // writers derive header bounds from the scaled records
                let (min, max) = (lo as f64 * scale, hi as f64 * scale);
                let mut header = sample_header();
                header.scale = [scale; 3];
                header.minimum_bounds = [min; 3];
                header.maximum_bounds = [max; 3];

                let t = WorldTransform::from_header(&header);
                let world = t.world_bounds();
                for raw in [lo, hi] {
                    let record = PointRecord {
                        position: [raw; 3],
                        intensity: 0,
                        classification: 0,
                        color: None,
                    };
                    let p = t.apply(&record);
                    assert!(world.contains(&p), "lo={} hi={} raw={} -> {:?}", lo, hi, raw, p);
                    assert_eq!(t.to_raw(&p), record.position);
                }
            }
        }
    }

    #[test]
    fn test_world_transform_with_header_offset() {
        let mut header = sample_header();
        header.offset = [100.0, 0.0, 0.0];
        header.minimum_bounds[0] = 100.0;
        header.maximum_bounds[0] = 110.0;

        let t = WorldTransform::from_header(&header).with_header_offset(&header);
        let record = PointRecord {
            position: [500, 0, 0],
            intensity: 0,
            classification: 0,
            color: None,
        };
        assert_relative_eq!(t.apply(&record).x, 0.0, epsilon = 1e-9);
        assert_eq!(t.to_raw(&t.apply(&record)), record.position);
    }
}
