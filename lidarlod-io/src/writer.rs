//! LAS writing
//!
//! Two entry points: plain record writing, and the optimised export that
//! turns simplified world-space points back into records behind a copy of
//! the source header.

use crate::header::{LasHeader, WorldTransform, HEADER_LEN, POINT_COUNT_AT};
use byteorder::{ByteOrder, LittleEndian};
use lidarlod_core::{Error, LodPoint, PointRecord, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Options for the optimised export
#[derive(Debug, Clone)]
pub struct OptimisedWriteOptions {
    /// Classification stamped on every exported record
    pub classification: u8,
    /// Drop points that fall outside the header bounds
    pub clip_to_bounds: bool,
}

impl Default for OptimisedWriteOptions {
    fn default() -> Self {
        Self {
            classification: 2,
            clip_to_bounds: true,
        }
    }
}

impl OptimisedWriteOptions {
    pub fn with_classification(mut self, classification: u8) -> Self {
        self.classification = classification;
        self
    }

    pub fn with_clip_to_bounds(mut self, clip: bool) -> Self {
        self.clip_to_bounds = clip;
        self
    }
}

/// Writer for LAS files
pub struct LasWriter;

impl LasWriter {
    /// Write a header and records to a file
    pub fn write_records<P: AsRef<Path>>(
        path: P,
        header: &LasHeader,
        records: &[PointRecord],
    ) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_records_to_writer(&mut writer, header, records)?;
        writer.flush()?;
        Ok(())
    }

    /// Write a header and records.
    ///
    /// Bytes between the header block and the point offset are zero-filled.
    /// The written point count is `records.len()`.
    pub fn write_records_to_writer<W: Write>(
        writer: &mut W,
        header: &LasHeader,
        records: &[PointRecord],
    ) -> Result<()> {
        let format = header.point_format()?;
        let stride = header.struct_size as usize;
        let point_offset = header.point_offset as usize;
        if point_offset < HEADER_LEN {
            return Err(Error::InvalidData(format!(
                "point offset {} overlaps the {} byte header",
                point_offset, HEADER_LEN
            )));
        }

        let mut header = header.clone();
        header.point_count = u32::try_from(records.len())
            .map_err(|_| Error::InvalidData(format!("{} records do not fit a LAS header", records.len())))?;

        let mut head = header.to_bytes()?;
        head.resize(point_offset, 0);
        writer.write_all(&head)?;

        let mut window = vec![0u8; stride];
        for record in records {
            window.fill(0);
            format.encode(record, &mut window)?;
            writer.write_all(&window)?;
        }
        Ok(())
    }

    /// Export simplified points to a file, returning the record count
    pub fn write_optimised<P: AsRef<Path>>(
        path: P,
        header_bytes: &[u8],
        transform: &WorldTransform,
        points: &[LodPoint],
        options: &OptimisedWriteOptions,
    ) -> Result<usize> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let written = Self::write_optimised_to_writer(&mut writer, header_bytes, transform, points, options)?;
        writer.flush()?;
        Ok(written)
    }

    /// Export simplified points behind a copy of the source header.
    ///
    /// `header_bytes` is the source file up to its first record. Each point is
    /// mapped back to raw units, its alpha becomes the intensity and the color
    /// channels are rescaled to 0..=255 for formats that carry color. The
    /// point count field is patched to the number of records written.
    pub fn write_optimised_to_writer<W: Write>(
        writer: &mut W,
        header_bytes: &[u8],
        transform: &WorldTransform,
        points: &[LodPoint],
        options: &OptimisedWriteOptions,
    ) -> Result<usize> {
        let header = LasHeader::parse(header_bytes)?;
        let format = header.point_format()?;
        let stride = header.struct_size as usize;
        let bounds = transform.world_bounds();

        let mut body = Vec::with_capacity(points.len() * stride);
        let mut window = vec![0u8; stride];
        let mut clipped = 0usize;

        for point in points {
            let position = point.position();
            if options.clip_to_bounds && !bounds.contains(&position) {
                clipped += 1;
                continue;
            }

            let color = format.has_color().then(|| {
                point.color().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u16)
            });
            let record = PointRecord {
                position: transform.to_raw(&position),
                intensity: point.alpha.clamp(0.0, u16::MAX as f64) as u16,
                classification: options.classification,
                color,
            };

            window.fill(0);
            format.encode(&record, &mut window)?;
            body.extend_from_slice(&window);
        }

        if clipped > 0 {
            log::debug!("optimised export dropped {} points outside the bounds", clipped);
        }

        let count = body.len() / stride.max(1);
        let mut head = header_bytes.to_vec();
        let count_field = u32::try_from(count)
            .map_err(|_| Error::InvalidData(format!("{} records do not fit a LAS header", count)))?;
        LittleEndian::write_u32(&mut head[POINT_COUNT_AT..], count_field);

        writer.write_all(&head)?;
        writer.write_all(&body)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::LasVersion;
    use crate::loader::LasLoader;
    use approx::assert_relative_eq;
    use lidarlod_core::Point3d;

    fn header(point_count: u32) -> LasHeader {
        LasHeader {
            point_offset: 240,
            format_id: 2,
            struct_size: 28,
            point_count,
            scale: [0.001; 3],
            offset: [0.0; 3],
            maximum_bounds: [10.0, 10.0, 10.0],
            minimum_bounds: [0.0, 0.0, 0.0],
            version: LasVersion::default(),
        }
    }

    #[test]
    fn test_write_records_then_load() {
        let records = vec![
            PointRecord {
                position: [1, 2, 3],
                intensity: 40,
                classification: 6,
                color: Some([255, 0, 128]),
            },
            PointRecord {
                position: [-4, 5, -6],
                intensity: 0,
                classification: 2,
                color: Some([0, 0, 0]),
            },
        ];

        let mut buf = Vec::new();
        LasWriter::write_records_to_writer(&mut buf, &header(99), &records).unwrap();
        assert_eq!(buf.len(), 240 + 2 * 28);

        let mut loader = LasLoader::new(buf).unwrap();
        assert_eq!(loader.header().point_count, 2);
        assert_eq!(loader.read_all(10).unwrap(), records);
    }

    #[test]
    fn test_optimised_export_patches_count() {
        let h = header(1000);
        let mut source = Vec::new();
        LasWriter::write_records_to_writer(&mut source, &h, &[]).unwrap();
        let header_bytes = &source[..h.point_offset as usize];

        let transform = WorldTransform::from_header(&h);
        let points = vec![
            LodPoint::new(Point3d::new(1.0, -2.0, 0.5), [1.0, 0.5, 0.0], 300.0),
            LodPoint::new(Point3d::new(-5.0, 5.0, 5.0), [0.0, 0.0, 0.0], 1.0),
            // outside the centred bounds
            LodPoint::new(Point3d::new(50.0, 0.0, 0.0), [0.0, 0.0, 0.0], 1.0),
        ];

        let mut out = Vec::new();
        let written = LasWriter::write_optimised_to_writer(
            &mut out,
            header_bytes,
            &transform,
            &points,
            &OptimisedWriteOptions::default(),
        )
        .unwrap();
        assert_eq!(written, 2);

        let mut loader = LasLoader::new(out).unwrap();
        assert_eq!(loader.header().point_count, 2);
        let records = loader.read_all(16).unwrap();
        assert_eq!(records[0].classification, 2);
        assert_eq!(records[0].intensity, 300);
        assert_eq!(records[0].color, Some([255, 128, 0]));

        let back = transform.apply(&records[0]);
        assert_relative_eq!(back.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(back.y, -2.0, epsilon = 1e-9);
        assert_relative_eq!(back.z, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_optimised_export_without_clipping() {
        let h = header(0);
        let mut source = Vec::new();
        LasWriter::write_records_to_writer(&mut source, &h, &[]).unwrap();

        let points = vec![LodPoint::new(Point3d::new(50.0, 0.0, 0.0), [0.0; 3], 1.0)];
        let options = OptimisedWriteOptions::default()
            .with_clip_to_bounds(false)
            .with_classification(9);

        let mut out = Vec::new();
        let written = LasWriter::write_optimised_to_writer(
            &mut out,
            &source,
            &WorldTransform::from_header(&h),
            &points,
            &options,
        )
        .unwrap();
        assert_eq!(written, 1);
        assert_eq!(out[240 + 15], 9);
    }

    #[test]
    fn test_optimised_export_keeps_points_on_the_bounds() {
        let mut h = header(0);
        h.scale = [0.01; 3];
        h.minimum_bounds = [2.0 * 0.01, 3.0 * 0.01, 5.0 * 0.01];
        h.maximum_bounds = [9.0 * 0.01, 17.0 * 0.01, 11.0 * 0.01];
        let mut source = Vec::new();
        LasWriter::write_records_to_writer(&mut source, &h, &[]).unwrap();

        let transform = WorldTransform::from_header(&h);
        let corners = [[2, 3, 5], [9, 17, 11]];
        let points: Vec<LodPoint> = corners
            .iter()
            .map(|&position| {
                let record = PointRecord {
                    position,
                    intensity: 1,
                    classification: 2,
                    color: None,
                };
                transform.lod_point(&record)
            })
            .collect();

        let mut out = Vec::new();
        let written = LasWriter::write_optimised_to_writer(
            &mut out,
            &source,
            &transform,
            &points,
            &OptimisedWriteOptions::default(),
        )
        .unwrap();
        assert_eq!(written, 2);

        let records = LasLoader::new(out).unwrap().read_all(4).unwrap();
        assert_eq!(records[0].position, corners[0]);
        assert_eq!(records[1].position, corners[1]);
    }

    #[test]
    fn test_rejects_overlapping_point_offset() {
        let mut h = header(0);
        h.point_offset = 100;
        let mut buf = Vec::new();
        assert!(LasWriter::write_records_to_writer(&mut buf, &h, &[]).is_err());
    }
}
