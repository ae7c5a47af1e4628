//! Batched, cursor-based reading of point records

use crate::format::PointFormat;
use crate::header::LasHeader;
use lidarlod_core::{Error, PointRecord, Result};

/// Reads point records out of a LAS byte buffer in bounded batches.
///
/// The loader keeps a read cursor measured in records. Each call to
/// [`LasLoader::load_data`] advances it, so a file is consumed once from
/// front to back unless [`LasLoader::reset`] is called.
#[derive(Debug)]
pub struct LasLoader<B: AsRef<[u8]>> {
    bytes: B,
    header: LasHeader,
    format: PointFormat,
    /// Records actually present in the buffer, never above the header count
    available: usize,
    read_offset: usize,
}

impl<B: AsRef<[u8]>> LasLoader<B> {
    /// Parse the header and prepare to read records.
    pub fn new(bytes: B) -> Result<Self> {
        let header = LasHeader::parse(bytes.as_ref())?;
        let format = header.point_format()?;
        let stride = header.struct_size as usize;

        if stride < format.min_record_len() {
            return Err(Error::InvalidData(format!(
                "record stride {} is too small for format {} (needs {})",
                stride,
                format.id(),
                format.min_record_len()
            )));
        }

        let len = bytes.as_ref().len();
        let start = header.point_offset as usize;
        if start > len {
            return Err(Error::InvalidData(format!(
                "point data offset {} is past the end of a {} byte buffer",
                start, len
            )));
        }

        let declared = header.point_count as usize;
        let present = (len - start) / stride;
        let available = if present < declared {
            log::warn!(
                "header declares {} points but only {} fit in the buffer, reading what is there",
                declared,
                present
            );
            present
        } else {
            declared
        };

        log::debug!(
            "LAS {}.{} format {} stride {}: {} points",
            header.version.major,
            header.version.minor,
            format.id(),
            stride,
            available
        );

        Ok(Self {
            bytes,
            header,
            format,
            available,
            read_offset: 0,
        })
    }

    pub fn header(&self) -> &LasHeader {
        &self.header
    }

    pub fn format(&self) -> PointFormat {
        self.format
    }

    /// Number of records readable from the buffer
    pub fn point_count(&self) -> usize {
        self.available
    }

    /// Records examined so far
    pub fn read_offset(&self) -> usize {
        self.read_offset
    }

    pub fn remaining(&self) -> usize {
        self.available - self.read_offset
    }

    /// Raw header block, up to the first point record
    pub fn header_bytes(&self) -> &[u8] {
        &self.bytes.as_ref()[..self.header.point_offset as usize]
    }

    /// Rewind the cursor to the first record
    pub fn reset(&mut self) {
        self.read_offset = 0;
    }

    /// Read the next batch.
    ///
    /// With `skip <= 1` this returns up to `count` consecutive records. With a
    /// larger `skip` it examines up to `count * skip` records and keeps every
    /// `skip`th one, starting with the first. Skipped records still advance the
    /// cursor.
    pub fn load_data(&mut self, count: usize, skip: usize) -> PointBatch {
        let stride = self.header.struct_size as usize;
        let start = self.header.point_offset as usize + self.read_offset * stride;
        let bytes = self.bytes.as_ref();

        let (data, kept) = if skip <= 1 {
            let n = count.min(self.remaining());
            self.read_offset += n;
            (bytes[start..start + n * stride].to_vec(), n)
        } else {
            let examined = count.saturating_mul(skip).min(self.remaining());
            let kept = examined.div_ceil(skip);
            let mut data = Vec::with_capacity(kept * stride);
            for record in bytes[start..start + examined * stride]
                .chunks_exact(stride)
                .step_by(skip)
            {
                data.extend_from_slice(record);
            }
            self.read_offset += examined;
            (data, kept)
        };

        PointBatch {
            bytes: data,
            count: kept,
            stride,
            format: self.format,
            has_more_data: self.read_offset < self.available,
        }
    }

    /// Iterate over the remaining records in batches
    pub fn batches(&mut self, batch_size: usize, skip: usize) -> Batches<'_, B> {
        Batches {
            loader: self,
            batch_size: batch_size.max(1),
            skip,
        }
    }

    /// Decode every remaining record, one batch at a time.
    pub fn read_all(&mut self, batch_size: usize) -> Result<Vec<PointRecord>> {
        let mut records = Vec::with_capacity(self.remaining());
        for batch in self.batches(batch_size, 1) {
            for record in batch.iter() {
                records.push(record?);
            }
        }
        Ok(records)
    }
}

/// Iterator returned by [`LasLoader::batches`]
pub struct Batches<'a, B: AsRef<[u8]>> {
    loader: &'a mut LasLoader<B>,
    batch_size: usize,
    skip: usize,
}

impl<B: AsRef<[u8]>> Iterator for Batches<'_, B> {
    type Item = PointBatch;

    fn next(&mut self) -> Option<PointBatch> {
        if self.loader.remaining() == 0 {
            return None;
        }
        Some(self.loader.load_data(self.batch_size, self.skip))
    }
}

/// A contiguous run of raw records copied out of the file
#[derive(Debug, Clone)]
pub struct PointBatch {
    bytes: Vec<u8>,
    count: usize,
    stride: usize,
    format: PointFormat,
    has_more_data: bool,
}

impl PointBatch {
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether the loader had records left after this batch
    pub fn has_more_data(&self) -> bool {
        self.has_more_data
    }

    /// Raw record bytes, `len() * stride` long
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode the record at `index`
    pub fn get_point(&self, index: usize) -> Result<PointRecord> {
        if index >= self.count {
            return Err(Error::IndexOutOfRange {
                index,
                count: self.count,
            });
        }
        let at = index * self.stride;
        self.format.decode(&self.bytes[at..at + self.stride])
    }

    /// Decode records in order
    pub fn iter(&self) -> impl Iterator<Item = Result<PointRecord>> + '_ {
        (0..self.count).map(move |i| self.get_point(i))
    }
}
