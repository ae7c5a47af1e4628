//! Point record formats and their decoders

use byteorder::{ByteOrder, LittleEndian};
use lidarlod_core::{Error, PointRecord, Result};

const X_AT: usize = 0;
const Y_AT: usize = 4;
const Z_AT: usize = 8;
const INTENSITY_AT: usize = 12;
const CLASSIFICATION_AT: usize = 15;

/// Pure decoder for a single record window
pub type PointDecoder = fn(&[u8]) -> PointRecord;

/// Supported point data record formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointFormat {
    /// Position, intensity, classification
    Format0,
    /// Format 0 plus GPS time
    Format1,
    /// Format 0 plus RGB at byte 20
    Format2,
    /// Format 1 plus RGB at byte 28
    Format3,
}

impl PointFormat {
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Self::Format0),
            1 => Ok(Self::Format1),
            2 => Ok(Self::Format2),
            3 => Ok(Self::Format3),
            other => Err(Error::UnsupportedFormat(other)),
        }
    }

    pub fn id(&self) -> u8 {
        match self {
            Self::Format0 => 0,
            Self::Format1 => 1,
            Self::Format2 => 2,
            Self::Format3 => 3,
        }
    }

    /// Byte offset of the RGB triple, for formats that carry color
    pub fn color_offset(&self) -> Option<usize> {
        match self {
            Self::Format0 | Self::Format1 => None,
            Self::Format2 => Some(20),
            Self::Format3 => Some(28),
        }
    }

    pub fn has_color(&self) -> bool {
        self.color_offset().is_some()
    }

    /// Smallest window that holds every field this format decodes
    pub fn min_record_len(&self) -> usize {
        match self.color_offset() {
            Some(at) => at + 6,
            None => CLASSIFICATION_AT + 1,
        }
    }

    /// Decoder function for this format
    pub fn decoder(&self) -> PointDecoder {
        match self {
            Self::Format0 | Self::Format1 => decode_plain,
            Self::Format2 => decode_rgb_at_20,
            Self::Format3 => decode_rgb_at_28,
        }
    }

    /// Decode one record, checking the window is long enough first
    pub fn decode(&self, window: &[u8]) -> Result<PointRecord> {
        if window.len() < self.min_record_len() {
            return Err(Error::InvalidData(format!(
                "record window of {} bytes is too short for format {} (needs {})",
                window.len(),
                self.id(),
                self.min_record_len()
            )));
        }
        Ok((self.decoder())(window))
    }

    /// Write the decoded fields of `record` into `window`.
    ///
    /// Other bytes in the window are left as they are. The color triple is
    /// written only when both the format and the record carry one.
    pub fn encode(&self, record: &PointRecord, window: &mut [u8]) -> Result<()> {
        if window.len() < self.min_record_len() {
            return Err(Error::InvalidData(format!(
                "record window of {} bytes is too short for format {}",
                window.len(),
                self.id()
            )));
        }

        LittleEndian::write_i32(&mut window[X_AT..], record.position[0]);
        LittleEndian::write_i32(&mut window[Y_AT..], record.position[1]);
        LittleEndian::write_i32(&mut window[Z_AT..], record.position[2]);
        LittleEndian::write_u16(&mut window[INTENSITY_AT..], record.intensity);
        window[CLASSIFICATION_AT] = record.classification;

        if let (Some(at), Some(rgb)) = (self.color_offset(), record.color) {
            LittleEndian::write_u16_into(&rgb, &mut window[at..at + 6]);
        }
        Ok(())
    }
}

/// Decoder for a format id, failing for ids with no decoder
pub fn decoder_for(format_id: u8) -> Result<PointDecoder> {
    Ok(PointFormat::from_id(format_id)?.decoder())
}

fn decode_plain(window: &[u8]) -> PointRecord {
    PointRecord {
        position: [
            LittleEndian::read_i32(&window[X_AT..]),
            LittleEndian::read_i32(&window[Y_AT..]),
            LittleEndian::read_i32(&window[Z_AT..]),
        ],
        intensity: LittleEndian::read_u16(&window[INTENSITY_AT..]),
        classification: window[CLASSIFICATION_AT],
        color: None,
    }
}

fn read_rgb(window: &[u8], at: usize) -> [u16; 3] {
    let mut rgb = [0u16; 3];
    LittleEndian::read_u16_into(&window[at..at + 6], &mut rgb);
    rgb
}

fn decode_rgb_at_20(window: &[u8]) -> PointRecord {
    PointRecord {
        color: Some(read_rgb(window, 20)),
        ..decode_plain(window)
    }
}

fn decode_rgb_at_28(window: &[u8]) -> PointRecord {
    PointRecord {
        color: Some(read_rgb(window, 28)),
        ..decode_plain(window)
    }
}
