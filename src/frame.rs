//! Captured frame containers.
//!
//! - `Plane`: raw little-endian element buffer with its shape and element type.
//! - `Frame`: one synchronized capture (color + depth) tagged with a sequence
//!   number and a monotonic capture timestamp.
//! - `Channel`: the named streams inside a frame and their on-disk naming.
//!
//! Planes are row-major; the last dimension varies fastest.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// ----------------------------------------------------------------------------
// Channel
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    Color,
    Depth,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Color, Channel::Depth];

    /// Name used in `metadata.txt`.
    pub fn metadata_name(self) -> &'static str {
        match self {
            Channel::Color => "RGB",
            Channel::Depth => "Depth",
        }
    }

    /// Sub-directory of the session holding this channel's frame files.
    pub fn dir_name(self) -> &'static str {
        match self {
            Channel::Color => "rgb",
            Channel::Depth => "depth",
        }
    }

    /// File name stem, e.g. `color` in `color_0042.bin`.
    pub fn file_stem(self) -> &'static str {
        match self {
            Channel::Color => "color",
            Channel::Depth => "depth",
        }
    }

    pub fn from_metadata_name(name: &str) -> Option<Self> {
        Channel::ALL
            .into_iter()
            .find(|c| c.metadata_name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metadata_name())
    }
}

// ----------------------------------------------------------------------------
// ElementType
// ----------------------------------------------------------------------------

/// Element type of a plane, spelled the numpy way in metadata (`uint8`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Uint8,
    Uint16,
    Int16,
    Uint32,
    Float32,
    Float64,
}

impl ElementType {
    pub fn size_bytes(self) -> usize {
        match self {
            ElementType::Uint8 => 1,
            ElementType::Uint16 | ElementType::Int16 => 2,
            ElementType::Uint32 | ElementType::Float32 => 4,
            ElementType::Float64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::Uint8 => "uint8",
            ElementType::Uint16 => "uint16",
            ElementType::Int16 => "int16",
            ElementType::Uint32 => "uint32",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
        }
    }

    fn decode(self, bytes: &[u8]) -> f64 {
        match self {
            ElementType::Uint8 => bytes[0] as f64,
            ElementType::Uint16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            ElementType::Int16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            ElementType::Uint32 => {
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            ElementType::Float32 => {
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            ElementType::Float64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[..8]);
                f64::from_le_bytes(raw)
            }
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "uint8" => Ok(ElementType::Uint8),
            "uint16" => Ok(ElementType::Uint16),
            "int16" => Ok(ElementType::Int16),
            "uint32" => Ok(ElementType::Uint32),
            "float32" => Ok(ElementType::Float32),
            "float64" => Ok(ElementType::Float64),
            other => Err(format!("unsupported element type '{}'", other)),
        }
    }
}

// ----------------------------------------------------------------------------
// Shape
// ----------------------------------------------------------------------------

/// Plane dimensions. Displays as a tuple: `(1080, 1920, 4)`, `(5,)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape(pub Vec<usize>);

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of elements, `None` on overflow.
    pub fn element_count(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |acc, d| acc.checked_mul(*d))
    }

    /// `(height, width)` of an image-like shape.
    pub fn height_width(&self) -> Option<(usize, usize)> {
        match self.0.as_slice() {
            [h, w] | [h, w, _] => Some((*h, *w)),
            _ => None,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "({},)", single),
            dims => {
                let joined: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
                write!(f, "({})", joined.join(", "))
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Plane
// ----------------------------------------------------------------------------

/// Raw channel buffer. Length always equals `shape.element_count() * element size`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plane {
    shape: Shape,
    element_type: ElementType,
    data: Vec<u8>,
}

impl Plane {
    pub fn new(shape: Shape, element_type: ElementType, data: Vec<u8>) -> Result<Self> {
        let expected = expected_len(&shape, element_type)?;
        if data.len() != expected {
            return Err(Error::InvalidPlane(format!(
                "{} {} needs {} bytes, got {}",
                shape,
                element_type,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            shape,
            element_type,
            data,
        })
    }

    pub fn from_u16(shape: Shape, values: &[u16]) -> Result<Self> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(shape, ElementType::Uint16, data)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Decode every element as `f64` (used for depth normalization).
    pub fn values_f64(&self) -> Vec<f64> {
        let size = self.element_type.size_bytes();
        self.data
            .chunks_exact(size)
            .map(|chunk| self.element_type.decode(chunk))
            .collect()
    }

    /// Whether this plane has the shape and element type described by metadata.
    pub fn matches(&self, shape: &Shape, element_type: ElementType) -> bool {
        &self.shape == shape && self.element_type == element_type
    }
}

/// Byte length of a plane with the given layout.
pub fn expected_len(shape: &Shape, element_type: ElementType) -> Result<usize> {
    shape
        .element_count()
        .and_then(|n| n.checked_mul(element_type.size_bytes()))
        .ok_or_else(|| Error::InvalidPlane(format!("shape {} overflows", shape)))
}

// ----------------------------------------------------------------------------
// CapturePair / Frame
// ----------------------------------------------------------------------------

/// What a `FrameSource` hands back for one capture call.
#[derive(Clone, Debug, Default)]
pub struct CapturePair {
    pub color: Option<Plane>,
    pub depth: Option<Plane>,
}

impl CapturePair {
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.depth.is_none()
    }
}

/// A sequenced, timestamped capture.
#[derive(Clone, Debug)]
pub struct Frame {
    pub sequence: u64,
    /// Monotonic seconds.
    pub timestamp: f64,
    pub color: Option<Plane>,
    pub depth: Option<Plane>,
}

impl Frame {
    pub fn new(sequence: u64, timestamp: f64, pair: CapturePair) -> Self {
        Self {
            sequence,
            timestamp,
            color: pair.color,
            depth: pair.depth,
        }
    }

    pub fn plane(&self, channel: Channel) -> Option<&Plane> {
        match channel {
            Channel::Color => self.color.as_ref(),
            Channel::Depth => self.depth.as_ref(),
        }
    }

    pub fn byte_len(&self) -> usize {
        Channel::ALL
            .iter()
            .filter_map(|c| self.plane(*c))
            .map(Plane::byte_len)
            .sum()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_displays_like_a_tuple() {
        assert_eq!(Shape::new(vec![1080, 1920, 4]).to_string(), "(1080, 1920, 4)");
        assert_eq!(Shape::new(vec![5]).to_string(), "(5,)");
        assert_eq!(Shape::new(vec![3, 4]).to_string(), "(3, 4)");
    }

    #[test]
    fn plane_rejects_wrong_length() {
        let err = Plane::new(Shape::new(vec![2, 2]), ElementType::Uint16, vec![0; 4]);
        assert!(err.is_err());
        let ok = Plane::new(Shape::new(vec![2, 2]), ElementType::Uint16, vec![0; 8]);
        assert!(ok.is_ok());
    }

    #[test]
    fn u16_values_are_little_endian() {
        let plane = Plane::from_u16(Shape::new(vec![3]), &[1, 256, 65535]).unwrap();
        assert_eq!(plane.as_bytes(), &[1, 0, 0, 1, 255, 255]);
        assert_eq!(plane.values_f64(), vec![1.0, 256.0, 65535.0]);
    }

    #[test]
    fn element_type_names_round_trip() {
        for ty in [
            ElementType::Uint8,
            ElementType::Uint16,
            ElementType::Int16,
            ElementType::Uint32,
            ElementType::Float32,
            ElementType::Float64,
        ] {
            assert_eq!(ty.name().parse::<ElementType>().unwrap(), ty);
        }
        assert!("complex128".parse::<ElementType>().is_err());
    }

    #[test]
    fn channel_names_match_session_layout() {
        assert_eq!(Channel::from_metadata_name("RGB"), Some(Channel::Color));
        assert_eq!(Channel::from_metadata_name(" depth "), Some(Channel::Depth));
        assert_eq!(Channel::Color.dir_name(), "rgb");
        assert_eq!(Channel::Color.file_stem(), "color");
        assert_eq!(Channel::from_metadata_name("IR"), None);
    }
}
