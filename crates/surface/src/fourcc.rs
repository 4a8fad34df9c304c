//! Four-character codes identifying driver image layouts.

use std::fmt;
use std::str::FromStr;

/// A FourCC code as exchanged with the driver.
///
/// Stored as the four raw bytes; [`FourCc::to_u32`] gives the little-endian
/// packed value drivers use on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc([u8; 4]);

/// Planar YUV 4:2:0 with the V plane stored before U.
pub const YV12: FourCc = FourCc::new(*b"YV12");
/// Planar YUV 4:2:0, U before V.
pub const I420: FourCc = FourCc::new(*b"I420");
/// Alias some drivers report for [`I420`].
pub const IYUV: FourCc = FourCc::new(*b"IYUV");
/// Y plane plus interleaved UV plane at half resolution.
pub const NV12: FourCc = FourCc::new(*b"NV12");
/// Packed 4:2:2, U Y0 V Y1.
pub const UYVY: FourCc = FourCc::new(*b"UYVY");
/// Packed 4:2:2, Y0 U Y1 V.
pub const YUY2: FourCc = FourCc::new(*b"YUY2");
/// 32-bit RGBA.
pub const RGBA: FourCc = FourCc::new(*b"RGBA");
/// 32-bit RGB with an ignored alpha byte.
pub const RGBX: FourCc = FourCc::new(*b"RGBX");
/// 32-bit BGRA.
pub const BGRA: FourCc = FourCc::new(*b"BGRA");
/// 32-bit BGR with an ignored alpha byte.
pub const BGRX: FourCc = FourCc::new(*b"BGRX");

impl FourCc {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(self) -> [u8; 4] {
        self.0
    }

    /// Little-endian packed value, as drivers encode it.
    pub const fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// The code as text, if all four bytes are printable ASCII.
    pub fn as_str(&self) -> Option<&str> {
        if self.0.iter().all(|&b| (0x20..0x7f).contains(&b)) {
            std::str::from_utf8(&self.0).ok()
        } else {
            None
        }
    }
}

impl From<u32> for FourCc {
    fn from(value: u32) -> Self {
        Self(value.to_le_bytes())
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => f.write_str(s),
            None => write!(f, "0x{:08x}", self.to_u32()),
        }
    }
}

impl FromStr for FourCc {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 {
            return Err("fourcc must be exactly 4 bytes");
        }
        Ok(Self([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_little_endian() {
        assert_eq!(NV12.to_u32(), u32::from_le_bytes(*b"NV12"));
        assert_eq!(FourCc::from(NV12.to_u32()), NV12);
    }

    #[test]
    fn displays_printable_codes_as_text() {
        assert_eq!(YV12.to_string(), "YV12");
        assert_eq!("YUY2".parse::<FourCc>().unwrap(), YUY2);
    }

    #[test]
    fn displays_unprintable_codes_as_hex() {
        let odd = FourCc::new([0x01, 0x02, 0x03, 0x04]);
        assert_eq!(odd.as_str(), None);
        assert_eq!(odd.to_string(), "0x04030201");
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("NV1".parse::<FourCc>().is_err());
        assert!("NV123".parse::<FourCc>().is_err());
    }
}
