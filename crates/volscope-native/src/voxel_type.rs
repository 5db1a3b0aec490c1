//! Voxel element types.

use std::fmt;

use bytemuck::Pod;

/// Element type of the voxels stored in a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoxelType {
    /// `u8` voxels.
    UChar,
    /// `i16` voxels.
    Short,
    /// `u16` voxels.
    UShort,
    /// `f32` voxels.
    Float,
    /// `f64` voxels.
    Double,
}

impl VoxelType {
    /// All supported voxel types.
    pub const ALL: [VoxelType; 5] = [
        VoxelType::UChar,
        VoxelType::Short,
        VoxelType::UShort,
        VoxelType::Float,
        VoxelType::Double,
    ];

    /// Parses the `voxelType` parameter spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "uchar" => Some(Self::UChar),
            "short" => Some(Self::Short),
            "ushort" => Some(Self::UShort),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            _ => None,
        }
    }

    /// Returns the `voxelType` parameter spelling.
    pub fn name(self) -> &'static str {
        match self {
            Self::UChar => "uchar",
            Self::Short => "short",
            Self::UShort => "ushort",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    /// Size of one voxel in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::UChar => 1,
            Self::Short | Self::UShort => 2,
            Self::Float => 4,
            Self::Double => 8,
        }
    }

    /// Decodes one voxel from native-endian bytes.
    ///
    /// `bytes` must hold exactly [`VoxelType::size`] bytes.
    #[allow(clippy::cast_possible_truncation)]
    pub fn decode(self, bytes: &[u8]) -> f32 {
        match self {
            Self::UChar => f32::from(bytes[0]),
            Self::Short => f32::from(bytemuck::pod_read_unaligned::<i16>(bytes)),
            Self::UShort => f32::from(bytemuck::pod_read_unaligned::<u16>(bytes)),
            Self::Float => bytemuck::pod_read_unaligned::<f32>(bytes),
            Self::Double => bytemuck::pod_read_unaligned::<f64>(bytes) as f32,
        }
    }

    /// Encodes one voxel into `out`, rounding and saturating for integer types.
    ///
    /// `out` must hold exactly [`VoxelType::size`] bytes.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn encode(self, value: f32, out: &mut [u8]) {
        match self {
            Self::UChar => out[0] = value.round() as u8,
            Self::Short => out.copy_from_slice(bytemuck::bytes_of(&(value.round() as i16))),
            Self::UShort => out.copy_from_slice(bytemuck::bytes_of(&(value.round() as u16))),
            Self::Float => out.copy_from_slice(bytemuck::bytes_of(&value)),
            Self::Double => out.copy_from_slice(bytemuck::bytes_of(&f64::from(value))),
        }
    }
}

impl fmt::Display for VoxelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rust element types that can be written to a volume directly.
pub trait Voxel: Pod {
    /// The matching voxel type tag.
    const TYPE: VoxelType;
}

impl Voxel for u8 {
    const TYPE: VoxelType = VoxelType::UChar;
}

impl Voxel for i16 {
    const TYPE: VoxelType = VoxelType::Short;
}

impl Voxel for u16 {
    const TYPE: VoxelType = VoxelType::UShort;
}

impl Voxel for f32 {
    const TYPE: VoxelType = VoxelType::Float;
}

impl Voxel for f64 {
    const TYPE: VoxelType = VoxelType::Double;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for ty in VoxelType::ALL {
            assert_eq!(VoxelType::from_name(ty.name()), Some(ty));
        }
        assert_eq!(VoxelType::from_name("unspecified"), None);
        assert_eq!(VoxelType::from_name("Float"), None);
    }

    #[test]
    fn test_decode() {
        assert_eq!(VoxelType::UChar.decode(&[200]), 200.0);
        assert_eq!(VoxelType::Short.decode(bytemuck::bytes_of(&-42_i16)), -42.0);
        assert_eq!(VoxelType::UShort.decode(bytemuck::bytes_of(&60000_u16)), 60000.0);
        assert_eq!(VoxelType::Float.decode(bytemuck::bytes_of(&1.5_f32)), 1.5);
        assert_eq!(VoxelType::Double.decode(bytemuck::bytes_of(&-0.25_f64)), -0.25);
    }

    #[test]
    fn test_encode_rounds_and_saturates() {
        let mut byte = [0_u8; 1];
        VoxelType::UChar.encode(300.0, &mut byte);
        assert_eq!(byte, [255]);
        VoxelType::UChar.encode(2.6, &mut byte);
        assert_eq!(byte, [3]);

        let mut short = [0_u8; 2];
        VoxelType::Short.encode(-7.4, &mut short);
        assert_eq!(VoxelType::Short.decode(&short), -7.0);

        let mut double = [0_u8; 8];
        VoxelType::Double.encode(0.5, &mut double);
        assert_eq!(VoxelType::Double.decode(&double), 0.5);
    }

    #[test]
    fn test_sizes_match_rust_types() {
        assert_eq!(<u8 as Voxel>::TYPE.size(), std::mem::size_of::<u8>());
        assert_eq!(<i16 as Voxel>::TYPE.size(), std::mem::size_of::<i16>());
        assert_eq!(<u16 as Voxel>::TYPE.size(), std::mem::size_of::<u16>());
        assert_eq!(<f32 as Voxel>::TYPE.size(), std::mem::size_of::<f32>());
        assert_eq!(<f64 as Voxel>::TYPE.size(), std::mem::size_of::<f64>());
    }
}
