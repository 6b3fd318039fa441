use std::ops::{Deref, DerefMut};

/// A 16-bit tag attached to every output triangle, describing what kind of area it belongs to.
///
/// The low byte is the area type. The high byte holds user defined flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct AreaAnnotation(pub u16);

impl Deref for AreaAnnotation {
    type Target = u16;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for AreaAnnotation {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<u16> for AreaAnnotation {
    fn from(value: u16) -> Self {
        AreaAnnotation(value)
    }
}

impl AreaAnnotation {
    /// Creates an annotation from its area type and flags.
    #[inline]
    pub const fn new(area_type: u8, flags: u8) -> Self {
        Self((flags as u16) << 8 | area_type as u16)
    }

    /// The area type, used to order markups when building the paint palette.
    #[inline]
    pub const fn area_type(self) -> u8 {
        (self.0 & 0xff) as u8
    }

    /// The user defined flags.
    #[inline]
    pub const fn flags(self) -> u8 {
        (self.0 >> 8) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_type_and_flags() {
        let annotation = AreaAnnotation::new(3, 0x81);
        assert_eq!(annotation.area_type(), 3);
        assert_eq!(annotation.flags(), 0x81);
        assert_eq!(*annotation, 0x8103);
    }
}
