//! Decimation policy and byte order primitives shared by every grid reader.

/// Default bound on either resampled grid dimension
pub const DEFAULT_MAX_GRID_SIZE: u32 = 2000;

/// Spatial decimation applied to every grid reader.
///
/// Grids whose width or height exceed `max_size` are sampled every
/// `sample_dist` rows and columns so that neither resampled dimension
/// exceeds `max_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimation {
    max_size: u32,
}

impl Default for Decimation {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_GRID_SIZE)
    }
}

impl Decimation {
    /// Creates a policy bounding both dimensions to `max_size` (at least 1)
    #[must_use]
    pub const fn new(max_size: u32) -> Self {
        Self {
            max_size: if max_size == 0 { 1 } else { max_size },
        }
    }

    /// The bound on either resampled dimension
    #[must_use]
    pub const fn max_size(&self) -> u32 {
        self.max_size
    }

    /// Sampling stride for a `width` x `height` grid
    #[must_use]
    pub const fn sample_dist(&self, width: u32, height: u32) -> u32 {
        if width <= self.max_size && height <= self.max_size {
            return 1;
        }
        let w = width.div_ceil(self.max_size);
        let h = height.div_ceil(self.max_size);
        if w > h {
            w
        } else {
            h
        }
    }

    /// Resampled `(width, height)` of a `width` x `height` grid
    #[must_use]
    pub const fn resampled(&self, width: u32, height: u32) -> (u32, u32) {
        let dist = self.sample_dist(width, height);
        (width.div_ceil(dist), height.div_ceil(dist))
    }
}

/// Byte order declared by a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// least significant byte first
    #[default]
    Little,
    /// most significant byte first
    Big,
}

impl ByteOrder {
    /// Byte order of the running host
    #[must_use]
    pub const fn native() -> Self {
        if u16::from_ne_bytes([1, 0]) == 1 {
            Self::Little
        } else {
            Self::Big
        }
    }

    /// Whether values in this order must be swapped on the running host
    #[must_use]
    pub fn needs_swap(self) -> bool {
        self != Self::native()
    }

    /// Decodes a signed 16 bit sample stored in this order
    #[must_use]
    pub fn i16(self, bytes: [u8; 2]) -> i16 {
        let raw = u16::from_ne_bytes(bytes);
        let value = if self.needs_swap() { swap16(raw) } else { raw };
        i16::from_ne_bytes(value.to_ne_bytes())
    }

    /// Decodes a 32 bit float stored in this order
    #[must_use]
    pub fn f32(self, bytes: [u8; 4]) -> f32 {
        let raw = u32::from_ne_bytes(bytes);
        f32::from_bits(if self.needs_swap() { swap32(raw) } else { raw })
    }

    /// Decodes a 64 bit float stored in this order
    #[must_use]
    pub fn f64(self, bytes: [u8; 8]) -> f64 {
        let raw = u64::from_ne_bytes(bytes);
        f64::from_bits(if self.needs_swap() { swap64(raw) } else { raw })
    }

    /// Decodes a signed 32 bit integer stored in this order
    #[must_use]
    pub fn i32(self, bytes: [u8; 4]) -> i32 {
        let raw = u32::from_ne_bytes(bytes);
        i32::from_ne_bytes(if self.needs_swap() { swap32(raw) } else { raw }.to_ne_bytes())
    }
}

/// Reverses the bytes of a 16 bit word
#[must_use]
pub const fn swap16(value: u16) -> u16 {
    value.swap_bytes()
}

/// Reverses the bytes of a 32 bit word
#[must_use]
pub const fn swap32(value: u32) -> u32 {
    value.swap_bytes()
}

/// Reverses the bytes of a 64 bit word
#[must_use]
pub const fn swap64(value: u64) -> u64 {
    value.swap_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_grids_are_not_decimated() {
        let d = Decimation::default();
        for (w, h) in [(1, 1), (2000, 2000), (1, 2000), (1999, 3)] {
            assert_eq!(d.sample_dist(w, h), 1);
            assert_eq!(d.resampled(w, h), (w, h));
        }
    }

    #[test]
    fn large_grids_fit_the_bound() {
        let d = Decimation::default();
        for (w, h) in [(2001, 10), (4800, 6000), (40_000, 50_000), (3601, 3601), (7, 9999)] {
            let dist = d.sample_dist(w, h);
            let (rw, rh) = d.resampled(w, h);
            assert!(rw <= 2000 && rh <= 2000, "{w}x{h} -> {rw}x{rh}");
            assert_eq!(rw, w.div_ceil(dist));
            assert_eq!(rh, h.div_ceil(dist));
        }
        assert_eq!(d.sample_dist(4800, 6000), 3);
        assert_eq!(d.resampled(4800, 6000), (1600, 2000));
        assert_eq!(d.sample_dist(3601, 3601), 2);
        assert_eq!(d.resampled(3601, 3601), (1801, 1801));
    }

    #[test]
    fn custom_bound() {
        let d = Decimation::new(4);
        assert_eq!(d.sample_dist(10, 3), 3);
        assert_eq!(d.resampled(10, 3), (4, 1));
    }

    #[test]
    fn decodes_both_orders() {
        assert_eq!(ByteOrder::Big.i16([0x80, 0x00]), i16::MIN);
        assert_eq!(ByteOrder::Little.i16([0x00, 0x80]), i16::MIN);
        assert_eq!(ByteOrder::Big.f32(1.5f32.to_be_bytes()), 1.5);
        assert_eq!(ByteOrder::Little.f32(1.5f32.to_le_bytes()), 1.5);
        assert_eq!(ByteOrder::Big.f64((-2.25f64).to_be_bytes()), -2.25);
        assert_eq!(ByteOrder::Little.i32((-7i32).to_le_bytes()), -7);
        assert_eq!(swap16(0x1234), 0x3412);
    }
}
