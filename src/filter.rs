//! Filter devices that rewrite register writes before passing them on

use crate::device::Device;
use crate::error::Result;
use crate::registers::{is_level_register, LEVEL_ATTENUATION_MASK};

/// Volume that leaves level registers untouched
pub const FULL_VOLUME: u8 = 255;

/// Scales the attenuation of every operator level write
///
/// The filter owns the device it wraps; closing the filter closes the
/// whole chain.
pub struct VolumeFilter {
    inner: Box<dyn Device>,
    volume: u8,
}

impl VolumeFilter {
    pub fn new(inner: Box<dyn Device>) -> Self {
        Self {
            inner,
            volume: FULL_VOLUME,
        }
    }

    /// Set the scaling factor (0-255) and return the previous one.
    ///
    /// Only affects writes issued afterwards.
    pub fn set_volume(&mut self, volume: u8) -> u8 {
        std::mem::replace(&mut self.volume, volume)
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn inner(&self) -> &dyn Device {
        self.inner.as_ref()
    }
}

/// Rescale the attenuation field of a level register value.
pub fn scale_level(val: u8, volume: u8) -> u8 {
    if volume == FULL_VOLUME {
        return val;
    }
    // the register stores attenuation; scale the output level instead
    let level = !val & LEVEL_ATTENUATION_MASK;
    let scaled = ((level as u32 * volume as u32) >> 8) as u8;
    (val & !LEVEL_ATTENUATION_MASK) | (!scaled & LEVEL_ATTENUATION_MASK)
}

impl Device for VolumeFilter {
    fn name(&self) -> &'static str {
        "volume"
    }

    fn is_opl3(&self) -> bool {
        self.inner.is_opl3()
    }

    fn write(&mut self, reg: u16, val: u8) -> Result<()> {
        let val = if is_level_register(reg) {
            scale_level(val, self.volume)
        } else {
            val
        };
        self.inner.write(reg, val)
    }

    fn unsupported_writes(&self) -> u64 {
        self.inner.unsupported_writes()
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.inner.close()
    }
}

/// Wrap `inner` in a volume filter at full volume.
pub fn create_volume_filter(inner: Box<dyn Device>) -> Box<VolumeFilter> {
    Box::new(VolumeFilter::new(inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::RecordingDevice;

    fn attenuation(val: u8) -> u8 {
        val & LEVEL_ATTENUATION_MASK
    }

    #[test]
    fn test_full_volume_is_identity() {
        for val in 0..=255u8 {
            assert_eq!(scale_level(val, FULL_VOLUME), val);
        }
    }

    #[test]
    fn test_zero_volume_is_silent() {
        for val in 0..=255u8 {
            let out = scale_level(val, 0);
            assert_eq!(attenuation(out), 0x3F);
            assert_eq!(out & 0xC0, val & 0xC0);
        }
    }

    #[test]
    fn test_lower_volume_never_louder() {
        for a in 0..=0x3Fu8 {
            for ksl in [0x00u8, 0x40, 0x80, 0xC0] {
                let val = ksl | a;
                let mut prev = attenuation(scale_level(val, 255));
                for v in (0..255u8).rev() {
                    let out = scale_level(val, v);
                    assert_eq!(out & 0xC0, ksl);
                    let att = attenuation(out);
                    assert!(att <= 0x3F);
                    assert!(att >= prev, "a={} v={} att={} prev={}", a, v, att, prev);
                    prev = att;
                }
            }
        }
    }

    #[test]
    fn test_half_volume() {
        // loudest (attenuation 0 -> level 63) at half volume: 63*128>>8 = 31
        assert_eq!(scale_level(0x00, 128), 0x3F - 31);
        assert_eq!(scale_level(0x80, 128), 0x80 | (0x3F - 31));
    }

    #[test]
    fn test_filter_only_touches_level_registers() {
        let (inner, log) = RecordingDevice::new(true);
        let mut filter = create_volume_filter(Box::new(inner));
        assert_eq!(filter.set_volume(0), FULL_VOLUME);
        filter.write(0x20, 0x01).unwrap();
        filter.write(0x40, 0x00).unwrap();
        filter.write(0x143, 0x80).unwrap();
        filter.write(0xA0, 0x98).unwrap();
        assert_eq!(
            log.borrow().writes,
            vec![(0x20, 0x01), (0x40, 0x3F), (0x143, 0xBF), (0xA0, 0x98)]
        );
    }

    #[test]
    fn test_set_volume_returns_previous() {
        let (inner, _log) = RecordingDevice::new(false);
        let mut filter = VolumeFilter::new(Box::new(inner));
        assert_eq!(filter.set_volume(100), 255);
        assert_eq!(filter.set_volume(20), 100);
        assert_eq!(filter.volume(), 20);
    }

    #[test]
    fn test_close_closes_chain() {
        let (inner, log) = RecordingDevice::new(true);
        let filter = create_volume_filter(Box::new(inner));
        let outer = create_volume_filter(filter);
        assert!(outer.is_opl3());
        assert_eq!(outer.unsupported_writes(), 7);
        outer.close().unwrap();
        assert!(log.borrow().closed);
    }
}
