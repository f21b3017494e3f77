//! Soft hue-band masks for selective color.
//!
//! [`ColorBandTable`] maps each [`ColorBand`] to one or more hue
//! intervals on the 0-180 scale. [`mask_for`] marks every pixel whose hue
//! falls inside the band with weight 1.0 and everything else 0.0, then
//! blurs the result so band boundaries fade instead of cutting hard
//! edges into the image. The output is always within `[0, 1]`.
//!
//! Membership is decided on hue alone. Grays carry hue 0 and so belong
//! to the red band.

use crate::blur;
use crate::params::ColorBand;
use crate::types::Plane;

/// Side of the square kernel used to soften band masks.
pub const BAND_MASK_KERNEL: u32 = 15;

/// Half-open hue interval `[start, end)` on the 0-180 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HueInterval {
    /// Inclusive lower bound.
    pub start: f32,
    /// Exclusive upper bound.
    pub end: f32,
}

impl HueInterval {
    const fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    /// Whether `hue` lies in the interval.
    #[must_use]
    pub fn contains(self, hue: f32) -> bool {
        hue >= self.start && hue < self.end
    }
}

/// Static band-to-hue-interval table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorBandTable;

impl ColorBandTable {
    // Red wraps: its upper interval ends past 180 so hue 180 (== 0) is red.
    const RED: [HueInterval; 2] = [HueInterval::new(0.0, 10.0), HueInterval::new(170.0, 181.0)];
    const ORANGE: [HueInterval; 1] = [HueInterval::new(10.0, 25.0)];
    const YELLOW: [HueInterval; 1] = [HueInterval::new(25.0, 35.0)];
    const GREEN: [HueInterval; 1] = [HueInterval::new(35.0, 85.0)];
    const AQUA: [HueInterval; 1] = [HueInterval::new(85.0, 100.0)];
    const BLUE: [HueInterval; 1] = [HueInterval::new(100.0, 130.0)];
    const PURPLE: [HueInterval; 1] = [HueInterval::new(130.0, 150.0)];
    const MAGENTA: [HueInterval; 1] = [HueInterval::new(150.0, 170.0)];

    /// The hue intervals covered by `band`.
    #[must_use]
    pub const fn intervals(band: ColorBand) -> &'static [HueInterval] {
        match band {
            ColorBand::Red => &Self::RED,
            ColorBand::Orange => &Self::ORANGE,
            ColorBand::Yellow => &Self::YELLOW,
            ColorBand::Green => &Self::GREEN,
            ColorBand::Aqua => &Self::AQUA,
            ColorBand::Blue => &Self::BLUE,
            ColorBand::Purple => &Self::PURPLE,
            ColorBand::Magenta => &Self::MAGENTA,
        }
    }

    /// Whether `hue` belongs to `band`.
    #[must_use]
    pub fn contains(band: ColorBand, hue: f32) -> bool {
        Self::intervals(band).iter().any(|i| i.contains(hue))
    }
}

/// Binary band membership: 1.0 inside the band, 0.0 outside.
#[must_use]
pub fn band_membership(hue: &Plane, band: ColorBand) -> Plane {
    Plane::from_fn(hue.width(), hue.height(), |x, y| {
        let inside = ColorBandTable::contains(band, hue.get_pixel(x, y).0[0]);
        image::Luma([if inside { 1.0 } else { 0.0 }])
    })
}

/// Soft band mask in `[0, 1]`: membership blurred with a
/// [`BAND_MASK_KERNEL`]-sized Gaussian.
#[must_use]
pub fn mask_for(hue: &Plane, band: ColorBand) -> Plane {
    let sigma = blur::sigma_for_kernel(BAND_MASK_KERNEL);
    let mut mask = blur::gaussian_blur(&band_membership(hue, band), sigma);
    // Guard against float drift above 1 from kernel normalization.
    for w in mask.iter_mut() {
        *w = w.clamp(0.0, 1.0);
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hue_row(hues: &[f32]) -> Plane {
        #[allow(clippy::cast_possible_truncation)]
        let width = hues.len() as u32;
        Plane::from_fn(width, 1, |x, _| image::Luma([hues[x as usize]]))
    }

    #[test]
    fn red_wraps_around_zero() {
        let membership = band_membership(&hue_row(&[0.0, 179.0, 90.0, 180.0]), ColorBand::Red);
        let w: Vec<f32> = membership.pixels().map(|p| p.0[0]).collect();
        assert_eq!(w, vec![1.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn every_hue_belongs_to_exactly_one_band() {
        for tenth in 0..1800 {
            #[allow(clippy::cast_precision_loss)]
            let hue = tenth as f32 / 10.0;
            let count = ColorBand::ALL
                .iter()
                .filter(|&&band| ColorBandTable::contains(band, hue))
                .count();
            assert_eq!(count, 1, "hue {hue} is in {count} bands");
        }
    }

    #[test]
    fn achromatic_hue_selects_red() {
        let gray = Plane::from_pixel(6, 6, image::Luma([0.0]));
        let mask = mask_for(&gray, ColorBand::Red);
        assert!(mask.pixels().all(|p| (p.0[0] - 1.0).abs() < 1e-4));
    }

    #[test]
    fn band_boundaries() {
        assert!(ColorBandTable::contains(ColorBand::Orange, 10.0));
        assert!(!ColorBandTable::contains(ColorBand::Red, 10.0));
        assert!(ColorBandTable::contains(ColorBand::Green, 60.0));
        assert!(ColorBandTable::contains(ColorBand::Blue, 120.0));
        assert!(ColorBandTable::contains(ColorBand::Magenta, 169.9));
    }

    #[test]
    fn uniform_in_band_plane_gives_full_weight() {
        let hue = Plane::from_pixel(12, 12, image::Luma([60.0]));
        let mask = mask_for(&hue, ColorBand::Green);
        for p in mask.pixels() {
            assert!((p.0[0] - 1.0).abs() < 1e-4, "got {}", p.0[0]);
        }
        let other = mask_for(&hue, ColorBand::Blue);
        for p in other.pixels() {
            assert!(p.0[0].abs() < 1e-6);
        }
    }

    #[test]
    fn mask_softens_band_edge() {
        // Left half green, right half blue.
        let hue = Plane::from_fn(20, 4, |x, _| image::Luma([if x < 10 { 60.0 } else { 120.0 }]));
        let mask = mask_for(&hue, ColorBand::Green);
        let inner = mask.get_pixel(9, 2).0[0];
        let outer = mask.get_pixel(10, 2).0[0];
        assert!(inner < 1.0 && inner > 0.5, "got {inner}");
        assert!(outer > 0.0 && outer < 0.5, "got {outer}");
        for p in mask.pixels() {
            assert!((0.0..=1.0).contains(&p.0[0]));
        }
    }
}
