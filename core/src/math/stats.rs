use ndarray::Array2;

pub struct StatsHelper;

impl StatsHelper {
    /// BT.601 gray level in 14-bit fixed point; the weights sum to 1 << 14,
    /// so a uniform gray sample maps back to itself.
    pub fn luminance(rgb: [u8; 3]) -> u8 {
        let [r, g, b] = rgb;
        let weighted = r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + (1 << 13);
        (weighted >> 14) as u8
    }

    pub fn mean(values: &Array2<u8>) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let sum: u64 = values.iter().map(|&v| v as u64).sum();
        sum as f64 / values.len() as f64
    }

    /// Fraction of values strictly below `threshold`.
    pub fn fraction_below(values: &Array2<u8>, threshold: u8) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let below = values.iter().filter(|&&v| v < threshold).count();
        below as f64 / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luminance_preserves_gray_levels() {
        for level in [0u8, 1, 64, 127, 128, 200, 255] {
            assert_eq!(StatsHelper::luminance([level, level, level]), level);
        }
    }

    #[test]
    fn luminance_weights_green_heaviest() {
        let red = StatsHelper::luminance([255, 0, 0]);
        let green = StatsHelper::luminance([0, 255, 0]);
        let blue = StatsHelper::luminance([0, 0, 255]);
        assert_eq!((red, green, blue), (76, 150, 29));
    }

    #[test]
    fn empty_grid_yields_zero() {
        let empty = Array2::<u8>::zeros((0, 0));
        assert_eq!(StatsHelper::mean(&empty), 0.0);
        assert_eq!(StatsHelper::fraction_below(&empty, 128), 0.0);
    }

    #[test]
    fn fraction_below_is_strict() {
        let grid = Array2::from_shape_vec((1, 4), vec![127, 128, 0, 255]).unwrap();
        assert_eq!(StatsHelper::fraction_below(&grid, 128), 0.5);
        assert_eq!(StatsHelper::mean(&grid), 127.5);
    }
}
