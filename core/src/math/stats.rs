pub struct StatsHelper;

impl StatsHelper {
    pub fn rms(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = samples.iter().map(|&v| v * v).sum();
        (sum_sq / samples.len() as f64).sqrt()
    }

    pub fn mean(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    /// Mean of angles in degrees, taken on the circle so that values either
    /// side of the ±180 seam average to the seam rather than to zero.
    /// Falls back to the arithmetic mean when the angles cancel out.
    pub fn circular_mean_deg(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let (sin_sum, cos_sum) = samples.iter().fold((0.0, 0.0), |(s, c), deg: &f64| {
            let rad = deg.to_radians();
            (s + rad.sin(), c + rad.cos())
        });
        let resultant = sin_sum.hypot(cos_sum) / samples.len() as f64;
        if resultant < 1e-9 {
            return Self::mean(samples);
        }
        sin_sum.atan2(cos_sum).to_degrees()
    }

    pub fn max(samples: &[f64]) -> f64 {
        samples.iter().copied().fold(0.0, f64::max)
    }
}
