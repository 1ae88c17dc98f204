use crate::error::{GhtError, Result};
use std::f64::consts::TAU;

/// Processing parameters of the Generalized Hough Transform.
#[derive(Debug, Clone, PartialEq)]
pub struct HoughParams {
    /// Standard deviation of the directional gradient kernel
    pub sigma: f64,
    /// Relative threshold for binarizing the template edge magnitude
    pub template_thresh: f32,
    /// Relative threshold for maxima in Hough space
    pub obj_thresh: f32,
    /// Number of scales investigated
    pub scale_steps: usize,
    /// Scale range `[min, max]`, both ends sampled
    pub scale_range: [f64; 2],
    /// Number of angles investigated
    pub angle_steps: usize,
    /// Angle range `[min, max)` in radians, upper end excluded
    pub angle_range: [f64; 2],
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            template_thresh: 0.3,
            obj_thresh: 0.53,
            scale_steps: 33,
            scale_range: [0.5, 2.0],
            angle_steps: 4,
            angle_range: [0.0, TAU],
        }
    }
}

/// One `(scale, angle)` cell of the search grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hypothesis {
    pub scale_index: usize,
    pub angle_index: usize,
    pub scale: f64,
    pub angle: f64,
}

impl HoughParams {
    /// Preset for synthetic scenes built with `make_test_image`.
    pub fn synthetic() -> Self {
        Self {
            sigma: 1.0,
            template_thresh: 0.7,
            obj_thresh: 0.85,
            scale_steps: 3,
            scale_range: [1.0, 2.0],
            angle_steps: 12,
            angle_range: [0.0, TAU],
        }
    }

    /// Single-hypothesis search at scale 1 and angle 0.
    pub fn single(sigma: f64, template_thresh: f32, obj_thresh: f32) -> Self {
        Self {
            sigma,
            template_thresh,
            obj_thresh,
            scale_steps: 1,
            scale_range: [1.0, 1.0],
            angle_steps: 1,
            angle_range: [0.0, TAU],
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(GhtError::invalid(
                "sigma",
                format!("must be positive, got {}", self.sigma),
            ));
        }
        for (name, value) in [
            ("template_thresh", self.template_thresh),
            ("obj_thresh", self.obj_thresh),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GhtError::invalid(
                    name,
                    format!("must lie in [0, 1], got {value}"),
                ));
            }
        }
        if self.scale_steps == 0 {
            return Err(GhtError::invalid("scale_steps", "must be at least 1"));
        }
        if self.angle_steps == 0 {
            return Err(GhtError::invalid("angle_steps", "must be at least 1"));
        }

        let [s_min, s_max] = self.scale_range;
        if !(s_min.is_finite() && s_max.is_finite() && s_min > 0.0) {
            return Err(GhtError::invalid(
                "scale_range",
                format!("scales must be positive, got [{s_min}, {s_max}]"),
            ));
        }
        if s_max < s_min {
            return Err(GhtError::invalid(
                "scale_range",
                format!("max {s_max} is below min {s_min}"),
            ));
        }
        if self.scale_steps > 1 && s_max == s_min {
            return Err(GhtError::invalid(
                "scale_range",
                format!("{} steps over an empty range", self.scale_steps),
            ));
        }

        let [a_min, a_max] = self.angle_range;
        if !(a_min.is_finite() && a_max.is_finite()) || a_max <= a_min {
            return Err(GhtError::invalid(
                "angle_range",
                format!("needs min < max, got [{a_min}, {a_max})"),
            ));
        }
        Ok(())
    }

    /// Scale of `scale_index`; the range ends are both sampled.
    pub fn scale_at(&self, scale_index: usize) -> f64 {
        let [min, max] = self.scale_range;
        if self.scale_steps <= 1 {
            return min;
        }
        min + (max - min) * scale_index as f64 / (self.scale_steps - 1) as f64
    }

    /// Angle of `angle_index`; the upper end of the range is excluded.
    pub fn angle_at(&self, angle_index: usize) -> f64 {
        let [min, max] = self.angle_range;
        min + (max - min) * angle_index as f64 / self.angle_steps as f64
    }

    pub fn hypothesis_count(&self) -> usize {
        self.scale_steps * self.angle_steps
    }

    /// Hypothesis stored at flat slot `index` (scale-major).
    pub fn hypothesis(&self, index: usize) -> Hypothesis {
        let scale_index = index / self.angle_steps;
        let angle_index = index % self.angle_steps;
        Hypothesis {
            scale_index,
            angle_index,
            scale: self.scale_at(scale_index),
            angle: self.angle_at(angle_index),
        }
    }

    /// All hypotheses, scale outer and angle inner.
    pub fn hypotheses(&self) -> impl Iterator<Item = Hypothesis> + '_ {
        (0..self.hypothesis_count()).map(|k| self.hypothesis(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_validate() {
        assert!(HoughParams::default().validate().is_ok());
        assert!(HoughParams::synthetic().validate().is_ok());
        assert!(HoughParams::single(1.0, 0.3, 0.5).validate().is_ok());
    }

    #[test]
    fn test_scale_interpolation_includes_both_ends() {
        let p = HoughParams {
            scale_steps: 4,
            scale_range: [0.5, 2.0],
            ..HoughParams::default()
        };
        assert_relative_eq!(p.scale_at(0), 0.5);
        assert_relative_eq!(p.scale_at(1), 1.0);
        assert_relative_eq!(p.scale_at(3), 2.0);
    }

    #[test]
    fn test_angle_range_is_half_open() {
        let p = HoughParams {
            angle_steps: 4,
            angle_range: [0.0, TAU],
            ..HoughParams::default()
        };
        assert_relative_eq!(p.angle_at(0), 0.0);
        assert_relative_eq!(p.angle_at(1), std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(p.angle_at(3), 1.5 * std::f64::consts::PI);
    }

    #[test]
    fn test_hypothesis_order_is_scale_major() {
        let p = HoughParams {
            scale_steps: 2,
            angle_steps: 3,
            ..HoughParams::default()
        };
        let cells: Vec<_> = p
            .hypotheses()
            .map(|h| (h.scale_index, h.angle_index))
            .collect();
        assert_eq!(cells, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_validation_errors() {
        let base = HoughParams::default();
        let cases = [
            HoughParams { sigma: 0.0, ..base.clone() },
            HoughParams { template_thresh: 1.5, ..base.clone() },
            HoughParams { obj_thresh: -0.1, ..base.clone() },
            HoughParams { scale_steps: 0, ..base.clone() },
            HoughParams { angle_steps: 0, ..base.clone() },
            HoughParams { scale_range: [0.0, 1.0], ..base.clone() },
            HoughParams { scale_range: [2.0, 1.0], ..base.clone() },
            HoughParams { scale_range: [1.0, 1.0], ..base.clone() },
            HoughParams { angle_range: [1.0, 1.0], ..base.clone() },
        ];
        for case in cases {
            assert!(
                matches!(case.validate(), Err(GhtError::InvalidParameter { .. })),
                "{case:?} should be rejected"
            );
        }
    }
}
