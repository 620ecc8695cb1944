use super::candidate::RejectReason;
use crate::core::config::GateConfig;
use crate::core::video::GateMetrics;

/// 质量门：先看蒙版拓扑，再看清晰度下限
#[derive(Debug, Clone)]
pub struct QualityGate {
    config: GateConfig,
}

impl QualityGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// 0 个区域 = 没有主体；区域过多 = 多人或背景残留
    pub fn check_topology(&self, regions: usize) -> Result<(), RejectReason> {
        if regions == 0 {
            return Err(RejectReason::EmptyMask);
        }
        if regions > self.config.max_mask_regions {
            return Err(RejectReason::MaskTopology {
                regions,
                max: self.config.max_mask_regions,
            });
        }
        Ok(())
    }

    pub fn check_sharpness(&self, sharpness: f64) -> Result<(), RejectReason> {
        if sharpness < self.config.min_sharpness {
            return Err(RejectReason::TooBlurry {
                sharpness,
                min: self.config.min_sharpness,
            });
        }
        Ok(())
    }

    pub fn evaluate(&self, metrics: &GateMetrics) -> Result<(), RejectReason> {
        self.check_topology(metrics.mask_regions)?;
        self.check_sharpness(metrics.sharpness)
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(GateConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(mask_regions: usize, sharpness: f64) -> GateMetrics {
        GateMetrics {
            mask_regions,
            sharpness,
        }
    }

    #[test]
    fn test_topology_bounds() {
        let gate = QualityGate::default();
        assert_eq!(gate.check_topology(0), Err(RejectReason::EmptyMask));
        assert!(gate.check_topology(1).is_ok());
        assert!(gate.check_topology(3).is_ok());
        assert_eq!(
            gate.check_topology(4),
            Err(RejectReason::MaskTopology { regions: 4, max: 3 })
        );
    }

    #[test]
    fn test_sharpness_floor() {
        let gate = QualityGate::default();
        assert!(gate.check_sharpness(50.0).is_ok());
        assert!(matches!(
            gate.check_sharpness(49.9),
            Err(RejectReason::TooBlurry { .. })
        ));
    }

    #[test]
    fn test_topology_checked_before_sharpness() {
        let gate = QualityGate::default();
        let reason = gate.evaluate(&metrics(5, 0.0)).unwrap_err();
        assert_eq!(reason.code(), "mask_topology");
        assert!(gate.evaluate(&metrics(2, 120.0)).is_ok());
    }
}
