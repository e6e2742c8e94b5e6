//! Deserializable analysis configuration
//!
//! ```rust
//! use equilibrium::AnalysisConfig;
//!
//! let config: AnalysisConfig = serde_json::from_str(r#"{
//!     "asset": "EURUSD",
//!     "mode": { "kind": "session", "granularity": "weekly", "min_candles": 3 }
//! }"#).unwrap();
//! let analyzer = config.into_analyzer().unwrap();
//! assert_eq!(analyzer.asset(), "EURUSD");
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::classify::DEFAULT_PRECISION;
use crate::{AnalysisMode, Analyzer, EngineBuilder, RegimeBands, ReportOptions, Result};

fn default_precision() -> u32 {
    DEFAULT_PRECISION
}

/// Everything needed to build an [`Analyzer`] and render its reports.
///
/// `lookback` and the band table are checked while deserializing; precision
/// and tick size are checked by [`into_analyzer`](Self::into_analyzer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub asset: String,
    pub mode: AnalysisMode,
    #[serde(default)]
    pub bands: RegimeBands,
    #[serde(default = "default_precision")]
    pub precision: u32,
    #[serde(default)]
    pub tick_size: Option<Decimal>,
    #[serde(default)]
    pub report: ReportOptions,
}

impl AnalysisConfig {
    pub fn new(asset: impl Into<String>, mode: AnalysisMode) -> Self {
        Self {
            asset: asset.into(),
            mode,
            bands: RegimeBands::default(),
            precision: DEFAULT_PRECISION,
            tick_size: None,
            report: ReportOptions::default(),
        }
    }

    /// Validate and build the analyzer
    pub fn into_analyzer(self) -> Result<Analyzer> {
        let mut builder = EngineBuilder::new(self.asset)
            .mode(self.mode)
            .bands(self.bands)
            .precision(self.precision);
        if let Some(tick_size) = self.tick_size {
            builder = builder.tick_size(tick_size);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Diagnosis, Granularity};
    use rust_decimal_macros::dec;

    #[test]
    fn test_minimal_standard_config() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"asset":"GOLD","mode":{"kind":"standard","lookback":20}}"#).unwrap();
        assert_eq!(config, AnalysisConfig::new("GOLD", AnalysisMode::standard(20).unwrap()));
        assert_eq!(config.report.point_decimals, 2);

        let analyzer = config.into_analyzer().unwrap();
        assert_eq!(analyzer.mode().required_bars(), 20);
        assert_eq!(analyzer.normalizer().precision(), 8);
    }

    #[test]
    fn test_session_min_candles_defaults_to_zero() {
        let config: AnalysisConfig = serde_json::from_str(
            r#"{"asset":"X","mode":{"kind":"session","granularity":"monthly"}}"#,
        )
        .unwrap();
        assert_eq!(config.mode, AnalysisMode::session(Granularity::Monthly, 0));
    }

    #[test]
    fn test_rejects_zero_lookback() {
        let parsed: std::result::Result<AnalysisConfig, _> =
            serde_json::from_str(r#"{"asset":"X","mode":{"kind":"standard","lookback":0}}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_custom_bands_and_tick() {
        let json = r#"{
            "asset": "ES",
            "mode": {"kind": "standard", "lookback": 10},
            "bands": [
                {"lower": {"value": 0.0, "inclusive": true},
                 "upper": {"value": 40.0, "inclusive": false},
                 "diagnosis": "strong_downward_bias"},
                {"lower": {"value": 40.0, "inclusive": true},
                 "upper": {"value": 60.0, "inclusive": true},
                 "diagnosis": "equilibrium"},
                {"lower": {"value": 60.0, "inclusive": false},
                 "upper": {"value": 100.0, "inclusive": true},
                 "diagnosis": "strong_upward_bias"}
            ],
            "tick_size": "0.25"
        }"#;
        let config: AnalysisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.bands.diagnose(58.0), Diagnosis::Equilibrium);

        let analyzer = config.into_analyzer().unwrap();
        assert_eq!(analyzer.normalizer().tick_size(), Some(dec!(0.25)));
    }

    #[test]
    fn test_rejects_bad_tick_and_precision() {
        let mut config = AnalysisConfig::new("X", AnalysisMode::standard(5).unwrap());
        config.tick_size = Some(dec!(-1));
        assert!(config.clone().into_analyzer().is_err());

        config.tick_size = None;
        config.precision = 99;
        assert!(config.into_analyzer().is_err());
    }
}
