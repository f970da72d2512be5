use std::{fs, path::Path};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hal::{error::Error, LgwConfigBoard};

/// Scan settings read from the configuration file; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConf {
    #[serde(default)]
    pub freq_start: Option<u32>,
    #[serde(default)]
    pub freq_stop: Option<u32>,
    #[serde(default)]
    pub freq_step: Option<u32>,
    #[serde(default)]
    pub nb_samples: Option<u16>,
    #[serde(default)]
    pub rate_divisor: Option<u16>,
    #[serde(default)]
    pub log_name: Option<String>,
    #[serde(default)]
    pub acquisition_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpectralScanConf {
    #[serde(default)]
    pub board: LgwConfigBoard,
    #[serde(default)]
    pub scan: ScanConf,
}

impl SpectralScanConf {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::ValidationError(format!("configuration: {}", e)).into())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| Error::ValidationError(format!("cannot read configuration file {}: {}", path.display(), e)))?;
        let conf = Self::from_json(&json)?;
        debug!(?conf, "INFO: configuration loaded from {}", path.display());
        Ok(conf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::loragw_com::LgwComType;
    use std::io::Write;

    #[test]
    fn empty_document_gives_defaults() {
        let conf = SpectralScanConf::from_json("{}").unwrap();
        assert_eq!(conf, SpectralScanConf::default());
        assert_eq!(conf.board.com_path, "/dev/ttyACM0");
    }

    #[test]
    fn full_document() {
        let conf = SpectralScanConf::from_json(r#"{
            "board": {"com_type": "USB", "com_path": "/dev/ttyACM1"},
            "scan": {
                "freq_start": 868000000, "freq_stop": 870000000, "freq_step": 1000000,
                "nb_samples": 1000, "rate_divisor": 4, "log_name": "eu868",
                "acquisition_timeout_ms": 5000
            }
        }"#).unwrap();
        assert_eq!(conf.board.com_type, LgwComType::LGW_COM_USB);
        assert_eq!(conf.board.com_path, "/dev/ttyACM1");
        assert_eq!(conf.scan.freq_step, Some(1_000_000));
        assert_eq!(conf.scan.nb_samples, Some(1000));
        assert_eq!(conf.scan.log_name.as_deref(), Some("eu868"));
        assert_eq!(conf.scan.acquisition_timeout_ms, Some(5000));
    }

    #[test]
    fn out_of_range_sample_count_is_rejected() {
        let err = SpectralScanConf::from_json(r#"{"scan": {"nb_samples": 70000}}"#).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ValidationError(_))));
        assert!(SpectralScanConf::from_json(r#"{"scan": {"nb_sample": 10}}"#).is_err());
    }

    #[test]
    fn misspelled_keys_are_rejected() {
        let err = SpectralScanConf::from_json(r#"{"scna": {"freq_start": 902000000}}"#).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ValidationError(_))));
        assert!(format!("{}", err).contains("scna"));

        let err = SpectralScanConf::from_json(r#"{"board": {"com_pth": "/dev/ttyACM1"}}"#).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ValidationError(_))));
        assert!(format!("{}", err).contains("com_pth"));
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"scan": {{"rate_divisor": 2}}}}"#).unwrap();
        let conf = SpectralScanConf::from_file(file.path()).unwrap();
        assert_eq!(conf.scan.rate_divisor, Some(2));

        assert!(SpectralScanConf::from_file("/nonexistent/spectral_scan.json").is_err());
    }
}
