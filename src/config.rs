use crate::error::KilnError;
use kiln_object::DEFAULT_MAX_OBJECT_ID;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriterConfig {
    /// Version written into the `%PDF-` header. Cross-reference streams need 1.5 or later.
    ///
    /// Defaults to `"1.7"`.
    pub pdf_version: String,

    /// zlib level (0-9) for content streams, soft masks, palettes and object streams.
    ///
    /// Defaults to `6`.
    pub compression_level: u32,

    /// Pack non-stream objects into `/ObjStm` object streams. Packed objects are
    /// located through `Compressed` table entries.
    ///
    /// Defaults to `false`.
    pub object_streams: bool,

    /// Maximum number of objects per object stream.
    ///
    /// Defaults to `100`.
    pub objects_per_stream: usize,

    /// Highest object number the registry may hand out.
    ///
    /// Defaults to `8388607`.
    pub max_object_id: u32,

    /// `/Producer` written into the Info dictionary. `kiln <version>` when unset.
    pub producer: Option<String>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            pdf_version: "1.7".to_string(),
            compression_level: 6,
            object_streams: false,
            objects_per_stream: 100,
            max_object_id: DEFAULT_MAX_OBJECT_ID,
            producer: None,
        }
    }
}

impl WriterConfig {
    /// Parses and validates a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, KilnError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KilnError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), KilnError> {
        let (major, minor) = parse_version(&self.pdf_version)
            .ok_or_else(|| KilnError::Config(format!("'{}' is not a PDF version", self.pdf_version)))?;
        if (major, minor) < (1, 5) {
            return Err(KilnError::Config(format!(
                "PDF {} predates cross-reference streams (1.5)",
                self.pdf_version
            )));
        }
        if self.compression_level > 9 {
            return Err(KilnError::Config(format!(
                "compression level {} is outside 0-9",
                self.compression_level
            )));
        }
        if self.objects_per_stream == 0 {
            return Err(KilnError::Config("objects_per_stream must be at least 1".into()));
        }
        if self.max_object_id == 0 || self.max_object_id > DEFAULT_MAX_OBJECT_ID {
            return Err(KilnError::Config(format!(
                "max_object_id must be between 1 and {}",
                DEFAULT_MAX_OBJECT_ID
            )));
        }
        Ok(())
    }
}

fn parse_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WriterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pdf_version, "1.7");
        assert_eq!(config.compression_level, 6);
        assert_eq!(config.max_object_id, 8_388_607);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = WriterConfig::from_json_str(r#"{ "object_streams": true, "producer": "tests" }"#).unwrap();
        assert!(config.object_streams);
        assert_eq!(config.producer.as_deref(), Some("tests"));
        assert_eq!(config.objects_per_stream, 100);
    }

    #[test]
    fn test_rejects_old_versions_and_bad_values() {
        for json in [
            r#"{ "pdf_version": "1.4" }"#,
            r#"{ "pdf_version": "seven" }"#,
            r#"{ "compression_level": 10 }"#,
            r#"{ "objects_per_stream": 0 }"#,
            r#"{ "max_object_id": 0 }"#,
        ] {
            assert!(
                matches!(WriterConfig::from_json_str(json), Err(KilnError::Config(_))),
                "{} should be rejected",
                json
            );
        }
        assert!(WriterConfig::from_json_str(r#"{ "pdf_version": "2.0" }"#).is_ok());
    }

    #[test]
    fn test_unknown_fields_are_json_errors() {
        assert!(matches!(
            WriterConfig::from_json_str(r#"{ "colour": "blue" }"#),
            Err(KilnError::Json(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiln.json");
        std::fs::write(&path, r#"{ "compression_level": 9 }"#).unwrap();
        assert_eq!(WriterConfig::from_file(&path).unwrap().compression_level, 9);
        assert!(matches!(WriterConfig::from_file(dir.path().join("missing.json")), Err(KilnError::Io(_))));
    }
}
