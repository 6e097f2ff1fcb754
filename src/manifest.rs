//! Payload `MANIFEST` codec.
//!
//! A manifest is an ordered list of `Key: Value` lines. Three keys are
//! required (`Payload-Version`, `Payload-Checksum`, `Bootstrap-Entrypoint`);
//! any other key is carried through untouched so newer bundles stay readable.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::ValidationError;
use crate::utils::Checksum;

pub const MANIFEST_FILE: &str = "MANIFEST";

pub const KEY_VERSION: &str = "Payload-Version";
pub const KEY_CHECKSUM: &str = "Payload-Checksum";
pub const KEY_ENTRYPOINT: &str = "Bootstrap-Entrypoint";

pub const REQUIRED_KEYS: [&str; 3] = [KEY_VERSION, KEY_CHECKSUM, KEY_ENTRYPOINT];

/// Returned by the lenient field readers when a key is absent.
pub const UNKNOWN: &str = "unknown";

const PLACEHOLDER: &str = "PLACEHOLDER";
const SHA256_PREFIX: &str = "SHA256:";

/// Value of the `Payload-Checksum` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadChecksum {
    /// Written before the seal is known.
    Placeholder,
    /// The manifest seal of the placeholder-form payload tree.
    Sha256(Checksum),
}

impl PayloadChecksum {
    pub fn parse(value: &str) -> Option<Self> {
        if value == PLACEHOLDER {
            return Some(Self::Placeholder);
        }
        value
            .strip_prefix(SHA256_PREFIX)
            .and_then(Checksum::from_hex)
            .map(Self::Sha256)
    }
}

impl fmt::Display for PayloadChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placeholder => f.write_str(PLACEHOLDER),
            Self::Sha256(checksum) => write!(f, "{}{}", SHA256_PREFIX, checksum),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    fields: Vec<(String, String)>,
}

impl Manifest {
    /// Manifest carrying the three required keys, in canonical order.
    pub fn new(version: &str, checksum: &PayloadChecksum, entrypoint: &str) -> Result<Self, ValidationError> {
        let mut manifest = Self::default();
        manifest.push(KEY_VERSION, version)?;
        manifest.push(KEY_CHECKSUM, &checksum.to_string())?;
        manifest.push(KEY_ENTRYPOINT, entrypoint)?;
        Ok(manifest)
    }

    /// Append a field. Keys are written once.
    pub fn push(&mut self, key: &str, value: &str) -> Result<(), ValidationError> {
        check_key(key)?;
        check_value(key, value)?;
        if self.get(key).is_some() {
            return Err(ValidationError::DuplicateKey(key.to_string()));
        }
        self.fields.push((key.to_string(), value.to_string()));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Fields other than the required ones, in file order.
    pub fn metadata(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields().filter(|(k, _)| !REQUIRED_KEYS.contains(k))
    }

    pub fn version(&self) -> Result<&str, ValidationError> {
        self.get(KEY_VERSION).ok_or(ValidationError::MissingKey(KEY_VERSION))
    }

    pub fn entrypoint(&self) -> Result<&str, ValidationError> {
        self.get(KEY_ENTRYPOINT)
            .ok_or(ValidationError::MissingKey(KEY_ENTRYPOINT))
    }

    pub fn checksum(&self) -> Result<PayloadChecksum, ValidationError> {
        let value = self
            .get(KEY_CHECKSUM)
            .ok_or(ValidationError::MissingKey(KEY_CHECKSUM))?;
        PayloadChecksum::parse(value).ok_or_else(|| ValidationError::InvalidValue {
            key: KEY_CHECKSUM.to_string(),
            reason: format!("expected {} or {}<64 hex digits>, got '{}'", PLACEHOLDER, SHA256_PREFIX, value),
        })
    }

    /// Copy of this manifest with `Payload-Checksum` replaced in place.
    pub fn with_checksum(&self, checksum: &PayloadChecksum) -> Self {
        let value = checksum.to_string();
        let mut fields = self.fields.clone();
        match fields.iter_mut().find(|(k, _)| k == KEY_CHECKSUM) {
            Some(field) => field.1 = value,
            None => fields.push((KEY_CHECKSUM.to_string(), value)),
        }
        Self { fields }
    }

    /// Check the required keys are present and well formed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.version()?;
        self.entrypoint()?;
        self.checksum()?;
        Ok(())
    }

    pub fn encode(&self) -> String {
        let mut text = String::new();
        for (key, value) in &self.fields {
            text.push_str(key);
            text.push_str(": ");
            text.push_str(value);
            text.push('\n');
        }
        text
    }

    /// Parse manifest text. Blank lines are skipped; any other line without a
    /// `: ` separator is rejected.
    pub fn decode(text: &str) -> Result<Self, ValidationError> {
        let mut manifest = Self::default();

        for (index, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = split_line(line) else {
                return Err(ValidationError::MalformedLine {
                    line: index + 1,
                    content: line.to_string(),
                });
            };
            if key.is_empty() || key.trim() != key {
                return Err(ValidationError::MalformedLine {
                    line: index + 1,
                    content: line.to_string(),
                });
            }
            manifest.push(key, value)?;
        }

        Ok(manifest)
    }

    pub fn read(path: &Path) -> Result<Self, ValidationError> {
        let text = fs::read_to_string(path)?;
        Self::decode(&text)
    }

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        fs::write(path, self.encode())
    }
}

fn split_line(line: &str) -> Option<(&str, &str)> {
    line.split_once(": ")
        .or_else(|| line.strip_suffix(':').map(|key| (key, "")))
}

fn check_key(key: &str) -> Result<(), ValidationError> {
    let reason = if key.is_empty() {
        Some("key is empty")
    } else if key.contains(':') {
        Some("key contains ':'")
    } else if key.contains(['\n', '\r']) {
        Some("key contains a line break")
    } else if key.trim() != key {
        Some("key has surrounding whitespace")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ValidationError::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn check_value(key: &str, value: &str) -> Result<(), ValidationError> {
    if value.contains(['\n', '\r']) {
        return Err(ValidationError::InvalidValue {
            key: key.to_string(),
            reason: "value contains a line break".to_string(),
        });
    }
    Ok(())
}

/// First value of `key` in `text`, skipping lines that do not parse.
pub fn extract_field(text: &str, key: &str) -> Option<String> {
    text.lines()
        .filter_map(split_line)
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.trim().to_string())
}

/// Payload version recorded in the manifest at `path`, or [`UNKNOWN`].
pub fn read_version(path: &Path) -> String {
    fs::read_to_string(path)
        .ok()
        .and_then(|text| extract_field(&text, KEY_VERSION))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hash_bytes;

    fn sample() -> Manifest {
        let mut manifest = Manifest::new("2.0.0", &PayloadChecksum::Placeholder, "bootstrap.sh").unwrap();
        manifest.push("Vendor", "Example Corp").unwrap();
        manifest
    }

    #[test]
    fn encode_writes_required_keys_first() {
        assert_eq!(
            sample().encode(),
            "Payload-Version: 2.0.0\n\
             Payload-Checksum: PLACEHOLDER\n\
             Bootstrap-Entrypoint: bootstrap.sh\n\
             Vendor: Example Corp\n"
        );
    }

    #[test]
    fn decode_preserves_order_and_unknown_keys() {
        let text = "Payload-Version: 1.2.3\nX-Future: yes: really\nPayload-Checksum: PLACEHOLDER\nBootstrap-Entrypoint: run.sh\n\n";
        let manifest = Manifest::decode(text).unwrap();

        let keys: Vec<_> = manifest.fields().map(|(k, _)| k).collect();
        assert_eq!(keys, ["Payload-Version", "X-Future", "Payload-Checksum", "Bootstrap-Entrypoint"]);
        assert_eq!(manifest.get("X-Future"), Some("yes: really"));
        assert_eq!(manifest.metadata().count(), 1);
        manifest.validate().unwrap();
    }

    #[test]
    fn decode_rejects_line_without_separator() {
        let err = Manifest::decode("Payload-Version: 1.0\ngarbage line\n").unwrap_err();
        assert!(matches!(err, ValidationError::MalformedLine { line: 2, .. }));
    }

    #[test]
    fn decode_rejects_duplicate_keys() {
        let err = Manifest::decode("A: 1\nA: 2\n").unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateKey(key) if key == "A"));
    }

    #[test]
    fn empty_value_survives_reencoding() {
        let text = "Payload-Version: 1\nNote:\nPayload-Checksum: PLACEHOLDER\nBootstrap-Entrypoint: b.sh\n";
        let manifest = Manifest::decode(text).unwrap();
        assert_eq!(manifest.get("Note"), Some(""));
        assert_eq!(Manifest::decode(&manifest.encode()).unwrap(), manifest);
    }

    #[test]
    fn push_rejects_line_breaks_and_colons() {
        let mut manifest = Manifest::default();
        assert!(manifest.push("Bad: key", "v").is_err());
        assert!(manifest.push("Key", "two\nlines").is_err());
        assert!(manifest.push("", "v").is_err());
    }

    #[test]
    fn with_checksum_only_touches_checksum_field() {
        let placeholder = sample();
        let seal = hash_bytes(b"payload");
        let finalized = placeholder.with_checksum(&PayloadChecksum::Sha256(seal.clone()));

        assert_eq!(finalized.checksum().unwrap(), PayloadChecksum::Sha256(seal));
        assert_eq!(finalized.get("Vendor"), Some("Example Corp"));
        assert_eq!(finalized.with_checksum(&PayloadChecksum::Placeholder), placeholder);
        assert_eq!(placeholder.checksum().unwrap(), PayloadChecksum::Placeholder);
    }

    #[test]
    fn checksum_field_must_be_well_formed() {
        let manifest = Manifest::decode(
            "Payload-Version: 1\nPayload-Checksum: SHA256:abc\nBootstrap-Entrypoint: b.sh\n",
        )
        .unwrap();
        assert!(matches!(manifest.validate(), Err(ValidationError::InvalidValue { .. })));
    }

    #[test]
    fn validate_reports_missing_key() {
        let manifest = Manifest::decode("Payload-Version: 1\n").unwrap();
        assert!(matches!(
            manifest.validate(),
            Err(ValidationError::MissingKey(KEY_ENTRYPOINT))
        ));
    }

    #[test]
    fn payload_checksum_display_roundtrips() {
        let seal = hash_bytes(b"x");
        let value = PayloadChecksum::Sha256(seal.clone()).to_string();
        assert_eq!(value, format!("SHA256:{}", seal));
        assert_eq!(PayloadChecksum::parse(&value), Some(PayloadChecksum::Sha256(seal)));
        assert_eq!(PayloadChecksum::parse("PLACEHOLDER"), Some(PayloadChecksum::Placeholder));
        assert_eq!(PayloadChecksum::parse("md5:abc"), None);
    }

    #[test]
    fn extract_field_tolerates_malformed_lines() {
        let text = "???\nPayload-Version: 3.1.4\nPayload-Version: 9.9.9\n";
        assert_eq!(extract_field(text, KEY_VERSION).as_deref(), Some("3.1.4"));
        assert_eq!(extract_field(text, KEY_ENTRYPOINT), None);
    }

    #[test]
    fn read_version_defaults_to_unknown() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        assert_eq!(read_version(&path), UNKNOWN);

        fs::write(&path, "broken\nPayload-Version: 4.0.0\n").unwrap();
        assert_eq!(read_version(&path), "4.0.0");
    }
}
