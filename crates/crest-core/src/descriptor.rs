//! Content-derived identities: digests and descriptors.
//!
//! A digest is the deterministic fingerprint of byte content; a descriptor
//! bundles it with a media type and size. Two descriptors with equal digests
//! denote byte-identical content.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Media type of a detached signature envelope blob.
pub const MEDIA_TYPE_SIGNATURE: &str = "application/jose+json";

/// Artifact type recorded on signature link manifests.
pub const ARTIFACT_TYPE_SIGNATURE: &str = "application/vnd.crest.signature.v1";

/// Media type of the link record (artifact manifest) tying a signature to its subject.
pub const MEDIA_TYPE_ARTIFACT_MANIFEST: &str =
    "application/vnd.cncf.oras.artifact.manifest.v1+json";

/// Default media type assumed for resolved subject manifests.
pub const MEDIA_TYPE_IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// Accept header value for manifest resolution.
pub const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json, \
     application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.cncf.oras.artifact.manifest.v1+json";

/// A content digest in canonical `algorithm:hex` form, e.g. `sha256:ab12…`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Digest {
    pub algorithm: String,
    pub hex: String,
}

impl Digest {
    /// Parse and validate a digest string. Hex must be lowercase; for known
    /// algorithms the hex length must match the digest width.
    pub fn parse(s: &str) -> Result<Digest, String> {
        let Some((algorithm, hex)) = s.split_once(':') else {
            return Err(format!("invalid digest {:?}: missing ':' separator", s));
        };
        if algorithm.is_empty()
            || !algorithm
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(format!("invalid digest algorithm {:?}", algorithm));
        }
        if hex.is_empty()
            || !hex
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(format!("invalid digest hex {:?}", hex));
        }
        let expected = match algorithm {
            "sha256" => Some(64),
            "sha512" => Some(128),
            _ => None,
        };
        if let Some(len) = expected {
            if hex.len() != len {
                return Err(format!(
                    "invalid {} digest: expected {} hex chars, got {}",
                    algorithm,
                    len,
                    hex.len()
                ));
            }
        }
        Ok(Digest {
            algorithm: algorithm.to_string(),
            hex: hex.to_string(),
        })
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl Serialize for Digest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Digest, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Content-derived identity for a stored blob or manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub digest: Digest,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_sha256() {
        let hex = "a".repeat(64);
        let d = Digest::parse(&format!("sha256:{}", hex)).unwrap();
        assert_eq!(d.algorithm, "sha256");
        assert_eq!(d.hex, hex);
        assert_eq!(d.to_string(), format!("sha256:{}", hex));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Digest::parse("sha256").is_err());
        assert!(Digest::parse(":abcd").is_err());
        assert!(Digest::parse("sha256:").is_err());
        assert!(Digest::parse("sha256:xyz").is_err());
        // uppercase hex is not canonical
        let upper = "A".repeat(64);
        assert!(Digest::parse(&format!("sha256:{}", upper)).is_err());
        // wrong width for a known algorithm
        assert!(Digest::parse("sha256:abcd").is_err());
    }

    #[test]
    fn test_parse_unknown_algorithm_any_width() {
        let d = Digest::parse("blake3:abcdef").unwrap();
        assert_eq!(d.algorithm, "blake3");
    }

    #[test]
    fn test_descriptor_wire_field_names() {
        let hex = "b".repeat(64);
        let desc = Descriptor {
            media_type: MEDIA_TYPE_SIGNATURE.to_string(),
            digest: Digest::parse(&format!("sha256:{}", hex)).unwrap(),
            size: 42,
        };
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json["mediaType"], MEDIA_TYPE_SIGNATURE);
        assert_eq!(json["digest"], format!("sha256:{}", hex));
        assert_eq!(json["size"], 42);

        let back: Descriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, desc);
    }
}
