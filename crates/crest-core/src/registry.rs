//! Remote signature repository client: reference parsing, manifest
//! resolution, content-addressed blob upload, and signature link records.
//!
//! The registry is the authority on digests: resolved and linked descriptors
//! carry the digest the registry reports, never one recomputed from caller
//! metadata.

use std::fmt;
use std::path::Path;

use sha2::{Digest as _, Sha256};

use crate::config::PushOptions;
use crate::deadline::Deadline;
use crate::descriptor::{
    Descriptor, Digest, ARTIFACT_TYPE_SIGNATURE, MANIFEST_ACCEPT, MEDIA_TYPE_ARTIFACT_MANIFEST,
    MEDIA_TYPE_IMAGE_MANIFEST, MEDIA_TYPE_SIGNATURE,
};
use crate::error::CrestError;
use crate::http_client;

/// Parsed artifact reference: `host[:port]/repository[:tag][@digest]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    pub registry: String,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<Digest>,
}

impl Reference {
    pub fn parse(s: &str) -> Result<Reference, CrestError> {
        let invalid = |source: &str| CrestError::Resolution {
            operation: "reference".to_string(),
            reference: s.to_string(),
            source: source.to_string(),
        };
        let Some((registry, rest)) = s.split_once('/') else {
            return Err(invalid("expected <registry>/<repository>"));
        };
        if registry.is_empty() {
            return Err(invalid("empty registry host"));
        }
        let (rest, digest) = match rest.split_once('@') {
            Some((r, d)) => {
                let digest = Digest::parse(d).map_err(|e| invalid(&e))?;
                (r, Some(digest))
            }
            None => (rest, None),
        };
        let (repository, tag) = match rest.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') && !tag.is_empty() => {
                (repo, Some(tag.to_string()))
            }
            _ => (rest, None),
        };
        if repository.is_empty() {
            return Err(invalid("empty repository path"));
        }
        if !repository
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-/".contains(c))
        {
            return Err(invalid("repository may only contain [a-z0-9._-/]"));
        }
        Ok(Reference {
            registry: registry.to_string(),
            repository: repository.to_string(),
            tag,
            digest,
        })
    }

    /// The manifest selector: digest wins over tag; no tag means `latest`.
    pub fn manifest_selector(&self) -> String {
        if let Some(digest) = &self.digest {
            return digest.to_string();
        }
        self.tag.clone().unwrap_or_else(|| "latest".to_string())
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

/// Resolved registry credentials, rendered as an Authorization header value.
/// Explicit username/password (Basic) beats the configured token (Bearer).
#[derive(Clone, Debug)]
pub struct Credentials {
    header: Option<String>,
}

impl Credentials {
    pub fn resolve(dir: &Path, opts: &PushOptions) -> Credentials {
        if let (Some(user), Some(pass)) = (opts.username.as_deref(), opts.password.as_deref()) {
            let raw = format!("{}:{}", user, pass);
            return Credentials {
                header: Some(format!("Basic {}", base64::encode(raw))),
            };
        }
        if let Some(token) = crate::config::registry_token(dir) {
            if !token.is_empty() {
                return Credentials {
                    header: Some(format!("Bearer {}", token)),
                };
            }
        }
        Credentials { header: None }
    }

    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }
}

/// Remote collaborator exposing content-addressed put and link operations.
/// The push engine is written against this seam; tests provide in-memory
/// implementations.
pub trait Repository {
    /// Store one payload content-addressed and return its descriptor.
    /// Idempotent: identical content converges on the same digest store-side.
    fn put(&self, deadline: &Deadline, payload: &[u8]) -> Result<Descriptor, String>;

    /// Record a link between a subject manifest and an uploaded signature,
    /// returning the link record's descriptor.
    fn link(
        &self,
        deadline: &Deadline,
        subject: &Descriptor,
        signature: &Descriptor,
    ) -> Result<Descriptor, String>;
}

/// Repository handle over the registry HTTP wire protocol. Resolved once per
/// command invocation and reused read-only across the batch.
pub struct RemoteRepository {
    origin: String,
    repository: String,
    auth: Credentials,
}

/// Build the repository handle for a reference. No network call is made here.
pub fn resolve_signature_repository(
    reference: &Reference,
    opts: &PushOptions,
) -> Result<RemoteRepository, CrestError> {
    let scheme = if opts.plain_http { "http" } else { "https" };
    Ok(RemoteRepository {
        origin: format!("{}://{}", scheme, reference.registry),
        repository: reference.repository.clone(),
        auth: Credentials::resolve(Path::new("."), opts),
    })
}

/// Resolve the subject manifest's descriptor from the registry. The digest
/// comes from the registry's Docker-Content-Digest header; a missing header
/// is an error.
pub fn resolve_manifest_descriptor(
    deadline: &Deadline,
    reference: &Reference,
    opts: &PushOptions,
) -> Result<Descriptor, CrestError> {
    deadline.check("resolve manifest")?;
    let resolve_err = |source: String| CrestError::Resolution {
        operation: "manifest".to_string(),
        reference: reference.to_string(),
        source,
    };

    let scheme = if opts.plain_http { "http" } else { "https" };
    let url = format!(
        "{}://{}/v2/{}/manifests/{}",
        scheme,
        reference.registry,
        reference.repository,
        reference.manifest_selector()
    );
    let auth = Credentials::resolve(Path::new("."), opts);
    let mut owned: Vec<(String, String)> =
        vec![("Accept".to_string(), MANIFEST_ACCEPT.to_string())];
    if let Some(value) = auth.header() {
        owned.push(("Authorization".to_string(), value.to_string()));
    }
    let headers: Vec<(&str, &str)> = owned.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

    // HEAD is enough when the registry reports digest and size; fall back to
    // GET otherwise.
    let resp = match http_client::head(&url, &headers) {
        Ok(r)
            if r.header("Docker-Content-Digest").is_some()
                && r.header("Content-Length").is_some() =>
        {
            r
        }
        _ => http_client::get(&url, &headers).map_err(resolve_err)?,
    };

    let digest_header = resp
        .header("Docker-Content-Digest")
        .ok_or_else(|| resolve_err("registry returned no digest for manifest".to_string()))?;
    let digest = Digest::parse(digest_header).map_err(resolve_err)?;
    let size = resp
        .header("Content-Length")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(resp.body.len() as u64);
    let media_type = resp
        .header("Content-Type")
        .unwrap_or(MEDIA_TYPE_IMAGE_MANIFEST)
        .to_string();
    Ok(Descriptor {
        media_type,
        digest,
        size,
    })
}

impl RemoteRepository {
    fn url(&self, rest: &str) -> String {
        format!("{}/v2/{}/{}", self.origin, self.repository, rest)
    }

    fn auth_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(value) = self.auth.header() {
            headers.push(("Authorization".to_string(), value.to_string()));
        }
        headers
    }

    /// Absolute upload URL from a session Location, with the digest query
    /// parameter appended. Locations may be absolute or registry-relative.
    fn upload_url(&self, location: &str, digest: &Digest) -> String {
        let absolute = if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else {
            format!("{}{}", self.origin, location)
        };
        let sep = if absolute.contains('?') { '&' } else { '?' };
        format!("{}{}digest={}", absolute, sep, digest)
    }
}

impl Repository for RemoteRepository {
    fn put(&self, deadline: &Deadline, payload: &[u8]) -> Result<Descriptor, String> {
        deadline.check("blob upload").map_err(|e| e.to_string())?;
        // The digest computed here only addresses the upload; the registry
        // verifies it against the received bytes before committing the blob.
        let digest = Digest {
            algorithm: "sha256".to_string(),
            hex: format!("{:x}", Sha256::digest(payload)),
        };

        let owned = self.auth_headers();
        let headers: Vec<(&str, &str)> =
            owned.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let start = http_client::post_empty(&self.url("blobs/uploads/"), &headers)?;
        let location = start
            .header("Location")
            .ok_or_else(|| "registry returned no upload location".to_string())?;
        let put_url = self.upload_url(location, &digest);

        deadline.check("blob upload").map_err(|e| e.to_string())?;
        let mut owned = self.auth_headers();
        owned.push((
            "Content-Type".to_string(),
            "application/octet-stream".to_string(),
        ));
        let headers: Vec<(&str, &str)> =
            owned.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        http_client::put_bytes(&put_url, &headers, payload)?;

        Ok(Descriptor {
            media_type: MEDIA_TYPE_SIGNATURE.to_string(),
            digest,
            size: payload.len() as u64,
        })
    }

    fn link(
        &self,
        deadline: &Deadline,
        subject: &Descriptor,
        signature: &Descriptor,
    ) -> Result<Descriptor, String> {
        deadline.check("signature link").map_err(|e| e.to_string())?;
        let manifest = serde_json::json!({
            "mediaType": MEDIA_TYPE_ARTIFACT_MANIFEST,
            "artifactType": ARTIFACT_TYPE_SIGNATURE,
            "blobs": [signature],
            "subject": subject,
        });
        let body = serde_json::to_vec(&manifest).map_err(|e| e.to_string())?;
        let digest = Digest {
            algorithm: "sha256".to_string(),
            hex: format!("{:x}", Sha256::digest(&body)),
        };

        let mut owned = self.auth_headers();
        owned.push((
            "Content-Type".to_string(),
            MEDIA_TYPE_ARTIFACT_MANIFEST.to_string(),
        ));
        let headers: Vec<(&str, &str)> =
            owned.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let url = self.url(&format!("manifests/{}", digest));
        let resp = http_client::put_bytes(&url, &headers, &body)?;

        let returned = resp
            .header("Docker-Content-Digest")
            .ok_or_else(|| "registry returned no digest for link manifest".to_string())?;
        let digest = Digest::parse(returned)?;
        Ok(Descriptor {
            media_type: MEDIA_TYPE_ARTIFACT_MANIFEST.to_string(),
            digest,
            size: body.len() as u64,
        })
    }
}
