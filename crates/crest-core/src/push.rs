//! Push engine: select signature payloads, upload each as a
//! content-addressed blob, link it to the subject manifest, and report link
//! digests in processing order.
//!
//! Processing is strictly sequential and fail-fast. A link record is only
//! created after its blob is durably stored; a blob whose link step fails
//! stays in the store as an orphan (remote writes are not transactional).

use std::fs;
use std::path::{Path, PathBuf};

use crate::cache;
use crate::config::PushOptions;
use crate::deadline::Deadline;
use crate::descriptor::{Descriptor, Digest};
use crate::error::CrestError;
use crate::registry::{self, Reference, Repository};

/// Ordered payload sources for one run. An explicit non-empty list is used
/// verbatim; otherwise the cache decides, keyed by the subject digest.
/// Selection completes before any network call.
pub fn select_sources(
    cache_root: &Path,
    subject: &Digest,
    explicit: &[PathBuf],
) -> Result<Vec<PathBuf>, CrestError> {
    if !explicit.is_empty() {
        return Ok(explicit.to_vec());
    }
    let digests = cache::signature_digests(cache_root, subject)?;
    Ok(digests
        .iter()
        .map(|sig| cache::signature_path(cache_root, subject, sig))
        .collect())
}

/// Upload one signature payload and link it to the subject manifest. The
/// shared operation behind both the batch and single-shot entry points.
pub fn push_one(
    repo: &dyn Repository,
    deadline: &Deadline,
    subject: &Descriptor,
    payload: &[u8],
) -> Result<Descriptor, CrestError> {
    deadline.check("push signature")?;
    let sig_desc = repo
        .put(deadline, payload)
        .map_err(|e| CrestError::Upload { source: e })?;
    deadline.check("link signature")?;
    repo.link(deadline, subject, &sig_desc)
        .map_err(|e| CrestError::Link { source: e })
}

/// Push every source in order, invoking the reporter with each link
/// descriptor as it lands. The first error halts the batch; items already
/// reported stand, later items are never attempted.
pub fn push_signatures(
    repo: &dyn Repository,
    deadline: &Deadline,
    subject: &Descriptor,
    sources: &[PathBuf],
    mut on_linked: impl FnMut(&Descriptor),
) -> Result<usize, CrestError> {
    let mut pushed = 0usize;
    for path in sources {
        let payload = fs::read(path).map_err(|e| CrestError::PayloadRead {
            path: path.display().to_string(),
            source: e.to_string(),
        })?;
        let desc = push_one(repo, deadline, subject, &payload)?;
        on_linked(&desc);
        pushed += 1;
    }
    Ok(pushed)
}

/// `crest push` entry point: resolve the subject manifest, select payload
/// sources, resolve the repository handle, then upload and link each payload
/// sequentially. Returns the number of linked signatures.
pub fn run_push(
    deadline: &Deadline,
    reference: &str,
    opts: &PushOptions,
    on_linked: impl FnMut(&Descriptor),
) -> Result<usize, CrestError> {
    let reference = require_reference(reference)?;
    opts.validate()?;
    let reference = Reference::parse(reference)?;
    let manifest_desc = registry::resolve_manifest_descriptor(deadline, &reference, opts)?;
    let sources = select_sources(
        &cache::cache_dir(),
        &manifest_desc.digest,
        &opts.signature_paths,
    )?;
    let repo = registry::resolve_signature_repository(&reference, opts)?;
    push_signatures(&repo, deadline, &manifest_desc, &sources, on_linked)
}

/// Single-shot variant: push one already-in-memory payload for a reference.
/// Resolution order matches `run_push`; both converge on `push_one`.
pub fn push_signature(
    deadline: &Deadline,
    reference: &str,
    opts: &PushOptions,
    payload: &[u8],
) -> Result<Descriptor, CrestError> {
    let reference = require_reference(reference)?;
    opts.validate()?;
    let reference = Reference::parse(reference)?;
    let manifest_desc = registry::resolve_manifest_descriptor(deadline, &reference, opts)?;
    let repo = registry::resolve_signature_repository(&reference, opts)?;
    push_one(&repo, deadline, &manifest_desc, payload)
}

fn require_reference(reference: &str) -> Result<&str, CrestError> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(CrestError::MissingReference);
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::time::Duration;

    use sha2::{Digest as _, Sha256};

    use super::*;
    use crate::descriptor::{MEDIA_TYPE_ARTIFACT_MANIFEST, MEDIA_TYPE_SIGNATURE};

    fn sha256_hex(content: &[u8]) -> String {
        format!("{:x}", Sha256::digest(content))
    }

    fn digest_of(content: &[u8]) -> Digest {
        Digest {
            algorithm: "sha256".to_string(),
            hex: sha256_hex(content),
        }
    }

    fn subject_descriptor() -> Descriptor {
        Descriptor {
            media_type: "application/vnd.oci.image.manifest.v1+json".to_string(),
            digest: digest_of(b"subject manifest"),
            size: 16,
        }
    }

    /// In-memory content-addressed repository. `fail_put_at` / `fail_link_at`
    /// make the n-th call of that kind fail (1-based).
    #[derive(Default)]
    struct MemoryRepository {
        blobs: RefCell<HashMap<String, Vec<u8>>>,
        links: RefCell<Vec<(Digest, Digest, Digest)>>,
        puts: Cell<usize>,
        link_calls: Cell<usize>,
        fail_put_at: Option<usize>,
        fail_link_at: Option<usize>,
    }

    impl Repository for MemoryRepository {
        fn put(&self, _deadline: &Deadline, payload: &[u8]) -> Result<Descriptor, String> {
            self.puts.set(self.puts.get() + 1);
            if self.fail_put_at == Some(self.puts.get()) {
                return Err("connection reset".to_string());
            }
            let digest = digest_of(payload);
            self.blobs
                .borrow_mut()
                .insert(digest.to_string(), payload.to_vec());
            Ok(Descriptor {
                media_type: MEDIA_TYPE_SIGNATURE.to_string(),
                digest,
                size: payload.len() as u64,
            })
        }

        fn link(
            &self,
            _deadline: &Deadline,
            subject: &Descriptor,
            signature: &Descriptor,
        ) -> Result<Descriptor, String> {
            self.link_calls.set(self.link_calls.get() + 1);
            if self.fail_link_at == Some(self.link_calls.get()) {
                return Err("manifest rejected".to_string());
            }
            let record = format!("{}\n{}", subject.digest, signature.digest);
            let link_digest = digest_of(record.as_bytes());
            self.links.borrow_mut().push((
                subject.digest.clone(),
                signature.digest.clone(),
                link_digest.clone(),
            ));
            Ok(Descriptor {
                media_type: MEDIA_TYPE_ARTIFACT_MANIFEST.to_string(),
                digest: link_digest,
                size: record.len() as u64,
            })
        }
    }

    fn write_payloads(dir: &Path, payloads: &[&[u8]]) -> Vec<PathBuf> {
        payloads
            .iter()
            .enumerate()
            .map(|(i, payload)| {
                let path = dir.join(format!("payload-{}.sig", i));
                fs::write(&path, payload).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_order_and_count() {
        let tmp = tempfile::tempdir().unwrap();
        let inputs: [&[u8]; 3] = [b"one", b"two", b"three"];
        let sources = write_payloads(tmp.path(), &inputs);
        let repo = MemoryRepository::default();
        let subject = subject_descriptor();
        let mut reported = Vec::new();

        let pushed = push_signatures(&repo, &Deadline::none(), &subject, &sources, |d| {
            reported.push(d.digest.clone())
        })
        .unwrap();

        assert_eq!(pushed, 3);
        assert_eq!(reported.len(), 3);
        let links = repo.links.borrow();
        assert_eq!(links.len(), 3);
        // reported in the same order the links were created
        for (i, (_, sig, link)) in links.iter().enumerate() {
            assert_eq!(&reported[i], link);
            assert_eq!(sig, &digest_of(inputs[i]));
        }
    }

    #[test]
    fn test_content_addressing_is_path_independent() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("first.sig");
        let b = tmp.path().join("renamed-copy.sig");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();
        let repo = MemoryRepository::default();
        let subject = subject_descriptor();
        let mut reported = Vec::new();

        push_signatures(
            &repo,
            &Deadline::none(),
            &subject,
            &[a, b],
            |d| reported.push(d.digest.clone()),
        )
        .unwrap();

        assert_eq!(reported[0], reported[1]);
        // one blob stored, both link records reference the identical digest
        assert_eq!(repo.blobs.borrow().len(), 1);
        let links = repo.links.borrow();
        assert_eq!(links[0].1, links[1].1);
    }

    #[test]
    fn test_cache_derived_selection() {
        let tmp = tempfile::tempdir().unwrap();
        let subject = subject_descriptor();
        let payloads: [&[u8]; 2] = [b"cached sig A", b"cached sig B"];
        for payload in payloads {
            let sig = digest_of(payload);
            let path = cache::signature_path(tmp.path(), &subject.digest, &sig);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, payload).unwrap();
        }

        let sources = select_sources(tmp.path(), &subject.digest, &[]).unwrap();
        assert_eq!(sources.len(), 2);
        let expected = cache::signature_digests(tmp.path(), &subject.digest).unwrap();
        for (path, sig) in sources.iter().zip(&expected) {
            assert_eq!(
                path,
                &cache::signature_path(tmp.path(), &subject.digest, sig)
            );
        }

        let repo = MemoryRepository::default();
        let pushed =
            push_signatures(&repo, &Deadline::none(), &subject, &sources, |_| {}).unwrap();
        assert_eq!(pushed, 2);
        assert_eq!(repo.blobs.borrow().len(), 2);
    }

    #[test]
    fn test_explicit_sources_used_verbatim() {
        let explicit = vec![PathBuf::from("z.sig"), PathBuf::from("a.sig")];
        let subject = subject_descriptor();
        // cache root that doesn't exist: explicit list must win without a lookup
        let sources =
            select_sources(Path::new("/nonexistent"), &subject.digest, &explicit).unwrap();
        assert_eq!(sources, explicit);
    }

    #[test]
    fn test_partial_failure_at_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let inputs: [&[u8]; 3] = [b"one", b"two", b"three"];
        let sources = write_payloads(tmp.path(), &inputs);
        let repo = MemoryRepository {
            fail_put_at: Some(2),
            ..Default::default()
        };
        let subject = subject_descriptor();
        let mut reported = Vec::new();

        let err = push_signatures(&repo, &Deadline::none(), &subject, &sources, |d| {
            reported.push(d.digest.clone())
        })
        .unwrap_err();

        assert!(err.to_string().contains("push signature failure"));
        assert_eq!(reported.len(), 1);
        assert_eq!(repo.links.borrow().len(), 1);
        // item 3 was never attempted
        assert_eq!(repo.puts.get(), 2);
    }

    #[test]
    fn test_partial_failure_at_link_leaves_orphan_blob() {
        let tmp = tempfile::tempdir().unwrap();
        let inputs: [&[u8]; 1] = [b"orphaned payload"];
        let sources = write_payloads(tmp.path(), &inputs);
        let repo = MemoryRepository {
            fail_link_at: Some(1),
            ..Default::default()
        };
        let subject = subject_descriptor();

        let err = push_signatures(&repo, &Deadline::none(), &subject, &sources, |_| {})
            .unwrap_err();

        let text = err.to_string();
        assert!(text.contains("link signature failure"));
        assert!(!text.contains("push signature failure"));
        // the uploaded blob persists, discoverable by digest alone
        let orphan = digest_of(b"orphaned payload");
        assert!(repo.blobs.borrow().contains_key(&orphan.to_string()));
        assert!(repo.links.borrow().is_empty());
    }

    #[test]
    fn test_entry_points_converge() {
        let tmp = tempfile::tempdir().unwrap();
        let inputs: [&[u8]; 1] = [b"the one signature"];
        let sources = write_payloads(tmp.path(), &inputs);
        let subject = subject_descriptor();

        let batch_repo = MemoryRepository::default();
        let mut batch_result = Vec::new();
        push_signatures(&batch_repo, &Deadline::none(), &subject, &sources, |d| {
            batch_result.push(d.clone())
        })
        .unwrap();

        let single_repo = MemoryRepository::default();
        let single_result = push_one(
            &single_repo,
            &Deadline::none(),
            &subject,
            b"the one signature",
        )
        .unwrap();

        assert_eq!(batch_result, vec![single_result]);
    }

    #[test]
    fn test_missing_reference_fails_before_any_call() {
        let err = run_push(&Deadline::none(), "  ", &PushOptions::default(), |_| {})
            .unwrap_err();
        assert_eq!(err, CrestError::MissingReference);

        let err = push_signature(
            &Deadline::none(),
            "",
            &PushOptions::default(),
            b"payload",
        )
        .unwrap_err();
        assert_eq!(err, CrestError::MissingReference);
    }

    #[test]
    fn test_invalid_options_fail_before_any_call() {
        let opts = PushOptions {
            password: Some("p".to_string()),
            ..Default::default()
        };
        let err = run_push(&Deadline::none(), "host/repo:v1", &opts, |_| {}).unwrap_err();
        assert!(matches!(err, CrestError::Config { .. }));
    }

    #[test]
    fn test_expired_deadline_halts_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let inputs: [&[u8]; 2] = [b"one", b"two"];
        let sources = write_payloads(tmp.path(), &inputs);
        let repo = MemoryRepository::default();
        let subject = subject_descriptor();

        let err = push_signatures(
            &repo,
            &Deadline::after(Duration::ZERO),
            &subject,
            &sources,
            |_| {},
        )
        .unwrap_err();

        assert!(matches!(err, CrestError::Canceled { .. }));
        assert_eq!(repo.puts.get(), 0);
    }
}
