//! Literal byte-range patches used to embed a signature into an artifact.

use crate::infra::error::{SigningError, SigningResult};

/// Replace `length` bytes at `offset` with `replacement`.
///
/// `original_len` pins the artifact length the patch was computed against so
/// that a patch is never applied to a different revision of the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    offset: usize,
    length: usize,
    original_len: usize,
    replacement: Vec<u8>,
}

impl Patch {
    pub fn new(
        offset: usize,
        length: usize,
        original_len: usize,
        replacement: Vec<u8>,
    ) -> SigningResult<Self> {
        let end = offset.checked_add(length).ok_or_else(|| {
            SigningError::PatchApplicationError("patch range overflows".to_string())
        })?;
        if end > original_len {
            return Err(SigningError::PatchApplicationError(format!(
                "patch range {offset}..{end} exceeds artifact length {original_len}"
            )));
        }
        Ok(Self {
            offset,
            length,
            original_len,
            replacement,
        })
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn original_len(&self) -> usize {
        self.original_len
    }

    pub fn replacement(&self) -> &[u8] {
        &self.replacement
    }
}

/// Apply `patch` to `original`, returning the patched artifact.
pub fn apply_patch(original: &[u8], patch: &Patch) -> SigningResult<Vec<u8>> {
    if original.len() != patch.original_len {
        return Err(SigningError::PatchApplicationError(format!(
            "artifact is {} bytes but the patch was built for {} bytes",
            original.len(),
            patch.original_len
        )));
    }
    let end = patch.offset + patch.length;
    let mut out =
        Vec::with_capacity(original.len() - patch.length + patch.replacement.len());
    out.extend_from_slice(&original[..patch.offset]);
    out.extend_from_slice(&patch.replacement);
    out.extend_from_slice(&original[end..]);
    log::debug!(
        "Applied patch at offset {} (replaced {} bytes with {})",
        patch.offset,
        patch.length,
        patch.replacement.len()
    );
    Ok(out)
}
