//! PowerShell script canonicalization and signature block encoding.
//!
//! Scripts carry their Authenticode signature as a trailing comment block:
//!
//! ```text
//! <script body>\r\n
//! # SIG # Begin signature block\r\n
//! # MIIa...\r\n
//! # SIG # End signature block\r\n
//! ```
//!
//! The digest covers the UTF-16LE encoding of the script body (everything
//! before the `\r\n` that precedes the begin marker), regardless of the file's
//! own encoding. The block itself is written back in the file's encoding.

use std::io::Read;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::domain::carrier::{CarrierDigest, CarrierFormat};
use crate::domain::constants::{SIGNATURE_BEGIN_MARKER, SIGNATURE_END_MARKER, SIGNATURE_LINE_WIDTH};
use crate::domain::crypto::{DigestBytes, HashAlgorithm};
use crate::domain::patch::Patch;
use crate::domain::style::Style;
use crate::infra::error::{SigningError, SigningResult};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Text encoding of an artifact on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8 { bom: bool },
    Utf16Le,
}

impl TextEncoding {
    fn detect(bytes: &[u8]) -> SigningResult<Self> {
        if bytes.starts_with(UTF8_BOM) {
            Ok(TextEncoding::Utf8 { bom: true })
        } else if bytes.starts_with(UTF16LE_BOM) {
            Ok(TextEncoding::Utf16Le)
        } else if bytes.starts_with(UTF16BE_BOM) {
            Err(SigningError::UnrecognizedStyleError(
                "UTF-16BE scripts are not supported".to_string(),
            ))
        } else {
            Ok(TextEncoding::Utf8 { bom: false })
        }
    }

    pub fn bom_len(&self) -> usize {
        match self {
            TextEncoding::Utf8 { bom: true } => UTF8_BOM.len(),
            TextEncoding::Utf8 { bom: false } => 0,
            TextEncoding::Utf16Le => UTF16LE_BOM.len(),
        }
    }

    fn decode(&self, body: &[u8]) -> SigningResult<String> {
        match self {
            TextEncoding::Utf8 { .. } => String::from_utf8(body.to_vec()).map_err(|e| {
                SigningError::UnrecognizedStyleError(format!("script is not valid UTF-8: {e}"))
            }),
            TextEncoding::Utf16Le => {
                if body.len() % 2 != 0 {
                    return Err(SigningError::UnrecognizedStyleError(
                        "UTF-16 script has an odd byte length".to_string(),
                    ));
                }
                let units: Vec<u16> = body
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|e| {
                    SigningError::UnrecognizedStyleError(format!(
                        "script is not valid UTF-16: {e}"
                    ))
                })
            }
        }
    }

    fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 { .. } => text.as_bytes().to_vec(),
            TextEncoding::Utf16Le => utf16le(text),
        }
    }
}

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// Canonical digest of a script plus what is needed to re-embed a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    style: Style,
    imprint: DigestBytes,
    encoding: TextEncoding,
    text_size: usize,
    signature_size: usize,
    embedded_signature: Option<Vec<u8>>,
}

impl Digest {
    pub fn style(&self) -> Style {
        self.style
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.imprint.algorithm()
    }

    pub fn imprint(&self) -> &DigestBytes {
        &self.imprint
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Byte offset where the signature block starts (or would start).
    pub fn text_size(&self) -> usize {
        self.text_size
    }

    /// Byte length of the existing signature block, zero when unsigned.
    pub fn signature_size(&self) -> usize {
        self.signature_size
    }

    pub fn embedded_signature(&self) -> Option<&[u8]> {
        self.embedded_signature.as_deref()
    }

    /// Encode `signed_blob` as a signature block replacing any existing one.
    pub fn build_patch(&self, signed_blob: &[u8]) -> SigningResult<Patch> {
        if signed_blob.is_empty() {
            return Err(SigningError::PatchEncodingError(
                "signed blob is empty".to_string(),
            ));
        }
        let (start, end) = self.style.delimiters();
        let encoded = STANDARD.encode(signed_blob);

        let mut block = format!("\r\n{start}{SIGNATURE_BEGIN_MARKER}{end}\r\n");
        for chunk in encoded.as_bytes().chunks(SIGNATURE_LINE_WIDTH) {
            // base64 output is ASCII
            let line = std::str::from_utf8(chunk)
                .map_err(|e| SigningError::PatchEncodingError(e.to_string()))?;
            if let Some(forbidden) = self.style.forbidden_sequence() {
                if line.contains(forbidden) {
                    return Err(SigningError::PatchEncodingError(format!(
                        "encoded line contains '{forbidden}', which terminates a {} comment",
                        self.style
                    )));
                }
            }
            block.push_str(start);
            block.push_str(line);
            block.push_str(end);
            block.push_str("\r\n");
        }
        block.push_str(&format!("{start}{SIGNATURE_END_MARKER}{end}\r\n"));

        let original_len = self.text_size + self.signature_size;
        Patch::new(
            self.text_size,
            self.signature_size,
            original_len,
            self.encoding.encode(&block),
        )
    }
}

impl CarrierDigest for Digest {
    fn imprint(&self) -> &DigestBytes {
        &self.imprint
    }

    fn embedded_signature(&self) -> Option<&[u8]> {
        self.embedded_signature.as_deref()
    }
}

/// Read a script and compute its canonical digest for `style`.
pub fn digest<R: Read>(mut reader: R, style: Style, hash: HashAlgorithm) -> SigningResult<Digest> {
    let mut artifact = Vec::new();
    reader.read_to_end(&mut artifact)?;
    digest_bytes(&artifact, style, hash)
}

/// Compute the canonical digest of an in-memory script.
pub fn digest_bytes(artifact: &[u8], style: Style, hash: HashAlgorithm) -> SigningResult<Digest> {
    let encoding = TextEncoding::detect(artifact)?;
    let text = encoding.decode(&artifact[encoding.bom_len()..])?;
    let (canonical, embedded_signature) = split_signature_block(&text, style)?;

    let text_size = encoding.bom_len() + encoding.encode(canonical).len();
    let imprint = DigestBytes::compute(hash, &utf16le(canonical));
    log::debug!(
        "Digested {} script: {} canonical bytes, {} signature bytes, {}",
        style,
        text_size,
        artifact.len() - text_size,
        imprint.to_hex()
    );

    Ok(Digest {
        style,
        imprint,
        encoding,
        text_size,
        signature_size: artifact.len() - text_size,
        embedded_signature,
    })
}

/// Split `text` into canonical content and the decoded embedded signature.
fn split_signature_block(text: &str, style: Style) -> SigningResult<(&str, Option<Vec<u8>>)> {
    let (start, end) = style.delimiters();
    let begin_line = format!("{start}{SIGNATURE_BEGIN_MARKER}{end}");
    let end_line = format!("{start}{SIGNATURE_END_MARKER}{end}");
    let begin_block = format!("\r\n{begin_line}\r\n");

    let Some(pos) = text.rfind(&begin_block) else {
        if text.contains(&begin_line) || text.contains(&end_line) {
            return Err(SigningError::UnrecognizedStyleError(format!(
                "signature block markers are not on their own CRLF lines for style {style}"
            )));
        }
        return Ok((text, None));
    };

    let mut encoded = String::new();
    let mut lines = text[pos + begin_block.len()..].split("\r\n");
    let mut terminated = false;
    for line in lines.by_ref() {
        if line == end_line {
            terminated = true;
            break;
        }
        let inner = line
            .strip_prefix(start)
            .and_then(|l| l.strip_suffix(end))
            .ok_or_else(|| {
                SigningError::UnrecognizedStyleError(format!(
                    "malformed signature block line for style {style}: {line:?}"
                ))
            })?;
        encoded.push_str(inner);
    }
    if !terminated {
        return Err(SigningError::UnrecognizedStyleError(
            "signature block has no end marker".to_string(),
        ));
    }
    if lines.any(|rest| !rest.trim().is_empty()) {
        return Err(SigningError::UnrecognizedStyleError(
            "content follows the signature block".to_string(),
        ));
    }

    let blob = STANDARD.decode(encoded.as_bytes()).map_err(|e| {
        SigningError::UnrecognizedStyleError(format!("signature block is not base64: {e}"))
    })?;
    if blob.is_empty() {
        return Err(SigningError::UnrecognizedStyleError(
            "signature block is empty".to_string(),
        ));
    }
    Ok((&text[..pos], Some(blob)))
}

impl CarrierFormat for Style {
    type Digest = Digest;

    fn digest(&self, artifact: &[u8], hash: HashAlgorithm) -> SigningResult<Digest> {
        digest_bytes(artifact, *self, hash)
    }

    fn build_patch(&self, digest: &Digest, signed_blob: &[u8]) -> SigningResult<Patch> {
        if digest.style() != *self {
            return Err(SigningError::PatchEncodingError(format!(
                "digest was computed for style {} not {}",
                digest.style(),
                self
            )));
        }
        digest.build_patch(signed_blob)
    }
}
