//! Signature block styles for PowerShell-family artifacts.
//!
//! A style names the comment syntax used to embed the signature block. Styles
//! are resolved either from an explicit name (`hash`, `xml`, `c`) or from a
//! file name / extension.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::infra::error::SigningError;

/// Comment convention used to carry the signature block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    /// `# ...` line comments (.ps1, .psd1, .psm1)
    Hash,
    /// `<!-- ... -->` comments (.ps1xml, .psc1, .cdxml)
    Xml,
    /// `/* ... */` comments (.mof)
    C,
}

const STYLES: [Style; 3] = [Style::Hash, Style::Xml, Style::C];

const EXTENSIONS: &[(&str, Style)] = &[
    ("ps1", Style::Hash),
    ("psd1", Style::Hash),
    ("psm1", Style::Hash),
    ("ps1xml", Style::Xml),
    ("psc1", Style::Xml),
    ("cdxml", Style::Xml),
    ("mof", Style::C),
];

impl Style {
    pub fn name(&self) -> &'static str {
        match self {
            Style::Hash => "hash",
            Style::Xml => "xml",
            Style::C => "c",
        }
    }

    /// Comment opener and closer wrapped around every block line.
    pub fn delimiters(&self) -> (&'static str, &'static str) {
        match self {
            Style::Hash => ("# ", ""),
            Style::Xml => ("<!-- ", " -->"),
            Style::C => ("/* ", " */"),
        }
    }

    /// Sequence that must not appear inside a block line.
    pub fn forbidden_sequence(&self) -> Option<&'static str> {
        match self {
            Style::Hash => None,
            Style::Xml => Some("--"),
            Style::C => Some("*/"),
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        STYLES.iter().copied().find(|s| s.name() == name)
    }

    fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, style)| *style)
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Style {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve_style(s).ok_or_else(|| unknown_style(s))
    }
}

/// Resolve a style from an explicit name, a file name or a bare extension.
///
/// Explicit names win over extensions; extensions match case-insensitively.
pub fn resolve_style(name: &str) -> Option<Style> {
    if let Some(style) = Style::from_name(name) {
        return Some(style);
    }
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_else(|| name.trim_start_matches('.'));
    Style::from_extension(ext)
}

/// Names of every registered style.
pub fn all_styles() -> Vec<&'static str> {
    STYLES.iter().map(Style::name).collect()
}

/// Error raised when neither a name nor an extension resolves.
pub fn unknown_style(name: &str) -> SigningError {
    SigningError::UnknownStyleError(format!(
        "{name}: unknown powershell style, expected: {}",
        all_styles().join(" ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_name() {
        assert_eq!(resolve_style("hash"), Some(Style::Hash));
        assert_eq!(resolve_style("xml"), Some(Style::Xml));
        assert_eq!(resolve_style("c"), Some(Style::C));
    }

    #[test]
    fn resolves_by_extension() {
        assert_eq!(resolve_style("foo.ps1"), Some(Style::Hash));
        assert_eq!(resolve_style("dir/Module.PSM1"), Some(Style::Hash));
        assert_eq!(resolve_style("types.ps1xml"), Some(Style::Xml));
        assert_eq!(resolve_style(".cdxml"), Some(Style::Xml));
        assert_eq!(resolve_style("schema.mof"), Some(Style::C));
        assert_eq!(resolve_style("psd1"), Some(Style::Hash));
    }

    #[test]
    fn unresolved_names() {
        assert_eq!(resolve_style("foo.txt"), None);
        assert_eq!(resolve_style(""), None);
        let err = "foo.exe".parse::<Style>().unwrap_err();
        assert!(err.to_string().contains("expected: hash xml c"));
    }

    #[test]
    fn delimiters_and_forbidden_sequences() {
        assert_eq!(Style::Xml.delimiters(), ("<!-- ", " -->"));
        assert_eq!(Style::C.forbidden_sequence(), Some("*/"));
        assert_eq!(Style::Hash.forbidden_sequence(), None);
    }
}
