use once_cell::sync::Lazy;
use regex::Regex;

use crate::data::{CnjNumber, RegionCode};
use crate::error::{CnjError, Result};

static CANONICAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{7}-\d{2}\.\d{4}\.\d\.\d{2}\.\d{4}$").expect("canonical CNJ pattern")
});

/// Digit widths of the CNJ segments, in order.
const SEGMENTS: [usize; 6] = [7, 2, 4, 1, 2, 4];
const SEPARATORS: [char; 5] = ['-', '.', '.', '.', '.'];

/// Labour-court branch; the only branch served by the regional tribunals here.
const LABOUR_BRANCH: char = '5';

impl CnjNumber {
    /// Validate `raw`, tolerating surrounding noise and missing separators.
    ///
    /// Letters and punctuation other than `.`, `-` and `_` are dropped first.
    /// If what remains is not canonical it must be exactly 20 digits, which are
    /// re-split at the fixed 7-2-4-1-2-4 offsets.
    pub fn parse(raw: &str) -> Result<Self> {
        let stripped: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '_'))
            .collect();

        if CANONICAL.is_match(&stripped) {
            return Ok(Self(stripped));
        }

        let rebuilt = insert_separators(&stripped).ok_or_else(|| CnjError::Malformed(raw.to_string()))?;
        if !CANONICAL.is_match(&rebuilt) {
            return Err(CnjError::Malformed(raw.to_string()));
        }

        Ok(Self(rebuilt))
    }

    /// Tribunal region of a labour-court number, leading zero stripped.
    pub fn region(&self) -> Result<RegionCode> {
        let branch = self.branch();
        if branch != LABOUR_BRANCH {
            return Err(CnjError::UnsupportedBranch {
                number: self.0.clone(),
                branch,
            });
        }

        let tribunal = self.tribunal();
        let code = tribunal.strip_prefix('0').unwrap_or(tribunal);
        if code.is_empty() || code == "0" {
            return Err(CnjError::InvalidRegion(self.0.clone()));
        }

        Ok(RegionCode::new(code))
    }
}

fn insert_separators(digits: &str) -> Option<String> {
    if digits.len() != 20 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut out = String::with_capacity(25);
    let mut offset = 0;
    for (i, width) in SEGMENTS.iter().enumerate() {
        if i > 0 {
            out.push(SEPARATORS[i - 1]);
        }
        out.push_str(&digits[offset..offset + width]);
        offset += width;
    }
    Some(out)
}

/// Parse a case number and resolve its owning region.
///
/// Returns `None` for anything that is not a labour-court CNJ number; the
/// caller drops such records instead of retrying them.
///
/// # Examples
///
/// ```
/// use crawjud_cnj::normalize;
///
/// let (region, number) = normalize("00012345620245020001").unwrap();
/// assert_eq!(region.as_str(), "2");
/// assert_eq!(number.as_str(), "0001234-56.2024.5.02.0001");
///
/// assert!(normalize("not a case").is_none());
/// ```
pub fn normalize(raw: &str) -> Option<(RegionCode, CnjNumber)> {
    let number = CnjNumber::parse(raw)
        .inspect_err(|e| tracing::debug!(error = %e, "rejected case number"))
        .ok()?;
    let region = number
        .region()
        .inspect_err(|e| tracing::debug!(error = %e, "rejected case number"))
        .ok()?;
    Some((region, number))
}
