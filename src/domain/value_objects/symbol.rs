use crate::domain::errors::ValidationError;

/// A validated stock ticker symbol.
///
/// Invariant: 1-5 uppercase ASCII letters, no digits or punctuation.
/// Construction goes through [`Symbol::parse`], which also performs the
/// normalization (trim + uppercase) applied to every user-supplied
/// ticker before it reaches the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(String);

impl Symbol {
    /// Normalize raw ticker input the way the trade form does: trim
    /// surrounding whitespace and uppercase.
    pub fn normalize(raw: &str) -> String {
        raw.trim().to_uppercase()
    }

    /// Parse and validate a raw ticker string.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = Self::normalize(raw);

        if normalized.is_empty() {
            return Err(ValidationError::Required("Ticker symbol"));
        }

        if normalized.len() > 5 || !normalized.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ValidationError::InvalidFormat(normalized));
        }

        Ok(Symbol(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let symbol = Symbol::parse("  aapl ").unwrap();
        assert_eq!(symbol.as_str(), "AAPL");
    }

    #[test]
    fn test_parse_empty_is_required() {
        assert_eq!(
            Symbol::parse("   "),
            Err(ValidationError::Required("Ticker symbol"))
        );
        assert_eq!(
            Symbol::parse(""),
            Err(ValidationError::Required("Ticker symbol"))
        );
    }

    #[test]
    fn test_parse_rejects_digits_and_punctuation() {
        assert!(matches!(
            Symbol::parse("AAPL1"),
            Err(ValidationError::InvalidFormat(_))
        ));
        assert!(matches!(
            Symbol::parse("BRK.B"),
            Err(ValidationError::InvalidFormat(_))
        ));
        assert!(matches!(
            Symbol::parse("A-B"),
            Err(ValidationError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_parse_rejects_too_long() {
        assert!(Symbol::parse("ABCDE").is_ok());
        assert!(matches!(
            Symbol::parse("ABCDEF"),
            Err(ValidationError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let first = Symbol::parse("tsla").unwrap();
        let second = Symbol::parse(first.as_str()).unwrap();
        assert_eq!(first, second);
    }
}
