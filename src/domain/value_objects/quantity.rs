use crate::domain::errors::ValidationError;

/// A whole-share trade quantity, always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ShareQuantity(i64);

impl ShareQuantity {
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if value > 0 {
            Ok(ShareQuantity(value))
        } else {
            Err(ValidationError::NotPositive)
        }
    }

    /// Parse raw form input into a share quantity.
    ///
    /// The input is parsed as an integer first, so a leading minus sign
    /// parses fine and then fails the positivity check (`NotPositive`),
    /// while decimals and non-numeric text fail as `NotInteger`. Both
    /// error codes are deliberate and distinct.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::Required("Quantity"));
        }

        let value: i64 = trimmed
            .parse()
            .map_err(|_| ValidationError::NotInteger(trimmed.to_string()))?;

        Self::new(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ShareQuantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_positive() {
        let qty = ShareQuantity::new(100).unwrap();
        assert_eq!(qty.value(), 100);
    }

    #[test]
    fn test_new_zero_and_negative_rejected() {
        assert_eq!(ShareQuantity::new(0), Err(ValidationError::NotPositive));
        assert_eq!(ShareQuantity::new(-5), Err(ValidationError::NotPositive));
    }

    #[test]
    fn test_parse_valid() {
        assert_eq!(ShareQuantity::parse("100").unwrap().value(), 100);
        assert_eq!(ShareQuantity::parse(" 42 ").unwrap().value(), 42);
    }

    #[test]
    fn test_parse_empty_is_required() {
        assert_eq!(
            ShareQuantity::parse(""),
            Err(ValidationError::Required("Quantity"))
        );
        assert_eq!(
            ShareQuantity::parse("   "),
            Err(ValidationError::Required("Quantity"))
        );
    }

    #[test]
    fn test_parse_non_integer() {
        assert_eq!(
            ShareQuantity::parse("12.5"),
            Err(ValidationError::NotInteger("12.5".to_string()))
        );
        assert_eq!(
            ShareQuantity::parse("ten"),
            Err(ValidationError::NotInteger("ten".to_string()))
        );
    }

    #[test]
    fn test_parse_negative_lands_on_not_positive() {
        // "-5" parses as an integer, so the failure is positivity, not
        // integer-ness.
        assert_eq!(ShareQuantity::parse("-5"), Err(ValidationError::NotPositive));
        assert_eq!(ShareQuantity::parse("0"), Err(ValidationError::NotPositive));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let qty = ShareQuantity::parse("250").unwrap();
        let again = ShareQuantity::parse(&qty.to_string()).unwrap();
        assert_eq!(qty, again);
    }
}
