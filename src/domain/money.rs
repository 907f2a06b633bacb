use std::fmt;

/// Money is represented as a signed integer in the minor currency unit.
/// Balances are always >= 0 after a successful operation; the signed type
/// exists so arithmetic on deltas stays natural.
pub type Cents = i64;

/// Parse a user-supplied amount string into a positive integer amount.
/// All amounts arrive as text from the caller; anything non-numeric,
/// zero or negative is rejected before any mutation happens.
///
/// Example: "500" -> 500, "0" -> error, "-3" -> error, "12.50" -> error
pub fn parse_amount(input: &str) -> Result<Cents, ParseAmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseAmountError::InvalidFormat);
    }

    let amount: Cents = input.parse().map_err(|_| ParseAmountError::InvalidFormat)?;
    if amount <= 0 {
        return Err(ParseAmountError::NotPositive);
    }
    Ok(amount)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    InvalidFormat,
    NotPositive,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::InvalidFormat => write!(f, "invalid amount format"),
            ParseAmountError::NotPositive => write!(f, "amount must be positive"),
        }
    }
}

impl std::error::Error for ParseAmountError {}
