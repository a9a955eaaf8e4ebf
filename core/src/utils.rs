use std::num::{ParseFloatError, ParseIntError};

/// Parses a decimal integer literal lexeme into a Rust int.
pub fn parse_int_lexeme(lexeme: &str) -> Result<i64, ParseIntError> {
  lexeme.parse::<i64>()
}

/// Parses a float literal lexeme (with a decimal point, no exponent) into
/// a Rust float.
pub fn parse_float_lexeme(lexeme: &str) -> Result<f64, ParseFloatError> {
  lexeme.parse::<f64>()
}

/// Parses a `0x`/`0o`/`0b`-prefixed literal lexeme into a Rust int, given
/// the lexeme's full text (including its two-character prefix) and the
/// radix that prefix selects.
pub fn parse_int_from_lexeme_base(lexeme: &str, radix: u32) -> Result<i64, ParseIntError> {
  i64::from_str_radix(&lexeme[2..], radix)
}

/// Parses a scientific-notation literal (`<base>e<exponent>` or
/// `<base>E<exponent>`, optionally negative exponent) into a Rust float.
/// Delegates to the standard float parser rather than reconstructing the
/// value via `powf`, which is not correctly rounded.
pub fn parse_scientific_literal_lexeme(lexeme: &str) -> Result<f64, ParseFloatError> {
  lexeme.parse::<f64>()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_hex() {
    assert_eq!(parse_int_from_lexeme_base("0xFF", 16).unwrap(), 255);
  }

  #[test]
  fn parses_scientific() {
    assert_eq!(parse_scientific_literal_lexeme("1.5e2").unwrap(), 150.0);
    assert_eq!(parse_scientific_literal_lexeme("2e-1").unwrap(), 0.2);
  }
}
