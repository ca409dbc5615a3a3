use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::{Exchange, Market, ValidationError};

const DOMESTIC_CODE_LEN: usize = 6;
const MAX_INTERNATIONAL_LEN: usize = 10;

/// Validated market symbol bound to the market it was parsed for.
///
/// Domestic symbols also carry their exchange so that per-source
/// canonicalization never has to guess.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Symbol {
    code: String,
    market: Market,
    #[serde(skip_serializing_if = "Option::is_none")]
    exchange: Option<Exchange>,
}

impl Symbol {
    /// Parse and normalize a user-facing symbol for the given market.
    pub fn parse(input: &str, market: Market) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        match market {
            Market::Domestic => parse_domestic(trimmed),
            Market::International => parse_international(trimmed),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub const fn market(&self) -> Market {
        self.market
    }

    /// Listing exchange; `None` for international symbols.
    pub const fn exchange(&self) -> Option<Exchange> {
        self.exchange
    }
}

fn parse_domestic(input: &str) -> Result<Symbol, ValidationError> {
    let lower = input.to_ascii_lowercase();
    let (code, explicit) = if let Some((code, suffix)) = lower.split_once('.') {
        let exchange = match suffix {
            "sh" | "ss" => Exchange::Shanghai,
            "sz" => Exchange::Shenzhen,
            "bj" => Exchange::Beijing,
            _ => {
                return Err(ValidationError::InvalidDomesticCode {
                    value: input.to_owned(),
                })
            }
        };
        (code.to_owned(), Some(exchange))
    } else if let Some(code) = lower.strip_prefix("sh") {
        (code.to_owned(), Some(Exchange::Shanghai))
    } else if let Some(code) = lower.strip_prefix("sz") {
        (code.to_owned(), Some(Exchange::Shenzhen))
    } else if let Some(code) = lower.strip_prefix("bj") {
        (code.to_owned(), Some(Exchange::Beijing))
    } else {
        (lower, None)
    };

    let is_code = code.len() == DOMESTIC_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit());
    if !is_code {
        return Err(ValidationError::InvalidDomesticCode {
            value: input.to_owned(),
        });
    }

    let exchange = explicit.unwrap_or_else(|| Exchange::infer(&code));
    Ok(Symbol {
        code,
        market: Market::Domestic,
        exchange: Some(exchange),
    })
}

fn parse_international(input: &str) -> Result<Symbol, ValidationError> {
    let normalized = input.to_ascii_uppercase();
    let len = normalized.chars().count();
    if len > MAX_INTERNATIONAL_LEN {
        return Err(ValidationError::SymbolTooLong {
            len,
            max: MAX_INTERNATIONAL_LEN,
        });
    }

    // Index tickers such as `^GSPC` carry a caret before the first letter.
    let body = normalized.strip_prefix('^').unwrap_or(&normalized);
    let offset = normalized.len() - body.len();
    match body.chars().next() {
        Some(first) if !first.is_ascii_alphabetic() => {
            return Err(ValidationError::SymbolInvalidStart { ch: first });
        }
        None => return Err(ValidationError::EmptySymbol),
        _ => {}
    }

    for (index, ch) in body.chars().enumerate() {
        let index = index + offset;
        let valid = ch.is_ascii_alphanumeric() || ch == '.' || ch == '-';
        if !valid {
            return Err(ValidationError::SymbolInvalidChar { ch, index });
        }
    }

    Ok(Symbol {
        code: normalized,
        market: Market::International,
        exchange: None,
    })
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_domestic_code() {
        let symbol = Symbol::parse(" 600519 ", Market::Domestic).expect("valid code");
        assert_eq!(symbol.code(), "600519");
        assert_eq!(symbol.exchange(), Some(Exchange::Shanghai));
    }

    #[test]
    fn explicit_exchange_overrides_inference() {
        let prefixed = Symbol::parse("SZ000001", Market::Domestic).expect("prefixed");
        let suffixed = Symbol::parse("600519.SS", Market::Domestic).expect("suffixed");
        assert_eq!(prefixed.code(), "000001");
        assert_eq!(prefixed.exchange(), Some(Exchange::Shenzhen));
        assert_eq!(suffixed.exchange(), Some(Exchange::Shanghai));
    }

    #[test]
    fn rejects_non_numeric_domestic_code() {
        let err = Symbol::parse("AAPL", Market::Domestic).expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidDomesticCode { .. }));

        let err = Symbol::parse("60051", Market::Domestic).expect_err("five digits");
        assert!(matches!(err, ValidationError::InvalidDomesticCode { .. }));
    }

    #[test]
    fn parses_and_normalizes_international_ticker() {
        let parsed = Symbol::parse(" brk.b ", Market::International).expect("valid ticker");
        assert_eq!(parsed.code(), "BRK.B");
        assert_eq!(parsed.exchange(), None);
    }

    #[test]
    fn accepts_caret_index_ticker() {
        let index = Symbol::parse("^gspc", Market::International).expect("index ticker");
        assert_eq!(index.code(), "^GSPC");

        let err = Symbol::parse("A^B", Market::International).expect_err("caret inside");
        assert_eq!(err, ValidationError::SymbolInvalidChar { ch: '^', index: 1 });
    }

    #[test]
    fn rejects_invalid_international_start() {
        let err = Symbol::parse("1AAPL", Market::International).expect_err("must fail");
        assert!(matches!(err, ValidationError::SymbolInvalidStart { .. }));
    }

    #[test]
    fn rejects_empty_symbol() {
        assert_eq!(
            Symbol::parse("   ", Market::International),
            Err(ValidationError::EmptySymbol)
        );
    }
}
