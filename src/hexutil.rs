//! Hex quantity helpers.
//!
//! Node replies carry numbers as `0x`-prefixed hex strings. Balances and
//! ERC-20 amounts are uint256 words and decode into a [`U256`].

use primitive_types::U256;

use crate::error::{Result, RpcError};

fn digits(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parse a hex quantity or a 32-byte word (with or without `0x`) into a
/// [`U256`].
pub fn parse_u256(s: &str) -> Result<U256> {
    let invalid = || RpcError::InvalidHex(format!("could not transform hex string: {} to uint256", s));
    let digits = digits(s);
    if digits.is_empty() {
        return Err(invalid());
    }
    U256::from_str_radix(digits, 16).map_err(|_| invalid())
}

/// Parse a hex quantity (with or without `0x`) into a `u64`.
pub fn parse_u64(s: &str) -> Result<u64> {
    u64::from_str_radix(digits(s), 16).map_err(|_| RpcError::InvalidHex(s.to_string()))
}

/// Parse a hex quantity (with or without `0x`) into an `i64`.
pub fn parse_i64(s: &str) -> Result<i64> {
    i64::from_str_radix(digits(s), 16).map_err(|_| RpcError::InvalidHex(s.to_string()))
}

/// Decode `0x`-prefixed hex data into bytes.
pub fn decode_bytes(s: &str) -> Result<Vec<u8>> {
    ::hex::decode(digits(s)).map_err(|e| RpcError::InvalidHex(format!("{}: {}", s, e)))
}

/// Encode bytes as `0x`-less lowercase hex.
pub fn encode_bytes(bytes: &[u8]) -> String {
    ::hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantities() {
        assert_eq!(parse_u64("0x1a").unwrap(), 26);
        assert_eq!(parse_u64("1a").unwrap(), 26);
        assert_eq!(parse_i64("0x0").unwrap(), 0);
        assert_eq!(
            parse_u256("0x1bc16d674ec80000").unwrap(),
            U256::from(2_000_000_000_000_000_000u128)
        );
    }

    #[test]
    fn test_parse_full_word() {
        let max = format!("0x{}", "f".repeat(64));
        assert_eq!(parse_u256(&max).unwrap(), U256::MAX);
        assert_eq!(format!("0x{:x}", parse_u256(&max).unwrap()), max);

        // 1e27: a billion tokens with 18 decimals, past u128
        let word = "0x0000000000000000000000000000000000000000033b2e3c9fd0803ce8000000";
        let amount = parse_u256(word).unwrap();
        assert_eq!(amount.to_string(), "1000000000000000000000000000");
        assert_eq!(format!("0x{:064x}", amount), word);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_u64("0x"), Err(RpcError::InvalidHex(_))));
        assert!(matches!(parse_u64("0xzz"), Err(RpcError::InvalidHex(_))));
        assert!(parse_u256("0x").is_err());
        assert!(parse_u256("0xg1").is_err());
        // 65 hex digits overflow a uint256
        assert!(parse_u256(&format!("0x1{}", "0".repeat(64))).is_err());
    }

    #[test]
    fn test_bytes() {
        assert_eq!(decode_bytes("0x6060").unwrap(), vec![0x60, 0x60]);
        assert_eq!(decode_bytes("0x").unwrap(), Vec::<u8>::new());
        assert_eq!(encode_bytes(&[0xde, 0xad]), "dead");
        assert!(decode_bytes("0x123").is_err());
    }
}
