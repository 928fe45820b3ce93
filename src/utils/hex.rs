use alloy::primitives::U256;

/// Convert a string (hex, Z3 bit-vector literal or decimal) to U256
pub fn to_u256(s: &str) -> Option<U256> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return U256::from_str_radix(hex, 16).ok();
    }

    // Z3 renders concrete bit-vectors as #x.. (width % 4 == 0) or #b..
    if let Some(hex) = s.strip_prefix("#x") {
        return U256::from_str_radix(hex, 16).ok();
    }

    if let Some(bin) = s.strip_prefix("#b") {
        return U256::from_str_radix(bin, 2).ok();
    }

    if s.chars().all(|c| c.is_ascii_digit()) {
        return U256::from_str_radix(s, 10).ok();
    }

    None
}

/// Lowercase `0x`-prefixed rendering used for bytecode and calldata in findings/logs.
pub fn encode_prefixed(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}
