//! A1 notation for sheet ranges.

/// 1-based column index to letters: 1 → `A`, 26 → `Z`, 27 → `AA`.
pub fn column_letters(column: u32) -> String {
    let mut remaining = column;
    let mut letters = Vec::new();
    while remaining > 0 {
        let offset = ((remaining - 1) % 26) as u8;
        letters.push(char::from(b'A' + offset));
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Sheet names with anything beyond letters, digits and `_` need quoting;
/// embedded quotes are doubled.
pub fn quote_sheet_name(sheet: &str) -> String {
    if !sheet.is_empty() && sheet.chars().all(|ch| ch.is_alphanumeric() || ch == '_') {
        return sheet.to_string();
    }
    format!("'{}'", sheet.replace('\'', "''"))
}

/// `Sheet!G12` style single-cell range.
pub fn cell_range(sheet: &str, row: u32, column: u32) -> String {
    format!("{}!{}{row}", quote_sheet_name(sheet), column_letters(column))
}

/// Percent-encodes a range for use as one URL path segment. `!` and `:` are
/// valid path characters and stay literal.
pub fn encode_range_for_path(range: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut encoded = String::with_capacity(range.len());
    for byte in range.as_bytes() {
        let literal = matches!(
            byte,
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'!' | b':'
        );
        if literal {
            encoded.push(char::from(*byte));
        } else {
            encoded.push('%');
            encoded.push(char::from(HEX[usize::from(byte >> 4)]));
            encoded.push(char::from(HEX[usize::from(byte & 0x0F)]));
        }
    }
    encoded
}
