// size.rs - Human readable byte counts

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Formats a byte count with base-1024 units and at most two decimals.
///
/// Trailing zeros are dropped (`1536` is `"1.5 KB"`, `1024` is `"1 KB"`).
/// Anything past the gigabyte range stays in GB.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return String::from("0 Bytes");
    }

    let mut unit = 0;
    let mut scale = 1u64;
    while unit + 1 < UNITS.len() && bytes >= scale * 1024 {
        scale *= 1024;
        unit += 1;
    }

    let value = ((bytes as f64 / scale as f64) * 100.0).round() / 100.0;
    format!("{} {}", value, UNITS[unit])
}
