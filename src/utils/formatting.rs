//! Formatting helpers for CLI output.

/// `125` → `02h 05m`, or `02:05` when `short`.
pub fn mins2readable(mins: i64, want_sign: bool, short: bool) -> String {
    let abs_m = mins.abs();
    let hours = abs_m / 60;
    let minutes = abs_m % 60;

    let sign = match (want_sign, mins.signum()) {
        (true, 1) => "+",
        (true, -1) => "-",
        _ => "",
    };

    if short {
        format!("{sign}{hours:02}:{minutes:02}")
    } else {
        format!("{sign}{hours:02}h {minutes:02}m")
    }
}

pub fn fmt_local(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string()
}
