//! ICP amounts: prices are quoted in ICP, the ledger moves e8s.

pub const E8S_PER_ICP: u64 = 100_000_000;

/// Convert ICP to e8s, rounding up so a payment never falls short.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn icp_to_e8s(icp: f64) -> u64 {
    if icp <= 0.0 || !icp.is_finite() {
        return 0;
    }
    (icp * E8S_PER_ICP as f64).ceil() as u64
}

#[allow(clippy::cast_precision_loss)]
pub fn e8s_to_icp(e8s: u64) -> f64 {
    (e8s / E8S_PER_ICP) as f64 + (e8s % E8S_PER_ICP) as f64 / E8S_PER_ICP as f64
}

/// Human-readable amount, e.g. `1.50 ICP`.
pub fn display_icp(icp: f64, max_fraction_digits: usize) -> String {
    let digits = max_fraction_digits.max(2);
    let formatted = format!("{icp:.digits$}");
    let trimmed = match formatted.split_once('.') {
        Some((int, frac)) => {
            let frac = frac.trim_end_matches('0');
            format!("{int}.{frac:0<2}")
        }
        None => formatted,
    };
    format!("{trimmed} ICP")
}
