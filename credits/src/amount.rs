use crate::CreditError;

/// Convert a credit quantity into a token amount in minor units.
///
/// `credits * ratio` is the token price, scaled by the rail's decimal
/// precision and truncated toward zero. The same function quotes the
/// amount to the user and re-derives it at initiate time, so it must stay
/// deterministic for identical inputs.
pub fn amount_to_pay(credits: &str, ratio: f64, decimals: u8) -> Result<String, CreditError> {
    let credits: u64 = credits
        .trim()
        .parse()
        .map_err(|_| CreditError::InvalidAmount(credits.to_owned()))?;
    if credits == 0 {
        return Err(CreditError::InvalidAmount("0".to_owned()));
    }

    let units = credits as f64 * ratio * 10f64.powi(decimals as i32);
    if !units.is_finite() || units < 0.0 {
        return Err(CreditError::InvalidAmount(credits.to_string()));
    }

    // truncation, not rounding
    Ok((units as u128).to_string())
}
