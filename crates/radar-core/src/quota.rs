use crate::error::ConfigError;

/// Split `total` picks across buckets in proportion to `ratio`.
///
/// Every component except the last gets `round(total * r / sum)`, rounding
/// halves away from zero. The last component takes whatever is left so the
/// quotas always add up to `total`. A rounded quota is capped at what is still
/// unallocated, which keeps the remainder from going negative when several
/// halves round up (e.g. one pick over a `1:1:0` ratio).
pub fn allocate(total: usize, ratio: &[u32]) -> Result<Vec<usize>, ConfigError> {
    let Some((_, leading)) = ratio.split_last() else {
        return Err(ConfigError::NoBuckets);
    };

    let sum: u128 = ratio.iter().map(|&r| u128::from(r)).sum();
    if sum == 0 {
        return Err(ConfigError::ZeroRatio);
    }

    let mut quotas = Vec::with_capacity(ratio.len());
    let mut remaining = total;

    for &r in leading {
        let rounded = round_share(total, r, sum).min(remaining);
        remaining -= rounded;
        quotas.push(rounded);
    }
    quotas.push(remaining);

    Ok(quotas)
}

/// `round(total * r / sum)` with halves rounded up, in integer arithmetic.
fn round_share(total: usize, r: u32, sum: u128) -> usize {
    let numerator = 2 * total as u128 * u128::from(r) + sum;
    let share = numerator / (2 * sum);
    // share <= total + 1, and the caller caps it at the remainder
    usize::try_from(share).unwrap_or(usize::MAX)
}
