//! Response Validation

use stream_stats::Stats;

/// Replace a non-finite value with its fallback, counting replacements
#[inline]
fn repair(value: &mut f64, fallback: f64, replaced: &mut usize) {
    if !value.is_finite() {
        *value = if fallback.is_finite() { fallback } else { 0.0 };
        *replaced += 1;
    }
}

/// Make `value` and `stats` finite field by field
///
/// Each non-finite field takes the matching field of `prior` (the last
/// known-good result) or 0 when nothing is cached. Returns how many fields
/// were replaced.
pub(crate) fn sanitize(value: &mut f64, stats: &mut Stats, prior: Option<(f64, &Stats)>) -> usize {
    let (prior_value, prior_stats) = match prior {
        Some((v, s)) => (v, *s),
        None => (0.0, Stats::ZERO),
    };

    let mut replaced = 0;
    repair(value, prior_value, &mut replaced);
    repair(&mut stats.current, prior_stats.current, &mut replaced);
    repair(&mut stats.mean, prior_stats.mean, &mut replaced);
    repair(
        &mut stats.standard_deviation,
        prior_stats.standard_deviation,
        &mut replaced,
    );
    repair(&mut stats.variance, prior_stats.variance, &mut replaced);
    repair(&mut stats.z_score, prior_stats.z_score, &mut replaced);
    repair(&mut stats.min, prior_stats.min, &mut replaced);
    repair(&mut stats.max, prior_stats.max, &mut replaced);
    repair(&mut stats.median, prior_stats.median, &mut replaced);
    repair(&mut stats.normalized, prior_stats.normalized, &mut replaced);
    repair(&mut stats.mad, prior_stats.mad, &mut replaced);
    replaced
}
