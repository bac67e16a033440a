use crate::error::{CronError, Result};

/// A parsed cron field: either "matches anything" or an explicit set of
/// in-range values. Kept as a `Vec<u32>` rather than a bitset — fields are
/// tiny (at most 60 entries) so there's no point being clever.
#[derive(Debug, Clone)]
pub(crate) enum FieldSet {
    Any,
    Values(Vec<u32>),
}

impl FieldSet {
    pub(crate) fn matches(&self, value: u32) -> bool {
        match self {
            FieldSet::Any => true,
            FieldSet::Values(values) => values.contains(&value),
        }
    }
}

/// Parses one of the five whitespace-separated fields of a cron expression.
///
/// Supported forms: `*`, `a`, `a-b`, `a,b,c` (each item itself a value or a
/// range), `*/n`, and `a-b/n`. `min`/`max` bound the field's legal range
/// (inclusive) and are used both to validate values and to expand `*`.
pub(crate) fn parse_field(expr: &str, field: &str, min: u32, max: u32) -> Result<FieldSet> {
    let bad = |reason: String| CronError::BadExpression {
        expr: field.to_string(),
        reason,
    };

    let mut values = Vec::new();
    for item in expr.split(',') {
        let item = item.trim();
        if item.is_empty() {
            return Err(bad(format!("empty item in {item:?}")));
        }

        let (range_part, step) = match item.split_once('/') {
            Some((range_part, step_str)) => {
                let step: u32 = step_str
                    .parse()
                    .map_err(|_| bad(format!("bad step {step_str:?}")))?;
                if step == 0 {
                    return Err(bad("step cannot be zero".to_string()));
                }
                (range_part, step)
            }
            None => (item, 1),
        };

        let (lo, hi) = if range_part == "*" {
            (min, max)
        } else if let Some((lo_str, hi_str)) = range_part.split_once('-') {
            let lo: u32 = lo_str
                .parse()
                .map_err(|_| bad(format!("bad range start {lo_str:?}")))?;
            let hi: u32 = hi_str
                .parse()
                .map_err(|_| bad(format!("bad range end {hi_str:?}")))?;
            if lo > hi {
                return Err(bad(format!("range {lo}-{hi} is backwards")));
            }
            (lo, hi)
        } else {
            let v: u32 = range_part
                .parse()
                .map_err(|_| bad(format!("bad value {range_part:?}")))?;
            (v, v)
        };

        if lo < min || hi > max {
            return Err(bad(format!(
                "value out of range {min}-{max}: {lo}-{hi}"
            )));
        }

        let mut v = lo;
        while v <= hi {
            values.push(v);
            v += step;
        }
    }

    if expr.trim() == "*" {
        return Ok(FieldSet::Any);
    }

    values.sort_unstable();
    values.dedup();
    Ok(FieldSet::Values(values))
}
