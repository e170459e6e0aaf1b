//! Bars -> per-feature price frames.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use dpr_schemas::{FrameError, PriceFeature, PriceFrame};

use crate::provider::ProviderBar;

/// Pivot bars into one frame per price feature.
///
/// The index is the sorted union of bar days across all symbols; columns
/// follow `symbols` order. Days a symbol did not trade are NaN. A repeated
/// (symbol, day) keeps the last bar seen. Bars for symbols not listed are
/// ignored.
pub fn frames_from_bars(
    bars: &[ProviderBar],
    symbols: &[String],
) -> Result<BTreeMap<PriceFeature, PriceFrame>, FrameError> {
    let wanted: HashMap<&str, usize> = symbols
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i))
        .collect();

    let index: Vec<i64> = bars
        .iter()
        .filter(|b| wanted.contains_key(b.symbol.as_str()))
        .map(|b| b.day_ts)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let row_of: HashMap<i64, usize> = index.iter().enumerate().map(|(i, t)| (*t, i)).collect();

    let mut out = BTreeMap::new();
    for feature in PriceFeature::ALL {
        let mut columns: Vec<Vec<f64>> = vec![vec![f64::NAN; index.len()]; symbols.len()];
        for b in bars {
            let (Some(col), Some(row)) = (wanted.get(b.symbol.as_str()), row_of.get(&b.day_ts))
            else {
                continue;
            };
            let v = match feature {
                PriceFeature::Close => b.close,
                PriceFeature::Open => b.open,
            };
            columns[*col][*row] = v.filter(|x| x.is_finite()).unwrap_or(f64::NAN);
        }
        let frame = PriceFrame::from_columns(
            index.clone(),
            symbols.iter().cloned().zip(columns).collect(),
        )?;
        out.insert(feature, frame);
    }
    Ok(out)
}
