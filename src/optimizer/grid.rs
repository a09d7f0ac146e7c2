//! Grid construction: evenly spaced candidate ranges, resampling and
//! expansion of a parameter table into the Cartesian product searched.

use super::params::{FitConfiguration, GridConfiguration, ParamKind, ParamTable, ParamValue};
use crate::error::{RaError, Result};

fn cast(value: f64, kind: ParamKind) -> ParamValue {
    match kind {
        ParamKind::Int => ParamValue::Int(value.round() as i64),
        _ => ParamValue::Float(value),
    }
}

/// `count` evenly spaced values over `[min, max]`, both ends included.
///
/// Without `max` the range is unit-stepped from `min`. Integer kinds are
/// rounded and duplicates are kept, so the result always has `count` values.
pub fn conf_params(min: f64, max: Option<f64>, count: usize, kind: ParamKind) -> Result<Vec<ParamValue>> {
    if !matches!(kind, ParamKind::Int | ParamKind::Float) {
        return Err(RaError::InvalidParameter {
            name: "kind".to_string(),
            value: kind.to_string(),
            reason: "ranges can only be built for int or float".to_string(),
        });
    }
    if count == 0 {
        return Err(RaError::InvalidParameter {
            name: "count".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        });
    }

    let step = match max {
        Some(_) if count == 1 => 0.0,
        Some(max) => (max - min) / (count - 1) as f64,
        None => 1.0,
    };
    Ok((0..count).map(|i| cast(min + step * i as f64, kind)).collect())
}

/// Resample the numeric part of a grid to `count` evenly spaced values
/// between its minimum and maximum.
///
/// Grids without numeric values come back unchanged; non-numeric entries of
/// a mixed grid (such as `None`) are kept after the resampled range.
pub fn choose_params(values: &[ParamValue], count: usize, kind: ParamKind) -> Vec<ParamValue> {
    let numeric: Vec<f64> = values.iter().filter_map(ParamValue::as_float).collect();
    if count == 0 || numeric.is_empty() {
        return values.to_vec();
    }

    let min = numeric.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numeric.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let kind = if kind == ParamKind::Int { ParamKind::Int } else { ParamKind::Float };

    let mut resampled = match conf_params(min, Some(max), count, kind) {
        Ok(range) => range,
        Err(_) => return values.to_vec(),
    };
    for extra in values.iter().filter(|v| !v.is_numeric()) {
        if !resampled.contains(extra) {
            resampled.push(extra.clone());
        }
    }
    resampled
}

/// Build the grid searched for `table`.
///
/// Per parameter, in table order: an override is used verbatim and a locked
/// parameter collapses to its default. Any other parameter takes its default
/// grid resampled to `count` values, or only its default when `count == 0`.
pub fn resolve_grid(table: &ParamTable, overrides: Option<&GridConfiguration>, count: usize) -> Result<GridConfiguration> {
    let overrides = match overrides {
        Some(o) => table.resolve_grid_overrides(o)?,
        None => GridConfiguration::new(),
    };

    let grid = table
        .specs()
        .iter()
        .map(|spec| {
            let values = if let Some(values) = overrides.get(&spec.name) {
                values.clone()
            } else if spec.locked || count == 0 {
                vec![spec.default.clone()]
            } else {
                let kind = if spec.kinds.contains(&ParamKind::Int) { ParamKind::Int } else { ParamKind::Float };
                choose_params(&spec.grid, count, kind)
            };
            (spec.name.clone(), values)
        })
        .collect();
    Ok(grid)
}

/// Number of combinations in `grid`
pub fn n_combinations(grid: &GridConfiguration) -> usize {
    grid.iter().map(|(_, values)| values.len()).product()
}

/// Combination number `index` of `grid`, the last parameter varying fastest.
///
/// Returns `None` once `index` reaches [`n_combinations`].
pub fn combination_at(grid: &GridConfiguration, index: usize) -> Option<FitConfiguration> {
    let total = n_combinations(grid);
    if index >= total {
        return None;
    }

    let mut stride = total;
    let combo = grid
        .iter()
        .map(|(name, values)| {
            stride /= values.len();
            (name.to_string(), values[(index / stride) % values.len()].clone())
        })
        .collect();
    Some(combo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::params::ParamSpec;

    fn ints(values: &[i64]) -> Vec<ParamValue> {
        values.iter().map(|&v| ParamValue::Int(v)).collect()
    }

    #[test]
    fn test_conf_params_inclusive() {
        let values = conf_params(2.0, Some(10.0), 5, ParamKind::Int).unwrap();
        assert_eq!(values, ints(&[2, 4, 6, 8, 10]));

        let floats = conf_params(0.1, Some(1.0), 4, ParamKind::Float).unwrap();
        assert_eq!(floats.len(), 4);
        assert_eq!(floats[0], ParamValue::Float(0.1));
        assert!((floats[3].as_float().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_conf_params_edges() {
        assert_eq!(conf_params(3.0, Some(9.0), 1, ParamKind::Int).unwrap(), ints(&[3]));
        assert_eq!(conf_params(1.0, None, 4, ParamKind::Int).unwrap(), ints(&[1, 2, 3, 4]));
        assert!(conf_params(1.0, Some(2.0), 0, ParamKind::Int).is_err());
        assert!(conf_params(1.0, Some(2.0), 3, ParamKind::Str).is_err());
        // rounding duplicates are kept
        assert_eq!(conf_params(1.0, Some(2.0), 3, ParamKind::Int).unwrap(), ints(&[1, 2, 2]));
    }

    #[test]
    fn test_choose_params() {
        let grid = ints(&[2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(choose_params(&grid, 3, ParamKind::Int), ints(&[2, 6, 10]));
        assert_eq!(choose_params(&grid, 0, ParamKind::Int), grid);

        let names = vec![ParamValue::from("gini"), ParamValue::from("entropy")];
        assert_eq!(choose_params(&names, 5, ParamKind::Str), names);

        let mut with_none = ints(&[1, 2, 3, 4, 5]);
        with_none.push(ParamValue::None);
        let mut expected = ints(&[1, 5]);
        expected.push(ParamValue::None);
        assert_eq!(choose_params(&with_none, 2, ParamKind::Int), expected);
    }

    fn table() -> ParamTable {
        ParamTable::new(vec![
            ParamSpec::new("n_estimators", &[ParamKind::Int], 100).with_grid(ints(&[2, 4, 6, 8, 10])),
            ParamSpec::new("bootstrap", &[ParamKind::Bool], true)
                .with_grid(vec![true.into(), false.into()])
                .locked(),
            ParamSpec::new("tol", &[ParamKind::Float], 1e-4),
        ])
    }

    #[test]
    fn test_resolve_grid_defaults() {
        let grid = resolve_grid(&table(), None, 0).unwrap();
        assert_eq!(grid.names(), vec!["n_estimators", "bootstrap", "tol"]);
        assert_eq!(grid.get("n_estimators"), Some(&ints(&[100])));
        assert_eq!(grid.get("bootstrap"), Some(&vec![ParamValue::Bool(true)]));
        assert_eq!(grid.get("tol"), Some(&vec![ParamValue::Float(1e-4)]));
        assert_eq!(n_combinations(&grid), 1);

        let resampled = resolve_grid(&table(), None, 2).unwrap();
        assert_eq!(resampled.get("n_estimators"), Some(&ints(&[2, 10])));
    }

    #[test]
    fn test_resolve_grid_overrides() {
        let overrides = GridConfiguration::new()
            .with_values("bootstrap", vec![true, false])
            .with_values("tol", vec![1]);
        let grid = resolve_grid(&table(), Some(&overrides), 2).unwrap();
        assert_eq!(grid.get("bootstrap").unwrap().len(), 2);
        assert_eq!(grid.get("tol"), Some(&vec![ParamValue::Float(1.0)]));
        assert_eq!(n_combinations(&grid), 4);

        // without resampling an override still replaces the default
        let kept = GridConfiguration::new().with_values("n_estimators", vec![3, 7]);
        let grid = resolve_grid(&table(), Some(&kept), 0).unwrap();
        assert_eq!(grid.get("n_estimators"), Some(&ints(&[3, 7])));
        assert_eq!(n_combinations(&grid), 2);

        // resampling never touches an override
        let verbatim = GridConfiguration::new().with_values("n_estimators", vec![2, 4, 6]);
        let grid = resolve_grid(&table(), Some(&verbatim), 2).unwrap();
        assert_eq!(grid.get("n_estimators"), Some(&ints(&[2, 4, 6])));

        let unknown = GridConfiguration::new().with_values("depth", vec![1]);
        assert!(matches!(resolve_grid(&table(), Some(&unknown), 0), Err(RaError::UnknownParameter(_))));
    }

    #[test]
    fn test_combination_at() {
        let grid = GridConfiguration::new()
            .with_values("a", vec![1, 2])
            .with_values("b", vec!["x", "y", "z"]);
        assert_eq!(n_combinations(&grid), 6);

        let first = combination_at(&grid, 0).unwrap();
        assert_eq!(first.get("a"), Some(&ParamValue::Int(1)));
        assert_eq!(first.get("b"), Some(&ParamValue::from("x")));

        let second = combination_at(&grid, 1).unwrap();
        assert_eq!(second.get("a"), Some(&ParamValue::Int(1)));
        assert_eq!(second.get("b"), Some(&ParamValue::from("y")));

        let last = combination_at(&grid, 5).unwrap();
        assert_eq!(last.names(), vec!["a", "b"]);
        assert_eq!(last.get("a"), Some(&ParamValue::Int(2)));
        assert_eq!(last.get("b"), Some(&ParamValue::from("z")));

        assert!(combination_at(&grid, 6).is_none());
    }

    #[test]
    fn test_combination_at_covers_grid_once() {
        let grid = GridConfiguration::new()
            .with_values("a", vec![1, 2, 3])
            .with_values("b", vec![true, false])
            .with_values("c", vec![0.5, 1.5]);
        let combos: Vec<String> = (0..n_combinations(&grid))
            .map(|i| combination_at(&grid, i).unwrap().to_string())
            .collect();
        let mut unique = combos.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 12);
    }
}
