//! Data loading and DataFrame/ndarray conversion

use crate::error::{RaError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Load a CSV file with a header row
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| RaError::DataError(format!("{}: {}", path.display(), e)))?;

    let reader = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file);

    Ok(reader.finish()?)
}

/// Column names of a frame, in order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

fn column_values(df: &DataFrame, col_name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(col_name)
        .map_err(|_| RaError::DataError(format!("Column {} not found", col_name)))?;
    let cast = column.cast(&DataType::Float64)?;
    cast.f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                RaError::DataError(format!("Column {} has a missing value at row {}", col_name, row))
            })
        })
        .collect()
}

/// Extract named columns into a row-major `Array2<f64>`
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| column_values(df, name))
        .collect::<Result<_>>()?;

    Ok(Array2::from_shape_fn((n_rows, col_names.len()), |(r, c)| col_data[c][r]))
}

/// Extract the single column of a target frame
pub fn target_to_array1(target: &DataFrame) -> Result<Array1<f64>> {
    if target.width() != 1 {
        return Err(RaError::ShapeError {
            expected: "a single target column".to_string(),
            actual: format!("{} columns", target.width()),
        });
    }
    let names = column_names(target);
    Ok(Array1::from(column_values(target, &names[0])?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_columns_to_array2_is_row_major() {
        let df = df!("a" => &[1.0, 2.0, 3.0], "b" => &[4i64, 5, 6]).unwrap();
        let x = columns_to_array2(&df, &column_names(&df)).unwrap();
        assert_eq!(x.dim(), (3, 2));
        assert_eq!(x[[1, 0]], 2.0);
        assert_eq!(x[[2, 1]], 6.0);
    }

    #[test]
    fn test_missing_column() {
        let df = df!("a" => &[1.0]).unwrap();
        let err = columns_to_array2(&df, &["b".to_string()]).unwrap_err();
        assert!(matches!(err, RaError::DataError(_)));
    }

    #[test]
    fn test_null_is_rejected() {
        let df = df!("a" => &[Some(1.0), None]).unwrap();
        assert!(columns_to_array2(&df, &["a".to_string()]).is_err());
    }

    #[test]
    fn test_target_must_be_single_column() {
        let df = df!("a" => &[1.0], "b" => &[2.0]).unwrap();
        assert!(matches!(target_to_array1(&df), Err(RaError::ShapeError { .. })));
        let y = target_to_array1(&df!("y" => &[1.0, 0.0]).unwrap()).unwrap();
        assert_eq!(y.len(), 2);
    }

    #[test]
    fn test_load_csv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "x,y").unwrap();
        writeln!(file, "1.0,2.0").unwrap();
        writeln!(file, "3.0,4.0").unwrap();
        file.flush().unwrap();

        let df = load_csv(file.path()).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(column_names(&df), vec!["x", "y"]);
    }
}
