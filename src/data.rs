//! Data
//!
//! Containers for the inputs of the diagnostics: a column major matrix of
//! predictions (one column per model) and feature columns, classified once
//! into numeric, categorical and string columns.
use crate::errors::DiagnosticsError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Contiguous Column Major Matrix data container.
///
/// This structure holds a dense matrix of values in a single contiguous memory block.
/// It follows column-major order (Fortran-style), so that a single column, i.e. the
/// predictions of one model, is a contiguous slice.
///
/// # Type Parameters
/// * `T` - The type of the data (e.g., `f64`).
pub struct Matrix<'a, T> {
    /// The raw data stored in a single slice.
    pub data: &'a [T],
    /// Number of rows in the matrix.
    pub rows: usize,
    /// Number of columns in the matrix.
    pub cols: usize,
    stride1: usize,
    stride2: usize,
}

impl<'a, T> Matrix<'a, T> {
    /// Create a new Matrix.
    pub fn new(data: &'a [T], rows: usize, cols: usize) -> Self {
        Matrix {
            data,
            rows,
            cols,
            stride1: rows,
            stride2: 1,
        }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[self.item_index(i, j)]
    }

    fn item_index(&self, i: usize, j: usize) -> usize {
        let mut idx = self.stride2 * i;
        idx += j * self.stride1;
        idx
    }

    /// Get a slice of a column in the matrix.
    ///
    /// * `col` - The index of the column to select.
    /// * `start_row` - The index of the start of the slice.
    /// * `end_row` - The index of the end of the slice of the column to select.
    pub fn get_col_slice(&self, col: usize, start_row: usize, end_row: usize) -> &'a [T] {
        let i = self.item_index(start_row, col);
        let j = self.item_index(end_row, col);
        &self.data[i..j]
    }

    /// Get an entire column in the matrix.
    ///
    /// * `col` - The index of the column to get.
    pub fn get_col(&self, col: usize) -> &'a [T] {
        self.get_col_slice(col, 0, self.rows)
    }
}

impl<'a, T> Matrix<'a, T>
where
    T: Copy,
{
    /// Get a row of the data as a vector.
    pub fn get_row(&self, row: usize) -> Vec<T> {
        self.data.iter().skip(row).step_by(self.rows.max(1)).copied().collect()
    }
}

impl<'a, T> fmt::Display for Matrix<'a, T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut val = String::new();
        for i in 0..self.rows {
            for j in 0..self.cols {
                val.push_str(self.get(i, j).to_string().as_str());
                if j == (self.cols - 1) {
                    val.push('\n');
                } else {
                    val.push(' ');
                }
            }
        }
        write!(f, "{}", val)
    }
}

/// Check that two paired inputs have the same number of rows.
pub fn validate_same_length(a_name: &str, a_len: usize, b_name: &str, b_len: usize) -> Result<(), DiagnosticsError> {
    if a_len != b_len {
        Err(DiagnosticsError::ShapeMismatch(
            a_name.to_string(),
            a_len,
            b_name.to_string(),
            b_len,
        ))
    } else {
        Ok(())
    }
}

/// Predictions of one or several models for the same observations.
///
/// Every model is a column of a column major matrix and carries a name.
/// A single unnamed model has the empty string as name.
pub struct Predictions<'a> {
    matrix: Matrix<'a, f64>,
    names: Vec<String>,
}

impl<'a> Predictions<'a> {
    /// Predictions of a single, unnamed model.
    pub fn single(y_pred: &'a [f64]) -> Self {
        Predictions {
            matrix: Matrix::new(y_pred, y_pred.len(), 1),
            names: vec![String::new()],
        }
    }

    /// Predictions of a single model with a name.
    pub fn named(name: &str, y_pred: &'a [f64]) -> Self {
        Predictions {
            matrix: Matrix::new(y_pred, y_pred.len(), 1),
            names: vec![name.to_string()],
        }
    }

    /// Predictions of several models, stored column major.
    ///
    /// * `matrix` - One column per model.
    /// * `names` - Names of the models, defaults to `model_0`, `model_1`, ...
    pub fn from_matrix(matrix: Matrix<'a, f64>, names: Option<Vec<String>>) -> Result<Self, DiagnosticsError> {
        if matrix.data.len() != matrix.rows * matrix.cols {
            return Err(DiagnosticsError::ShapeMismatch(
                "matrix data".to_string(),
                matrix.data.len(),
                "rows x cols".to_string(),
                matrix.rows * matrix.cols,
            ));
        }
        let names = match names {
            Some(names) => {
                validate_same_length("names", names.len(), "matrix columns", matrix.cols)?;
                names
            }
            None => (0..matrix.cols).map(|i| format!("model_{}", i)).collect(),
        };
        Ok(Predictions { matrix, names })
    }

    /// Number of models.
    pub fn n_models(&self) -> usize {
        self.matrix.cols
    }

    /// Number of observations.
    pub fn rows(&self) -> usize {
        self.matrix.rows
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Select the predictions of model `i`.
    pub fn get_model(&self, i: usize) -> Result<(&str, &'a [f64]), DiagnosticsError> {
        if i >= self.matrix.cols {
            return Err(DiagnosticsError::InvalidParameter(
                "model index".to_string(),
                format!("a value smaller than {}", self.matrix.cols),
                i.to_string(),
            ));
        }
        Ok((self.names[i].as_str(), self.matrix.get_col(i)))
    }

    /// Iterate over `(name, predictions)` of all models.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &'a [f64])> + '_ {
        (0..self.matrix.cols).map(move |i| (self.names[i].as_str(), self.matrix.get_col(i)))
    }
}

/// Classification of a feature column.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ColumnKind {
    Numeric,
    Categorical,
    String,
}

/// Values of a feature column.
///
/// Missing numeric values are represented by NaN, missing categorical and
/// string values by `None`.
#[derive(Clone, Copy, Debug)]
pub enum FeatureValues<'a> {
    Numeric(&'a [f64]),
    Categorical(&'a [Option<&'a str>]),
    String(&'a [Option<&'a str>]),
}

/// A named feature column.
#[derive(Clone, Debug)]
pub struct Feature<'a> {
    pub name: String,
    pub values: FeatureValues<'a>,
}

impl<'a> Feature<'a> {
    pub fn numeric(name: &str, values: &'a [f64]) -> Self {
        Feature {
            name: name.to_string(),
            values: FeatureValues::Numeric(values),
        }
    }

    pub fn categorical(name: &str, values: &'a [Option<&'a str>]) -> Self {
        Feature {
            name: name.to_string(),
            values: FeatureValues::Categorical(values),
        }
    }

    pub fn string(name: &str, values: &'a [Option<&'a str>]) -> Self {
        Feature {
            name: name.to_string(),
            values: FeatureValues::String(values),
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self.values {
            FeatureValues::Numeric(_) => ColumnKind::Numeric,
            FeatureValues::Categorical(_) => ColumnKind::Categorical,
            FeatureValues::String(_) => ColumnKind::String,
        }
    }

    pub fn len(&self) -> usize {
        match self.values {
            FeatureValues::Numeric(v) => v.len(),
            FeatureValues::Categorical(v) | FeatureValues::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether row `i` is missing. NaN counts as missing.
    pub fn is_null(&self, i: usize) -> bool {
        match self.values {
            FeatureValues::Numeric(v) => v[i].is_nan(),
            FeatureValues::Categorical(v) | FeatureValues::String(v) => v[i].is_none(),
        }
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|i| self.is_null(*i)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_get() {
        let v = vec![1, 2, 3, 5, 6, 7];
        let m = Matrix::new(&v, 2, 3);
        println!("{}", m);
        assert_eq!(m.get(0, 0), &1);
        assert_eq!(m.get(1, 0), &2);
    }

    #[test]
    fn test_matrix_get_col_slice() {
        let v = vec![1, 2, 3, 5, 6, 7];
        let m = Matrix::new(&v, 3, 2);
        assert_eq!(m.get_col_slice(0, 0, 3), &vec![1, 2, 3]);
        assert_eq!(m.get_col_slice(1, 0, 2), &vec![5, 6]);
        assert_eq!(m.get_col_slice(1, 1, 3), &vec![6, 7]);
    }

    #[test]
    fn test_matrix_row() {
        let v = vec![1, 2, 3, 5, 6, 7];
        let m = Matrix::new(&v, 3, 2);
        assert_eq!(m.get_row(2), vec![3, 7]);
        assert_eq!(m.get_row(0), vec![1, 5]);
    }

    #[test]
    fn test_predictions_from_matrix() {
        let v = vec![1., 2., 3., 5., 6., 7.];
        let p = Predictions::from_matrix(Matrix::new(&v, 3, 2), None).unwrap();
        assert_eq!(p.n_models(), 2);
        assert_eq!(p.rows(), 3);
        let (name, col) = p.get_model(1).unwrap();
        assert_eq!(name, "model_1");
        assert_eq!(col, &[5., 6., 7.]);
        assert!(p.get_model(2).is_err());
        let names: Vec<&str> = p.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["model_0", "model_1"]);
    }

    #[test]
    fn test_predictions_bad_names() {
        let v = vec![1., 2., 3., 5., 6., 7.];
        let p = Predictions::from_matrix(Matrix::new(&v, 3, 2), Some(vec!["a".to_string()]));
        assert!(matches!(p, Err(DiagnosticsError::ShapeMismatch(..))));
    }

    #[test]
    fn test_feature_nulls() {
        let v = vec![1., f64::NAN, 3.];
        let f = Feature::numeric("x", &v);
        assert_eq!(f.kind(), ColumnKind::Numeric);
        assert_eq!(f.null_count(), 1);
        assert!(f.is_null(1));

        let c = vec![Some("a"), None, Some("b"), None];
        let f = Feature::categorical("c", &c);
        assert_eq!(f.kind(), ColumnKind::Categorical);
        assert_eq!(f.len(), 4);
        assert_eq!(f.null_count(), 2);
    }
}
