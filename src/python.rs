//! Python bindings for the in-memory flood mapping stages

use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::prelude::*;

use crate::core::{
    AccuracyAssessor, ChangeDetector, SlopeFilter, SlopeFilterParams, ValidationReport,
    WaterDetectionParams, WaterDetector,
};
use crate::types::FloodError;

fn to_py_err(e: FloodError) -> PyErr {
    match e {
        FloodError::DimensionMismatch { .. } | FloodError::Processing(_) => {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", e))
        }
        _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e)),
    }
}

/// Segment water in a VV/VH intensity pair
#[pyfunction]
#[pyo3(signature = (vv, vh, percentile=90.0, vv_threshold=0.03, vh_threshold=0.01, min_object_size=2000))]
fn detect_water<'py>(
    py: Python<'py>,
    vv: PyReadonlyArray2<'py, f32>,
    vh: PyReadonlyArray2<'py, f32>,
    percentile: f64,
    vv_threshold: f64,
    vh_threshold: f64,
    min_object_size: usize,
) -> PyResult<&'py PyArray2<u8>> {
    let detector = WaterDetector::with_params(WaterDetectionParams {
        percentile,
        vv_threshold,
        vh_threshold,
        min_object_size,
        ..Default::default()
    });
    let mask = detector
        .detect_water(&vv.as_array().to_owned(), &vh.as_array().to_owned())
        .map_err(to_py_err)?;
    Ok(mask.into_pyarray(py))
}

#[pyfunction]
fn detect_change<'py>(
    py: Python<'py>,
    pre: PyReadonlyArray2<'py, u8>,
    post: PyReadonlyArray2<'py, u8>,
) -> PyResult<&'py PyArray2<u8>> {
    let flooded =
        ChangeDetector::detect_new_water(&pre.as_array().to_owned(), &post.as_array().to_owned())
            .map_err(to_py_err)?;
    Ok(flooded.into_pyarray(py))
}

/// Returns the filtered mask and the number of suppressed pixels
#[pyfunction]
#[pyo3(signature = (mask, dem, slope_threshold=5.0))]
fn apply_slope_filter<'py>(
    py: Python<'py>,
    mask: PyReadonlyArray2<'py, u8>,
    dem: PyReadonlyArray2<'py, f32>,
    slope_threshold: f32,
) -> PyResult<(&'py PyArray2<u8>, usize)> {
    let filter = SlopeFilter::with_params(SlopeFilterParams {
        slope_threshold_deg: slope_threshold,
        ..Default::default()
    });
    let mut mask = mask.as_array().to_owned();
    let suppressed = filter
        .apply(&mut mask, &dem.as_array().to_owned())
        .map_err(to_py_err)?;
    Ok((mask.into_pyarray(py), suppressed))
}

#[pyfunction]
fn assess_accuracy<'py>(
    reference: PyReadonlyArray2<'py, u8>,
    predicted: PyReadonlyArray2<'py, u8>,
) -> PyResult<PyValidationReport> {
    let report = AccuracyAssessor::compare(
        &reference.as_array().to_owned(),
        &predicted.as_array().to_owned(),
    )
    .map_err(to_py_err)?;
    Ok(PyValidationReport { inner: report })
}

/// Python wrapper for ValidationReport
#[pyclass(name = "ValidationReport")]
struct PyValidationReport {
    inner: ValidationReport,
}

#[pymethods]
impl PyValidationReport {
    #[getter]
    fn f1_score(&self) -> f64 {
        self.inner.f1_score
    }

    #[getter]
    fn iou(&self) -> f64 {
        self.inner.iou
    }

    #[getter]
    fn precision(&self) -> f64 {
        self.inner.precision
    }

    #[getter]
    fn recall(&self) -> f64 {
        self.inner.recall
    }

    #[getter]
    fn degenerate(&self) -> bool {
        self.inner.degenerate
    }

    /// Confusion matrix as [[TN, FP], [FN, TP]]
    #[getter]
    fn confusion_matrix(&self) -> [[u64; 2]; 2] {
        self.inner.confusion.as_table()
    }

    fn __str__(&self) -> String {
        format!(
            "ValidationReport(f1_score={:.4}, iou={:.4}, degenerate={})",
            self.inner.f1_score, self.inner.iou, self.inner.degenerate
        )
    }
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(detect_water, m)?)?;
    m.add_function(wrap_pyfunction!(detect_change, m)?)?;
    m.add_function(wrap_pyfunction!(apply_slope_filter, m)?)?;
    m.add_function(wrap_pyfunction!(assess_accuracy, m)?)?;
    m.add_class::<PyValidationReport>()?;
    Ok(())
}
