use std::collections::HashMap;

use indicatif::{ProgressBar, ProgressStyle};
use numpy::ndarray::Array1;
use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1};
use pyo3::exceptions::{PyOSError, PyValueError};
use pyo3::prelude::*;

use tau_corr::{
    Autocorrelate, AutocorrelateConfig, Correlator, CorrelatorConfig, CorrelatorError,
};

const PROGRESS_CHUNK: usize = 4096;

fn to_py_err(e: CorrelatorError) -> PyErr {
    match e {
        CorrelatorError::Io(e) => PyOSError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

fn to_pyarray<'py>(py: Python<'py>, values: &[f64]) -> Bound<'py, PyArray1<f64>> {
    Array1::from(values.to_vec()).into_pyarray(py)
}

#[pyclass(name = "Correlator")]
struct PyCorrelator {
    inner: Correlator,
}

#[pymethods]
impl PyCorrelator {
    /// Create a multi-tau correlator.
    ///
    /// Arguments:
    ///   numcorrelators: number of levels in the hierarchy
    ///   p: lag bins kept per level
    ///   m: decimation factor between consecutive levels
    #[new]
    fn new(numcorrelators: usize, p: usize, m: usize) -> PyResult<Self> {
        let config = CorrelatorConfig::new(numcorrelators, p, m);
        let inner = Correlator::new(config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Reset all buffers and sums.
    fn initialize(&mut self) {
        self.inner.initialize();
    }

    /// Insert one sample at level `k` (default 0).
    #[pyo3(signature = (w, k=0))]
    fn add(&mut self, w: f64, k: usize) {
        self.inner.add_at(w, k);
    }

    /// Recompute `t` and `f`; with `norm`, subtract the squared stream mean.
    #[pyo3(signature = (norm=false))]
    fn evaluate(&mut self, norm: bool) {
        self.inner.evaluate(norm);
    }

    #[getter]
    fn npcorr(&self) -> usize {
        self.inner.npcorr()
    }

    #[getter]
    fn t<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        to_pyarray(py, self.inner.t())
    }

    #[getter]
    fn f<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        to_pyarray(py, self.inner.f())
    }
}

#[pyclass(name = "Autocorrelate")]
struct PyAutocorrelate {
    inner: Autocorrelate,
}

#[pymethods]
impl PyAutocorrelate {
    /// Autocorrelate logged scalar quantities on a schedule.
    ///
    /// Arguments:
    ///   quantities: names of the quantities to correlate
    ///   filename: output file, truncated on the first write
    ///   eval_period: write every N timesteps (0 = never)
    ///   numcorrin, p_in, m_in: hierarchy shape shared by all quantities
    ///   normalize: subtract the squared mean from every value
    ///
    /// The number of correlation points per write goes to the Rust `log`
    /// facade, which is silent unless the host installs a logger; read the
    /// `npcorr` property after `write_to_file` instead.
    #[new]
    #[pyo3(signature = (quantities, filename="autocorrelate.log".to_string(), eval_period=0, numcorrin=32, p_in=16, m_in=2, normalize=false))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        quantities: Vec<String>,
        filename: String,
        eval_period: u64,
        numcorrin: usize,
        p_in: usize,
        m_in: usize,
        normalize: bool,
    ) -> PyResult<Self> {
        let mut config = AutocorrelateConfig::new(quantities);
        config.correlator = CorrelatorConfig::new(numcorrin, p_in, m_in);
        config.eval_period = eval_period;
        config.normalize = normalize;
        let inner = Autocorrelate::new(config, filename).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Feed the current values, e.g. a flattened logger snapshot.
    fn act(&mut self, timestep: u64, values: HashMap<String, f64>) -> PyResult<()> {
        self.inner.act(timestep, &values).map_err(to_py_err)
    }

    /// Evaluate all correlators and append a block to the output file.
    fn write_to_file(&mut self, timestep: u64) -> PyResult<()> {
        self.inner.write_to_file(timestep).map_err(to_py_err)
    }

    #[getter]
    fn filename(&self) -> String {
        self.inner.path().to_string_lossy().into_owned()
    }

    #[getter]
    fn quantities(&self) -> Vec<String> {
        self.inner.quantities().to_vec()
    }

    #[getter]
    fn npcorr(&self) -> usize {
        self.inner.npcorr()
    }
}

/// Correlate a whole series in one call.
///
/// Returns: tuple `(t, f)` of numpy arrays.
#[pyfunction]
#[pyo3(signature = (series, numcorrelators=32, p=16, m=2, normalize=false, progress=false))]
fn correlate_series<'py>(
    py: Python<'py>,
    series: PyReadonlyArray1<f64>,
    numcorrelators: usize,
    p: usize,
    m: usize,
    normalize: bool,
    progress: bool,
) -> PyResult<(Bound<'py, PyArray1<f64>>, Bound<'py, PyArray1<f64>>)> {
    let values = series.as_slice()?;
    let mut corr =
        Correlator::new(CorrelatorConfig::new(numcorrelators, p, m)).map_err(to_py_err)?;

    let pb = if progress {
        ProgressBar::new(values.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::with_template(
            "{msg} [{bar:40}] {pos}/{len} [{elapsed_precise} < {eta_precise}, {per_sec}]",
        )
        .map_err(|e| PyValueError::new_err(e.to_string()))?
        .progress_chars("=> "),
    );
    pb.set_message("samples");

    for chunk in values.chunks(PROGRESS_CHUNK) {
        for &x in chunk {
            corr.add(x);
        }
        pb.inc(chunk.len() as u64);
    }
    pb.finish();

    corr.evaluate(normalize);
    Ok((to_pyarray(py, corr.t()), to_pyarray(py, corr.f())))
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyCorrelator>()?;
    m.add_class::<PyAutocorrelate>()?;
    m.add_function(wrap_pyfunction!(correlate_series, m)?)?;
    Ok(())
}
