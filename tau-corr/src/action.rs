use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use validator::Validate;

use crate::config::AutocorrelateConfig;
use crate::correlator::Correlator;
use crate::error::{CorrelatorError, Result};
use crate::parallel::par_over_correlators;

/// Anything that can report the current value of a named scalar quantity,
/// typically the logger of a running simulation.
pub trait QuantitySource {
    fn value(&self, name: &str) -> Option<f64>;
}

impl QuantitySource for HashMap<String, f64> {
    fn value(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl QuantitySource for BTreeMap<String, f64> {
    fn value(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

/// Scheduled autocorrelation of several scalar quantities.
///
/// Called once per simulation step via [`act`](Self::act). Keeps one
/// [`Correlator`] per quantity, created lazily on the first step, and every
/// `eval_period` steps appends a block with all correlation curves to `path`.
///
/// Block format:
///
/// ```text
/// correlator evaluated at timestep {timestep}
/// timestep,corr_{q1},corr_{q2},...
/// {t0},{f_q1(t0)},{f_q2(t0)},...
/// ```
pub struct Autocorrelate {
    config: AutocorrelateConfig,
    path: PathBuf,
    correlators: Vec<Correlator>,
    first_write: bool,
}

impl Autocorrelate {
    pub fn new(config: AutocorrelateConfig, path: impl Into<PathBuf>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            path: path.into(),
            correlators: Vec::new(),
            first_write: true,
        })
    }

    /// Feed the current value of every quantity and write a block when
    /// `timestep` falls on the evaluation period.
    pub fn act<S: QuantitySource + ?Sized>(&mut self, timestep: u64, source: &S) -> Result<()> {
        if self.correlators.is_empty() {
            self.create_correlators(source)?;
        }

        // look everything up first so a missing value leaves all engines in lock-step
        let values = self
            .config
            .quantities
            .iter()
            .map(|name| {
                source.value(name).ok_or_else(|| CorrelatorError::MissingValue {
                    name: name.clone(),
                    timestep,
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        for (corr, value) in self.correlators.iter_mut().zip(values) {
            corr.add(value);
        }

        if self.config.eval_period == 0 {
            return Ok(());
        }
        if timestep % self.config.eval_period == 0 {
            self.write_to_file(timestep)?;
        }
        Ok(())
    }

    fn create_correlators<S: QuantitySource + ?Sized>(&mut self, source: &S) -> Result<()> {
        if let Some(name) = self
            .config
            .quantities
            .iter()
            .find(|q| source.value(q).is_none())
        {
            return Err(CorrelatorError::QuantityNotFound { name: name.clone() });
        }

        let correlators = self
            .config
            .quantities
            .iter()
            .map(|_| Correlator::new(self.config.correlator))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "created {} correlators for {:?}",
            correlators.len(),
            self.config.quantities
        );
        self.correlators = correlators;
        Ok(())
    }

    /// Evaluate every correlator and write one block to `path`.
    ///
    /// The first successful write truncates the file; later writes append.
    pub fn write_to_file(&mut self, timestep: u64) -> Result<()> {
        let file = if self.first_write {
            File::create(&self.path)?
        } else {
            OpenOptions::new().append(true).create(true).open(&self.path)?
        };

        let mut out = BufWriter::new(file);
        self.write_block(&mut out, timestep)?;
        out.flush()?;
        self.first_write = false;
        Ok(())
    }

    /// Evaluate every correlator and write one block to `out`.
    pub fn write_block<W: Write>(&mut self, out: &mut W, timestep: u64) -> Result<()> {
        let normalize = self.config.normalize;
        par_over_correlators(&mut self.correlators, self.config.sequential, |corr| {
            corr.evaluate(normalize)
        });

        writeln!(out, "correlator evaluated at timestep {timestep}")?;
        write!(out, "timestep")?;
        for name in &self.config.quantities {
            write!(out, ",corr_{name}")?;
        }
        writeln!(out)?;

        let npcorr = self.npcorr();
        info!("number of correlation points: {npcorr}");

        if let Some(first) = self.correlators.first() {
            for (i, t) in first.t().iter().enumerate() {
                write!(out, "{t:?}")?;
                for corr in &self.correlators {
                    write!(out, ",{:?}", corr.f()[i])?;
                }
                writeln!(out)?;
            }
        }
        Ok(())
    }

    /// Points in the last evaluation of the first quantity.
    pub fn npcorr(&self) -> usize {
        self.correlators.first().map_or(0, Correlator::npcorr)
    }

    pub fn correlators(&self) -> &[Correlator] {
        &self.correlators
    }

    pub fn quantities(&self) -> &[String] {
        &self.config.quantities
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &AutocorrelateConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorrelatorConfig;

    fn config(quantities: &[&str], eval_period: u64) -> AutocorrelateConfig {
        let mut cfg = AutocorrelateConfig::new(quantities.iter().map(|q| q.to_string()).collect());
        cfg.correlator = CorrelatorConfig::new(3, 4, 2);
        cfg.eval_period = eval_period;
        cfg
    }

    fn source(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|&(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(Autocorrelate::new(config(&[], 0), "unused.log").is_err());
        let mut cfg = config(&["pressure_xy"], 0);
        cfg.correlator.p = 0;
        assert!(matches!(
            Autocorrelate::new(cfg, "unused.log"),
            Err(CorrelatorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unknown_quantity() {
        let mut action = Autocorrelate::new(config(&["pressure_xy", "volume"], 0), "unused.log")
            .unwrap();
        let err = action
            .act(0, &source(&[("pressure_xy", 1.0)]))
            .unwrap_err();
        match err {
            CorrelatorError::QuantityNotFound { name } => assert_eq!(name, "volume"),
            other => panic!("expected QuantityNotFound, got {other:?}"),
        }
        assert!(action.correlators().is_empty());
    }

    #[test]
    fn test_missing_value_after_first_step() {
        let mut action = Autocorrelate::new(config(&["volume"], 0), "unused.log").unwrap();
        action.act(0, &source(&[("volume", 1.0)])).unwrap();
        assert!(matches!(
            action.act(1, &source(&[])),
            Err(CorrelatorError::MissingValue { timestep: 1, .. })
        ));
    }

    #[test]
    fn test_missing_value_keeps_engines_in_lock_step() {
        let mut action = Autocorrelate::new(config(&["a", "b"], 0), "unused.log").unwrap();
        action.act(0, &source(&[("a", 1.0), ("b", 2.0)])).unwrap();
        assert!(action.act(1, &source(&[("a", 1.0)])).is_err());
        assert!(action.correlators().iter().all(|c| c.samples() == 1));

        action.act(2, &source(&[("a", 1.0), ("b", 2.0)])).unwrap();
        let mut buf = Vec::new();
        action.write_block(&mut buf, 2).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with("0.0,1.0,4.0\n1.0,1.0,4.0\n"));
        assert!(action.correlators().iter().all(|c| c.npcorr() == 2));
    }

    #[test]
    fn test_one_correlator_per_quantity() {
        let mut action =
            Autocorrelate::new(config(&["a", "b"], 0), "unused.log").unwrap();
        let src: BTreeMap<String, f64> =
            [("a".to_string(), 1.0), ("b".to_string(), 2.0), ("c".to_string(), 9.0)]
                .into_iter()
                .collect();
        for step in 0..5 {
            action.act(step, &src).unwrap();
        }
        assert_eq!(action.correlators().len(), 2);
        assert!(action.correlators().iter().all(|c| c.samples() == 5));
        assert_eq!(action.correlators()[1].mean(), Some(2.0));
    }

    #[test]
    fn test_block_format() {
        let mut cfg = config(&["a", "b"], 0);
        cfg.sequential = true;
        let mut action = Autocorrelate::new(cfg, "unused.log").unwrap();
        for _ in 0..2 {
            action.act(0, &source(&[("a", 1.0), ("b", 2.0)])).unwrap();
        }

        let mut buf = Vec::new();
        action.write_block(&mut buf, 2).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "correlator evaluated at timestep 2\n\
             timestep,corr_a,corr_b\n\
             0.0,1.0,4.0\n\
             1.0,1.0,4.0\n"
        );
        assert_eq!(action.npcorr(), 2);
    }

    #[test]
    fn test_header_only_before_first_step() {
        let mut action = Autocorrelate::new(config(&["a"], 0), "unused.log").unwrap();
        let mut buf = Vec::new();
        action.write_block(&mut buf, 0).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "correlator evaluated at timestep 0\ntimestep,corr_a\n"
        );
        assert_eq!(action.npcorr(), 0);
    }

    #[test]
    fn test_periodic_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autocorrelate.log");
        std::fs::write(&path, "stale contents\n").unwrap();

        let mut action = Autocorrelate::new(config(&["a"], 4), &path).unwrap();
        for step in 1..=8 {
            action.act(step, &source(&[("a", 0.5)])).unwrap();
        }

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("stale"));
        let headers: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with("correlator evaluated"))
            .collect();
        assert_eq!(
            headers,
            vec![
                "correlator evaluated at timestep 4",
                "correlator evaluated at timestep 8"
            ]
        );
        assert!(text.lines().any(|l| l == "0.0,0.25"));
    }

    #[test]
    fn test_failed_first_write_still_truncates_later() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("out");
        let path = sub.join("autocorrelate.log");

        let mut action = Autocorrelate::new(config(&["a"], 0), &path).unwrap();
        action.act(1, &source(&[("a", 0.5)])).unwrap();
        assert!(matches!(
            action.write_to_file(1),
            Err(CorrelatorError::Io(_))
        ));

        std::fs::create_dir(&sub).unwrap();
        std::fs::write(&path, "stale contents\n").unwrap();
        action.write_to_file(2).unwrap();
        action.write_to_file(3).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("stale"));
        assert!(text.starts_with("correlator evaluated at timestep 2\n"));
        assert!(text.contains("correlator evaluated at timestep 3\n"));
    }

    #[test]
    fn test_zero_period_never_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.log");
        let mut action = Autocorrelate::new(config(&["a"], 0), &path).unwrap();
        for step in 0..16 {
            action.act(step, &source(&[("a", 1.0)])).unwrap();
        }
        assert!(!path.exists());
        assert_eq!(action.correlators()[0].samples(), 16);
    }
}
