//! Reader for run configuration files.
//!
//! # File Format
//!
//! ```text
//! ; shell convection, adaptive steps
//! [parameters]
//! Lmax = 15
//! Nmax = 15
//! Ekman = 1e-3
//! Rayleigh = 1e5
//! Xn = 1
//! Yn = 1
//! t_end = 0.01
//! max_dt = 1e-2
//! init_dt = 1e-4
//! timestepper = SBDF2
//! safety = 0.4
//! ```
//!
//! The `[parameters]` section is deserialized into [`Parameters`]. Keys are
//! accepted in lower case or in the spelling shown above. Every key is
//! optional at the serde level; required keys and ranges are checked by
//! [`RunConfig::from_parameters`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::problem::TimeScaling;
use crate::solver::Representation;
use crate::time::Timestepper;
use crate::types::ShellGeometry;

/// Safety factor used when the timestepper key is absent.
pub const FALLBACK_SAFETY: f64 = 0.4;

/// Error type for configuration parsing and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed INI text or a value of the wrong type
    #[error("format error: {0}")]
    Format(#[from] serde_ini::de::Error),

    #[error("missing required key '{0}'")]
    MissingKey(String),

    #[error("key '{key}': cannot parse '{value}' as {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("unknown timestepper '{0}' (expected SBDF1..SBDF4)")]
    UnknownTimestepper(String),

    /// A value outside its admissible range
    #[error("key '{key}': {message}")]
    OutOfRange { key: String, message: String },
}

/// Raw `[parameters]` section.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Parameters {
    #[serde(alias = "Lmax", alias = "LMAX")]
    pub lmax: Option<usize>,
    #[serde(alias = "Nmax", alias = "NMAX")]
    pub nmax: Option<usize>,
    #[serde(alias = "Ekman", alias = "EKMAN")]
    pub ekman: Option<f64>,
    #[serde(alias = "Rayleigh", alias = "RAYLEIGH")]
    pub rayleigh: Option<f64>,
    #[serde(alias = "Prandtl", alias = "PRANDTL")]
    pub prandtl: Option<f64>,
    #[serde(alias = "Xn", alias = "XN")]
    pub xn: Option<usize>,
    #[serde(alias = "Yn", alias = "YN")]
    pub yn: Option<usize>,
    #[serde(alias = "T_end", alias = "T_END")]
    pub t_end: Option<f64>,
    pub max_dt: Option<f64>,
    pub init_dt: Option<f64>,
    pub dt: Option<f64>,
    pub timestepper: Option<String>,
    pub safety: Option<f64>,
    pub dtype: Option<String>,
    pub scaling: Option<String>,
    pub r_inner: Option<f64>,
    pub r_outer: Option<f64>,
    pub remove_m0: Option<bool>,
    pub report_cadence: Option<usize>,
    pub hermitian_cadence: Option<usize>,
    pub plot_cadence: Option<f64>,
    pub checkpoint_iter: Option<usize>,
    pub checkpoint_max_writes: Option<usize>,
    pub amplitude: Option<f64>,
}

/// Whole configuration file. Other sections are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    #[serde(alias = "Parameters", alias = "PARAMETERS")]
    parameters: Parameters,
}

impl Parameters {
    /// Deserialize the `[parameters]` section of INI text.
    pub fn from_ini(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_ini::from_str(text)?;
        Ok(file.parameters)
    }
}

fn required<T>(key: &str, value: Option<T>) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::MissingKey(key.to_string()))
}

/// How the step size is chosen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepControl {
    /// CFL-limited steps, capped at `init_dt` during startup.
    Adaptive { max_dt: f64, init_dt: f64 },
    /// Configured `dt`: `init_dt = dt`, `max_dt = 5·dt`, no startup cap.
    Fixed { dt: f64 },
}

impl StepControl {
    pub fn max_dt(&self) -> f64 {
        match *self {
            StepControl::Adaptive { max_dt, .. } => max_dt,
            StepControl::Fixed { dt } => 5.0 * dt,
        }
    }

    pub fn init_dt(&self) -> f64 {
        match *self {
            StepControl::Adaptive { init_dt, .. } => init_dt,
            StepControl::Fixed { dt } => dt,
        }
    }

    /// Whether steps are capped at `init_dt` early in the run.
    pub fn has_startup_cap(&self) -> bool {
        matches!(self, StepControl::Adaptive { .. })
    }

    fn default_safety(&self) -> f64 {
        match self {
            StepControl::Adaptive { .. } => FALLBACK_SAFETY,
            StepControl::Fixed { .. } => 0.1,
        }
    }
}

/// Validated run configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    /// File stem used to name outputs
    pub name: String,
    pub lmax: usize,
    pub nmax: usize,
    pub ekman: f64,
    pub rayleigh: f64,
    pub prandtl: f64,
    pub geometry: ShellGeometry,
    /// Process mesh extent along φ
    pub xn: usize,
    /// Process mesh extent along θ
    pub yn: usize,
    pub t_end: f64,
    pub step_control: StepControl,
    pub timestepper: Timestepper,
    /// Whether `timestepper` was absent and the fallback was chosen
    pub timestepper_defaulted: bool,
    pub safety: f64,
    pub representation: Representation,
    pub scaling: TimeScaling,
    /// Subtract the zonal mean from snapshots
    pub remove_m0: bool,
    pub report_cadence: usize,
    pub hermitian_cadence: usize,
    pub plot_cadence: f64,
    pub checkpoint_iter: usize,
    pub checkpoint_max_writes: usize,
    /// Amplitude of the initial temperature perturbation
    pub amplitude: f64,
}

impl RunConfig {
    /// Read and validate a configuration file. Outputs are named after the
    /// file stem.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "run".to_string());
        Self::parse(&text, name)
    }

    /// Parse and validate INI text.
    pub fn parse(text: &str, name: impl Into<String>) -> Result<Self, ConfigError> {
        Self::from_parameters(&Parameters::from_ini(text)?, name)
    }

    /// Apply defaults to a deserialized section and validate it.
    pub fn from_parameters(p: &Parameters, name: impl Into<String>) -> Result<Self, ConfigError> {
        let lmax = required("Lmax", p.lmax)?;
        let nmax = required("Nmax", p.nmax)?;
        let ekman = required("Ekman", p.ekman)?;
        let rayleigh = required("Rayleigh", p.rayleigh)?;
        let xn = required("Xn", p.xn)?;
        let yn = required("Yn", p.yn)?;
        let t_end = required("t_end", p.t_end)?;

        let step_control = match (p.max_dt, p.init_dt, p.dt) {
            (Some(max_dt), Some(init_dt), _) => StepControl::Adaptive { max_dt, init_dt },
            (None, None, Some(dt)) => StepControl::Fixed { dt },
            (None, _, None) => return Err(ConfigError::MissingKey("max_dt".into())),
            (_, None, None) => return Err(ConfigError::MissingKey("init_dt".into())),
            (None, Some(_), Some(_)) | (Some(_), None, Some(_)) => {
                return Err(ConfigError::OutOfRange {
                    key: "dt".into(),
                    message: "give either dt, or both max_dt and init_dt".into(),
                });
            }
        };

        let (timestepper, timestepper_defaulted, safety) = match &p.timestepper {
            Some(value) => {
                let ts = value
                    .parse::<Timestepper>()
                    .map_err(|_| ConfigError::UnknownTimestepper(value.clone()))?;
                (ts, false, p.safety.unwrap_or(step_control.default_safety()))
            }
            None => (Timestepper::Sbdf2, true, FALLBACK_SAFETY),
        };

        let representation = match p.dtype.as_deref() {
            None => Representation::default(),
            Some(v) => match v.to_lowercase().as_str() {
                "real" | "float64" => Representation::Real,
                "complex" | "complex128" => Representation::Complex,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "dtype".into(),
                        value: v.to_string(),
                        expected: "'real' or 'complex'",
                    });
                }
            },
        };
        let scaling = match p.scaling.as_deref() {
            None => TimeScaling::default(),
            Some(v) => v.parse::<TimeScaling>().map_err(|_| ConfigError::InvalidValue {
                key: "scaling".into(),
                value: v.to_string(),
                expected: "'viscous' or 'marti'",
            })?,
        };

        let config = Self {
            name: name.into(),
            lmax,
            nmax,
            ekman,
            rayleigh,
            prandtl: p.prandtl.unwrap_or(1.0),
            geometry: ShellGeometry::default(),
            xn,
            yn,
            t_end,
            step_control,
            timestepper,
            timestepper_defaulted,
            safety,
            representation,
            scaling,
            remove_m0: p.remove_m0.unwrap_or(false),
            report_cadence: p.report_cadence.unwrap_or(10),
            hermitian_cadence: p.hermitian_cadence.unwrap_or(100),
            plot_cadence: p.plot_cadence.unwrap_or(250.0 * step_control.max_dt()),
            checkpoint_iter: p.checkpoint_iter.unwrap_or(500),
            checkpoint_max_writes: p.checkpoint_max_writes.unwrap_or(10),
            amplitude: p.amplitude.unwrap_or(0.1),
        };
        config.validate(
            p.r_inner.unwrap_or(7.0 / 13.0),
            p.r_outer.unwrap_or(20.0 / 13.0),
        )
    }

    /// Log the resolved parameters.
    pub fn log(&self) {
        tracing::info!(
            name = %self.name,
            lmax = self.lmax,
            nmax = self.nmax,
            ekman = self.ekman,
            rayleigh = self.rayleigh,
            prandtl = self.prandtl,
            mesh = %format!("{}x{}", self.xn, self.yn),
            t_end = self.t_end,
            max_dt = self.step_control.max_dt(),
            init_dt = self.step_control.init_dt(),
            timestepper = %self.timestepper,
            safety = self.safety,
            "parameters"
        );
        if self.timestepper_defaulted {
            tracing::warn!(
                "no timestepper given, using {} with safety {}",
                self.timestepper,
                self.safety
            );
        }
    }

    fn validate(mut self, r_inner: f64, r_outer: f64) -> Result<Self, ConfigError> {
        let range = |key: &str, message: &str| ConfigError::OutOfRange {
            key: key.to_string(),
            message: message.to_string(),
        };

        if self.lmax == 0 {
            return Err(range("Lmax", "must be at least 1"));
        }
        if self.nmax < 3 {
            return Err(range("Nmax", "must be at least 3"));
        }
        if self.xn == 0 || self.yn == 0 {
            return Err(range("Xn", "process mesh extents must be positive"));
        }
        for (key, value) in [
            ("Ekman", self.ekman),
            ("Rayleigh", self.rayleigh),
            ("Prandtl", self.prandtl),
            ("t_end", self.t_end),
            ("safety", self.safety),
            ("plot_cadence", self.plot_cadence),
            ("max_dt", self.step_control.max_dt()),
            ("init_dt", self.step_control.init_dt()),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(range(key, "must be positive and finite"));
            }
        }
        if !(0.0 < r_inner && r_inner < r_outer && r_outer.is_finite()) {
            return Err(range("r_inner", "radii must satisfy 0 < r_inner < r_outer"));
        }
        for (key, value) in [
            ("report_cadence", self.report_cadence),
            ("hermitian_cadence", self.hermitian_cadence),
            ("checkpoint_iter", self.checkpoint_iter),
            ("checkpoint_max_writes", self.checkpoint_max_writes),
        ] {
            if value == 0 {
                return Err(range(key, "must be positive"));
            }
        }
        self.geometry = ShellGeometry::new(r_inner, r_outer);
        Ok(self)
    }

    /// Output root for checkpoints, `data_<name>`.
    pub fn checkpoint_dir(&self, root: &Path) -> PathBuf {
        root.join(format!("data_{}", self.name))
    }

    /// Energy series file, `<name>_marti_conv.dat`.
    pub fn series_path(&self, root: &Path) -> PathBuf {
        root.join(format!("{}_marti_conv.dat", self.name))
    }

    /// Snapshot directory, `frames/frames_<name>`.
    pub fn frames_dir(&self, root: &Path) -> PathBuf {
        root.join("frames").join(format!("frames_{}", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ADAPTIVE: &str = "\
; adaptive run
[parameters]
Lmax = 15
Nmax = 15
Ekman = 1e-3
Rayleigh = 1e5
Xn = 1
Yn = 1
t_end = 0.01
max_dt = 1e-2
init_dt = 1e-4
timestepper = SBDF2
safety = 0.4
";

    fn parse(text: &str) -> Result<RunConfig, ConfigError> {
        RunConfig::parse(text, "test")
    }

    #[test]
    fn test_parameters_deserialize() {
        let p = Parameters::from_ini(ADAPTIVE).unwrap();
        assert_eq!(p.lmax, Some(15));
        assert_eq!(p.ekman, Some(1e-3));
        assert_eq!(p.timestepper.as_deref(), Some("SBDF2"));
        assert_eq!(p.dt, None);
        assert_eq!(p.remove_m0, None);
    }

    #[test]
    fn test_lower_case_keys() {
        let text = ADAPTIVE
            .replace("Lmax", "lmax")
            .replace("Ekman", "ekman")
            .replace("[parameters]", "[Parameters]");
        let p = Parameters::from_ini(&text).unwrap();
        assert_eq!(p.lmax, Some(15));
        assert_eq!(p.ekman, Some(1e-3));
    }

    #[test]
    fn test_adaptive_config() {
        let config = parse(ADAPTIVE).unwrap();
        assert_eq!(config.lmax, 15);
        assert_eq!(config.rayleigh, 1e5);
        assert_eq!(
            config.step_control,
            StepControl::Adaptive {
                max_dt: 1e-2,
                init_dt: 1e-4
            }
        );
        assert_eq!(config.timestepper, Timestepper::Sbdf2);
        assert!(!config.timestepper_defaulted);
        assert_eq!(config.safety, 0.4);
        assert_eq!(config.prandtl, 1.0);
        assert_eq!(config.representation, Representation::Real);
        assert_eq!(config.report_cadence, 10);
        assert_eq!(config.hermitian_cadence, 100);
        assert_eq!(config.checkpoint_iter, 500);
        assert_eq!(config.checkpoint_max_writes, 10);
        assert!((config.plot_cadence - 2.5).abs() < 1e-12);
        assert_eq!(config.geometry, ShellGeometry::default());
    }

    #[test]
    fn test_fixed_dt_config() {
        let text = ADAPTIVE
            .replace("max_dt = 1e-2\n", "")
            .replace("init_dt = 1e-4\n", "dt = 1e-3\n")
            .replace("safety = 0.4\n", "");
        let config = parse(&text).unwrap();
        assert_eq!(config.step_control, StepControl::Fixed { dt: 1e-3 });
        assert_eq!(config.step_control.init_dt(), 1e-3);
        assert_eq!(config.step_control.max_dt(), 5e-3);
        assert!(!config.step_control.has_startup_cap());
        assert_eq!(config.safety, 0.1);
    }

    #[test]
    fn test_missing_timestepper_falls_back() {
        let text = ADAPTIVE
            .replace("timestepper = SBDF2\n", "")
            .replace("safety = 0.4\n", "safety = 0.9\n");
        let config = parse(&text).unwrap();
        assert_eq!(config.timestepper, Timestepper::Sbdf2);
        assert!(config.timestepper_defaulted);
        assert_eq!(config.safety, FALLBACK_SAFETY);
    }

    #[test]
    fn test_unknown_timestepper() {
        let text = ADAPTIVE.replace("SBDF2", "RK443");
        assert!(matches!(parse(&text), Err(ConfigError::UnknownTimestepper(name)) if name == "RK443"));
    }

    #[test]
    fn test_missing_keys() {
        let text = ADAPTIVE.replace("Nmax = 15\n", "");
        assert!(matches!(parse(&text), Err(ConfigError::MissingKey(k)) if k == "Nmax"));
        let text = ADAPTIVE.replace("init_dt = 1e-4\n", "");
        assert!(matches!(parse(&text), Err(ConfigError::MissingKey(k)) if k == "init_dt"));
    }

    #[test]
    fn test_invalid_values() {
        let text = ADAPTIVE.replace("Lmax = 15", "Lmax = fifteen");
        assert!(matches!(parse(&text), Err(ConfigError::Format(_))));
        let text = ADAPTIVE.replace("Lmax = 15", "Lmax = 15.5");
        assert!(matches!(parse(&text), Err(ConfigError::Format(_))));
        let text = ADAPTIVE.replace("t_end = 0.01", "t_end = -1");
        assert!(matches!(parse(&text), Err(ConfigError::OutOfRange { .. })));
        let text = format!("{ADAPTIVE}r_inner = 2\n");
        assert!(matches!(parse(&text), Err(ConfigError::OutOfRange { .. })));
        let text = format!("{ADAPTIVE}dtype = quaternion\n");
        assert!(matches!(parse(&text), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_optional_keys() {
        let text = format!(
            "{ADAPTIVE}dtype = complex\nscaling = Marti\nremove_m0 = true\nPrandtl = 0.5\nRayleigh2 = 1\n"
        );
        let config = parse(&text).unwrap();
        assert_eq!(config.representation, Representation::Complex);
        assert_eq!(config.scaling, TimeScaling::Marti);
        assert!(config.remove_m0);
        assert_eq!(config.prandtl, 0.5);
    }

    #[test]
    fn test_read_from_file_uses_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shell_a.cfg");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(ADAPTIVE.as_bytes()).unwrap();
        let config = RunConfig::read(&path).unwrap();
        assert_eq!(config.name, "shell_a");
        let root = Path::new("/run");
        assert_eq!(config.checkpoint_dir(root), Path::new("/run/data_shell_a"));
        assert_eq!(
            config.series_path(root),
            Path::new("/run/shell_a_marti_conv.dat")
        );
        assert_eq!(
            config.frames_dir(root),
            Path::new("/run/frames/frames_shell_a")
        );
    }

    #[test]
    fn test_read_missing_file() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("missing");
        assert!(matches!(RunConfig::read(&path), Err(ConfigError::IoError(_))));
    }
}
