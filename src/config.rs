use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::handicap::HandicapModel;
use crate::optimizer::OptimizerConfig;
use crate::uncertainty::SigmaMethod;

const CACHE_DIR: &str = "bayrate";
const DB_FILE: &str = "ratings.sqlite";

pub const DEFAULT_IMPROBABLE_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub handicap_model: HandicapModel,
    pub sigma_method: SigmaMethod,
    pub optimizer: OptimizerConfig,
    /// Games whose winner had a seeded win probability below this are flagged.
    pub improbable_threshold: f64,
    /// Seed for the starting-point jitter, so reruns give the same ratings.
    pub jitter_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            handicap_model: HandicapModel::Flat,
            sigma_method: SigmaMethod::Integration,
            optimizer: OptimizerConfig::default(),
            improbable_threshold: DEFAULT_IMPROBABLE_THRESHOLD,
            jitter_seed: 0x6261_7972,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with any `BAYRATE_*` variables that parse.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(model) = opt_env("BAYRATE_HANDICAP_MODEL").and_then(|v| parse_handicap_model(&v)) {
            self.handicap_model = model;
        }
        if let Some(method) = opt_env("BAYRATE_SIGMA_METHOD").and_then(|v| parse_sigma_method(&v)) {
            self.sigma_method = method;
        }
        self.improbable_threshold =
            env_parse("BAYRATE_IMPROBABLE_THRESHOLD").unwrap_or(self.improbable_threshold);
        self.jitter_seed = env_parse("BAYRATE_JITTER_SEED").unwrap_or(self.jitter_seed);

        let opt = &mut self.optimizer;
        opt.gradient_tolerance = env_parse("BAYRATE_GRADIENT_TOL").unwrap_or(opt.gradient_tolerance);
        opt.gradient_max_iters = env_parse("BAYRATE_GRADIENT_MAX_ITERS").unwrap_or(opt.gradient_max_iters);
        opt.jitter = env_parse("BAYRATE_JITTER").unwrap_or(opt.jitter);
        opt.simplex_step = env_parse("BAYRATE_SIMPLEX_STEP").unwrap_or(opt.simplex_step);
        opt.simplex_tolerance = env_parse("BAYRATE_SIMPLEX_TOL").unwrap_or(opt.simplex_tolerance);
        opt.simplex_max_iters = env_parse("BAYRATE_SIMPLEX_MAX_ITERS").unwrap_or(opt.simplex_max_iters);
        self
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(&tmp, json).context("write config")?;
        fs::rename(&tmp, path).context("swap config")?;
        Ok(())
    }
}

pub fn parse_handicap_model(raw: &str) -> Option<HandicapModel> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "flat" => Some(HandicapModel::Flat),
        "fitted" => Some(HandicapModel::Fitted),
        _ => None,
    }
}

pub fn parse_sigma_method(raw: &str) -> Option<SigmaMethod> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "integration" | "integrate" => Some(SigmaMethod::Integration),
        "analytic" | "hessian" => Some(SigmaMethod::Analytic),
        _ => None,
    }
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Some(base) = opt_env("XDG_CACHE_HOME") {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = opt_env("HOME")?;
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

/// `BAYRATE_DB` if set, else `ratings.sqlite` in the cache dir.
pub fn default_db_path() -> Option<PathBuf> {
    if let Some(path) = opt_env("BAYRATE_DB") {
        return Some(PathBuf::from(path));
    }
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .and_then(|val| if val.trim().is_empty() { None } else { Some(val) })
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    opt_env(key).and_then(|val| val.trim().parse::<T>().ok())
}
