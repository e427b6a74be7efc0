//! Configuration for the racing API.

use serde::{Deserialize, Serialize};

use crate::ranking::SelectionMode;
use crate::strategy::StrategyKind;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/racing.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// How winners are picked from each race
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    #[default]
    TopN,
    Threshold,
}

/// Ranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default)]
    pub selection: SelectionKind,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_max_age")]
    pub max_age: u32,
    /// Furlongs
    #[serde(default = "default_max_distance_gap")]
    pub max_distance_gap: f64,
    #[serde(default)]
    pub race_year_blacklist: Vec<i32>,
    #[serde(default)]
    pub position_blacklist: Vec<String>,
    #[serde(default)]
    pub age_blacklist: Vec<u32>,
    #[serde(default = "default_excluded_race_link_term")]
    pub excluded_race_link_term: String,
}

fn default_top_n() -> usize {
    1
}

fn default_min_score() -> f64 {
    300.0
}

fn default_max_age() -> u32 {
    8
}

fn default_max_distance_gap() -> f64 {
    1.0
}

fn default_excluded_race_link_term() -> String {
    "handicap".to_string()
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            selection: SelectionKind::default(),
            top_n: default_top_n(),
            min_score: default_min_score(),
            max_age: default_max_age(),
            max_distance_gap: default_max_distance_gap(),
            race_year_blacklist: Vec::new(),
            position_blacklist: Vec::new(),
            age_blacklist: Vec::new(),
            excluded_race_link_term: default_excluded_race_link_term(),
        }
    }
}

impl RankingConfig {
    pub fn selection_mode(&self) -> SelectionMode {
        match self.selection {
            SelectionKind::TopN => SelectionMode::TopN(self.top_n.max(1)),
            SelectionKind::Threshold => SelectionMode::Threshold(self.min_score),
        }
    }
}

/// Monte Carlo configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_num_simulations")]
    pub num_simulations: usize,
    /// Fixed seed; wall clock when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_num_simulations() -> usize {
    crate::simulation::DEFAULT_NUM_SIMULATIONS
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_simulations: default_num_simulations(),
            seed: None,
        }
    }
}

/// Result scraper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: f64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://form.example.com".to_string()
}

fn default_requests_per_minute() -> u32 {
    30
}

fn default_min_delay_secs() -> f64 {
    0.5
}

fn default_max_delay_secs() -> f64 {
    1.5
}

fn default_timeout_secs() -> u64 {
    20
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            requests_per_minute: default_requests_per_minute(),
            min_delay_secs: default_min_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(Self::environment())
    }

    /// Environment variables such as RACING_SERVER__PORT or RACING_RANKING__TOP_N
    fn environment() -> config::Environment {
        config::Environment::with_prefix("RACING")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with(environment: config::Environment) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            .add_source(environment)
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
