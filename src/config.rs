use std::path::Path;

use anyhow::{Context, Result};
use clap_serde_derive::ClapSerde;

pub const DEFAULT_CONFIG_FILE: &str = "ExerciseClassifier.toml";

#[derive(ClapSerde, Debug)]
pub struct Config {
    /// The address the listener binds to
    #[default("0.0.0.0".to_string())]
    #[arg(short, long, env)]
    pub(crate) address: String,

    /// The port the listener binds to
    #[default(8000)]
    #[arg(short, long, env)]
    pub(crate) port: u16,

    /// Path to the safetensors file holding the classifier weights
    #[default("models/exercise_classifier.safetensors".to_string())]
    #[arg(short, long, env)]
    pub(crate) model_path: String,
}

impl Config {
    /// Builds the effective configuration: defaults, then the TOML file, then CLI/env options.
    ///
    /// Only the default config file may be absent.
    pub fn load(config_file: &str, cli: &mut <Config as ClapSerde>::Opt) -> Result<Self> {
        if config_file == DEFAULT_CONFIG_FILE && !Path::new(config_file).exists() {
            return Ok(Config::from(cli));
        }
        let file = Config::opt_from_toml(config_file)?;
        Ok(Config::from(file).merge(cli))
    }

    /// Reads the options present in a TOML file, leaving absent keys unset.
    pub fn opt_from_toml(path: &str) -> Result<<Config as ClapSerde>::Opt> {
        let str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {path}"))?;
        let opt = toml::from_str(&str)
            .with_context(|| format!("Failed to parse configuration file {path}"))?;
        Ok(opt)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct CliArgs {
        #[command(flatten)]
        opt: <Config as ClapSerde>::Opt,
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.address, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.model_path, "models/exercise_classifier.safetensors");
    }

    #[test]
    fn toml_overrides_only_present_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 9100").unwrap();
        writeln!(file, "model_path = \"/srv/model.safetensors\"").unwrap();

        let opt = Config::opt_from_toml(file.path().to_str().unwrap()).unwrap();
        let config = Config::from(opt);
        assert_eq!(config.address, "0.0.0.0");
        assert_eq!(config.port, 9100);
        assert_eq!(config.model_path, "/srv/model.safetensors");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(Config::opt_from_toml(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();
        assert!(Config::opt_from_toml(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn cli_overrides_file_which_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 9100").unwrap();
        writeln!(file, "model_path = \"/srv/model.safetensors\"").unwrap();
        let mut cli = CliArgs::parse_from(["exercise_classifier", "--port", "9200"]).opt;

        let config = Config::load(file.path().to_str().unwrap(), &mut cli).unwrap();
        assert_eq!(config.port, 9200);
        assert_eq!(config.model_path, "/srv/model.safetensors");
        assert_eq!(config.address, "0.0.0.0");
    }

    #[test]
    fn explicit_missing_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let mut cli = CliArgs::parse_from(["exercise_classifier"]).opt;
        assert!(Config::load(path.to_str().unwrap(), &mut cli).is_err());
    }
}
