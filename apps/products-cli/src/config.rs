//! Configuration for the products CLI

use core_config::{Environment, FromEnv};
use database::cosmos::CosmosConfig;
use eyre::Result;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub cosmos: CosmosConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            environment: Environment::from_env(),
            cosmos: CosmosConfig::from_env()?,
        })
    }
}
