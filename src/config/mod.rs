//! Task configuration: YAML file loading, defaults and environment expansion.

mod env_vars;
mod task_config;

pub use env_vars::{expand_env_vars, expand_with};

pub use task_config::{
    CopyTaskConfig,
    NumericInput,
    load_or_default,
};
