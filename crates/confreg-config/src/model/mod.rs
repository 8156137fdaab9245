pub mod config;

pub use config::{
    ConfigurationGroup, Configuration, LabeledConfiguration, Labels, Parameters, Versioned,
    describe,
};
