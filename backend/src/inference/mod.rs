pub mod config;
pub mod decode;
pub mod model;
pub mod predictor;
pub mod preprocess;
pub mod screening;
