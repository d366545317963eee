//! creditrisk-classifiers: training pipeline for credit-card default prediction.
//!
//! The crate covers the whole offline flow: reading the (zip-compressed) CSV
//! tables, cleaning and splitting them, a scikit-learn style pipeline of
//! one-hot encoding, scaling, ANOVA-F feature selection, PCA and an MLP
//! classifier, stratified grid search, model persistence, evaluation metrics
//! and the JSON-lines/HTML reports.
pub mod config;
pub mod data_handling;
pub mod decomposition;
pub mod error;
pub mod feature_selection;
pub mod io;
pub mod metrics;
pub mod model_selection;
pub mod models;
pub mod persistence;
pub mod pipeline;
pub mod preprocessing;
pub mod report;
pub mod tracking;
