//! Feature selection utilities.
//!
//! This module contains univariate selection routines (a la scikit-learn)
//! for scoring and ranking features against a class label with the ANOVA
//! F-statistic.
pub mod univariate_selection;
