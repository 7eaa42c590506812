//! # Inference Module
//!
//! Client side of the external sign classifier. The model itself is a black box: a
//! window of landmark frames goes in, a probability per label comes out.
//!
//! ## Key Components:
//! - **Predictor**: trait seam between the pipeline and whatever serves predictions
//! - **HttpPredictor**: the production implementation talking JSON over HTTP

pub mod client;

pub use client::{HttpPredictor, Predictor};
