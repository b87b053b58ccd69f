//! URL phishing detection
//!
//! Raw URLs are cleaned into a canonical form, shortened links are expanded
//! through a persistent cache, and the result is turned into a fixed-schema
//! feature vector for a classifier. The same [`pipeline::Pipeline`] serves
//! single-URL inference and batch preparation of training data.

pub mod api;
pub mod cache;
pub mod config;
pub mod features;
pub mod feedback;
pub mod link_resolver;
pub mod model;
pub mod pipeline;
pub mod suffix;
pub mod url_cleaner;
pub mod utils;

pub use features::{FeatureExtractor, FeatureVector, FEATURE_NAMES};
pub use link_resolver::LinkResolver;
pub use pipeline::Pipeline;
pub use url_cleaner::canonicalize;
