//! The presentation capability the flows render through.
//!
//! A `Page` is whatever shows notices and results to the user: a terminal in
//! the CLI, a recording double in tests.

use crate::models::PredictionDisplay;

/// Sign-in entry location
pub const ENTRY_PAGE: &str = "index.html";

/// Gated prediction location
pub const PREDICT_PAGE: &str = "predict.html";

pub trait Page: Send + Sync {
    /// Blocking notice.
    fn alert(&self, message: &str);

    /// Leave the current page for `location`.
    fn navigate(&self, location: &str);

    /// Show content that is hidden until the user is known to be signed in.
    fn reveal_content(&self);

    /// Show or hide the batch "Processing..." indicator.
    fn set_processing(&self, visible: bool);

    fn show_prediction(&self, prediction: &PredictionDisplay);

    fn show_download_link(&self, link: &str);
}
