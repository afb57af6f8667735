//! Terminal rendering of the page capability and the interactive prompts.

use std::io::{self, BufRead, Write};

use predict_portal_core::auth::PasswordPrompter;
use predict_portal_core::models::PredictionDisplay;
use predict_portal_core::page::{Page, ENTRY_PAGE, PREDICT_PAGE};
use tracing::debug;

/// Prints notices and results to stdout. Navigation becomes a hint for the
/// command to run next.
pub struct TerminalPage;

impl Page for TerminalPage {
    fn alert(&self, message: &str) {
        println!("{}", message);
    }

    fn navigate(&self, location: &str) {
        match location {
            ENTRY_PAGE => println!("Sign in with: predict-portal signin --email <email>"),
            PREDICT_PAGE => println!("Submit with: predict-portal predict <v1> <v2> <v3> <v4> | batch <file>"),
            other => println!("Continue at {}", other),
        }
    }

    fn reveal_content(&self) {
        debug!("Gated content available");
    }

    fn set_processing(&self, visible: bool) {
        if visible {
            eprint!("Processing...");
        } else {
            eprintln!();
        }
        let _ = io::stderr().flush();
    }

    fn show_prediction(&self, prediction: &PredictionDisplay) {
        println!("Probability: {}", prediction.pred_proba);
        println!("{} ({})", prediction.report(), prediction.outcome);
    }

    fn show_download_link(&self, link: &str) {
        println!("Download your results: {}", link);
    }
}

/// Reads passwords without echo and the verification code from stdin.
/// A read error or end of input counts as cancelling the prompt.
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn read_line(prompt: &str) -> Option<String> {
        print!("{}", prompt);
        io::stdout().flush().ok()?;
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

impl PasswordPrompter for TerminalPrompter {
    fn new_password(&self) -> Option<String> {
        rpassword::prompt_password("Enter a new password: ").ok()
    }

    fn confirm_password(&self) -> Option<String> {
        rpassword::prompt_password("Confirm your new password: ").ok()
    }

    fn verification_code(&self) -> Option<String> {
        Self::read_line("Verification code: ")
    }
}
