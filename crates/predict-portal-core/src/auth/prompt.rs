use tracing::warn;

use crate::page::Page;

/// How many times the user may mistype the confirmation of a new password.
pub const MAX_PASSWORD_ATTEMPTS: usize = 3;

/// Interactive input needed by the forced password change and the password
/// reset flows. `None` means the user cancelled the prompt.
pub trait PasswordPrompter: Send + Sync {
    fn new_password(&self) -> Option<String>;

    fn confirm_password(&self) -> Option<String>;

    fn verification_code(&self) -> Option<String>;
}

/// Ask for a new password and its confirmation until they match, at most
/// `MAX_PASSWORD_ATTEMPTS` times.
pub fn enter_confirm_password(prompter: &dyn PasswordPrompter, page: &dyn Page) -> Option<String> {
    for _ in 0..MAX_PASSWORD_ATTEMPTS {
        let new_password = prompter.new_password()?;
        let confirm_password = prompter.confirm_password()?;
        if new_password == confirm_password {
            return Some(new_password);
        }
        page.alert("Passwords do not match. Please try again.");
    }

    warn!(attempts = MAX_PASSWORD_ATTEMPTS, "New password was never confirmed");
    page.alert(&format!(
        "You have failed to enter the correct password after {} attempts. Please try again later.",
        MAX_PASSWORD_ATTEMPTS
    ));
    None
}
