use std::time::Duration;

/// Seconds a bounded wait is allowed to run before the item is skipped.
pub const DEFAULT_WAIT_SECS: u64 = 7;

/// Login form selectors. The portal's sign-in form uses fixed ids, so
/// these never vary per deployment.
pub const LOGIN_FORM_SELECTOR: &str = "form#new_user";
pub const LOGIN_EMAIL_SELECTOR: &str = "#user_email";
pub const LOGIN_PASSWORD_SELECTOR: &str = "#user_password";
pub const LOGIN_REMEMBER_ME_SELECTOR: &str = "#user_remember_me";
pub const LOGIN_SUBMIT_SELECTOR: &str = "[name=commit]";

/// Local page used to seed the browser when it exists, instead of
/// hitting the portal home over the network.
pub const OFFLINE_SEED_PAGE: &str = "index.html";

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Read credentials from the `email`/`password` environment
    /// variables. Absence is a usage error; callers report it before
    /// any browser or network activity starts.
    pub fn from_env() -> anyhow::Result<Self> {
        let email = std::env::var("email").ok().filter(|v| !v.is_empty());
        let password = std::env::var("password").ok().filter(|v| !v.is_empty());

        match (email, password) {
            (Some(email), Some(password)) => Ok(Self { email, password }),
            _ => anyhow::bail!(
                "missing credentials: set the `email` and `password` environment variables"
            ),
        }
    }
}

/// Delay after navigation before the rendered markup is scraped, giving
/// dynamic content time to settle. Kept at a third of the wait budget.
pub fn settle_delay(wait: Duration) -> Duration {
    wait / 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_delay_is_a_third_of_the_wait_budget() {
        assert_eq!(settle_delay(Duration::from_secs(9)), Duration::from_secs(3));
        assert!(settle_delay(Duration::from_secs(DEFAULT_WAIT_SECS)) < Duration::from_secs(3));
    }
}
