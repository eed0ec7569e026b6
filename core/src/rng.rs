//! Token generation for session tokens and API keys.
//!
//! All secrets come from a single PCG stream. Production seeds it from
//! OS entropy; tests seed it with a fixed value so issued keys are
//! reproducible run to run.

use rand::{distributions::Alphanumeric, Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub const SESSION_TOKEN_LEN: usize = 40;
pub const API_KEY_LEN: usize = 32;

pub struct TokenRng {
    inner: Pcg64Mcg,
}

impl TokenRng {
    pub fn from_entropy() -> Self {
        Self { inner: Pcg64Mcg::from_entropy() }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { inner: Pcg64Mcg::seed_from_u64(seed) }
    }

    fn alphanumeric(&mut self, len: usize) -> String {
        (&mut self.inner)
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    pub fn session_token(&mut self) -> String {
        format!("sess_{}", self.alphanumeric(SESSION_TOKEN_LEN))
    }

    /// An opaque API key: `<prefix><32 alphanumerics>`.
    pub fn api_key(&mut self, prefix: &str) -> String {
        format!("{prefix}{}", self.alphanumeric(API_KEY_LEN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_same_keys() {
        let mut a = TokenRng::seeded(7);
        let mut b = TokenRng::seeded(7);
        assert_eq!(a.api_key("sk_live_"), b.api_key("sk_live_"));
        assert_eq!(a.session_token(), b.session_token());
    }

    #[test]
    fn api_key_has_prefix_and_length() {
        let mut rng = TokenRng::seeded(99);
        let key = rng.api_key("sk_live_");
        assert!(key.starts_with("sk_live_"));
        assert_eq!(key.len(), "sk_live_".len() + API_KEY_LEN);
        assert!(key["sk_live_".len()..].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn successive_keys_differ() {
        let mut rng = TokenRng::seeded(1);
        assert_ne!(rng.api_key("k_"), rng.api_key("k_"));
    }
}
