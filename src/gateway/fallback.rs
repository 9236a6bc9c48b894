use log::warn;
use std::fmt;
use std::future::Future;

/// Result of the first provider that produced a usable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Success<T> {
    pub index: usize,
    pub value: T,
}

/// Ordered list of interchangeable providers. `run` tries them in order and
/// stops at the first success; a failing provider never aborts the chain.
#[derive(Debug, Clone)]
pub struct FallbackChain<P> {
    providers: Vec<P>,
}

impl<P: Clone> FallbackChain<P> {
    pub fn new(providers: Vec<P>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &[P] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub async fn run<T, E, F, Fut>(&self, mut attempt: F) -> Option<Success<T>>
        where F: FnMut(P) -> Fut, Fut: Future<Output = Result<T, E>>, E: fmt::Display
    {
        let total = self.providers.len();
        for (index, provider) in self.providers.iter().cloned().enumerate() {
            match attempt(provider).await {
                Ok(value) => {
                    return Some(Success { index, value });
                }
                Err(e) => {
                    warn!("Attempt {}/{} failed: {}", index + 1, total, e);
                }
            }
        }
        None
    }
}
