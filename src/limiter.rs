use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Caps in-flight fetches both overall and per host.
#[derive(Debug)]
pub struct RequestLimiter {
    global: Arc<Semaphore>,
    per_domain: usize,
    domains: Mutex<HashMap<String, Arc<Semaphore>>>,
}

/// Both permits are released when this is dropped.
#[derive(Debug)]
pub struct RequestPermit {
    _domain: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

impl RequestLimiter {
    pub fn new(max_concurrent: usize, max_per_domain: usize) -> Self {
        Self {
            global: Arc::new(Semaphore::new(max_concurrent.max(1))),
            per_domain: max_per_domain.max(1),
            domains: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, url: &Url) -> Result<RequestPermit, AcquireError> {
        let domain = self.domain_semaphore(url.host_str().unwrap_or_default());
        // Host slot is always taken before the global slot.
        let domain = domain.acquire_owned().await?;
        let global = Arc::clone(&self.global).acquire_owned().await?;
        Ok(RequestPermit {
            _domain: domain,
            _global: global,
        })
    }

    pub fn available(&self) -> usize {
        self.global.available_permits()
    }

    fn domain_semaphore(&self, host: &str) -> Arc<Semaphore> {
        let mut domains = self.domains.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            domains
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.per_domain))),
        )
    }
}
