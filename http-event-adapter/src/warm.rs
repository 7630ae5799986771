use crate::error::{AdapterError, Result};
use std::fmt::Display;
use std::future::Future;
use tokio::sync::OnceCell;
use tracing::{error, info};

/// Holds the application for the lifetime of the process.
///
/// Lambda keeps a process warm between invocations and sends them one at a time,
/// so the application is initialized by the first invocation and reused by the following ones.
/// There is no teardown: the state goes away with the process.
#[derive(Debug)]
pub struct WarmState<A> {
    app: OnceCell<A>,
}

impl<A> Default for WarmState<A> {
    fn default() -> Self {
        Self { app: OnceCell::new() }
    }
}

impl<A> WarmState<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored application or runs `factory` to create it.
    /// A failed `factory` is reported to the caller and nothing is stored,
    /// so the next invocation runs `factory` again.
    pub async fn get_or_init<F, Fut, E>(&self, factory: F) -> Result<&A>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<A, E>>,
        E: Display,
    {
        self.app
            .get_or_try_init(move || async move {
                info!("Initializing the application");
                factory().await.map_err(|e| {
                    error!("Application initialization failed: {e}");
                    AdapterError::ApplicationInitializationError(e.to_string())
                })
            })
            .await
    }

    /// The application, if it was initialized.
    pub fn get(&self) -> Option<&A> {
        self.app.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.app.initialized()
    }
}
