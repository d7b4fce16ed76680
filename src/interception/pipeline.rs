// src/interception/pipeline.rs
//! In-process interceptor host
//!
//! Sessions register their interceptor here on activation and remove it on
//! deactivation; the proxy dispatches each request and response through
//! whatever is registered at that moment.

use crate::interception::interceptor::{HttpMessage, Interceptor};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Registration points exposed by the host pipeline
pub trait InterceptorHost: Send + Sync {
    fn register_interceptor(&self, interceptor: Arc<dyn Interceptor>);

    fn unregister_interceptor(&self, interceptor: &Arc<dyn Interceptor>);
}

fn same_interceptor(a: &Arc<dyn Interceptor>, b: &Arc<dyn Interceptor>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Dispatches messages to registered interceptors in registration order
#[derive(Default)]
pub struct InterceptorPipeline {
    interceptors: RwLock<Vec<Arc<dyn Interceptor>>>,
}

impl InterceptorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered interceptors
    pub fn len(&self) -> usize {
        self.interceptors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.read().is_empty()
    }

    /// Run every registered interceptor over one message
    pub fn dispatch(&self, is_request: bool, message: &mut HttpMessage) {
        let interceptors = self.interceptors.read().clone();
        for interceptor in interceptors {
            interceptor.process_message(is_request, message);
        }
    }
}

impl InterceptorHost for InterceptorPipeline {
    fn register_interceptor(&self, interceptor: Arc<dyn Interceptor>) {
        let mut interceptors = self.interceptors.write();
        if interceptors.iter().any(|i| same_interceptor(i, &interceptor)) {
            debug!("Interceptor {} already registered", interceptor.name());
            return;
        }
        info!("Registered interceptor {}", interceptor.name());
        interceptors.push(interceptor);
    }

    fn unregister_interceptor(&self, interceptor: &Arc<dyn Interceptor>) {
        let mut interceptors = self.interceptors.write();
        let before = interceptors.len();
        interceptors.retain(|i| !same_interceptor(i, interceptor));
        if interceptors.len() < before {
            info!("Removed interceptor {}", interceptor.name());
        }
    }
}
