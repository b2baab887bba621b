use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tcc_common::kind::TIMEOUT;
use tcc_common::{TransactionContext, TryError};
use tcc_transaction::{Invocation, Terminator, TerminatorError, TransactionRegistry};

/// A request as it travels between services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<TransactionContext>,
    pub args: Value,
}

/// A service reachable over the [`Network`].
pub trait Service: Send + Sync {
    /// Handles one inbound request. Every request starts a new call chain.
    fn handle(
        &self,
        registry: &mut TransactionRegistry,
        request: Request,
    ) -> Result<Value, TryError>;
}

/// Routes requests to services by name.
///
/// The network also acts as the [`Terminator`] of every manager in the deployment, delivering
/// confirm and cancel invocations the same way as any other request.
#[derive(Default)]
pub struct Network {
    services: RwLock<HashMap<String, Weak<dyn Service>>>,
    lost_responses: Mutex<HashSet<(String, String)>>,
    calls: Mutex<Vec<String>>,
}

impl Network {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn bind<S: Service + 'static>(&self, name: &str, service: &Arc<S>) {
        let service: Weak<dyn Service> = Arc::downgrade(service) as Weak<S>;
        self.services.write().insert(name.to_owned(), service);
    }

    /// Drops the response of the next call to `target.method` after it has been delivered.
    ///
    /// The caller observes a timeout without knowing whether the call took effect.
    pub fn lose_next_response(&self, target: &str, method: &str) {
        self.lost_responses
            .lock()
            .insert((target.to_owned(), method.to_owned()));
    }

    /// Returns the calls delivered so far and starts a new recording.
    pub fn take_calls(&self) -> String {
        std::mem::take(&mut *self.calls.lock()).join("\n")
    }

    pub fn call(
        &self,
        target: &str,
        method: &str,
        context: Option<TransactionContext>,
        args: Value,
    ) -> Result<Value, TryError> {
        let status = match context {
            Some(c) if c.is_mandatory() => format!("{} mandatory", c.status()),
            Some(c) => c.status().to_string(),
            None => "-".to_owned(),
        };
        self.calls.lock().push(format!("{target}.{method} {status}"));

        let service = self
            .services
            .read()
            .get(target)
            .and_then(Weak::upgrade)
            .ok_or_else(|| TryError::business(format!("service {target} is unreachable")))?;
        let payload = serde_json::to_string(&Request {
            method: method.to_owned(),
            context,
            args,
        })
        .map_err(|e| TryError::business(format!("malformed request: {e}")))?;
        tracing::debug!(%target, %payload, "delivering request");
        let request: Request = serde_json::from_str(&payload)
            .map_err(|e| TryError::business(format!("malformed request: {e}")))?;

        let response = service.handle(&mut TransactionRegistry::new(), request);
        if self
            .lost_responses
            .lock()
            .remove(&(target.to_owned(), method.to_owned()))
        {
            tracing::debug!(%target, %method, "response lost");
            return Err(TryError::new(&TIMEOUT, format!("{target}.{method} timed out")));
        }
        response
    }
}

impl Terminator for Network {
    fn invoke(
        &self,
        context: &TransactionContext,
        invocation: &Invocation,
    ) -> Result<(), TerminatorError> {
        self.call(
            invocation.target(),
            invocation.method(),
            Some(*context),
            invocation.args().clone(),
        )?;
        Ok(())
    }
}
