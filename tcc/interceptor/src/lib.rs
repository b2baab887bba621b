//! The coordination core of the TCC transaction manager.
//!
//! [`CompensableInterceptor`] wraps every call to a compensable method. It resolves whether the
//! call is the root of a transaction, a participant reached through a propagated context, or an
//! uninvolved call, and sequences the [`TransactionManager`] operations around the business
//! logic accordingly.
//!
//! [`TransactionManager`]: tcc_transaction::TransactionManager

pub mod compensable;
pub mod config;
pub mod delay_cancel;
pub mod error;
mod frame;
pub mod interceptor;
pub mod method;

pub use compensable::{Compensable, Propagation};
pub use config::InterceptorConfig;
pub use delay_cancel::is_delay_cancel_error;
pub use error::{Error, InterceptResult};
pub use interceptor::CompensableInterceptor;
pub use method::{MethodCall, MethodContext, MethodRole};
