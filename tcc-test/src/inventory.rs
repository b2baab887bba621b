use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tcc_common::{TransactionContext, TransactionXid, TryError};
use tcc_interceptor::{
    Compensable, CompensableInterceptor, InterceptorConfig, MethodCall, Propagation,
};
use tcc_transaction::{
    Invocation, ManagerConfig, MemoryTransactionRepository, Participant, TccTxnManager,
    TransactionManager, TransactionRegistry, TransactionResult,
};

use crate::network::{Network, Request, Service};
use crate::service_error;

pub const INVENTORY: &str = "inventory";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationState {
    Reserved,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub sku: String,
    pub quantity: u32,
    pub state: ReservationState,
}

#[derive(Debug, Deserialize)]
struct ReserveArgs {
    sku: String,
    quantity: u32,
}

/// Keeps stock levels and reserves stock for orders.
///
/// `reserve` is a compensable participant method. A reservation takes the stock out of the
/// available level in the Try phase; confirming it keeps it taken, cancelling it puts it back.
pub struct InventoryService {
    repository: Arc<MemoryTransactionRepository>,
    interceptor: CompensableInterceptor<TccTxnManager>,
    stock: Mutex<HashMap<String, u32>>,
    /// Reservations keyed by the xid of the branch that made them.
    reservations: Mutex<HashMap<TransactionXid, Reservation>>,
}

impl InventoryService {
    pub fn new<'a>(
        network: &Arc<Network>,
        stock: impl IntoIterator<Item = (&'a str, u32)>,
    ) -> TransactionResult<Arc<Self>> {
        let repository = Arc::new(MemoryTransactionRepository::new());
        let manager = TccTxnManager::new(
            repository.clone(),
            network.clone(),
            &ManagerConfig::default(),
        )?;
        let service = Arc::new(Self {
            repository,
            interceptor: CompensableInterceptor::new(
                Arc::new(manager),
                InterceptorConfig::default(),
            ),
            stock: Mutex::new(
                stock
                    .into_iter()
                    .map(|(sku, level)| (sku.to_owned(), level))
                    .collect(),
            ),
            reservations: Mutex::new(HashMap::new()),
        });
        network.bind(INVENTORY, &service);
        Ok(service)
    }

    #[inline]
    pub fn repository(&self) -> &Arc<MemoryTransactionRepository> {
        &self.repository
    }

    pub fn available(&self, sku: &str) -> u32 {
        self.stock.lock().get(sku).copied().unwrap_or_default()
    }

    /// Returns every reservation with the xid of the branch that made it.
    pub fn reservations(&self) -> Vec<(TransactionXid, Reservation)> {
        self.reservations
            .lock()
            .iter()
            .map(|(xid, reservation)| (*xid, reservation.clone()))
            .collect()
    }

    fn reserve(
        &self,
        registry: &mut TransactionRegistry,
        context: Option<TransactionContext>,
        args: Value,
    ) -> Result<Value, TryError> {
        let mut call = MethodCall::new("reserve", |registry: &mut TransactionRegistry| {
            self.try_reserve(registry, &args)
        })
        .with_compensable(Compensable::new().with_propagation(Propagation::Mandatory))
        .with_context(context);
        self.interceptor
            .intercept(registry, &mut call)
            .map_err(service_error)
    }

    fn try_reserve(
        &self,
        registry: &mut TransactionRegistry,
        args: &Value,
    ) -> Result<Value, TryError> {
        let ReserveArgs { sku, quantity } = serde_json::from_value(args.clone())
            .map_err(|e| TryError::business(format!("invalid reserve arguments: {e}")))?;
        let xid = registry
            .current()
            .map(|transaction| transaction.lock().xid())
            .ok_or_else(|| TryError::business("reserve called outside a transaction"))?;

        // Enlisted before taking stock so a cancel always follows a partial Try.
        let participant = Participant::new(
            xid,
            Invocation::new(INVENTORY, "confirm_reserve", args.clone()),
            Invocation::new(INVENTORY, "cancel_reserve", args.clone()),
        );
        self.interceptor
            .manager()
            .enlist_participant(registry, participant)
            .map_err(|e| TryError::business(e.to_string()))?;

        {
            let mut stock = self.stock.lock();
            let available = stock.entry(sku.clone()).or_default();
            if *available < quantity {
                return Err(TryError::business(format!(
                    "{sku} is out of stock: {quantity} requested, {available} available"
                )));
            }
            *available -= quantity;
        }
        self.reservations.lock().insert(
            xid,
            Reservation {
                sku,
                quantity,
                state: ReservationState::Reserved,
            },
        );
        tracing::debug!(%xid, quantity, "stock reserved");
        Ok(Value::Null)
    }

    /// Moves the reservation of the branch in `context` out of `Reserved`.
    ///
    /// Settling a reservation that does not exist or is already settled does nothing.
    fn settle(
        &self,
        context: Option<TransactionContext>,
        state: ReservationState,
    ) -> Result<Value, TryError> {
        let context =
            context.ok_or_else(|| TryError::business("settle called without a context"))?;
        let mut reservations = self.reservations.lock();
        let Some(reservation) = reservations.get_mut(&context.xid()) else {
            return Ok(Value::Null);
        };
        if reservation.state != ReservationState::Reserved {
            return Ok(Value::Null);
        }
        reservation.state = state;
        if state == ReservationState::Cancelled {
            *self
                .stock
                .lock()
                .entry(reservation.sku.clone())
                .or_default() += reservation.quantity;
        }
        Ok(Value::Null)
    }
}

impl Service for InventoryService {
    fn handle(
        &self,
        registry: &mut TransactionRegistry,
        request: Request,
    ) -> Result<Value, TryError> {
        match request.method.as_str() {
            "reserve" => self.reserve(registry, request.context, request.args),
            "confirm_reserve" => self.settle(request.context, ReservationState::Confirmed),
            "cancel_reserve" => self.settle(request.context, ReservationState::Cancelled),
            method => Err(TryError::business(format!(
                "unknown method {INVENTORY}.{method}"
            ))),
        }
    }
}
