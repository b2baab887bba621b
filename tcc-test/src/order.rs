use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tcc_common::TryError;
use tcc_interceptor::{
    Compensable, CompensableInterceptor, InterceptResult, InterceptorConfig, MethodCall,
};
use tcc_transaction::{
    Invocation, ManagerConfig, MemoryTransactionRepository, Participant, TccTxnManager,
    TransactionManager, TransactionRegistry, TransactionResult,
};

use crate::inventory::INVENTORY;
use crate::network::{Network, Request, Service};

pub const ORDER: &str = "order";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub sku: String,
    pub quantity: u32,
    pub price: u32,
}

impl Order {
    pub fn new(id: impl Into<String>, sku: impl Into<String>, quantity: u32, price: u32) -> Self {
        Self {
            id: id.into(),
            sku: sku.into(),
            quantity,
            price,
        }
    }

    /// Returns the total price, or `None` if it does not fit in a `u32`.
    #[inline]
    pub fn amount(&self) -> Option<u32> {
        self.quantity.checked_mul(self.price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    Pending,
    Confirmed,
    Cancelled,
}

/// Places orders. Every order is the root of a transaction.
///
/// Placing an order records it as pending, enlists the order itself and the remote stock
/// reservation as participants, reserves the stock, and finally charges the order against the
/// service's credit limit.
pub struct OrderService {
    network: Arc<Network>,
    repository: Arc<MemoryTransactionRepository>,
    interceptor: CompensableInterceptor<TccTxnManager>,
    credit_limit: u32,
    orders: Mutex<HashMap<String, OrderState>>,
}

impl OrderService {
    pub fn new(
        network: &Arc<Network>,
        credit_limit: u32,
        config: InterceptorConfig,
    ) -> TransactionResult<Arc<Self>> {
        let repository = Arc::new(MemoryTransactionRepository::new());
        let manager = TccTxnManager::new(
            repository.clone(),
            network.clone(),
            &ManagerConfig::default(),
        )?;
        let service = Arc::new(Self {
            network: network.clone(),
            repository,
            interceptor: CompensableInterceptor::new(Arc::new(manager), config),
            credit_limit,
            orders: Mutex::new(HashMap::new()),
        });
        network.bind(ORDER, &service);
        Ok(service)
    }

    #[inline]
    pub fn repository(&self) -> &Arc<MemoryTransactionRepository> {
        &self.repository
    }

    pub fn order_state(&self, id: &str) -> Option<OrderState> {
        self.orders.lock().get(id).copied()
    }

    /// Places `order` as the root of a new transaction identified by the order id.
    pub fn place_order(&self, order: &Order, compensable: Compensable) -> InterceptResult<()> {
        let mut registry = TransactionRegistry::new();
        let mut call = MethodCall::new("place_order", |registry: &mut TransactionRegistry| {
            self.try_place_order(registry, order)
        })
        .with_compensable(compensable)
        .with_unique_identity(order.id.as_str());
        self.interceptor.intercept(&mut registry, &mut call)
    }

    fn try_place_order(
        &self,
        registry: &mut TransactionRegistry,
        order: &Order,
    ) -> Result<(), TryError> {
        let transaction = registry
            .current()
            .cloned()
            .ok_or_else(|| TryError::business("place_order called outside a transaction"))?;
        let (order_xid, reserve_xid) = {
            let mut transaction = transaction.lock();
            (transaction.next_branch_xid(), transaction.next_branch_xid())
        };
        let manager = self.interceptor.manager();

        self.orders
            .lock()
            .insert(order.id.clone(), OrderState::Pending);
        let order_args = json!({ "id": order.id });
        manager
            .enlist_participant(
                registry,
                Participant::new(
                    order_xid,
                    Invocation::new(ORDER, "confirm_order", order_args.clone()),
                    Invocation::new(ORDER, "cancel_order", order_args),
                ),
            )
            .map_err(|e| TryError::business(e.to_string()))?;

        let reserve_args = json!({ "sku": order.sku, "quantity": order.quantity });
        manager
            .enlist_participant(
                registry,
                Participant::new(
                    reserve_xid,
                    Invocation::new(INVENTORY, "reserve", reserve_args.clone()),
                    Invocation::new(INVENTORY, "reserve", reserve_args.clone()),
                ),
            )
            .map_err(|e| TryError::business(e.to_string()))?;

        // `reserve` refuses to run outside a transaction.
        let context = transaction.lock().context_for(reserve_xid).mandatory();
        self.network
            .call(INVENTORY, "reserve", Some(context), reserve_args)
            .map_err(|e| {
                TryError::business(format!("reserving stock for order {} failed", order.id))
                    .caused_by(e)
            })?;

        match order.amount() {
            Some(amount) if amount <= self.credit_limit => Ok(()),
            Some(amount) => Err(TryError::business(format!(
                "payment of {amount} for order {} declined",
                order.id
            ))),
            None => Err(TryError::business(format!(
                "payment for order {} declined: amount overflows",
                order.id
            ))),
        }
    }

    fn settle(&self, args: &Value, state: OrderState) -> Result<Value, TryError> {
        let id = args
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| TryError::business("order id missing"))?;
        let mut orders = self.orders.lock();
        if let Some(current) = orders
            .get_mut(id)
            .filter(|current| **current == OrderState::Pending)
        {
            *current = state;
        }
        Ok(Value::Null)
    }
}

impl Service for OrderService {
    fn handle(
        &self,
        _registry: &mut TransactionRegistry,
        request: Request,
    ) -> Result<Value, TryError> {
        match request.method.as_str() {
            "confirm_order" => self.settle(&request.args, OrderState::Confirmed),
            "cancel_order" => self.settle(&request.args, OrderState::Cancelled),
            method => Err(TryError::business(format!("unknown method {ORDER}.{method}"))),
        }
    }
}
