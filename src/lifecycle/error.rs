//! Order lifecycle error types

use crate::types::OrderId;
use std::fmt;

/// Errors raised by the order-lifecycle tracker.
///
/// Construction failures mean the connector handed over a malformed
/// request/trade and should reject the inbound message. `ChainCorrupt`
/// is different: it means the recorded chain contradicts itself, and per
/// the corruption-is-worse-than-downtime policy it is always raised,
/// never silently absorbed.
#[derive(Debug)]
#[non_exhaustive]
pub enum OrderError {
    /// Malformed constructor arguments.
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// A request id failed the strictly-increasing / orig-id rules.
    BadRequestId {
        /// The offending request id.
        id: OrderId,
        /// The orig (target) id it was checked against.
        orig_id: OrderId,
    },

    /// The request chain of an order contradicts itself (e.g. a
    /// backward terminal walk found neither a fill nor a cancel and the
    /// first request did not fail, or the chain holds no placement-like
    /// request at all).
    ChainCorrupt {
        /// Id of the affected order.
        order_id: OrderId,
        /// Description of the contradiction.
        message: String,
    },
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderError::InvalidArgument { message } => {
                write!(f, "invalid argument: {message}")
            }
            OrderError::BadRequestId { id, orig_id } => {
                write!(f, "bad request id {id} (orig id {orig_id})")
            }
            OrderError::ChainCorrupt { order_id, message } => {
                write!(f, "order {order_id}: request chain corrupt: {message}")
            }
        }
    }
}

impl std::error::Error for OrderError {}
