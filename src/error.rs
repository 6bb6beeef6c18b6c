//! Error types used by the flowkit components.
//!
//! Each component surfaces exactly one error per call and owns its own enum:
//!
//! - [`BrokerError`]: publish/subscribe refusals.
//! - [`BreakerError`]: circuit breaker rejections, or the wrapped operation's own error.
//! - [`CronError`]: scheduler refusals and schedule parsing failures.
//! - [`BalancerError`]: P2C lookups on empty sets or unknown nodes.
//!
//! Every enum provides `as_label()`, a short stable snake_case label for logs and
//! metrics. Compare errors by variant (`matches!`), never by message text.

use thiserror::Error;

/// # Errors produced by the [`Broker`](crate::Broker).
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker has been stopped; the operation was refused.
    #[error("broker stopped")]
    Stopped,

    /// Publish to a topic with no current subscribers.
    #[error("no such topic")]
    NoSuchTopic,
}

impl BrokerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use flowkit::BrokerError;
    ///
    /// assert_eq!(BrokerError::NoSuchTopic.as_label(), "broker_no_such_topic");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BrokerError::Stopped => "broker_stopped",
            BrokerError::NoSuchTopic => "broker_no_such_topic",
        }
    }
}

/// # Errors produced by [`CircuitBreaker::execute`](crate::CircuitBreaker::execute).
///
/// `E` is the error type of the wrapped operation. It is carried unchanged in
/// [`BreakerError::Operation`] and also drives the breaker's counters.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// The breaker is open; the operation was not run.
    #[error("circuit breaker is open")]
    OpenNow,

    /// The breaker is half-open and its trial budget is used up.
    #[error("circuit breaker is half-open and saturated")]
    HalfOpenSaturated,

    /// The operation ran and returned an error.
    #[error("operation failed: {0}")]
    Operation(E),
}

impl<E> BreakerError<E> {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BreakerError::OpenNow => "breaker_open_now",
            BreakerError::HalfOpenSaturated => "breaker_half_open_saturated",
            BreakerError::Operation(_) => "breaker_operation_failed",
        }
    }

    /// True if the breaker refused to run the operation.
    pub fn is_rejected(&self) -> bool {
        matches!(self, BreakerError::OpenNow | BreakerError::HalfOpenSaturated)
    }

    /// Returns the operation's own error, if that is what this is.
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// # Errors produced by the [`Cron`](crate::Cron) scheduler.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CronError {
    /// The scheduler has been stopped; no more jobs are accepted.
    #[error("cron scheduler stopped")]
    Stopped,

    /// A cron expression could not be parsed.
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidExpression {
        /// The rejected expression.
        expr: String,
        /// Parser diagnostic.
        reason: String,
    },
}

impl CronError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CronError::Stopped => "cron_stopped",
            CronError::InvalidExpression { .. } => "cron_invalid_expression",
        }
    }
}

/// # Errors produced by the [`P2c`](crate::P2c) balancer.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalancerError {
    /// Pick requested on a balancer with no nodes.
    #[error("no nodes available")]
    NoNodes,

    /// The addressed node is not a member of the balancer.
    #[error("node does not exist: {0}")]
    NodeNotExist(String),
}

impl BalancerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use flowkit::BalancerError;
    ///
    /// let err = BalancerError::NodeNotExist("10.0.0.1:80".into());
    /// assert_eq!(err.as_label(), "balancer_node_not_exist");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BalancerError::NoNodes => "balancer_no_nodes",
            BalancerError::NodeNotExist(_) => "balancer_node_not_exist",
        }
    }
}
