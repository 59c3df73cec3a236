use chemotaxis_common::Position;
use thiserror::Error;

use crate::node::NodeId;

/// Errors raised by the environment, reactions, and their actions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("{node} at {position} would overlap {other}")]
    Overlap {
        node: NodeId,
        position: Position,
        other: NodeId,
    },

    #[error("{0} is not part of the environment")]
    UnknownNode(NodeId),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{0} is not a cell")]
    NotACell(NodeId),

    #[error("concentration of {molecule} would become {value}")]
    NegativeConcentration { molecule: String, value: f64 },
}

pub type Result<T> = std::result::Result<T, SimError>;

impl SimError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        SimError::InvalidParameter(message.into())
    }
}
