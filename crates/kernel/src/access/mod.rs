//! Access control: principals, permission expressions, capabilities and
//! the request gate.

pub mod builtin;
pub mod capability;
pub mod condition;
pub mod evaluator;
pub mod expression;
pub mod gate;
pub mod principal;

pub use capability::{Capability, CapabilityRegistry};
pub use condition::ItemConditions;
pub use evaluator::{AccessError, ConditionEvaluator};
pub use expression::{AuthRequirement, ExpressionError, PermissionExpression};
pub use gate::{AccessControlGate, GateDecision, ViewRequirements};
pub use principal::{Principal, PrincipalSummary};
