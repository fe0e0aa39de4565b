//! Defense services used by the pipeline stages.

pub mod audit_log;
pub mod bypass;
pub mod detectors;
pub mod rate_limiter;
pub mod rule_sets;
pub mod sanitizer;
pub mod suspects;
pub mod validator;

pub use audit_log::RequestAuditLog;
pub use bypass::{BypassPolicy, IpList, IpMatcher, IpParseError};
pub use detectors::{Detection, Detector, DetectorChain, SqlInjectionDetector, XssDetector};
pub use rate_limiter::{Decision, LimiterError, RateLimiterRegistry, ceil_secs};
pub use rule_sets::{RouteBinding, RouteMatch, RuleCatalog, UnknownRuleSet};
pub use sanitizer::{DepthExceeded, Sanitizer, sanitize_str};
pub use suspects::SuspectList;
pub use self::validator::{Constraint, FieldRule, Location, ValidationRuleSet};
