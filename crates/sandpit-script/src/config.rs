//! Interpreter capability settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Language features and resource limits granted to every script.
///
/// Built once at process start and shared read-only (behind an `Arc` inside
/// [`crate::Interpreter`]); there is no per-request override.
///
/// # Security Model
///
/// - **Features**: each `allow_*` flag enables a piece of grammar. Disabled
///   features are rejected at parse time.
/// - **Limits**: every `max_*` value caps a resource. `0` means unlimited,
///   matching the interpreter's own convention.
/// - **Time**: `timeout` bounds wall-clock execution so a runaway script
///   cannot hold the execution slot forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// `loop`, `while`, `do` and `for` statements.
    pub allow_looping: bool,
    /// Anonymous functions and closures (`|x| x + 1`).
    pub allow_anonymous_fn: bool,
    /// Re-declaring a variable that already exists in scope.
    pub allow_shadowing: bool,
    /// `if` used as an expression.
    pub allow_if_expression: bool,
    /// `switch` used as an expression.
    pub allow_switch_expression: bool,
    /// Statement blocks used as expressions.
    pub allow_statement_expression: bool,
    /// Reject use of undeclared variables at compile time.
    pub strict_variables: bool,
    /// Maximum function call nesting (bounds recursion).
    pub max_call_levels: usize,
    /// Maximum number of operations per run.
    pub max_operations: u64,
    /// Maximum expression nesting at global level.
    pub max_expr_depth: usize,
    /// Maximum expression nesting inside functions.
    pub max_function_expr_depth: usize,
    /// Maximum string length.
    pub max_string_size: usize,
    /// Maximum array length.
    pub max_array_size: usize,
    /// Maximum object map size.
    pub max_map_size: usize,
    /// Wall-clock limit per run, in (possibly fractional) seconds. `0`
    /// disables it.
    #[serde(with = "duration_secs", alias = "timeout_secs")]
    pub timeout: Duration,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            allow_looping: true,
            allow_anonymous_fn: true,
            allow_shadowing: true,
            allow_if_expression: true,
            allow_switch_expression: true,
            allow_statement_expression: true,
            strict_variables: false,
            max_call_levels: 64,
            max_operations: 10_000_000,
            max_expr_depth: 64,
            max_function_expr_depth: 32,
            max_string_size: 1024 * 1024,
            max_array_size: 100_000,
            max_map_size: 100_000,
            timeout: Duration::from_secs(10),
        }
    }
}

impl Capabilities {
    /// Create capabilities with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// A locked-down profile: no loops, no lambdas, no shadowing.
    pub fn restricted() -> Self {
        Self {
            allow_looping: false,
            allow_anonymous_fn: false,
            allow_shadowing: false,
            strict_variables: true,
            max_call_levels: 16,
            max_operations: 100_000,
            timeout: Duration::from_secs(2),
            ..Self::default()
        }
    }

    /// Enable or disable loops.
    pub fn with_looping(mut self, allow: bool) -> Self {
        self.allow_looping = allow;
        self
    }

    /// Enable or disable anonymous functions.
    pub fn with_anonymous_fn(mut self, allow: bool) -> Self {
        self.allow_anonymous_fn = allow;
        self
    }

    /// Enable or disable variable shadowing.
    pub fn with_shadowing(mut self, allow: bool) -> Self {
        self.allow_shadowing = allow;
        self
    }

    /// Enable or disable strict variable checking.
    pub fn with_strict_variables(mut self, strict: bool) -> Self {
        self.strict_variables = strict;
        self
    }

    /// Set the maximum call depth.
    pub fn with_max_call_levels(mut self, levels: usize) -> Self {
        self.max_call_levels = levels;
        self
    }

    /// Set the operation budget.
    pub fn with_max_operations(mut self, ops: u64) -> Self {
        self.max_operations = ops;
        self
    }

    /// Set the wall-clock limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        if d.subsec_nanos() == 0 {
            s.serialize_u64(d.as_secs())
        } else {
            s.serialize_f64(d.as_secs_f64())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(|e| D::Error::custom(format!("timeout: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capabilities() {
        let caps = Capabilities::default();
        assert!(caps.allow_looping);
        assert!(caps.allow_anonymous_fn);
        assert!(!caps.strict_variables);
        assert_eq!(caps.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_restricted_profile() {
        let caps = Capabilities::restricted();
        assert!(!caps.allow_looping);
        assert!(!caps.allow_anonymous_fn);
        assert!(caps.strict_variables);
        // untouched fields keep their defaults
        assert!(caps.allow_if_expression);
    }

    #[test]
    fn test_builder_pattern() {
        let caps = Capabilities::new()
            .with_looping(false)
            .with_max_operations(500)
            .with_timeout(Duration::from_millis(250));

        assert!(!caps.allow_looping);
        assert_eq!(caps.max_operations, 500);
        assert_eq!(caps.timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_serde_timeout_in_seconds() {
        let caps: Capabilities = serde_json::from_str(r#"{"timeout": 3}"#).unwrap();
        assert_eq!(caps.timeout, Duration::from_secs(3));
        assert!(caps.allow_looping);
    }

    #[test]
    fn test_sub_second_timeout_survives_serde() {
        let caps = Capabilities::new().with_timeout(Duration::from_millis(250));
        let json = serde_json::to_string(&caps).unwrap();
        let back: Capabilities = serde_json::from_str(&json).unwrap();
        assert_eq!(back.timeout, Duration::from_millis(250));

        let whole: Capabilities = serde_json::from_str(r#"{"timeout": 1.5}"#).unwrap();
        assert_eq!(whole.timeout, Duration::from_millis(1500));
        assert!(serde_json::from_str::<Capabilities>(r#"{"timeout": -1}"#).is_err());
    }
}
