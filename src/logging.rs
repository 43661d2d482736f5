//! Structured logging utilities.
//!
//! Operation timing and structured logging helpers for tracking
//! initialization phases and operation performance during server startup
//! and runtime.

use std::time::Instant;

/// Operation timer for measuring and logging execution duration.
///
/// Logs the operation start on creation and the duration on finish.
///
/// # Examples
///
/// ```rust,ignore
/// use harbor_api::logging::OpTimer;
///
/// let timer = OpTimer::new("redis", "connection");
/// // ... perform operation ...
/// timer.finish();
/// ```
#[derive(Debug)]
pub struct OpTimer {
    /// Component being timed (e.g., "usage-store", "stream-registry").
    component: String,
    /// Operation being performed (e.g., "initialization", "connection").
    operation: String,
    /// Start time of the operation.
    start: Instant,
}

impl OpTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(component: impl Into<String>, operation: impl Into<String>) -> Self {
        let component = component.into();
        let operation = operation.into();

        tracing::debug!(
            component = %component,
            operation = %operation,
            "Operation started"
        );

        Self {
            component,
            operation,
            start: Instant::now(),
        }
    }

    /// Finishes the timer and logs the duration.
    pub fn finish(self) {
        let duration_ms = self.start.elapsed().as_millis();

        tracing::info!(
            component = %self.component,
            operation = %self.operation,
            duration_ms = duration_ms,
            "Operation completed"
        );
    }

    /// Finishes the timer with result-aware logging.
    ///
    /// Logs success or error based on the result, including error context
    /// when the operation fails.
    pub fn finish_with_result<T, E: std::fmt::Display>(self, result: Result<&T, &E>) {
        let duration_ms = self.start.elapsed().as_millis();

        match result {
            Ok(_) => {
                tracing::info!(
                    component = %self.component,
                    operation = %self.operation,
                    duration_ms = duration_ms,
                    "Operation completed successfully"
                );
            }
            Err(e) => {
                tracing::error!(
                    component = %self.component,
                    operation = %self.operation,
                    duration_ms = duration_ms,
                    error = %e,
                    "Operation failed"
                );
            }
        }
    }
}

/// Macro for logging initialization steps with consistent formatting.
///
/// # Examples
///
/// ```rust,ignore
/// log_init_step!(1, 6, "Session Resolver", "JWT enabled");
/// log_init_step!(2, 6, "Usage Store", "redis");
/// ```
#[macro_export]
macro_rules! log_init_step {
    ($step:expr, $total:expr, $name:expr, $detail:expr) => {
        tracing::info!(
            step = $step,
            total = $total,
            "[{}/{}] {} - {}",
            $step,
            $total,
            $name,
            $detail
        );
    };
    ($step:expr, $total:expr, $name:expr) => {
        tracing::info!(
            step = $step,
            total = $total,
            "[{}/{}] {}",
            $step,
            $total,
            $name
        );
    };
}

/// Macro for logging warnings during initialization.
#[macro_export]
macro_rules! log_init_warning {
    ($msg:expr) => {
        tracing::warn!("⚠️  {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        tracing::warn!("⚠️  {}", format!($msg, $($arg)*));
    };
}

/// Macro for logging successful completion of major phases.
#[macro_export]
macro_rules! log_success {
    ($msg:expr) => {
        tracing::info!("✅ {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        tracing::info!("✅ {}", format!($msg, $($arg)*));
    };
}

/// Macro for logging startup banners.
#[macro_export]
macro_rules! log_banner {
    ($title:expr) => {
        tracing::info!("");
        tracing::info!("═══════════════════════════════════════════════════");
        tracing::info!("  {}", $title);
        tracing::info!("═══════════════════════════════════════════════════");
        tracing::info!("");
    };
    ($title:expr, $subtitle:expr) => {
        tracing::info!("");
        tracing::info!("═══════════════════════════════════════════════════");
        tracing::info!("  {}", $title);
        tracing::info!("  {}", $subtitle);
        tracing::info!("═══════════════════════════════════════════════════");
        tracing::info!("");
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_timer_creation() {
        let timer = OpTimer::new("test_component", "test_operation");
        assert_eq!(timer.component, "test_component");
        assert_eq!(timer.operation, "test_operation");
    }

    #[test]
    fn test_op_timer_finish() {
        let timer = OpTimer::new("test", "operation");
        timer.finish();
    }

    #[test]
    fn test_op_timer_finish_with_result_ok() {
        let timer = OpTimer::new("test", "operation");
        let result: Result<i32, String> = Ok(42);
        timer.finish_with_result(result.as_ref());
    }

    #[test]
    fn test_op_timer_finish_with_result_err() {
        let timer = OpTimer::new("test", "operation");
        let result: Result<(), String> = Err("test error".to_string());
        timer.finish_with_result(result.as_ref());
    }
}
