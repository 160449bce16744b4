//! Per-thread diagnostic breadcrumbs for the build pipeline.
//!
//! The parser records where it is (which resource, which activity, which
//! statement) while it works. When a build fails, the breadcrumbs are
//! snapshotted into the [`BuildError`](crate::BuildError). Every build resets
//! the context before returning, so nothing leaks into the next build on the
//! same thread. Each thread has its own context; builds running on different
//! threads never see each other's breadcrumbs.

use std::cell::RefCell;
use std::fmt;

thread_local! {
    static CONTEXT: RefCell<ErrorContextSnapshot> = RefCell::new(ErrorContextSnapshot::default());
}

/// Handle to the calling thread's diagnostic context.
///
/// # Example
///
/// ```rust
/// use sqlsession::ErrorContext;
///
/// ErrorContext::resource("config.toml");
/// ErrorContext::activity("parsing settings");
/// assert!(!ErrorContext::is_empty());
///
/// ErrorContext::reset();
/// assert!(ErrorContext::is_empty());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ErrorContext;

impl ErrorContext {
    /// Record the resource being processed.
    pub fn resource(resource: impl Into<String>) {
        Self::update(|ctx| ctx.resource = Some(resource.into()));
    }

    /// Record what the pipeline is currently doing.
    pub fn activity(activity: impl Into<String>) {
        Self::update(|ctx| ctx.activity = Some(activity.into()));
    }

    /// Record the object (statement id, environment id, ...) being processed.
    pub fn object(object: impl Into<String>) {
        Self::update(|ctx| ctx.object = Some(object.into()));
    }

    /// Record a summary message.
    pub fn message(message: impl Into<String>) {
        Self::update(|ctx| ctx.message = Some(message.into()));
    }

    /// Record the SQL being processed.
    pub fn sql(sql: impl Into<String>) {
        Self::update(|ctx| ctx.sql = Some(sql.into()));
    }

    /// Record the rendered cause of a failure.
    pub fn cause(cause: impl Into<String>) {
        Self::update(|ctx| ctx.cause = Some(cause.into()));
    }

    /// Copy the current breadcrumbs.
    pub fn snapshot() -> ErrorContextSnapshot {
        CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Whether no breadcrumb is recorded on this thread.
    pub fn is_empty() -> bool {
        CONTEXT.with(|ctx| ctx.borrow().is_empty())
    }

    /// Clear every breadcrumb on this thread.
    pub fn reset() {
        CONTEXT.with(|ctx| *ctx.borrow_mut() = ErrorContextSnapshot::default());
    }

    fn update(f: impl FnOnce(&mut ErrorContextSnapshot)) {
        CONTEXT.with(|ctx| f(&mut ctx.borrow_mut()));
    }
}

/// A copy of the diagnostic breadcrumbs at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContextSnapshot {
    resource: Option<String>,
    activity: Option<String>,
    object: Option<String>,
    message: Option<String>,
    sql: Option<String>,
    cause: Option<String>,
}

impl ErrorContextSnapshot {
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn activity(&self) -> Option<&str> {
        self.activity.as_deref()
    }

    pub fn object(&self) -> Option<&str> {
        self.object.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    /// Whether every field is unset.
    pub fn is_empty(&self) -> bool {
        self.resource.is_none()
            && self.activity.is_none()
            && self.object.is_none()
            && self.message.is_none()
            && self.sql.is_none()
            && self.cause.is_none()
    }
}

impl fmt::Display for ErrorContextSnapshot {
    /// Renders one `### ` line per recorded breadcrumb, each on a new line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = &self.message {
            write!(f, "\n### {}", message)?;
        }
        if let Some(resource) = &self.resource {
            write!(f, "\n### The error may exist in {}", resource)?;
        }
        if let Some(object) = &self.object {
            write!(f, "\n### The error may involve {}", object)?;
        }
        if let Some(activity) = &self.activity {
            write!(f, "\n### The error occurred while {}", activity)?;
        }
        if let Some(sql) = &self.sql {
            let sql = sql.split_whitespace().collect::<Vec<_>>().join(" ");
            write!(f, "\n### SQL: {}", sql)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, "\n### Cause: {}", cause)?;
        }
        Ok(())
    }
}
