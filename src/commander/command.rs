//! Command registration.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use corvid_proto::Identity;

use super::response::Response;

/// A registered command hook.
///
/// Hooks run as independent tasks; the [`Response`] is theirs to drop,
/// which closes the invocation's reply channel.
#[async_trait]
pub trait Hook: Send + Sync + 'static {
    /// Handle one recognized occurrence of the command.
    async fn call(&self, source: Identity, resp: Response, name: String, args: Vec<String>);
}

/// Adapter implementing [`Hook`] for plain async closures.
struct FnHook<F>(F);

#[async_trait]
impl<F, Fut> Hook for FnHook<F>
where
    F: Fn(Identity, Response, String, Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn call(&self, source: Identity, resp: Response, name: String, args: Vec<String>) {
        (self.0)(source, resp, name, args).await;
    }
}

/// One command registration: immutable once the router starts.
///
/// ```
/// use corvid::commander::{Command, Response};
///
/// let cmd = Command::new("greet", |_source, mut resp: Response, _name, args: Vec<String>| async move {
///     resp.set_public();
///     resp.write(format!("hello {}", args.join(" "))).await;
/// })
/// .help("Greet someone")
/// .args(1, 3);
/// ```
pub struct Command {
    name: String,
    help: String,
    min: usize,
    max: Option<usize>,
    private: bool,
    hook: Arc<dyn Hook>,
}

impl Command {
    /// Create a command from a name and an async closure.
    pub fn new<F, Fut>(name: impl Into<String>, hook: F) -> Command
    where
        F: Fn(Identity, Response, String, Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Command::with_hook(name, Arc::new(FnHook(hook)))
    }

    /// Create a command from a name and a hook object.
    pub fn with_hook(name: impl Into<String>, hook: Arc<dyn Hook>) -> Command {
        Command {
            name: name.into(),
            help: String::new(),
            min: 0,
            max: None,
            private: false,
            hook,
        }
    }

    /// Limit the argument count. `None` for `max` leaves it unbounded.
    /// The bound is enforced before the hook runs.
    #[must_use]
    pub fn args(mut self, min: usize, max: impl Into<Option<usize>>) -> Self {
        self.min = min;
        self.max = max.into();
        self
    }

    /// Mark the command private: a statement of intent surfaced in help;
    /// the hook itself chooses private delivery through its [`Response`].
    #[must_use]
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    /// Set the help text; the first line is the summary shown in listings.
    #[must_use]
    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = text.into();
        self
    }

    /// The command name (uppercased once registered).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full help text.
    pub fn help_text(&self) -> &str {
        &self.help
    }

    /// Whether the command was marked private.
    pub fn is_private(&self) -> bool {
        self.private
    }

    pub(crate) fn normalize(&mut self) {
        self.name = self.name.to_uppercase();
    }

    pub(crate) fn hook(&self) -> Arc<dyn Hook> {
        Arc::clone(&self.hook)
    }

    pub(crate) fn arity_ok(&self, count: usize) -> bool {
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }
}
