//! Tower middleware used by the client stack.

mod redirect;
mod retry;
mod user_agent;

pub use redirect::RedirectPolicy;
pub use retry::RetryPolicy;
pub use user_agent::UserAgentLayer;
