// Library interface for escribe-server, so integration tests can start a
// listener on an ephemeral port.

pub mod server;

pub use server::{route, start, AssistantServer, Route, ShutdownHandle};
