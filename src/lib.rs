mod error;
pub use error::Error;

mod classify;
pub use classify::Classification;

mod part;
pub use part::Part;

mod decomposer;
pub use decomposer::{decompose, PersistAction};

mod sink;
pub use sink::{DirSink, Sink};

mod server;
pub use server::{timestamp, Config, Server};
