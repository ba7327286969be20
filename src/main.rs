use log::error;
use multipart_sink::{Config, DirSink, Server};

fn main() {
    dotenv::dotenv().ok();
    pretty_env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let sink = match DirSink::new(&config.storage_dir) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Failed to create storage directory: {}", e);
            std::process::exit(1);
        }
    };

    let server = Server::new(config, sink);
    if let Err(e) = server.run() {
        error!("Server stopped: {}", e);
        std::process::exit(1);
    }
}
