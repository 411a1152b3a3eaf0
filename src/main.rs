use classroom_server::api;
use classroom_server::classroom::{ClassroomHandle, CommandProcessor};
use classroom_server::config::{Config, LogFormat};
use classroom_server::directory;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(config.logging.format);

    let directory = match directory::from_config(&config.directory) {
        Ok(directory) => directory,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialise user directory");
            std::process::exit(1);
        }
    };

    let classroom = ClassroomHandle::spawn(CommandProcessor::new(
        config.classroom.max_message_length,
    ));

    let routes = api::routes(classroom, directory, config.classroom.clone());

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Classroom server listening"
    );

    warp::serve(routes)
        .run(config.bind_address())
        .await;
}

/// `RUST_LOG` selects levels, falling back to `info`.
fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_current_span(true)
                .init();
        }
        LogFormat::Text => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}
