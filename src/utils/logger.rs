use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

/// Initialise logging for the command line front-end
///
/// `RUST_LOG` overrides the default filter. Output goes to stderr so stdout
/// stays clean for the JSON result.
pub fn init_logger(verbose: bool) {
    let default_filter = if verbose {
        "warn,bgm_mixer=debug"
    } else {
        "warn,bgm_mixer=info"
    };
    let env = Env::default().filter_or("RUST_LOG", default_filter);

    let mut builder = Builder::from_env(env);
    builder
        .filter_module("tokio", LevelFilter::Warn)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr);

    // Tests and embedders may have installed a logger already
    let _ = builder.try_init();
}
