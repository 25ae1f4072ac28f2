use clap::Parser;
use simview::settings::CliArgs;
use simview::viewer::application::ViewerApplication;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = CliArgs::parse();
    log::trace!("Starting with args: {:?}", args);

    let (app, receiver) = ViewerApplication::from_args(&args);
    app.run(receiver)
}
