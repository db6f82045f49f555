use cardr::{
    card::{CardGenerator, CardRequest},
    configuration::CardConfiguration,
    error::{ContextError, ErrorKind},
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Generates visiting cards from a PDF template", long_about = None)]
struct CliArguments {
    /// A JSON file overriding the default template, fonts, layout and paths.
    #[arg(short = 'c', long = "configuration", value_name = "json_file", global = true)]
    configuration_path: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serves the card form and generates a card for every submission.
    Serve {
        #[arg(short = 'b', long = "bind", value_name = "address")]
        bind_address: Option<String>,
    },
    /// Generates a single card without going through the web form.
    Generate {
        #[arg(long)]
        name: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(short = 'o', long = "output", value_name = "file_path")]
        output_file_path: PathBuf,
    },
}

fn main() {
    if let Err(error) = fallible_main() {
        log::error!("{}", error);
        std::process::exit(1);
    }
}

fn fallible_main() -> Result<(), ContextError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let arguments = CliArguments::parse();
    log::debug!("{:?}", arguments);

    let mut configuration = match &arguments.configuration_path {
        Some(configuration_path) => CardConfiguration::from_path(configuration_path)?,
        None => CardConfiguration::default(),
    };

    match arguments.command {
        Command::Serve { bind_address } => {
            if let Some(bind_address) = bind_address {
                configuration.bind_address = bind_address;
            }
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|error| {
                    ContextError::with_error("Failed to start the async runtime", &error)
                        .of_kind(ErrorKind::Io)
                })?;
            runtime.block_on(cardr::server::serve(&configuration))
        }
        Command::Generate {
            name,
            role,
            email,
            phone,
            output_file_path,
        } => {
            let request = CardRequest {
                name,
                role,
                email,
                phone,
            };
            CardGenerator::from_configuration(&configuration)
                .generate_to_path(&request, &output_file_path)?;
            log::info!(
                "Saved the card of {:?} to the path: {:?}",
                request.name,
                output_file_path
            );
            Ok(())
        }
    }
}
