mod args;
mod client;
mod print;

use clap::Parser;
use thiserror::Error;
use wavecache_api_types::{InvalidateRequest, InvalidateResponse, RegionBody};

use crate::args::{Cli, Command, InvalidateArgs, SwitchState};
use crate::client::{AdminClient, ClientError};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("{0}")]
    Usage(String),
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let client = AdminClient::new(cli.url.clone());

    match cli.command {
        Command::Status => {
            let status = client.status().await?;
            print::status(&status);
        }
        Command::Switch(args) => {
            let enabled = matches!(args.state, SwitchState::On);
            let response = client.set_switch(args.switch.into(), enabled).await?;
            println!(
                "{} -> {}",
                response.switch.as_str(),
                if response.enabled { "enabled" } else { "disabled" },
            );
        }
        Command::Quota(args) => {
            let response = client.set_quota(args.quota).await?;
            println!("quota -> {}", response.quota);
        }
        Command::Invalidate(args) => {
            let request = build_invalidate_request(&args)?;
            match client.invalidate(&request).await? {
                InvalidateResponse::Invalidated { count } => {
                    println!("invalidated {count} entries");
                }
                InvalidateResponse::Rejected => {
                    println!("rejected: the invalidate switch is disabled");
                }
            }
        }
    }

    Ok(())
}

fn build_invalidate_request(args: &InvalidateArgs) -> Result<InvalidateRequest, CliError> {
    if args.all {
        return Ok(InvalidateRequest {
            all: Some(true),
            ..InvalidateRequest::default()
        });
    }
    if let Some(ruleset) = args.ruleset.as_ref() {
        return Ok(InvalidateRequest {
            ruleset_id: Some(ruleset.clone()),
            ..InvalidateRequest::default()
        });
    }
    if args.region.is_empty() {
        return Err(CliError::Usage(
            "one of --all, --ruleset or --region is required".to_string(),
        ));
    }

    let mut regions = Vec::with_capacity(args.region.len());
    for spec in &args.region {
        regions.push(parse_region(spec)?);
    }
    Ok(InvalidateRequest {
        regions: Some(regions),
        ..InvalidateRequest::default()
    })
}

fn parse_region(spec: &str) -> Result<RegionBody, CliError> {
    let parts: Vec<&str> = spec.split(',').map(str::trim).collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(CliError::Usage(format!(
            "`{spec}` is not of the form LAT,LON[,KM]"
        )));
    }

    let lat: f64 = parts[0]
        .parse()
        .map_err(|_| CliError::Usage(format!("`{}` is not a latitude", parts[0])))?;
    let lon: f64 = parts[1]
        .parse()
        .map_err(|_| CliError::Usage(format!("`{}` is not a longitude", parts[1])))?;
    let radius_km = match parts.get(2) {
        Some(raw) => Some(
            raw.parse::<f64>()
                .map_err(|_| CliError::Usage(format!("`{raw}` is not a radius in km")))?,
        ),
        None => None,
    };

    Ok(RegionBody {
        lat,
        lon,
        radius_km,
    })
}
