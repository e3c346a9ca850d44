use std::{path::PathBuf, sync::Arc};

use clap::{ArgGroup, Parser};
use navigator::{
    config::NavigatorConfig,
    geocoding::NominatimClient,
    location::{LocationProvider, SimulatedSensor},
    map_view::{route_feature, style_document, MapTap},
    routing::{approximate_distance_km, OsrmClient},
    screens::MapOverlay,
    workflow::{NavigationWorkflow, Outcome},
    Coordinate,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_ENV: &str = "NAVIGATOR_CONFIG";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Plan a route from a simulated position to a searched or tapped destination"
)]
#[command(group(ArgGroup::new("destination").required(true).args(["to", "tap"])))]
struct Args {
    /// Simulated device position as `lon,lat`
    #[arg(long, value_parser = parse_lon_lat, allow_hyphen_values = true)]
    from: Coordinate,

    /// Free-text destination, resolved through the geocoding service
    #[arg(long)]
    to: Option<String>,

    /// Destination as `lon,lat`, as if tapped on the map
    #[arg(long, value_parser = parse_lon_lat, allow_hyphen_values = true)]
    tap: Option<Coordinate>,

    /// JSON config file (falls back to $NAVIGATOR_CONFIG, then defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also print the map style document
    #[arg(long)]
    print_style: bool,
}

fn parse_lon_lat(raw: &str) -> Result<Coordinate, String> {
    let (lon, lat) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected lon,lat but got {raw:?}"))?;
    let lon = lon
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid longitude: {err}"))?;
    let lat = lat
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid latitude: {err}"))?;
    Coordinate::new(lon, lat).map_err(|err| err.to_string())
}

fn load_config(path: Option<PathBuf>) -> Result<NavigatorConfig, Box<dyn std::error::Error>> {
    let path = path.or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));
    let mut config = match path {
        Some(path) => {
            tracing::info!("loading config from {}", path.display());
            NavigatorConfig::from_file(&path)?
        }
        None => NavigatorConfig::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "navigator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config(args.config.clone())?;

    // UI-style scheduling: everything runs on one thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(args, config))
}

async fn run(args: Args, config: NavigatorConfig) -> Result<(), Box<dyn std::error::Error>> {
    if args.print_style {
        println!("{}", serde_json::to_string_pretty(&style_document(&config.map))?);
    }

    let geocoder = Arc::new(NominatimClient::new(&config.geocoding)?);
    let router = Arc::new(OsrmClient::new(&config.routing)?);
    let sensor = Arc::new(SimulatedSensor::fixed(args.from));
    let location = LocationProvider::new(sensor, config.location);
    let mut workflow = NavigationWorkflow::new(geocoder, router, location);

    if let Outcome::Failed(notice) = workflow.mount().await {
        return Err(format!("{}: {}", notice.title, notice.message).into());
    }
    if let Some(info) = MapOverlay::new(workflow.current_location()).info {
        tracing::info!("{info}");
    }

    let outcome = match (args.to.as_deref(), args.tap) {
        (Some(query), _) => workflow.search(query).await,
        (None, Some(tap)) => workflow.tap(MapTap::new(tap)).await,
        (None, None) => return Err("a destination is required".into()),
    };

    let result: Result<(), Box<dyn std::error::Error>> = match outcome {
        Outcome::Displayed => match workflow.route() {
            Some(route) => {
                tracing::info!(
                    "route of {:.2} km with {} points",
                    approximate_distance_km(route.coordinates()),
                    route.len()
                );
                println!("{}", serde_json::to_string_pretty(&route_feature(&route))?);
                Ok(())
            }
            None => Err("route vanished after being displayed".into()),
        },
        Outcome::Failed(notice) => Err(format!("{}: {}", notice.title, notice.message).into()),
        other => Err(format!("navigation did not complete: {other:?}").into()),
    };

    workflow.unmount();
    result
}
