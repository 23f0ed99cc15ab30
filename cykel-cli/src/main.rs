use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use cykel_costing::CostParams;
use cykel_graphtile::graph_tile::GraphTile;
use cykel_graphtile::shape_codec::decode_shape;
use cykel_graphtile::tile_provider::{DirectoryTileProvider, GraphTileProvider};
use cykel_graphtile::GraphId;
use cykel_router::{CancelToken, RouteOptions, RoutePlanner, RouteRequest};
use geo::coord;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "cykel", author, version, about, long_about = None)]
struct Cli {
    /// Root of the tile directory tree
    #[arg(env)]
    tile_dir: PathBuf,

    /// Cache this many parsed tiles in memory
    #[arg(long, default_value_t = cykel_graphtile::tile_provider::DEFAULT_TILE_CACHE_SIZE)]
    cache_size: usize,

    /// Optional scratch directory for inflated tiles
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Subcommand/tool to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pretty-print information about a node
    GetNode {
        /// Graph ID (u64) or slash-form level/tile/index
        graph_id: String,
    },
    /// Pretty-print information about a directed edge
    GetEdge {
        /// Graph ID (u64) or slash-form level/tile/index
        graph_id: String,
    },
    /// Compute a bicycle route between two coordinates
    Route {
        /// Start as lat,lon
        #[arg(long)]
        from: String,
        /// End as lat,lon
        #[arg(long)]
        to: String,
        /// Costing options as JSON (the costing_options.bicycle shape)
        #[arg(long)]
        costing: Option<String>,
        /// Include full edge geometry in the output shape
        #[arg(long)]
        densify: bool,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<f64>,
    },
}

fn parse_graph_id(input: &str) -> anyhow::Result<GraphId> {
    // Try pure integer
    if let Ok(id) = input.parse::<u64>() {
        return GraphId::try_from_id(id).map_err(|e| anyhow!(e));
    }

    // Try slash-separated level/tile/index
    let parts: Vec<&str> = input.split('/').collect();
    if parts.len() == 3 {
        let level = u8::from_str(parts[0]).context("invalid level in graph id")?;
        let tile_id = u64::from_str(parts[1]).context("invalid tile id in graph id")?;
        let index = u64::from_str(parts[2]).context("invalid index in graph id")?;
        return GraphId::try_from_components(level, tile_id, index).map_err(|e| anyhow!(e));
    }

    Err(anyhow!(
        "Unrecognized graph id format. Use a u64 integer or level/tile/index"
    ))
}

fn parse_lat_lon(input: &str) -> anyhow::Result<geo::Coord<f64>> {
    let (lat, lon) = input
        .split_once(',')
        .ok_or_else(|| anyhow!("Expected lat,lon"))?;
    let lat: f64 = lat.trim().parse().context("invalid latitude")?;
    let lon: f64 = lon.trim().parse().context("invalid longitude")?;
    Ok(coord! { x: lon, y: lat })
}

fn build_provider(cli: &Cli) -> anyhow::Result<Arc<DirectoryTileProvider>> {
    let cache_size = NonZeroUsize::new(cli.cache_size)
        .ok_or_else(|| anyhow!("cache size must be at least 1"))?;
    let mut provider = DirectoryTileProvider::new(cli.tile_dir.clone(), cache_size);
    if let Some(scratch) = &cli.scratch_dir {
        provider = provider.with_scratch_directory(scratch.clone());
    }
    Ok(Arc::new(provider))
}

fn print_node(provider: &Arc<DirectoryTileProvider>, gid: GraphId) -> anyhow::Result<()> {
    let tile = provider.get_tile(gid)?;
    let node = tile
        .get_node(gid)
        .map_err(|e| anyhow!("node lookup failed: {e}"))?;
    let coord = tile.node_coordinate(node);

    let output = serde_json::json!({
        "graph_id": gid.to_string(),
        "lat": coord.y,
        "lon": coord.x,
        "edge_count": node.edge_count(),
        "access": node.access().iter().map(|a| format!("{a:?}")).collect::<Vec<_>>(),
        "has_up_transition": node.has_up_transition(),
        "has_down_transition": node.has_down_transition(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_edge(provider: &Arc<DirectoryTileProvider>, gid: GraphId) -> anyhow::Result<()> {
    let tile = provider.get_tile(gid)?;
    let edge = tile
        .get_directed_edge(gid)
        .map_err(|e| anyhow!("edge lookup failed: {e}"))?;
    let info = tile.get_edge_info(edge)?;

    let output = serde_json::json!({
        "graph_id": gid.to_string(),
        "end_node": edge.end_node_id().to_string(),
        "length_m": edge.length(),
        "speed_kph": edge.speed(),
        "use": format!("{:?}", edge.edge_use()),
        "classification": format!("{:?}", edge.classification()),
        "surface": format!("{:?}", edge.surface()),
        "cycle_lane": format!("{:?}", edge.cycle_lane()),
        "weighted_grade": edge.weighted_grade(),
        "lane_count": edge.lane_count(),
        "shoulder": edge.shoulder(),
        "bike_network": edge.bike_network(),
        "use_sidepath": edge.use_sidepath(),
        "dismount": edge.dismount(),
        "truck_route": edge.truck_route(),
        "forward_access": edge.forward_access().iter().map(|a| format!("{a:?}")).collect::<Vec<_>>(),
        "reverse_access": edge.reverse_access().iter().map(|a| format!("{a:?}")).collect::<Vec<_>>(),
        "names": info.get_names(),
        "way_id": info.way_id(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_route(
    provider: Arc<DirectoryTileProvider>,
    from: &str,
    to: &str,
    costing: Option<&str>,
    densify: bool,
    timeout: Option<f64>,
) -> anyhow::Result<()> {
    let start = parse_lat_lon(from)?;
    let end = parse_lat_lon(to)?;
    let params: CostParams = match costing {
        Some(json) => serde_json::from_str(json).context("invalid costing options")?,
        None => CostParams::default(),
    };

    let cancel = match timeout {
        Some(secs) => CancelToken::with_deadline(Instant::now() + Duration::from_secs_f64(secs)),
        None => CancelToken::new(),
    };

    let planner = RoutePlanner::new(provider);
    let request = RouteRequest {
        start,
        end,
        params,
        options: RouteOptions {
            densify_shape: densify,
            ..RouteOptions::default()
        },
    };

    let summary = planner.route(&request, &cancel)?;
    let shape: Vec<[f64; 2]> = decode_shape(&summary.shape)
        .into_iter()
        .map(|c| [c.y, c.x])
        .collect();

    let output = serde_json::json!({
        "length_km": summary.length_km,
        "time_s": summary.time_s,
        "car_km": summary.car_km,
        "cyclefree_km": summary.cyclefree_km,
        "level_transitions": summary.transitions,
        "shape": shape,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        // Standard logger, configured via the RUST_LOG env variable
        .with(tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env()))
        .init();

    let cli = Cli::parse();
    info!(tile_dir = %cli.tile_dir.display(), "Using tile directory");
    let provider = build_provider(&cli)?;

    match &cli.command {
        Commands::GetNode { graph_id } => {
            let gid = parse_graph_id(graph_id)?;
            print_node(&provider, gid)
        }
        Commands::GetEdge { graph_id } => {
            let gid = parse_graph_id(graph_id)?;
            print_edge(&provider, gid)
        }
        Commands::Route {
            from,
            to,
            costing,
            densify,
            timeout,
        } => run_route(
            provider,
            from,
            to,
            costing.as_deref(),
            *densify,
            *timeout,
        ),
    }
}
